//! Slug derivation and collision handling.
//!
//! Uniqueness is checked against the tree *as it will exist after pending
//! staged changes apply*, so callers pass slugs from the staged+committed
//! union.

use std::collections::HashSet;

/// Turn a display label into a URL-safe slug.
pub fn slugify(label: &str) -> String {
    let mut slug = String::with_capacity(label.len());
    let mut last_dash = true;
    for ch in label.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Resolve a slug collision by suffixing `-2`, `-3`, … until free.
pub fn unique_slug(candidate: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(candidate) {
        return candidate.to_string();
    }
    let mut n = 2u32;
    loop {
        let suffixed = format!("{candidate}-{n}");
        if !taken.contains(&suffixed) {
            return suffixed;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Plumbing", "plumbing")]
    #[case("Plumbing & Heating", "plumbing-heating")]
    #[case("  Leak   Fixing ", "leak-fixing")]
    #[case("24/7 Call-out", "24-7-call-out")]
    #[case("---", "")]
    fn slugify_cases(#[case] label: &str, #[case] expected: &str) {
        assert_eq!(slugify(label), expected);
    }

    #[test]
    fn unique_slug_suffixes_on_collision() {
        let mut taken = HashSet::new();
        assert_eq!(unique_slug("plumbing", &taken), "plumbing");

        taken.insert("plumbing".to_string());
        assert_eq!(unique_slug("plumbing", &taken), "plumbing-2");

        taken.insert("plumbing-2".to_string());
        assert_eq!(unique_slug("plumbing", &taken), "plumbing-3");
    }
}
