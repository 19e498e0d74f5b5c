//! Generic tree walks over taxonomy items.
//!
//! A single visit-by-id utility replaces per-operation recursive walks:
//! update is a merge-and-keep transform, delete is a remove transform.

use std::collections::HashSet;

use crate::taxonomy::TaxonomyItem;

/// Outcome of a node transform during [`visit_item_mut`].
pub enum Visit {
    /// Put the (possibly modified) node back in place.
    Keep(TaxonomyItem),
    /// Drop the node and its entire subtree.
    Remove,
}

/// Find the node with `id` at any depth and apply `transform` to it.
///
/// Returns `true` if the node was found. Search order is depth-first in
/// sequence order, so ids being unique means at most one node is visited.
pub fn visit_item_mut<F>(nodes: &mut Vec<TaxonomyItem>, id: &str, transform: &mut F) -> bool
where
    F: FnMut(TaxonomyItem) -> Visit,
{
    for i in 0..nodes.len() {
        if nodes[i].id == id {
            let node = nodes.remove(i);
            match transform(node) {
                Visit::Keep(node) => nodes.insert(i, node),
                Visit::Remove => {}
            }
            return true;
        }
        if visit_item_mut(&mut nodes[i].children, id, transform) {
            return true;
        }
    }
    false
}

/// Find a node by id at any depth.
pub fn find_item<'a>(nodes: &'a [TaxonomyItem], id: &str) -> Option<&'a TaxonomyItem> {
    for node in nodes {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_item(&node.children, id) {
            return Some(found);
        }
    }
    None
}

/// All ids in the tree, at every depth.
pub fn collect_ids(nodes: &[TaxonomyItem]) -> HashSet<String> {
    let mut ids = HashSet::new();
    collect_into(nodes, &mut ids, |n| n.id.clone());
    ids
}

/// All slugs in the tree, at every depth.
pub fn collect_slugs(nodes: &[TaxonomyItem]) -> HashSet<String> {
    let mut slugs = HashSet::new();
    collect_into(nodes, &mut slugs, |n| n.slug.clone());
    slugs
}

fn collect_into<F>(nodes: &[TaxonomyItem], out: &mut HashSet<String>, f: F)
where
    F: Fn(&TaxonomyItem) -> String + Copy,
{
    for node in nodes {
        out.insert(f(node));
        collect_into(&node.children, out, f);
    }
}

/// Largest numeric id present in the tree, 0 if none parse.
pub fn max_numeric_id(nodes: &[TaxonomyItem]) -> u64 {
    let mut max = 0;
    for node in nodes {
        if let Ok(n) = node.id.parse::<u64>() {
            max = max.max(n);
        }
        max = max.max(max_numeric_id(&node.children));
    }
    max
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Vec<TaxonomyItem> {
        let mut repairs = TaxonomyItem::new("2", "Repairs", "repairs");
        repairs
            .children
            .push(TaxonomyItem::new("3", "Leak Fixing", "leak-fixing"));
        let mut plumbing = TaxonomyItem::new("1", "Plumbing", "plumbing");
        plumbing.children.push(repairs);
        vec![plumbing, TaxonomyItem::new("4", "Gardening", "gardening")]
    }

    #[test]
    fn finds_nodes_at_every_depth() {
        let tree = sample_tree();
        assert_eq!(find_item(&tree, "1").unwrap().slug, "plumbing");
        assert_eq!(find_item(&tree, "2").unwrap().slug, "repairs");
        assert_eq!(find_item(&tree, "3").unwrap().slug, "leak-fixing");
        assert!(find_item(&tree, "99").is_none());
    }

    #[test]
    fn visit_transforms_a_deep_node() {
        let mut tree = sample_tree();
        let found = visit_item_mut(&mut tree, "3", &mut |mut node| {
            node.label = "Leak Repair".into();
            Visit::Keep(node)
        });
        assert!(found);
        assert_eq!(find_item(&tree, "3").unwrap().label, "Leak Repair");
    }

    #[test]
    fn visit_remove_drops_subtree() {
        let mut tree = sample_tree();
        let found = visit_item_mut(&mut tree, "2", &mut |_| Visit::Remove);
        assert!(found);
        assert!(find_item(&tree, "2").is_none());
        // Children go with the deleted node, no re-parenting.
        assert!(find_item(&tree, "3").is_none());
        assert!(find_item(&tree, "1").is_some());
    }

    #[test]
    fn visit_reports_missing_id() {
        let mut tree = sample_tree();
        let found = visit_item_mut(&mut tree, "99", &mut |node| Visit::Keep(node));
        assert!(!found);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn id_and_slug_collection_spans_depths() {
        let tree = sample_tree();
        let ids = collect_ids(&tree);
        assert_eq!(ids.len(), 4);
        assert!(ids.contains("3"));
        let slugs = collect_slugs(&tree);
        assert!(slugs.contains("leak-fixing"));
    }

    #[test]
    fn max_numeric_id_spans_depths() {
        let tree = sample_tree();
        assert_eq!(max_numeric_id(&tree), 4);
        assert_eq!(max_numeric_id(&[]), 0);
    }
}
