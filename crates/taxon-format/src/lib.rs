//! taxon-format: round-trip exact handling of generated taxonomy files.
//!
//! Each taxonomy is committed as a generated source file: a fixed import
//! header followed by a single named export whose body is the item array.
//! The writer normalizes property order per item (id, label, slug,
//! description, image, then the remaining metadata alphabetically, children
//! last) so repeated machine commits produce minimal, reviewable diffs
//! instead of reordering noise. Normalization comes from the declaration
//! order of `TaxonomyItem`'s fields.

use thiserror::Error;

use taxon_core::{TaxonomyItem, TaxonomyType};

const HEADER: &str = "// Generated by the taxonomy pipeline. Do not edit by hand.\n\
                      import type { TaxonomyItem } from \"../types\";\n";

/// Errors from reading a generated taxonomy file.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("no `export const {symbol}` array found in {taxonomy_type} file")]
    MissingExport {
        taxonomy_type: TaxonomyType,
        symbol: &'static str,
    },

    #[error("malformed item array in {taxonomy_type} file: {source}")]
    BadArray {
        taxonomy_type: TaxonomyType,
        #[source]
        source: serde_json::Error,
    },
}

/// Extract and deserialize the exported item array from file text.
pub fn parse_taxonomy_file(
    ty: TaxonomyType,
    text: &str,
) -> Result<Vec<TaxonomyItem>, FormatError> {
    let symbol = ty.export_symbol();
    let marker = format!("export const {symbol}");
    let export_at = text.find(&marker).ok_or(FormatError::MissingExport {
        taxonomy_type: ty,
        symbol,
    })?;
    // The array body starts after the `=`; a `[` before it belongs to the
    // type annotation.
    let tail = &text[export_at..];
    let eq = tail.find('=').ok_or(FormatError::MissingExport {
        taxonomy_type: ty,
        symbol,
    })?;
    let tail = &tail[eq + 1..];
    let open = tail.find('[').ok_or(FormatError::MissingExport {
        taxonomy_type: ty,
        symbol,
    })?;
    let close = tail.rfind(']').filter(|&close| close > open).ok_or(
        FormatError::MissingExport {
            taxonomy_type: ty,
            symbol,
        },
    )?;
    let body = &tail[open..=close];

    serde_json::from_str(body).map_err(|source| FormatError::BadArray {
        taxonomy_type: ty,
        source,
    })
}

/// Re-emit the generated file for a taxonomy with normalized formatting.
pub fn generate_taxonomy_file(ty: TaxonomyType, items: &[TaxonomyItem]) -> String {
    // Serialization order follows TaxonomyItem field declaration order, and
    // absent optional fields are skipped, which is exactly the normalized
    // property order the committed files use.
    let body = serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string());
    format!(
        "{HEADER}\nexport const {symbol}: TaxonomyItem[] = {body};\n",
        symbol = ty.export_symbol(),
    )
}
