//! taxon-core: Taxonomy tree model, merge engine, and draft handling.
//!
//! Taxonomies classify marketplace listings. `categories` is a three-level
//! tree (category → subcategory → subdivision); `tags` and `skills` are flat.
//! The committed form of each taxonomy lives as a generated source file in a
//! hosted repository; edits are staged, optimized, and merged onto the
//! committed tree in submission order before publishing.

pub mod change;
pub mod draft;
pub mod merge;
pub mod slug;
pub mod taxonomy;
pub mod tree;

pub use change::*;
pub use draft::*;
pub use merge::*;
pub use slug::*;
pub use taxonomy::*;
pub use tree::*;
