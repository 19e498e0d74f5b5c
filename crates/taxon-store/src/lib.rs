//! taxon-store: durable staging queue and advisory locks.
//!
//! Staged changes are the canonical pending-edit state between admin edits
//! and a publish. The advisory lock serializes concurrent staging writes per
//! taxonomy type and operation class; it is cooperative, not storage-engine
//! enforced.

pub mod schema;
pub mod sqlite;
pub mod staging;

pub use sqlite::*;
pub use staging::*;
