//! taxon-publish: the admin edit surface and the publish pipeline.
//!
//! Edits are staged through [`TaxonomyService`] (permission gate, advisory
//! lock, union-state validation). `publish_all_changes` is the single
//! caller-facing publish entry point: sanitize → optimize → group by type →
//! sync → per-type merge+commit → ensure PR → auto-merge, with typed failure
//! reporting per stage. The workflow never clears staging; the caller does
//! once it has confirmed the terminal state.

pub mod error;
pub mod orchestrator;
pub mod permissions;
pub mod result;
pub mod service;
pub mod workflow;

pub use error::*;
pub use orchestrator::*;
pub use permissions::*;
pub use result::*;
pub use service::*;
pub use workflow::*;
