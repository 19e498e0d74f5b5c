//! taxon-host: the hosted repository's REST API, behind a trait.
//!
//! The publish pipeline only ever talks to the code host through
//! [`CodeHost`]: file contents at a ref, content writes guarded by a
//! content-hash precondition, server-side branch merges, and pull requests.
//! `GithubHost` implements it over the GitHub-style REST API; `MemoryHost`
//! is an in-memory fake for tests and local development.

pub mod api;
pub mod config;
pub mod github;
pub mod memory;

pub use api::*;
pub use config::*;
pub use github::*;
pub use memory::*;
