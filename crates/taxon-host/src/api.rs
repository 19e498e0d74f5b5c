//! The code-host boundary: types and the `CodeHost` trait.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A file read from the hosted repository. `content` is decoded text;
/// transport encodings (base64) are an implementation detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub content: String,
    /// Content hash the host requires as a precondition on the next write.
    pub sha: String,
}

/// A commit created through the content API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    pub url: String,
}

/// Result of a server-side branch merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// A real merge commit was created.
    Merged { sha: String },
    /// The head branch already contained everything from base.
    AlreadyUpToDate,
    /// The host detected conflicts; never auto-resolved.
    Conflict { message: String },
}

/// An open or merged pull request, owned by the code host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub url: String,
    pub title: String,
}

/// Detailed view of a single pull request. The change counts come only from
/// the single-pull endpoint, not from listings, hence the separate type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullDetails {
    pub number: u64,
    pub url: String,
    pub title: String,
    pub commits: u64,
    pub additions: u64,
    pub deletions: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    Squash,
    Merge,
    Rebase,
}

impl MergeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStrategy::Squash => "squash",
            MergeStrategy::Merge => "merge",
            MergeStrategy::Rebase => "rebase",
        }
    }
}

/// Errors from the code-host API.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("authentication with the code host failed")]
    Unauthorized,

    /// The file's hash changed between read and write. Recoverable: re-read
    /// and retry; never silently overwrite.
    #[error("remote content changed since read: {path}")]
    ShaMismatch { path: String },

    #[error("branch not found: {0}")]
    BranchNotFound(String),

    #[error("request to the code host failed: {0}")]
    Transport(String),

    #[error("code host returned {status}: {message}")]
    Api { status: u16, message: String },
}

/// Everything the publish pipeline needs from the hosted repository.
pub trait CodeHost: Send + Sync {
    /// Fetch a file at a ref. A missing file is `Ok(None)`, not an error:
    /// the caller treats it as first-time creation.
    fn get_file(&self, path: &str, reference: &str) -> Result<Option<RemoteFile>, HostError>;

    /// Create or update a file on a branch. `prior_sha` must match the
    /// current remote hash for updates and be `None` for new files.
    fn put_file(
        &self,
        path: &str,
        message: &str,
        content: &str,
        prior_sha: Option<&str>,
        branch: &str,
    ) -> Result<CommitInfo, HostError>;

    /// Server-side merge of `head` into `base`.
    fn merge_branch(&self, base: &str, head: &str, message: &str)
        -> Result<MergeOutcome, HostError>;

    fn list_open_pulls(&self, head: &str, base: &str) -> Result<Vec<PullRequest>, HostError>;

    fn create_pull(
        &self,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> Result<PullRequest, HostError>;

    /// Fetch one pull request with its commit and line-change counts, for
    /// review summaries.
    fn get_pull(&self, number: u64) -> Result<PullDetails, HostError>;

    /// Merge a pull request. Returns whether the host reports it merged.
    fn merge_pull(
        &self,
        number: u64,
        strategy: MergeStrategy,
        title: &str,
    ) -> Result<bool, HostError>;
}
