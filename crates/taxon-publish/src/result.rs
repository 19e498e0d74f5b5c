//! Caller-facing publish outcome types.

use serde::Serialize;

use crate::error::ErrorCode;

/// Workflow stages, used to report where a publish failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Sanitizing,
    Syncing,
    Committing,
    EnsuringPr,
    Merging,
}

/// What a (fully or partially) successful publish produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PublishData {
    pub commits_created: usize,
    pub commit_shas: Vec<String>,
    pub pr_number: Option<u64>,
    pub pr_url: Option<String>,
    /// Drafts that survived sanitization and optimization.
    pub published_drafts: usize,
}

/// A typed failure, with retry guidance derivable from `code`.
#[derive(Debug, Clone, Serialize)]
pub struct PublishFailure {
    pub code: ErrorCode,
    pub message: String,
    pub recoverable: bool,
    pub failed_at: Option<Stage>,
}

impl PublishFailure {
    pub fn new(code: ErrorCode, message: impl Into<String>, failed_at: Option<Stage>) -> Self {
        Self {
            code,
            message: message.into(),
            recoverable: code.recoverable(),
            failed_at,
        }
    }
}

/// The single result type of `publish_all_changes`.
///
/// `success` with a populated `error` is the partial-success case: all
/// commits landed but the pull request needs manual attention. A failure
/// may still carry `data` describing commits that landed before the failing
/// stage; partial progress is never rolled back.
#[derive(Debug, Clone, Serialize)]
pub struct PublishResult {
    pub success: bool,
    pub data: Option<PublishData>,
    pub error: Option<PublishFailure>,
}

impl PublishResult {
    pub fn succeeded(data: PublishData) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Commits landed but PR handling failed; the durable artifact is safe.
    pub fn succeeded_with_warning(data: PublishData, warning: PublishFailure) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: Some(warning),
        }
    }

    pub fn failed(failure: PublishFailure) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(failure),
        }
    }

    /// Failure after some commits already landed.
    pub fn failed_with_progress(data: PublishData, failure: PublishFailure) -> Self {
        Self {
            success: false,
            data: Some(data),
            error: Some(failure),
        }
    }
}
