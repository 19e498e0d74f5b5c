//! Pipeline error taxonomy.
//!
//! Every stage catches its own external-call failures and converts them into
//! one of these typed outcomes before returning up the workflow; nothing
//! propagates as an unhandled error to the caller.

use serde::Serialize;
use thiserror::Error;

use taxon_core::MergeError;
use taxon_format::FormatError;
use taxon_host::HostError;
use taxon_store::StoreError;

/// Stable, caller-facing error codes. The UI maps these to localized
/// messages and retry guidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    PermissionDenied,
    Locked,
    NotFound,
    ValidationFailed,
    NoChanges,
    SyncFailed,
    CommitFailed,
    PrCreateFailed,
    PrMergeFailed,
    Internal,
}

impl ErrorCode {
    /// Whether the caller may retry without operator intervention.
    pub fn recoverable(&self) -> bool {
        !matches!(self, ErrorCode::PermissionDenied)
    }

    /// Retry guidance shown to the admin.
    pub fn retry_guidance(&self) -> &'static str {
        match self {
            ErrorCode::PermissionDenied => "you do not have access to edit taxonomies",
            ErrorCode::Locked => "another edit is in progress, try again in a few seconds",
            ErrorCode::NotFound => "the item no longer exists, refresh and try again",
            ErrorCode::ValidationFailed => "the edit was malformed and was discarded",
            ErrorCode::NoChanges => "there is nothing to publish",
            ErrorCode::SyncFailed => {
                "the working branch has conflicts, resolve them manually and retry"
            }
            ErrorCode::CommitFailed => "publishing stopped partway, retry to continue",
            ErrorCode::PrCreateFailed | ErrorCode::PrMergeFailed => {
                "commits are safe, merge the pull request manually"
            }
            ErrorCode::Internal => "an unexpected error occurred, try again",
        }
    }
}

/// Internal pipeline error, carrying the source failures.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("permission denied: taxonomy {action} requires the edit capability")]
    PermissionDenied { action: &'static str },

    #[error("invalid edit: {0}")]
    Validation(String),

    #[error("item not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Format(#[from] FormatError),
}

impl PublishError {
    /// Map onto the caller-facing code.
    pub fn code(&self) -> ErrorCode {
        match self {
            PublishError::PermissionDenied { .. } => ErrorCode::PermissionDenied,
            PublishError::Validation(_) => ErrorCode::ValidationFailed,
            PublishError::NotFound(_) => ErrorCode::NotFound,
            PublishError::Store(StoreError::Locked(_)) => ErrorCode::Locked,
            PublishError::Store(_) => ErrorCode::Internal,
            PublishError::Host(_) => ErrorCode::Internal,
            PublishError::Merge(MergeError::ItemNotFound { .. }) => ErrorCode::NotFound,
            PublishError::Merge(_) => ErrorCode::Internal,
            PublishError::Format(_) => ErrorCode::Internal,
        }
    }
}
