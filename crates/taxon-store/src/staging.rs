//! Store traits, input types, and errors.

use taxon_core::{ChangeOp, ItemFields, Placement, StagedChange, TaxonomyType};
use thiserror::Error;

/// Errors from the staging store and lock manager.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The named lock is held by another request. Recoverable: retry shortly.
    #[error("operation in progress for {0}, retry shortly")]
    Locked(String),

    #[error("staged change not found: {0}")]
    NotFound(i64),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Input for queuing a staged change; the store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewStagedChange {
    pub taxonomy_type: TaxonomyType,
    pub op: ChangeOp,
    pub item_id: Option<String>,
    pub data: ItemFields,
    pub placement: Option<Placement>,
    pub created_by: String,
}

/// Durable queue of pending taxonomy edits.
///
/// Every write is persisted before the call returns. Listing order is
/// `created_at` ascending (row id as tie-break), the order the merge engine
/// consumes.
pub trait StagingRepository: Send + Sync {
    fn create(&self, change: NewStagedChange) -> Result<StagedChange, StoreError>;

    /// Pending changes, optionally filtered by taxonomy type, oldest first.
    fn list(&self, ty: Option<TaxonomyType>) -> Result<Vec<StagedChange>, StoreError>;

    fn count(&self, ty: Option<TaxonomyType>) -> Result<usize, StoreError>;

    /// Delete pending changes, returning how many rows were removed.
    fn clear(&self, ty: Option<TaxonomyType>) -> Result<usize, StoreError>;
}

/// Named cooperative mutual exclusion.
///
/// A held key fails fast with [`StoreError::Locked`]; callers retry from the
/// UI rather than queuing.
pub trait LockManager: Send + Sync {
    fn try_acquire(&self, key: &str, holder: &str) -> Result<(), StoreError>;
    fn release(&self, key: &str) -> Result<(), StoreError>;
}

/// Run `f` while holding the named lock, releasing on success or failure.
pub fn with_lock<L, T, E>(
    locks: &L,
    key: &str,
    holder: &str,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E>
where
    L: LockManager + ?Sized,
    E: From<StoreError>,
{
    locks.try_acquire(key, holder).map_err(E::from)?;
    let result = f();
    // Release even when f failed; a leaked lock would wedge staging until
    // the TTL reclaim.
    let _ = locks.release(key);
    result
}
