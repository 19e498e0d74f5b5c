//! SQLite-backed staging store and advisory lock.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;

use taxon_core::{ChangeOp, StagedChange, TaxonomyType};

use crate::schema::{Schema, SCHEMA_VERSION};
use crate::staging::{LockManager, NewStagedChange, StagingRepository, StoreError};

/// How long a lock row may sit before another caller may reclaim it.
/// A crashed request must not wedge staging forever.
const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(300);

/// Staging store and lock manager over one SQLite connection.
pub struct SqliteStaging {
    conn: Mutex<Connection>,
    lock_ttl: Duration,
}

impl SqliteStaging {
    /// Open (or create) a staging database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// In-memory store for tests.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = Self {
            conn: Mutex::new(conn),
            lock_ttl: DEFAULT_LOCK_TTL,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Override the stale-lock reclaim TTL (tests use a short one).
    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    fn initialize(&self) -> Result<(), StoreError> {
        let conn = self.lock_conn();
        let current: u32 = conn
            .query_row(
                "SELECT version FROM schema_version ORDER BY applied_at DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if current == 0 {
            conn.execute_batch(Schema::create_tables())?;
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )?;
        } else if current < SCHEMA_VERSION {
            for version in current..SCHEMA_VERSION {
                if let Some(migration) = Schema::migration(version, version + 1) {
                    conn.execute_batch(migration)?;
                }
            }
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )?;
        }
        Ok(())
    }

    fn lock_conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned mutex means another thread panicked mid-query; the
        // connection itself is still usable.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn row_to_change(row: &rusqlite::Row) -> rusqlite::Result<StagedChange> {
        let ty: String = row.get(1)?;
        let op: String = row.get(2)?;
        let data: String = row.get(4)?;
        let placement: Option<String> = row.get(5)?;
        let created_at: String = row.get(7)?;

        let parse_col = |idx: usize, msg: String| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                msg.into(),
            )
        };

        Ok(StagedChange {
            id: row.get(0)?,
            taxonomy_type: TaxonomyType::parse(&ty)
                .ok_or_else(|| parse_col(1, format!("unknown taxonomy type: {ty}")))?,
            op: ChangeOp::parse(&op)
                .ok_or_else(|| parse_col(2, format!("unknown operation: {op}")))?,
            item_id: row.get(3)?,
            data: serde_json::from_str(&data).map_err(|e| parse_col(4, e.to_string()))?,
            placement: placement
                .map(|p| serde_json::from_str(&p))
                .transpose()
                .map_err(|e| parse_col(5, e.to_string()))?,
            created_by: row.get(6)?,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| parse_col(7, e.to_string()))?
                .with_timezone(&Utc),
        })
    }
}

const CHANGE_COLUMNS: &str =
    "id, taxonomy_type, operation, item_id, data, placement, created_by, created_at";

impl StagingRepository for SqliteStaging {
    fn create(&self, change: NewStagedChange) -> Result<StagedChange, StoreError> {
        let data = serde_json::to_string(&change.data)?;
        let placement = change
            .placement
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let created_at = Utc::now();

        let conn = self.lock_conn();
        conn.execute(
            "INSERT INTO staged_changes \
             (taxonomy_type, operation, item_id, data, placement, created_by, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                change.taxonomy_type.as_str(),
                change.op.as_str(),
                change.item_id,
                data,
                placement,
                change.created_by,
                // Fixed-precision timestamps keep lexicographic and
                // chronological order identical.
                created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )?;
        let id = conn.last_insert_rowid();

        Ok(StagedChange {
            id,
            taxonomy_type: change.taxonomy_type,
            op: change.op,
            item_id: change.item_id,
            data: change.data,
            placement: change.placement,
            created_by: change.created_by,
            created_at,
        })
    }

    fn list(&self, ty: Option<TaxonomyType>) -> Result<Vec<StagedChange>, StoreError> {
        let conn = self.lock_conn();
        let changes = match ty {
            Some(ty) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {CHANGE_COLUMNS} FROM staged_changes \
                     WHERE taxonomy_type = ?1 ORDER BY created_at ASC, id ASC"
                ))?;
                let rows = stmt.query_map([ty.as_str()], Self::row_to_change)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {CHANGE_COLUMNS} FROM staged_changes \
                     ORDER BY created_at ASC, id ASC"
                ))?;
                let rows = stmt.query_map([], Self::row_to_change)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(changes)
    }

    fn count(&self, ty: Option<TaxonomyType>) -> Result<usize, StoreError> {
        let conn = self.lock_conn();
        let count: i64 = match ty {
            Some(ty) => conn.query_row(
                "SELECT COUNT(*) FROM staged_changes WHERE taxonomy_type = ?1",
                [ty.as_str()],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM staged_changes", [], |row| row.get(0))?,
        };
        Ok(count as usize)
    }

    fn clear(&self, ty: Option<TaxonomyType>) -> Result<usize, StoreError> {
        let conn = self.lock_conn();
        let removed = match ty {
            Some(ty) => conn.execute(
                "DELETE FROM staged_changes WHERE taxonomy_type = ?1",
                [ty.as_str()],
            )?,
            None => conn.execute("DELETE FROM staged_changes", [])?,
        };
        Ok(removed)
    }
}

impl LockManager for SqliteStaging {
    fn try_acquire(&self, key: &str, holder: &str) -> Result<(), StoreError> {
        let conn = self.lock_conn();
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.lock_ttl).unwrap_or(chrono::Duration::zero());
        // Reclaim stale locks from crashed requests before trying to insert.
        conn.execute(
            "DELETE FROM advisory_locks WHERE key = ?1 AND acquired_at < ?2",
            rusqlite::params![key, cutoff.to_rfc3339_opts(SecondsFormat::Micros, true)],
        )?;

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO advisory_locks (key, holder, acquired_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                key,
                holder,
                Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
            ],
        )?;
        if inserted == 1 {
            Ok(())
        } else {
            Err(StoreError::Locked(key.to_string()))
        }
    }

    fn release(&self, key: &str) -> Result<(), StoreError> {
        let conn = self.lock_conn();
        conn.execute("DELETE FROM advisory_locks WHERE key = ?1", [key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::with_lock;
    use taxon_core::{lock_key, ItemFields};

    fn new_change(ty: TaxonomyType, op: ChangeOp, label: &str) -> NewStagedChange {
        NewStagedChange {
            taxonomy_type: ty,
            op,
            item_id: if matches!(op, ChangeOp::Create) {
                None
            } else {
                Some("1".to_string())
            },
            data: ItemFields {
                label: Some(label.into()),
                ..Default::default()
            },
            placement: None,
            created_by: "admin".into(),
        }
    }

    #[test]
    fn create_persists_and_lists_in_order() {
        let store = SqliteStaging::in_memory().unwrap();
        store
            .create(new_change(TaxonomyType::Tags, ChangeOp::Create, "First"))
            .unwrap();
        store
            .create(new_change(TaxonomyType::Tags, ChangeOp::Update, "Second"))
            .unwrap();
        store
            .create(new_change(TaxonomyType::Skills, ChangeOp::Create, "Other"))
            .unwrap();

        let tags = store.list(Some(TaxonomyType::Tags)).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].data.label.as_deref(), Some("First"));
        assert_eq!(tags[1].data.label.as_deref(), Some("Second"));
        assert!(tags[0].created_at <= tags[1].created_at);

        let all = store.list(None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(store.count(Some(TaxonomyType::Skills)).unwrap(), 1);
    }

    #[test]
    fn round_trips_placement_and_data() {
        let store = SqliteStaging::in_memory().unwrap();
        let created = store
            .create(NewStagedChange {
                taxonomy_type: TaxonomyType::Categories,
                op: ChangeOp::Create,
                item_id: None,
                data: ItemFields {
                    id: Some("9".into()),
                    label: Some("Repairs".into()),
                    slug: Some("repairs".into()),
                    featured: Some(true),
                    ..Default::default()
                },
                placement: Some(taxon_core::Placement::under(
                    taxon_core::Level::Subcategory,
                    "1",
                )),
                created_by: "admin".into(),
            })
            .unwrap();

        let listed = store.list(Some(TaxonomyType::Categories)).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);
        assert_eq!(listed[0].data, created.data);
        assert_eq!(listed[0].placement, created.placement);
    }

    #[test]
    fn clear_by_type_leaves_others() {
        let store = SqliteStaging::in_memory().unwrap();
        store
            .create(new_change(TaxonomyType::Tags, ChangeOp::Create, "A"))
            .unwrap();
        store
            .create(new_change(TaxonomyType::Skills, ChangeOp::Create, "B"))
            .unwrap();

        assert_eq!(store.clear(Some(TaxonomyType::Tags)).unwrap(), 1);
        assert_eq!(store.count(None).unwrap(), 1);
        assert_eq!(store.clear(None).unwrap(), 1);
        assert_eq!(store.count(None).unwrap(), 0);
    }

    #[test]
    fn second_acquire_fails_fast() {
        let store = SqliteStaging::in_memory().unwrap();
        let key = lock_key(TaxonomyType::Tags, ChangeOp::Create);

        store.try_acquire(&key, "admin-a").unwrap();
        let err = store.try_acquire(&key, "admin-b").unwrap_err();
        assert!(matches!(err, StoreError::Locked(_)));

        store.release(&key).unwrap();
        store.try_acquire(&key, "admin-b").unwrap();
    }

    #[test]
    fn different_keys_do_not_contend() {
        let store = SqliteStaging::in_memory().unwrap();
        store
            .try_acquire(&lock_key(TaxonomyType::Tags, ChangeOp::Create), "a")
            .unwrap();
        store
            .try_acquire(&lock_key(TaxonomyType::Tags, ChangeOp::Update), "a")
            .unwrap();
        store
            .try_acquire(&lock_key(TaxonomyType::Skills, ChangeOp::Create), "a")
            .unwrap();
    }

    #[test]
    fn stale_lock_is_reclaimed() {
        let store = SqliteStaging::in_memory()
            .unwrap()
            .with_lock_ttl(Duration::from_secs(0));
        store.try_acquire("tags-create", "crashed").unwrap();
        // TTL of zero makes the previous holder stale as soon as the clock
        // moves past its acquisition timestamp.
        std::thread::sleep(Duration::from_millis(5));
        store.try_acquire("tags-create", "next").unwrap();
    }

    #[test]
    fn with_lock_releases_on_failure() {
        let store = SqliteStaging::in_memory().unwrap();
        let result: Result<(), StoreError> = with_lock(&store, "tags-create", "admin", || {
            Err(StoreError::Database("boom".into()))
        });
        assert!(result.is_err());
        // Lock must be free again after the failing closure.
        store.try_acquire("tags-create", "admin").unwrap();
    }

    #[test]
    fn with_lock_propagates_held_lock() {
        let store = SqliteStaging::in_memory().unwrap();
        store.try_acquire("tags-create", "other").unwrap();
        let result: Result<(), StoreError> =
            with_lock(&store, "tags-create", "admin", || Ok(()));
        assert!(matches!(result, Err(StoreError::Locked(_))));
    }
}
