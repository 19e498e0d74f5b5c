//! SQLite schema for the staging store.

pub const SCHEMA_VERSION: u32 = 1;

/// Schema DDL, versioned so future migrations can run in sequence.
pub struct Schema;

impl Schema {
    pub fn create_tables() -> &'static str {
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS staged_changes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            taxonomy_type TEXT NOT NULL,
            operation TEXT NOT NULL,
            item_id TEXT,
            data TEXT NOT NULL,
            placement TEXT,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_staged_changes_type_created
            ON staged_changes (taxonomy_type, created_at, id);

        CREATE TABLE IF NOT EXISTS advisory_locks (
            key TEXT PRIMARY KEY,
            holder TEXT NOT NULL,
            acquired_at TEXT NOT NULL
        );
        "#
    }

    /// Migration from `from` to `from + 1`, if one exists.
    pub fn migration(_from: u32, _to: u32) -> Option<&'static str> {
        None
    }
}
