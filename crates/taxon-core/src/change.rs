//! Staged changes: queued, not-yet-committed taxonomy edits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::taxonomy::{ItemFields, Level, TaxonomyType};

/// The kind of mutation a staged change applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Create,
    Update,
    Delete,
}

impl ChangeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOp::Create => "create",
            ChangeOp::Update => "update",
            ChangeOp::Delete => "delete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(ChangeOp::Create),
            "update" => Some(ChangeOp::Update),
            "delete" => Some(ChangeOp::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a created item lands in the tree.
///
/// Required for every create on a hierarchical type; `parent_id` is required
/// below the root level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub level: Level,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl Placement {
    pub fn root() -> Self {
        Placement {
            level: Level::Category,
            parent_id: None,
        }
    }

    pub fn under(level: Level, parent_id: impl Into<String>) -> Self {
        Placement {
            level,
            parent_id: Some(parent_id.into()),
        }
    }
}

/// A pending taxonomy mutation, durably queued until the next publish.
///
/// Never mutated in place: created by an edit action, read back to render
/// admin views and validate later edits, deleted after a successful publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedChange {
    /// Store-assigned row id.
    pub id: i64,
    pub taxonomy_type: TaxonomyType,
    pub op: ChangeOp,
    /// Target item id; `None` for creates (the assigned id lives in `data`).
    pub item_id: Option<String>,
    /// Full post-edit item payload.
    pub data: ItemFields,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<Placement>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Advisory-lock key serializing staging writes per type and operation class.
pub fn lock_key(ty: TaxonomyType, op: ChangeOp) -> String {
    format!("{}-{}", ty, op)
}
