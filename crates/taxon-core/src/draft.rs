//! Client-originated draft edits: parse boundary and optimizer.
//!
//! Drafts arrive as untrusted JSON. `parse_draft` is the trust boundary: a
//! draft either becomes a typed [`Draft`] or is rejected; nothing unchecked
//! flows past it. The optimizer collapses redundant operation sequences so
//! the merge engine sees one operation per logical item.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::change::{ChangeOp, Placement};
use crate::taxonomy::{ItemFields, Level, TaxonomyType};

/// A validated draft edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum Draft {
    #[serde(rename_all = "camelCase")]
    Create {
        taxonomy_type: TaxonomyType,
        data: ItemFields,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        placement: Option<Placement>,
    },
    #[serde(rename_all = "camelCase")]
    Update {
        taxonomy_type: TaxonomyType,
        item_id: String,
        data: ItemFields,
    },
    #[serde(rename_all = "camelCase")]
    Delete {
        taxonomy_type: TaxonomyType,
        item_id: String,
    },
}

impl Draft {
    pub fn taxonomy_type(&self) -> TaxonomyType {
        match self {
            Draft::Create { taxonomy_type, .. }
            | Draft::Update { taxonomy_type, .. }
            | Draft::Delete { taxonomy_type, .. } => *taxonomy_type,
        }
    }

    pub fn op(&self) -> ChangeOp {
        match self {
            Draft::Create { .. } => ChangeOp::Create,
            Draft::Update { .. } => ChangeOp::Update,
            Draft::Delete { .. } => ChangeOp::Delete,
        }
    }

    /// Key grouping operations that touch the same logical item.
    ///
    /// Updates and deletes key on their target id; creates key on the id
    /// assigned in their payload, falling back to a per-position synthetic
    /// key so unrelated creates never coalesce.
    fn group_key(&self, position: usize) -> String {
        match self {
            Draft::Update { item_id, .. } | Draft::Delete { item_id, .. } => item_id.clone(),
            Draft::Create { data, .. } => data
                .id
                .clone()
                .unwrap_or_else(|| format!("__create-{position}")),
        }
    }
}

/// Why a raw draft was rejected at the parse boundary.
#[derive(Debug, Error)]
pub enum DraftError {
    #[error("malformed draft: {0}")]
    Shape(#[from] serde_json::Error),

    #[error("create draft has no label")]
    MissingLabel,

    #[error("create draft below the root level has no parent id")]
    MissingParent,

    #[error("update draft carries no fields")]
    EmptyUpdate,

    #[error("delete draft has an empty item id")]
    EmptyItemId,
}

/// Validate a single raw draft.
pub fn parse_draft(raw: &serde_json::Value) -> Result<Draft, DraftError> {
    let draft: Draft = serde_json::from_value(raw.clone())?;
    match &draft {
        Draft::Create {
            taxonomy_type,
            data,
            placement,
        } => {
            if data.label.as_deref().map_or(true, str::is_empty) {
                return Err(DraftError::MissingLabel);
            }
            if taxonomy_type.is_hierarchical() {
                let needs_parent = placement
                    .as_ref()
                    .map_or(false, |p| p.level != Level::Category);
                if needs_parent && placement.as_ref().and_then(|p| p.parent_id.as_ref()).is_none()
                {
                    return Err(DraftError::MissingParent);
                }
            }
        }
        Draft::Update { data, .. } => {
            if data.is_empty() {
                return Err(DraftError::EmptyUpdate);
            }
        }
        Draft::Delete { item_id, .. } => {
            if item_id.is_empty() {
                return Err(DraftError::EmptyItemId);
            }
        }
    }
    Ok(draft)
}

/// Validate a batch of raw drafts, dropping and counting malformed entries.
///
/// Invalid drafts are never surfaced individually, only as a count.
pub fn sanitize_drafts(raw: &[serde_json::Value]) -> (Vec<Draft>, usize) {
    let mut valid = Vec::with_capacity(raw.len());
    let mut invalid = 0;
    for value in raw {
        match parse_draft(value) {
            Ok(draft) => valid.push(draft),
            Err(_) => invalid += 1,
        }
    }
    (valid, invalid)
}

/// Collapse redundant operation sequences per logical item.
///
/// Within a group (same taxonomy type and item key), operations fold left to
/// right: create+update becomes one create with the final data, a create
/// followed by a delete cancels out entirely (the item never reaches the
/// committed tree, so neither half has anything to apply there), anything
/// else followed by a delete becomes the delete, and consecutive updates
/// merge with last-write-wins fields. Relative order of first occurrence per
/// group is preserved so the merge engine's order sensitivity stays
/// meaningful.
pub fn merge_draft_operations(drafts: Vec<Draft>) -> Vec<Draft> {
    let mut slots: Vec<Option<Draft>> = Vec::with_capacity(drafts.len());
    let mut index: HashMap<(TaxonomyType, String), usize> = HashMap::new();

    for (position, draft) in drafts.into_iter().enumerate() {
        let key = (draft.taxonomy_type(), draft.group_key(position));
        match index.get(&key) {
            None => {
                index.insert(key, slots.len());
                slots.push(Some(draft));
            }
            Some(&slot) => fold_into(&mut slots[slot], draft),
        }
    }
    slots.into_iter().flatten().collect()
}

fn fold_into(slot: &mut Option<Draft>, later: Draft) {
    // Deleting an item created earlier in the same batch cancels both
    // operations.
    if matches!(slot, Some(Draft::Create { .. })) && matches!(later, Draft::Delete { .. }) {
        *slot = None;
        return;
    }
    // Everything after a cancelled pair is dropped, same as after a delete.
    let Some(existing) = slot.as_mut() else { return };
    match (&mut *existing, later) {
        // A delete supersedes whatever came before it.
        (_, later @ Draft::Delete { .. }) => {
            if !matches!(existing, Draft::Delete { .. }) {
                *existing = later;
            }
        }
        // Everything after a delete of the same item is dropped.
        (Draft::Delete { .. }, _) => {}
        (Draft::Create { data, .. }, Draft::Update { data: update, .. })
        | (Draft::Create { data, .. }, Draft::Create { data: update, .. })
        | (Draft::Update { data, .. }, Draft::Update { data: update, .. }) => {
            data.merge_from(&update);
        }
        // An update followed by a create of the same id: keep the update
        // slot, take the create's fields.
        (Draft::Update { data, .. }, Draft::Create { data: create, .. }) => {
            data.merge_from(&create);
        }
    }
}
