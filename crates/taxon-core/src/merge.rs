//! Hierarchical merge engine.
//!
//! Applies an ordered list of staged changes onto a base tree. Order is an
//! explicit contract: changes are applied strictly in the order supplied and
//! a later change touching the same item wins over an earlier one.

use thiserror::Error;

use crate::change::{ChangeOp, StagedChange};
use crate::taxonomy::{Level, TaxonomyItem, TaxonomyType};
use crate::tree::{visit_item_mut, Visit};

/// Errors from applying staged changes to a tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    /// Parent referenced by a create no longer exists at apply time.
    /// Validation checked it at staging time, so this is a logic error and
    /// fatal for the item.
    #[error("parent {parent_id} not found for {level} create in {taxonomy_type}")]
    MissingParent {
        taxonomy_type: TaxonomyType,
        level: Level,
        parent_id: String,
    },

    /// Create payload is missing id, label, or slug.
    #[error("create payload for {0} is missing id, label, or slug")]
    IncompleteCreate(TaxonomyType),

    /// Update or delete target is absent from the tree.
    #[error("item {item_id} not found in {taxonomy_type}")]
    ItemNotFound {
        taxonomy_type: TaxonomyType,
        item_id: String,
    },

    /// Update or delete staged without a target item id.
    #[error("{op} change for {taxonomy_type} has no target item id")]
    MissingItemId {
        taxonomy_type: TaxonomyType,
        op: ChangeOp,
    },
}

/// Apply `changes` to `base` in order, returning the new tree.
///
/// Pure: the base is consumed and a new tree returned; no external state.
pub fn apply_changes(
    base: Vec<TaxonomyItem>,
    changes: &[StagedChange],
) -> Result<Vec<TaxonomyItem>, MergeError> {
    let mut tree = base;
    for change in changes {
        match change.op {
            ChangeOp::Create => apply_create(&mut tree, change)?,
            ChangeOp::Update => apply_update(&mut tree, change)?,
            ChangeOp::Delete => apply_delete(&mut tree, change)?,
        }
    }
    Ok(tree)
}

fn apply_create(tree: &mut Vec<TaxonomyItem>, change: &StagedChange) -> Result<(), MergeError> {
    let item = change
        .data
        .clone()
        .into_item()
        .ok_or(MergeError::IncompleteCreate(change.taxonomy_type))?;

    let level = match &change.placement {
        Some(p) if change.taxonomy_type.is_hierarchical() => p.level,
        _ => Level::Category,
    };

    match level {
        Level::Category => {
            tree.push(item);
            Ok(())
        }
        Level::Subcategory => {
            let parent_id = placement_parent(change, level)?;
            let parent = tree
                .iter_mut()
                .find(|node| node.id == parent_id)
                .ok_or_else(|| MergeError::MissingParent {
                    taxonomy_type: change.taxonomy_type,
                    level,
                    parent_id: parent_id.clone(),
                })?;
            parent.children.push(item);
            Ok(())
        }
        Level::Subdivision => {
            let parent_id = placement_parent(change, level)?;
            // The parent subcategory sits exactly one level down.
            for root in tree.iter_mut() {
                if let Some(parent) = root.children.iter_mut().find(|c| c.id == parent_id) {
                    parent.children.push(item);
                    return Ok(());
                }
            }
            Err(MergeError::MissingParent {
                taxonomy_type: change.taxonomy_type,
                level,
                parent_id,
            })
        }
    }
}

fn placement_parent(change: &StagedChange, level: Level) -> Result<String, MergeError> {
    change
        .placement
        .as_ref()
        .and_then(|p| p.parent_id.clone())
        .ok_or(MergeError::MissingParent {
            taxonomy_type: change.taxonomy_type,
            level,
            parent_id: String::from("<unset>"),
        })
}

fn apply_update(tree: &mut Vec<TaxonomyItem>, change: &StagedChange) -> Result<(), MergeError> {
    let item_id = target_id(change)?;
    let data = &change.data;
    let found = visit_item_mut(tree, &item_id, &mut |mut node| {
        node.apply_fields(data);
        Visit::Keep(node)
    });
    if found {
        Ok(())
    } else {
        Err(MergeError::ItemNotFound {
            taxonomy_type: change.taxonomy_type,
            item_id,
        })
    }
}

fn apply_delete(tree: &mut Vec<TaxonomyItem>, change: &StagedChange) -> Result<(), MergeError> {
    let item_id = target_id(change)?;
    let found = visit_item_mut(tree, &item_id, &mut |_| Visit::Remove);
    if found {
        Ok(())
    } else {
        Err(MergeError::ItemNotFound {
            taxonomy_type: change.taxonomy_type,
            item_id,
        })
    }
}

fn target_id(change: &StagedChange) -> Result<String, MergeError> {
    change.item_id.clone().ok_or(MergeError::MissingItemId {
        taxonomy_type: change.taxonomy_type,
        op: change.op,
    })
}
