//! Admin edit surface: staging taxonomy changes with union-state validation.
//!
//! Validation never trusts the committed tree alone: id and slug uniqueness
//! and parent existence are checked against the tree *as it will exist after
//! pending staged changes apply*, so two admins cannot stage colliding edits
//! even before either publishes.

use tracing::debug;

use taxon_core::{
    apply_changes, collect_slugs, find_item, lock_key, max_numeric_id, slugify, unique_slug,
    ChangeOp, ItemFields, Level, Placement, StagedChange, TaxonomyItem, TaxonomyType,
};
use taxon_host::{CodeHost, HostConfig};
use taxon_store::{with_lock, LockManager, NewStagedChange, StagingRepository};

use crate::error::PublishError;
use crate::orchestrator::read_taxonomy;
use crate::permissions::Permissions;

/// Staged-edit service over a staging store, lock manager, and code host.
pub struct TaxonomyService<'a, S, H>
where
    S: StagingRepository + LockManager,
    H: CodeHost + ?Sized,
{
    store: &'a S,
    host: &'a H,
    config: &'a HostConfig,
}

impl<'a, S, H> TaxonomyService<'a, S, H>
where
    S: StagingRepository + LockManager,
    H: CodeHost + ?Sized,
{
    pub fn new(store: &'a S, host: &'a H, config: &'a HostConfig) -> Self {
        Self {
            store,
            host,
            config,
        }
    }

    /// The committed tree with all pending staged changes applied.
    fn union_tree(&self, ty: TaxonomyType) -> Result<Vec<TaxonomyItem>, PublishError> {
        let committed = read_taxonomy(self.host, ty, &self.config.review_branch)?;
        let staged = self.store.list(Some(ty))?;
        Ok(apply_changes(committed, &staged)?)
    }

    /// Render state for the admin UI: committed plus staged, in edit order.
    pub fn merged_view(
        &self,
        perms: Permissions,
        ty: TaxonomyType,
    ) -> Result<Vec<TaxonomyItem>, PublishError> {
        if !perms.can_view() {
            return Err(PublishError::PermissionDenied { action: "view" });
        }
        self.union_tree(ty)
    }

    /// Pending staged changes, oldest first.
    pub fn pending_changes(
        &self,
        perms: Permissions,
        ty: Option<TaxonomyType>,
    ) -> Result<Vec<StagedChange>, PublishError> {
        if !perms.can_view() {
            return Err(PublishError::PermissionDenied { action: "view" });
        }
        Ok(self.store.list(ty)?)
    }

    /// Drop pending changes without publishing them.
    pub fn discard_pending(
        &self,
        perms: Permissions,
        ty: Option<TaxonomyType>,
    ) -> Result<usize, PublishError> {
        if !perms.can_edit() {
            return Err(PublishError::PermissionDenied { action: "discard" });
        }
        Ok(self.store.clear(ty)?)
    }

    /// Queue one taxonomy edit.
    ///
    /// Serialized per `{type}-{operation}` by the advisory lock; a held lock
    /// surfaces as `Locked` for the UI to retry. Creates get their id and a
    /// collision-free slug assigned here, against the staged+committed union.
    pub fn stage_change(
        &self,
        perms: Permissions,
        actor: &str,
        ty: TaxonomyType,
        op: ChangeOp,
        item_id: Option<String>,
        data: ItemFields,
        placement: Option<Placement>,
    ) -> Result<StagedChange, PublishError> {
        if !perms.can_edit() {
            return Err(PublishError::PermissionDenied { action: "edit" });
        }
        let key = lock_key(ty, op);
        with_lock(self.store, &key, actor, || {
            self.stage_locked(actor, ty, op, item_id, data, placement)
        })
    }

    fn stage_locked(
        &self,
        actor: &str,
        ty: TaxonomyType,
        op: ChangeOp,
        item_id: Option<String>,
        mut data: ItemFields,
        placement: Option<Placement>,
    ) -> Result<StagedChange, PublishError> {
        let staged = self.store.list(Some(ty))?;
        let committed = read_taxonomy(self.host, ty, &self.config.review_branch)?;
        let union = apply_changes(committed, &staged)?;

        let (item_id, placement) = match op {
            ChangeOp::Create => {
                let label = data
                    .label
                    .as_deref()
                    .filter(|l| !l.is_empty())
                    .ok_or_else(|| PublishError::Validation("create needs a label".into()))?
                    .to_string();

                let placement = if ty.is_hierarchical() {
                    let placement = placement.unwrap_or_else(Placement::root);
                    if placement.level != Level::Category {
                        let parent_id = placement.parent_id.as_deref().ok_or_else(|| {
                            PublishError::Validation(format!(
                                "{} create needs a parent id",
                                placement.level
                            ))
                        })?;
                        if find_item(&union, parent_id).is_none() {
                            return Err(PublishError::NotFound(parent_id.to_string()));
                        }
                    }
                    Some(placement)
                } else {
                    None
                };

                data.id = Some(next_staged_id(&union, &staged));
                let candidate = data
                    .slug
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| slugify(&label));
                if candidate.is_empty() {
                    return Err(PublishError::Validation(format!(
                        "label {label:?} produces an empty slug"
                    )));
                }
                data.slug = Some(unique_slug(&candidate, &collect_slugs(&union)));
                (None, placement)
            }
            ChangeOp::Update => {
                let id = item_id
                    .ok_or_else(|| PublishError::Validation("update needs an item id".into()))?;
                let target = find_item(&union, &id)
                    .ok_or_else(|| PublishError::NotFound(id.clone()))?;
                if data.is_empty() {
                    return Err(PublishError::Validation("update carries no fields".into()));
                }
                if let Some(slug) = data.slug.as_deref().filter(|s| !s.is_empty()) {
                    // Renames must stay collision free, but keeping the
                    // item's own slug is not a collision.
                    let mut taken = collect_slugs(&union);
                    taken.remove(&target.slug);
                    data.slug = Some(unique_slug(slug, &taken));
                }
                (Some(id), None)
            }
            ChangeOp::Delete => {
                let id = item_id
                    .ok_or_else(|| PublishError::Validation("delete needs an item id".into()))?;
                if find_item(&union, &id).is_none() {
                    return Err(PublishError::NotFound(id));
                }
                (Some(id), None)
            }
        };

        debug!(taxonomy = %ty, op = %op, "staging change");
        Ok(self.store.create(NewStagedChange {
            taxonomy_type: ty,
            op,
            item_id,
            data,
            placement,
            created_by: actor.to_string(),
        })?)
    }
}

/// Next item id over the union tree and every pending change.
///
/// Allocating from the union alone would reissue an id freed by a staged
/// delete while the batch is still pending, and two pending creates sharing
/// an id would be coalesced by the publish optimizer.
fn next_staged_id(union: &[TaxonomyItem], staged: &[StagedChange]) -> String {
    let mut max = max_numeric_id(union);
    for change in staged {
        let ids = change.data.id.as_deref().into_iter().chain(change.item_id.as_deref());
        for id in ids {
            if let Ok(n) = id.parse::<u64>() {
                max = max.max(n);
            }
        }
    }
    (max + 1).to_string()
}
