//! The publish workflow: drafts in, typed result out.
//!
//! `publish_all_changes` never panics and never returns `Err`; every failure
//! mode is folded into the [`PublishResult`]. Partial progress is real
//! progress: commits that landed before a failure stay landed, and the
//! result reports them so a retry can pick up where the last run stopped.

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use tracing::{info, warn};

use taxon_core::{
    apply_changes, collect_ids, collect_slugs, find_item, max_numeric_id, merge_draft_operations,
    sanitize_drafts, slugify, unique_slug, ChangeOp, Draft, Placement, StagedChange, TaxonomyItem,
    TaxonomyType,
};
use taxon_host::{CodeHost, HostConfig, MergeOutcome};
use taxon_store::StoreError;

use crate::error::{ErrorCode, PublishError};
use crate::orchestrator::{
    commit_message, commit_taxonomy, ensure_pull_request, merge_pull_request, read_taxonomy,
    sync_working_branch,
};
use crate::result::{PublishData, PublishFailure, PublishResult, Stage};

/// Actor recorded on changes the workflow materializes from raw drafts.
const PIPELINE_ACTOR: &str = "publish";

/// Run the whole publish pipeline over a batch of raw draft edits.
///
/// Stages: sanitize and optimize the drafts, sync the working branch from
/// the review branch, commit each touched taxonomy's regenerated file, then
/// ensure and merge the pull request. A commit failure stops the run with
/// the landed commits reported; a PR failure after all commits landed is a
/// success with a warning, since the durable artifact is already safe.
pub fn publish_all_changes<H: CodeHost + ?Sized>(
    host: &H,
    config: &HostConfig,
    raw_drafts: &[serde_json::Value],
) -> PublishResult {
    // Stage 1: sanitize.
    let (drafts, invalid) = sanitize_drafts(raw_drafts);
    if invalid > 0 {
        warn!(invalid, "dropped malformed drafts");
    }
    let drafts = merge_draft_operations(drafts);
    if drafts.is_empty() {
        return PublishResult::failed(PublishFailure::new(
            ErrorCode::NoChanges,
            if invalid > 0 {
                format!("no publishable changes ({invalid} malformed drafts dropped)")
            } else {
                "no publishable changes".to_string()
            },
            Some(Stage::Sanitizing),
        ));
    }
    let published_drafts = drafts.len();
    info!(drafts = published_drafts, "drafts sanitized and optimized");

    // Stage 2: sync the working branch so the publish builds on the latest
    // reviewed state.
    match sync_working_branch(host, config) {
        Ok(MergeOutcome::Merged { .. }) | Ok(MergeOutcome::AlreadyUpToDate) => {}
        Ok(MergeOutcome::Conflict { message }) => {
            return PublishResult::failed(PublishFailure::new(
                ErrorCode::SyncFailed,
                format!("working branch sync conflict: {message}"),
                Some(Stage::Syncing),
            ));
        }
        Err(err) => {
            return PublishResult::failed(PublishFailure::new(
                ErrorCode::SyncFailed,
                format!("working branch sync failed: {err}"),
                Some(Stage::Syncing),
            ));
        }
    }

    // Stage 3: one commit per touched taxonomy type, in type order.
    let mut by_type: BTreeMap<TaxonomyType, Vec<Draft>> = BTreeMap::new();
    for draft in drafts {
        by_type.entry(draft.taxonomy_type()).or_default().push(draft);
    }

    let mut data = PublishData {
        published_drafts,
        ..Default::default()
    };
    for (ty, type_drafts) in by_type {
        match commit_type(host, config, ty, &type_drafts) {
            Ok(commit) => {
                data.commits_created += 1;
                data.commit_shas.push(commit);
            }
            Err(err) => {
                let code = match err.code() {
                    // Bad draft content keeps its own code; host and other
                    // infrastructure failures surface as a commit failure.
                    ErrorCode::ValidationFailed | ErrorCode::NotFound => err.code(),
                    _ => ErrorCode::CommitFailed,
                };
                return PublishResult::failed_with_progress(
                    data,
                    PublishFailure::new(
                        code,
                        format!("publishing {ty} failed: {err}"),
                        Some(Stage::Committing),
                    ),
                );
            }
        }
    }

    // Stage 4: pull request. Commits are durable from here on, so failures
    // downgrade to warnings on an otherwise successful result.
    let pull = match ensure_pull_request(host, config) {
        Ok(pull) => pull,
        Err(err) => {
            return PublishResult::succeeded_with_warning(
                data,
                PublishFailure::new(
                    ErrorCode::PrCreateFailed,
                    format!("pull request creation failed: {err}"),
                    Some(Stage::EnsuringPr),
                ),
            );
        }
    };
    data.pr_number = Some(pull.number);
    data.pr_url = Some(pull.url.clone());

    match merge_pull_request(host, pull.number) {
        Ok(true) => {
            info!(number = pull.number, "pull request merged");
            PublishResult::succeeded(data)
        }
        Ok(false) => PublishResult::succeeded_with_warning(
            data,
            PublishFailure::new(
                ErrorCode::PrMergeFailed,
                "pull request was not mergeable, merge it manually",
                Some(Stage::Merging),
            ),
        ),
        Err(err) => PublishResult::succeeded_with_warning(
            data,
            PublishFailure::new(
                ErrorCode::PrMergeFailed,
                format!("pull request merge failed: {err}"),
                Some(Stage::Merging),
            ),
        ),
    }
}

/// Read, merge, and commit one taxonomy type on the working branch.
fn commit_type<H: CodeHost + ?Sized>(
    host: &H,
    config: &HostConfig,
    ty: TaxonomyType,
    drafts: &[Draft],
) -> Result<String, PublishError> {
    let tree = read_taxonomy(host, ty, &config.working_branch)?;
    let changes = prepare_changes(ty, drafts, &tree)?;
    let merged = apply_changes(tree, &changes)?;
    let commit = commit_taxonomy(
        host,
        config,
        ty,
        &merged,
        &commit_message(ty, drafts.len()),
    )?;
    Ok(commit.sha)
}

/// Materialize drafts into ordered staged changes, allocating ids and
/// collision-free slugs for creates that arrive without them. Preassigned
/// create ids and renamed slugs are held to the same uniqueness rules as
/// staged edits: a duplicate id is rejected, a colliding slug is suffixed.
fn prepare_changes(
    ty: TaxonomyType,
    drafts: &[Draft],
    tree: &[TaxonomyItem],
) -> Result<Vec<StagedChange>, PublishError> {
    let mut taken_ids: HashSet<String> = collect_ids(tree);
    let mut taken_slugs: HashSet<String> = collect_slugs(tree);
    let mut max_id = max_numeric_id(tree);
    let now = Utc::now();

    let mut changes = Vec::with_capacity(drafts.len());
    for (position, draft) in drafts.iter().enumerate() {
        let (op, item_id, data, placement) = match draft.clone() {
            Draft::Create {
                data: mut fields,
                placement,
                ..
            } => {
                match fields.id.clone() {
                    Some(id) => {
                        if taken_ids.contains(&id) {
                            return Err(PublishError::Validation(format!(
                                "item id {id} already exists in {ty}"
                            )));
                        }
                        if let Ok(n) = id.parse::<u64>() {
                            max_id = max_id.max(n);
                        }
                        taken_ids.insert(id);
                    }
                    None => {
                        max_id += 1;
                        let id = max_id.to_string();
                        taken_ids.insert(id.clone());
                        fields.id = Some(id);
                    }
                }
                let label = fields.label.clone().unwrap_or_default();
                let candidate = fields
                    .slug
                    .clone()
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| slugify(&label));
                if candidate.is_empty() {
                    return Err(PublishError::Validation(format!(
                        "label {label:?} produces an empty slug"
                    )));
                }
                let slug = unique_slug(&candidate, &taken_slugs);
                taken_slugs.insert(slug.clone());
                fields.slug = Some(slug);

                let placement = if ty.is_hierarchical() {
                    Some(placement.unwrap_or_else(Placement::root))
                } else {
                    None
                };
                (ChangeOp::Create, None, fields, placement)
            }
            Draft::Update {
                item_id, mut data, ..
            } => {
                if let Some(slug) = data.slug.as_deref().filter(|s| !s.is_empty()) {
                    // A rename keeping the item's own slug is not a
                    // collision.
                    let mut taken = taken_slugs.clone();
                    if let Some(target) = find_item(tree, &item_id) {
                        taken.remove(&target.slug);
                    }
                    let slug = unique_slug(slug, &taken);
                    taken_slugs.insert(slug.clone());
                    data.slug = Some(slug);
                }
                (ChangeOp::Update, Some(item_id), data, None)
            }
            Draft::Delete { item_id, .. } => {
                (ChangeOp::Delete, Some(item_id), Default::default(), None)
            }
        };
        changes.push(StagedChange {
            id: position as i64,
            taxonomy_type: ty,
            op,
            item_id,
            data,
            placement,
            created_by: PIPELINE_ACTOR.to_string(),
            created_at: now,
        });
    }
    Ok(changes)
}

/// Convenience for publishing everything a staging store holds.
///
/// Reads pending changes oldest first, re-expresses them as drafts, and
/// runs [`publish_all_changes`]. The staging store is deliberately not
/// cleared here: the caller decides what to discard once it has seen the
/// result, so a failed publish loses nothing.
pub fn publish_staged<H, S>(
    host: &H,
    config: &HostConfig,
    store: &S,
) -> Result<PublishResult, StoreError>
where
    H: CodeHost + ?Sized,
    S: taxon_store::StagingRepository + ?Sized,
{
    let staged = store.list(None)?;
    let drafts: Vec<serde_json::Value> = staged
        .into_iter()
        .map(|change| staged_to_draft(&change))
        .collect::<Result<_, _>>()
        .map_err(StoreError::from)?;
    Ok(publish_all_changes(host, config, &drafts))
}

fn staged_to_draft(change: &StagedChange) -> Result<serde_json::Value, serde_json::Error> {
    let draft = match change.op {
        ChangeOp::Create => Draft::Create {
            taxonomy_type: change.taxonomy_type,
            data: change.data.clone(),
            placement: change.placement.clone(),
        },
        ChangeOp::Update => Draft::Update {
            taxonomy_type: change.taxonomy_type,
            item_id: change.item_id.clone().unwrap_or_default(),
            data: change.data.clone(),
        },
        ChangeOp::Delete => Draft::Delete {
            taxonomy_type: change.taxonomy_type,
            item_id: change.item_id.clone().unwrap_or_default(),
        },
    };
    serde_json::to_value(draft)
}
