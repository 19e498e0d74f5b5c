//! End-to-end pipeline tests over the in-memory code host and SQLite store.

use serde_json::json;

use taxon_core::{find_item, ChangeOp, ItemFields, TaxonomyItem, TaxonomyType};
use taxon_format::{generate_taxonomy_file, parse_taxonomy_file};
use taxon_host::{HostConfig, MemoryHost};
use taxon_publish::{
    publish_all_changes, publish_staged, ErrorCode, Permissions, Stage, TaxonomyService,
};
use taxon_store::{SqliteStaging, StagingRepository};

fn config() -> HostConfig {
    HostConfig {
        owner: "acme".into(),
        repo: "marketplace".into(),
        working_branch: "taxonomy-updates".into(),
        review_branch: "main".into(),
        api_base: "memory://".into(),
        token: "test".into(),
    }
}

/// Seed both branches with the same committed taxonomy files.
fn seed(host: &MemoryHost, cfg: &HostConfig, ty: TaxonomyType, tree: &[TaxonomyItem]) {
    let content = generate_taxonomy_file(ty, tree);
    host.seed_file(&cfg.review_branch, ty.file_path(), &content);
    host.seed_file(&cfg.working_branch, ty.file_path(), &content);
}

fn committed_tree(host: &MemoryHost, branch: &str, ty: TaxonomyType) -> Vec<TaxonomyItem> {
    let text = host.file_content(branch, ty.file_path()).unwrap();
    parse_taxonomy_file(ty, &text).unwrap()
}

#[test]
fn publishes_a_tag_create_end_to_end() {
    let host = MemoryHost::new();
    let cfg = config();
    seed(
        &host,
        &cfg,
        TaxonomyType::Tags,
        &[TaxonomyItem::new("3", "Remote", "remote")],
    );

    let drafts = vec![json!({
        "operation": "create",
        "taxonomyType": "tags",
        "data": { "label": "Urgent" }
    })];
    let result = publish_all_changes(&host, &cfg, &drafts);

    assert!(result.success, "publish failed: {:?}", result.error);
    assert!(result.error.is_none());
    let data = result.data.unwrap();
    assert_eq!(data.commits_created, 1);
    assert_eq!(data.commit_shas.len(), 1);
    assert_eq!(data.published_drafts, 1);
    assert!(data.pr_number.is_some());

    // The merged pull request landed the regenerated file on the review
    // branch, with a fresh id and the label-derived slug.
    let tree = committed_tree(&host, &cfg.review_branch, TaxonomyType::Tags);
    let urgent = find_item(&tree, "4").expect("created item missing");
    assert_eq!(urgent.label, "Urgent");
    assert_eq!(urgent.slug, "urgent");
    assert_eq!(host.open_pull_count(), 0);
}

#[test]
fn empty_batch_reports_no_changes() {
    let host = MemoryHost::new();
    let cfg = config();

    let result = publish_all_changes(&host, &cfg, &[]);
    assert!(!result.success);
    let failure = result.error.unwrap();
    assert_eq!(failure.code, ErrorCode::NoChanges);
    assert_eq!(failure.failed_at, Some(Stage::Sanitizing));
    // Nothing touched the host.
    assert_eq!(host.put_count(), 0);
}

#[test]
fn all_invalid_drafts_report_no_changes() {
    let host = MemoryHost::new();
    let cfg = config();

    let drafts = vec![
        json!({ "operation": "create", "taxonomyType": "tags", "data": {} }),
        json!({ "operation": "upsert" }),
        json!(42),
    ];
    let result = publish_all_changes(&host, &cfg, &drafts);
    assert!(!result.success);
    let failure = result.error.unwrap();
    assert_eq!(failure.code, ErrorCode::NoChanges);
    assert!(failure.message.contains("3 malformed"));
}

#[test]
fn sync_conflict_stops_before_any_commit() {
    let host = MemoryHost::new();
    let cfg = config();
    seed(&host, &cfg, TaxonomyType::Tags, &[]);
    host.set_merge_conflict(true);

    let drafts = vec![json!({
        "operation": "create",
        "taxonomyType": "tags",
        "data": { "label": "Urgent" }
    })];
    let result = publish_all_changes(&host, &cfg, &drafts);

    assert!(!result.success);
    let failure = result.error.unwrap();
    assert_eq!(failure.code, ErrorCode::SyncFailed);
    assert_eq!(failure.failed_at, Some(Stage::Syncing));
    assert!(failure.recoverable);
    assert_eq!(host.put_count(), 0);
}

#[test]
fn commit_failure_keeps_earlier_commits() {
    let host = MemoryHost::new();
    let cfg = config();
    seed(&host, &cfg, TaxonomyType::Tags, &[]);
    seed(&host, &cfg, TaxonomyType::Skills, &[]);
    // First commit succeeds, the second fails.
    host.fail_puts_after(1);

    // Type order is categories, tags, skills; tags commits first here.
    let drafts = vec![
        json!({
            "operation": "create",
            "taxonomyType": "tags",
            "data": { "label": "Urgent" }
        }),
        json!({
            "operation": "create",
            "taxonomyType": "skills",
            "data": { "label": "Welding" }
        }),
    ];
    let result = publish_all_changes(&host, &cfg, &drafts);

    assert!(!result.success);
    let failure = result.error.as_ref().unwrap();
    assert_eq!(failure.code, ErrorCode::CommitFailed);
    assert_eq!(failure.failed_at, Some(Stage::Committing));

    // Partial progress is reported, not rolled back.
    let data = result.data.unwrap();
    assert_eq!(data.commits_created, 1);
    assert_eq!(data.commit_shas.len(), 1);
    let tags = committed_tree(&host, &cfg.working_branch, TaxonomyType::Tags);
    assert_eq!(tags.len(), 1);
    let skills = committed_tree(&host, &cfg.working_branch, TaxonomyType::Skills);
    assert!(skills.is_empty());
}

#[test]
fn pull_creation_failure_is_success_with_warning() {
    let host = MemoryHost::new();
    let cfg = config();
    seed(&host, &cfg, TaxonomyType::Tags, &[]);
    host.fail_pull_creation(true);

    let drafts = vec![json!({
        "operation": "create",
        "taxonomyType": "tags",
        "data": { "label": "Urgent" }
    })];
    let result = publish_all_changes(&host, &cfg, &drafts);

    // Commits landed, so the publish counts as successful.
    assert!(result.success);
    let data = result.data.as_ref().unwrap();
    assert_eq!(data.commits_created, 1);
    assert_eq!(data.pr_number, None);
    let warning = result.error.unwrap();
    assert_eq!(warning.code, ErrorCode::PrCreateFailed);
    assert_eq!(warning.failed_at, Some(Stage::EnsuringPr));
    assert!(warning.recoverable);
}

#[test]
fn pull_merge_failure_is_success_with_warning() {
    let host = MemoryHost::new();
    let cfg = config();
    seed(&host, &cfg, TaxonomyType::Tags, &[]);
    host.fail_pull_merge(true);

    let drafts = vec![json!({
        "operation": "create",
        "taxonomyType": "tags",
        "data": { "label": "Urgent" }
    })];
    let result = publish_all_changes(&host, &cfg, &drafts);

    assert!(result.success);
    let data = result.data.as_ref().unwrap();
    assert!(data.pr_number.is_some());
    let warning = result.error.unwrap();
    assert_eq!(warning.code, ErrorCode::PrMergeFailed);
    assert_eq!(warning.failed_at, Some(Stage::Merging));
    // The pull request stays open for a manual merge.
    assert_eq!(host.open_pull_count(), 1);
}

#[test]
fn redundant_operations_collapse_before_publish() {
    let host = MemoryHost::new();
    let cfg = config();
    seed(
        &host,
        &cfg,
        TaxonomyType::Tags,
        &[TaxonomyItem::new("1", "Remote", "remote")],
    );

    // Update then delete of the same item folds into a single delete.
    let drafts = vec![
        json!({
            "operation": "update",
            "taxonomyType": "tags",
            "itemId": "1",
            "data": { "label": "Remote Work" }
        }),
        json!({
            "operation": "delete",
            "taxonomyType": "tags",
            "itemId": "1"
        }),
    ];
    let result = publish_all_changes(&host, &cfg, &drafts);

    assert!(result.success, "publish failed: {:?}", result.error);
    let data = result.data.unwrap();
    assert_eq!(data.published_drafts, 1);
    let tree = committed_tree(&host, &cfg.review_branch, TaxonomyType::Tags);
    assert!(tree.is_empty());
}

#[test]
fn nested_category_create_publishes_into_the_tree() {
    let host = MemoryHost::new();
    let cfg = config();
    seed(
        &host,
        &cfg,
        TaxonomyType::Categories,
        &[TaxonomyItem::new("1", "Plumbing", "plumbing")],
    );

    let drafts = vec![json!({
        "operation": "create",
        "taxonomyType": "categories",
        "data": { "label": "Repairs" },
        "placement": { "level": "subcategory", "parentId": "1" }
    })];
    let result = publish_all_changes(&host, &cfg, &drafts);

    assert!(result.success, "publish failed: {:?}", result.error);
    let tree = committed_tree(&host, &cfg.review_branch, TaxonomyType::Categories);
    let plumbing = find_item(&tree, "1").unwrap();
    assert_eq!(plumbing.children.len(), 1);
    assert_eq!(plumbing.children[0].slug, "repairs");
}

#[test]
fn delete_of_unknown_item_fails_as_not_found() {
    let host = MemoryHost::new();
    let cfg = config();
    seed(&host, &cfg, TaxonomyType::Tags, &[]);

    let drafts = vec![json!({
        "operation": "delete",
        "taxonomyType": "tags",
        "itemId": "99"
    })];
    let result = publish_all_changes(&host, &cfg, &drafts);

    assert!(!result.success);
    let failure = result.error.unwrap();
    assert_eq!(failure.code, ErrorCode::NotFound);
    assert_eq!(failure.failed_at, Some(Stage::Committing));
}

#[test]
fn staged_changes_publish_and_staging_survives() {
    let store = SqliteStaging::in_memory().unwrap();
    let host = MemoryHost::new();
    let cfg = config();
    seed(&host, &cfg, TaxonomyType::Tags, &[]);

    let service = TaxonomyService::new(&store, &host, &cfg);
    service
        .stage_change(
            Permissions::EDITOR,
            "admin",
            TaxonomyType::Tags,
            ChangeOp::Create,
            None,
            ItemFields {
                label: Some("Urgent".into()),
                ..Default::default()
            },
            None,
        )
        .unwrap();

    let result = publish_staged(&host, &cfg, &store).unwrap();
    assert!(result.success, "publish failed: {:?}", result.error);

    let tree = committed_tree(&host, &cfg.review_branch, TaxonomyType::Tags);
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].slug, "urgent");

    // Publishing never clears staging; the caller discards after
    // confirming the result.
    assert_eq!(store.count(None).unwrap(), 1);
    service
        .discard_pending(Permissions::EDITOR, Some(TaxonomyType::Tags))
        .unwrap();
    assert_eq!(store.count(None).unwrap(), 0);
}

#[test]
fn duplicate_preassigned_id_is_rejected() {
    let host = MemoryHost::new();
    let cfg = config();
    seed(
        &host,
        &cfg,
        TaxonomyType::Tags,
        &[TaxonomyItem::new("1", "Remote", "remote")],
    );

    let drafts = vec![json!({
        "operation": "create",
        "taxonomyType": "tags",
        "data": { "id": "1", "label": "Urgent" }
    })];
    let result = publish_all_changes(&host, &cfg, &drafts);

    assert!(!result.success);
    let failure = result.error.unwrap();
    assert_eq!(failure.code, ErrorCode::ValidationFailed);
    assert_eq!(failure.failed_at, Some(Stage::Committing));

    // The committed tree is untouched; id "1" still appears exactly once.
    let tree = committed_tree(&host, &cfg.working_branch, TaxonomyType::Tags);
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].label, "Remote");
}

#[test]
fn update_slug_collision_gets_suffixed() {
    let host = MemoryHost::new();
    let cfg = config();
    seed(
        &host,
        &cfg,
        TaxonomyType::Tags,
        &[
            TaxonomyItem::new("1", "Remote", "remote"),
            TaxonomyItem::new("2", "Urgent", "urgent"),
        ],
    );

    let drafts = vec![json!({
        "operation": "update",
        "taxonomyType": "tags",
        "itemId": "2",
        "data": { "slug": "remote" }
    })];
    let result = publish_all_changes(&host, &cfg, &drafts);

    assert!(result.success, "publish failed: {:?}", result.error);
    let tree = committed_tree(&host, &cfg.review_branch, TaxonomyType::Tags);
    assert_eq!(find_item(&tree, "1").unwrap().slug, "remote");
    assert_eq!(find_item(&tree, "2").unwrap().slug, "remote-2");
}

#[test]
fn staged_create_then_delete_cancels_out() {
    let store = SqliteStaging::in_memory().unwrap();
    let host = MemoryHost::new();
    let cfg = config();
    seed(&host, &cfg, TaxonomyType::Tags, &[]);

    let service = TaxonomyService::new(&store, &host, &cfg);
    let stage_create = |label: &str| {
        service
            .stage_change(
                Permissions::EDITOR,
                "admin",
                TaxonomyType::Tags,
                ChangeOp::Create,
                None,
                ItemFields {
                    label: Some(label.into()),
                    ..Default::default()
                },
                None,
            )
            .unwrap()
    };
    let created = stage_create("Urgent");
    service
        .stage_change(
            Permissions::EDITOR,
            "admin",
            TaxonomyType::Tags,
            ChangeOp::Delete,
            Some(created.data.id.unwrap()),
            ItemFields::default(),
            None,
        )
        .unwrap();
    stage_create("Remote");

    // The create+delete pair cancels; the remaining create publishes.
    let result = publish_staged(&host, &cfg, &store).unwrap();
    assert!(result.success, "publish failed: {:?}", result.error);
    assert_eq!(result.data.unwrap().published_drafts, 1);

    let tree = committed_tree(&host, &cfg.review_branch, TaxonomyType::Tags);
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].slug, "remote");
}

#[test]
fn staged_batch_that_cancels_entirely_reports_no_changes() {
    let store = SqliteStaging::in_memory().unwrap();
    let host = MemoryHost::new();
    let cfg = config();
    seed(&host, &cfg, TaxonomyType::Tags, &[]);

    let service = TaxonomyService::new(&store, &host, &cfg);
    let created = service
        .stage_change(
            Permissions::EDITOR,
            "admin",
            TaxonomyType::Tags,
            ChangeOp::Create,
            None,
            ItemFields {
                label: Some("Urgent".into()),
                ..Default::default()
            },
            None,
        )
        .unwrap();
    service
        .stage_change(
            Permissions::EDITOR,
            "admin",
            TaxonomyType::Tags,
            ChangeOp::Delete,
            Some(created.data.id.unwrap()),
            ItemFields::default(),
            None,
        )
        .unwrap();

    // Everything cancels: no commits, no wedged NotFound retry loop, and
    // staging is intact for the caller to discard.
    let result = publish_staged(&host, &cfg, &store).unwrap();
    assert!(!result.success);
    assert_eq!(result.error.unwrap().code, ErrorCode::NoChanges);
    assert_eq!(host.put_count(), 0);
    assert_eq!(store.count(None).unwrap(), 2);
}

#[test]
fn sync_conflict_preserves_staged_rows() {
    let store = SqliteStaging::in_memory().unwrap();
    let host = MemoryHost::new();
    let cfg = config();
    seed(&host, &cfg, TaxonomyType::Tags, &[]);

    let service = TaxonomyService::new(&store, &host, &cfg);
    service
        .stage_change(
            Permissions::EDITOR,
            "admin",
            TaxonomyType::Tags,
            ChangeOp::Create,
            None,
            ItemFields {
                label: Some("Urgent".into()),
                ..Default::default()
            },
            None,
        )
        .unwrap();
    host.set_merge_conflict(true);

    let result = publish_staged(&host, &cfg, &store).unwrap();
    assert!(!result.success);
    assert_eq!(result.error.unwrap().code, ErrorCode::SyncFailed);
    // The staged batch survives the failed publish untouched.
    assert_eq!(store.count(None).unwrap(), 1);
    assert_eq!(host.put_count(), 0);
}

#[test]
fn second_publish_is_incremental() {
    let host = MemoryHost::new();
    let cfg = config();
    seed(&host, &cfg, TaxonomyType::Tags, &[]);

    let first = publish_all_changes(
        &host,
        &cfg,
        &[json!({
            "operation": "create",
            "taxonomyType": "tags",
            "data": { "label": "Urgent" }
        })],
    );
    assert!(first.success);

    // The next publish builds on the merged result: new id continues the
    // sequence and a colliding label gets a suffixed slug.
    let second = publish_all_changes(
        &host,
        &cfg,
        &[json!({
            "operation": "create",
            "taxonomyType": "tags",
            "data": { "label": "Urgent" }
        })],
    );
    assert!(second.success, "publish failed: {:?}", second.error);

    let tree = committed_tree(&host, &cfg.review_branch, TaxonomyType::Tags);
    assert_eq!(tree.len(), 2);
    assert_eq!(tree[1].id, "2");
    assert_eq!(tree[1].slug, "urgent-2");
}
