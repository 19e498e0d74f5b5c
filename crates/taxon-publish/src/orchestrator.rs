//! Git/PR orchestration steps.
//!
//! Each step is independently testable and returns a typed result the
//! workflow branches on. Conflicts are never auto-resolved: a conflicting
//! sync is a hard stop with staged data untouched.

use tracing::{debug, info};

use taxon_core::{TaxonomyItem, TaxonomyType};
use taxon_format::{generate_taxonomy_file, parse_taxonomy_file};
use taxon_host::{CodeHost, CommitInfo, HostConfig, HostError, MergeOutcome, MergeStrategy, PullRequest};

use crate::error::PublishError;

/// Fixed pull request template.
pub const PR_TITLE: &str = "Taxonomy updates";

pub fn pr_body() -> String {
    "Automated taxonomy publish.\n\n\
     This pull request was opened by the taxonomy pipeline and carries \
     staged edits from the admin back-office. Generated files only; review \
     the diff and merge, or leave it for auto-merge."
        .to_string()
}

/// Commit message for one taxonomy type's publish.
pub fn commit_message(ty: TaxonomyType, change_count: usize) -> String {
    format!(
        "Update {ty} taxonomy ({change_count} change{})",
        if change_count == 1 { "" } else { "s" }
    )
}

/// Read and parse the committed tree for a taxonomy at a ref.
///
/// A missing remote file is an empty tree (first-time creation), not an
/// error.
pub fn read_taxonomy<H: CodeHost + ?Sized>(
    host: &H,
    ty: TaxonomyType,
    reference: &str,
) -> Result<Vec<TaxonomyItem>, PublishError> {
    match host.get_file(ty.file_path(), reference)? {
        Some(file) => Ok(parse_taxonomy_file(ty, &file.content)?),
        None => Ok(Vec::new()),
    }
}

/// Merge the review branch into the working branch before publishing, so a
/// publish never clobbers unrelated changes landed on the review branch
/// since the working branch last diverged.
pub fn sync_working_branch<H: CodeHost + ?Sized>(
    host: &H,
    config: &HostConfig,
) -> Result<MergeOutcome, HostError> {
    let outcome = host.merge_branch(
        &config.working_branch,
        &config.review_branch,
        &format!(
            "Sync {} with {}",
            config.working_branch, config.review_branch
        ),
    )?;
    match &outcome {
        MergeOutcome::Merged { sha } => info!(sha = %sha, "working branch synced"),
        MergeOutcome::AlreadyUpToDate => debug!("working branch already up to date"),
        MergeOutcome::Conflict { message } => {
            info!(message = %message, "sync conflict, publish stops")
        }
    }
    Ok(outcome)
}

/// Format and commit one taxonomy's full tree to the working branch.
///
/// Fetches the current file hash first; a missing file is committed as a
/// first-time creation with no prior hash.
pub fn commit_taxonomy<H: CodeHost + ?Sized>(
    host: &H,
    config: &HostConfig,
    ty: TaxonomyType,
    tree: &[TaxonomyItem],
    message: &str,
) -> Result<CommitInfo, HostError> {
    let path = ty.file_path();
    let prior_sha = host
        .get_file(path, &config.working_branch)?
        .map(|file| file.sha);
    let content = generate_taxonomy_file(ty, tree);
    let commit = host.put_file(
        path,
        message,
        &content,
        prior_sha.as_deref(),
        &config.working_branch,
    )?;
    info!(taxonomy = %ty, sha = %commit.sha, "taxonomy committed");
    Ok(commit)
}

/// Ensure exactly one open pull request exists from the working branch to
/// the review branch. Idempotent: an existing PR is returned as-is.
pub fn ensure_pull_request<H: CodeHost + ?Sized>(
    host: &H,
    config: &HostConfig,
) -> Result<PullRequest, HostError> {
    let open = host.list_open_pulls(&config.working_branch, &config.review_branch)?;
    if let Some(existing) = open.into_iter().next() {
        debug!(number = existing.number, "reusing open pull request");
        return Ok(existing);
    }
    let pull = host.create_pull(
        PR_TITLE,
        &config.working_branch,
        &config.review_branch,
        &pr_body(),
    )?;
    info!(number = pull.number, "pull request opened");
    Ok(pull)
}

/// Merge the pull request, squashing by default.
pub fn merge_pull_request<H: CodeHost + ?Sized>(
    host: &H,
    number: u64,
) -> Result<bool, HostError> {
    host.merge_pull(number, MergeStrategy::Squash, PR_TITLE)
}
