//! In-memory fake code host for tests and local development.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::api::{
    CodeHost, CommitInfo, HostError, MergeOutcome, MergeStrategy, PullDetails, PullRequest,
    RemoteFile,
};

#[derive(Debug, Clone)]
struct FileEntry {
    content: String,
    sha: String,
}

#[derive(Debug, Clone)]
struct PullRecord {
    pull: PullRequest,
    head: String,
    base: String,
    open: bool,
    /// Put counter at creation time; the difference is the commit count.
    puts_at_open: usize,
}

#[derive(Debug, Default)]
struct MemoryState {
    /// branch -> path -> entry
    branches: HashMap<String, BTreeMap<String, FileEntry>>,
    pulls: Vec<PullRecord>,
    next_pull: u64,
    next_sha: u64,
    puts: usize,
    /// Fail every put once this many have succeeded.
    fail_puts_after: Option<usize>,
    conflict_on_merge: bool,
    fail_create_pull: bool,
    fail_merge_pull: bool,
}

/// An in-memory [`CodeHost`] with scriptable failures.
///
/// Branch merges are simplified: the base branch's files overwrite the
/// head's, which matches the pipeline's usage (the working branch never
/// diverges before a sync) without modeling real three-way merges.
#[derive(Default)]
pub struct MemoryHost {
    state: Mutex<MemoryState>,
}

impl MemoryHost {
    pub fn new() -> Self {
        let mut state = MemoryState::default();
        state.next_pull = 1;
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed a file on a branch directly, bypassing commit bookkeeping.
    pub fn seed_file(&self, branch: &str, path: &str, content: &str) {
        let mut state = self.lock();
        let sha = format!("sha-{}", state.next_sha);
        state.next_sha += 1;
        state
            .branches
            .entry(branch.to_string())
            .or_default()
            .insert(
                path.to_string(),
                FileEntry {
                    content: content.to_string(),
                    sha,
                },
            );
    }

    /// Current content of a file, if present.
    pub fn file_content(&self, branch: &str, path: &str) -> Option<String> {
        self.lock()
            .branches
            .get(branch)
            .and_then(|files| files.get(path))
            .map(|entry| entry.content.clone())
    }

    pub fn put_count(&self) -> usize {
        self.lock().puts
    }

    pub fn open_pull_count(&self) -> usize {
        self.lock().pulls.iter().filter(|p| p.open).count()
    }

    /// Make every put after the first `n` successful ones fail.
    pub fn fail_puts_after(&self, n: usize) {
        self.lock().fail_puts_after = Some(n);
    }

    /// Make the next branch merge report a conflict.
    pub fn set_merge_conflict(&self, conflict: bool) {
        self.lock().conflict_on_merge = conflict;
    }

    pub fn fail_pull_creation(&self, fail: bool) {
        self.lock().fail_create_pull = fail;
    }

    pub fn fail_pull_merge(&self, fail: bool) {
        self.lock().fail_merge_pull = fail;
    }
}

impl CodeHost for MemoryHost {
    fn get_file(&self, path: &str, reference: &str) -> Result<Option<RemoteFile>, HostError> {
        let state = self.lock();
        Ok(state
            .branches
            .get(reference)
            .and_then(|files| files.get(path))
            .map(|entry| RemoteFile {
                content: entry.content.clone(),
                sha: entry.sha.clone(),
            }))
    }

    fn put_file(
        &self,
        path: &str,
        _message: &str,
        content: &str,
        prior_sha: Option<&str>,
        branch: &str,
    ) -> Result<CommitInfo, HostError> {
        let mut state = self.lock();
        if let Some(limit) = state.fail_puts_after {
            if state.puts >= limit {
                return Err(HostError::Api {
                    status: 500,
                    message: "scripted put failure".to_string(),
                });
            }
        }

        let current_sha = state
            .branches
            .get(branch)
            .and_then(|files| files.get(path))
            .map(|entry| entry.sha.clone());
        // Content-hash precondition: an update must present the current sha.
        if let Some(current) = &current_sha {
            if prior_sha != Some(current.as_str()) {
                return Err(HostError::ShaMismatch {
                    path: path.to_string(),
                });
            }
        }

        let sha = format!("sha-{}", state.next_sha);
        let commit_sha = format!("commit-{}", state.next_sha);
        state.next_sha += 1;
        state.puts += 1;
        state
            .branches
            .entry(branch.to_string())
            .or_default()
            .insert(
                path.to_string(),
                FileEntry {
                    content: content.to_string(),
                    sha,
                },
            );

        Ok(CommitInfo {
            url: format!("memory://commits/{commit_sha}"),
            sha: commit_sha,
        })
    }

    fn merge_branch(
        &self,
        base: &str,
        head: &str,
        _message: &str,
    ) -> Result<MergeOutcome, HostError> {
        let mut state = self.lock();
        if state.conflict_on_merge {
            return Ok(MergeOutcome::Conflict {
                message: "merge conflict between base and head".to_string(),
            });
        }
        let head_files = state
            .branches
            .get(head)
            .cloned()
            .ok_or_else(|| HostError::BranchNotFound(head.to_string()))?;
        let base_files = state.branches.entry(base.to_string()).or_default();

        let mut changed = false;
        for (path, entry) in head_files {
            let stale = base_files
                .get(&path)
                .map_or(true, |existing| existing.content != entry.content);
            if stale {
                base_files.insert(path, entry);
                changed = true;
            }
        }
        if changed {
            let sha = format!("merge-{}", state.next_sha);
            state.next_sha += 1;
            Ok(MergeOutcome::Merged { sha })
        } else {
            Ok(MergeOutcome::AlreadyUpToDate)
        }
    }

    fn list_open_pulls(&self, head: &str, base: &str) -> Result<Vec<PullRequest>, HostError> {
        let state = self.lock();
        Ok(state
            .pulls
            .iter()
            .filter(|p| p.open && p.head == head && p.base == base)
            .map(|p| p.pull.clone())
            .collect())
    }

    fn create_pull(
        &self,
        title: &str,
        head: &str,
        base: &str,
        _body: &str,
    ) -> Result<PullRequest, HostError> {
        let mut state = self.lock();
        if state.fail_create_pull {
            return Err(HostError::Api {
                status: 422,
                message: "scripted pull creation failure".to_string(),
            });
        }
        let number = state.next_pull;
        state.next_pull += 1;
        let pull = PullRequest {
            number,
            url: format!("memory://pulls/{number}"),
            title: title.to_string(),
        };
        let puts_at_open = state.puts;
        state.pulls.push(PullRecord {
            pull: pull.clone(),
            head: head.to_string(),
            base: base.to_string(),
            open: true,
            puts_at_open,
        });
        Ok(pull)
    }

    fn get_pull(&self, number: u64) -> Result<PullDetails, HostError> {
        let state = self.lock();
        let record = state
            .pulls
            .iter()
            .find(|p| p.pull.number == number)
            .ok_or(HostError::Api {
                status: 404,
                message: format!("pull {number} not found"),
            })?;

        // Line counts treat a changed file as fully rewritten; good enough
        // for a fake that never computes real diffs.
        let empty = BTreeMap::new();
        let head_files = state.branches.get(&record.head).unwrap_or(&empty);
        let base_files = state.branches.get(&record.base).unwrap_or(&empty);
        let mut additions = 0u64;
        let mut deletions = 0u64;
        for (path, entry) in head_files {
            match base_files.get(path) {
                Some(base) if base.content == entry.content => {}
                Some(base) => {
                    additions += entry.content.lines().count() as u64;
                    deletions += base.content.lines().count() as u64;
                }
                None => additions += entry.content.lines().count() as u64,
            }
        }

        Ok(PullDetails {
            number: record.pull.number,
            url: record.pull.url.clone(),
            title: record.pull.title.clone(),
            commits: (state.puts - record.puts_at_open) as u64,
            additions,
            deletions,
        })
    }

    fn merge_pull(
        &self,
        number: u64,
        _strategy: MergeStrategy,
        _title: &str,
    ) -> Result<bool, HostError> {
        let mut state = self.lock();
        if state.fail_merge_pull {
            return Err(HostError::Api {
                status: 405,
                message: "scripted pull merge failure".to_string(),
            });
        }
        let record = state
            .pulls
            .iter_mut()
            .find(|p| p.pull.number == number && p.open)
            .ok_or(HostError::Api {
                status: 404,
                message: format!("open pull {number} not found"),
            })?;
        record.open = false;
        let (head, base) = (record.head.clone(), record.base.clone());

        // Land the working branch's files on the review branch.
        let head_files = state.branches.get(&head).cloned().unwrap_or_default();
        let base_files = state.branches.entry(base).or_default();
        for (path, entry) in head_files {
            base_files.insert(path, entry);
        }
        Ok(true)
    }
}
