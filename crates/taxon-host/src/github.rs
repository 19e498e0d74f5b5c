//! GitHub-style REST implementation of [`CodeHost`].

use std::time::Duration;

use base64::Engine;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::api::{
    CodeHost, CommitInfo, HostError, MergeOutcome, MergeStrategy, PullDetails, PullRequest,
    RemoteFile,
};
use crate::config::HostConfig;

const ACCEPT: &str = "application/vnd.github+json";
const USER_AGENT: &str = concat!("taxon/", env!("CARGO_PKG_VERSION"));

impl From<reqwest::Error> for HostError {
    fn from(err: reqwest::Error) -> Self {
        HostError::Transport(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct PutContentsResponse {
    commit: CommitResponse,
}

#[derive(Debug, Deserialize)]
struct MergeResponse {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    number: u64,
    html_url: String,
    title: String,
}

#[derive(Debug, Deserialize)]
struct PullDetailsResponse {
    number: u64,
    html_url: String,
    title: String,
    commits: u64,
    additions: u64,
    deletions: u64,
}

#[derive(Debug, Deserialize)]
struct MergePullResponse {
    merged: bool,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl From<PullResponse> for PullRequest {
    fn from(p: PullResponse) -> Self {
        PullRequest {
            number: p.number,
            url: p.html_url,
            title: p.title,
        }
    }
}

/// Blocking client for a GitHub-style contents / merges / pulls API.
pub struct GithubHost {
    http: Client,
    config: HostConfig,
}

impl GithubHost {
    pub fn new(config: HostConfig) -> Result<Self, HostError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { http, config })
    }

    fn repo_url(&self, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.config.api_base, self.config.owner, self.config.repo, tail
        )
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder) -> Result<Response, HostError> {
        let response = request
            .header("Accept", ACCEPT)
            .bearer_auth(&self.config.token)
            .send()?;
        if response.status() == StatusCode::UNAUTHORIZED
            || response.status() == StatusCode::FORBIDDEN
        {
            return Err(HostError::Unauthorized);
        }
        Ok(response)
    }

    fn api_error(response: Response) -> HostError {
        let status = response.status().as_u16();
        let message = response
            .json::<ApiErrorBody>()
            .map(|b| b.message)
            .unwrap_or_else(|_| "unreadable error body".to_string());
        HostError::Api { status, message }
    }
}

impl CodeHost for GithubHost {
    fn get_file(&self, path: &str, reference: &str) -> Result<Option<RemoteFile>, HostError> {
        let url = self.repo_url(&format!("contents/{path}"));
        debug!(path, reference, "fetching remote file");
        let response = self.send(self.http.get(&url).query(&[("ref", reference)]))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::OK => {
                let body: ContentsResponse = response.json()?;
                // The contents API base64-encodes with line wrapping.
                let raw: String = body.content.split_whitespace().collect();
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(raw)
                    .map_err(|e| HostError::Transport(format!("bad base64 content: {e}")))?;
                let content = String::from_utf8(bytes)
                    .map_err(|e| HostError::Transport(format!("non-utf8 content: {e}")))?;
                Ok(Some(RemoteFile {
                    content,
                    sha: body.sha,
                }))
            }
            _ => Err(Self::api_error(response)),
        }
    }

    fn put_file(
        &self,
        path: &str,
        message: &str,
        content: &str,
        prior_sha: Option<&str>,
        branch: &str,
    ) -> Result<CommitInfo, HostError> {
        let url = self.repo_url(&format!("contents/{path}"));
        let mut body = json!({
            "message": message,
            "content": base64::engine::general_purpose::STANDARD.encode(content),
            "branch": branch,
        });
        if let Some(sha) = prior_sha {
            body["sha"] = json!(sha);
        }
        debug!(path, branch, update = prior_sha.is_some(), "writing remote file");
        let response = self.send(self.http.put(&url).json(&body))?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                let body: PutContentsResponse = response.json()?;
                Ok(CommitInfo {
                    sha: body.commit.sha,
                    url: body.commit.html_url,
                })
            }
            // The host rejects writes whose sha no longer matches the
            // remote file: a concurrent publish landed first.
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(HostError::ShaMismatch {
                    path: path.to_string(),
                })
            }
            _ => Err(Self::api_error(response)),
        }
    }

    fn merge_branch(
        &self,
        base: &str,
        head: &str,
        message: &str,
    ) -> Result<MergeOutcome, HostError> {
        let url = self.repo_url("merges");
        debug!(base, head, "requesting server-side merge");
        let response = self.send(self.http.post(&url).json(&json!({
            "base": base,
            "head": head,
            "commit_message": message,
        })))?;

        match response.status() {
            StatusCode::CREATED => {
                let body: MergeResponse = response.json()?;
                Ok(MergeOutcome::Merged { sha: body.sha })
            }
            StatusCode::NO_CONTENT => Ok(MergeOutcome::AlreadyUpToDate),
            StatusCode::CONFLICT => {
                let message = response
                    .json::<ApiErrorBody>()
                    .map(|b| b.message)
                    .unwrap_or_else(|_| "merge conflict".to_string());
                Ok(MergeOutcome::Conflict { message })
            }
            StatusCode::NOT_FOUND => Err(HostError::BranchNotFound(format!("{base} or {head}"))),
            _ => Err(Self::api_error(response)),
        }
    }

    fn list_open_pulls(&self, head: &str, base: &str) -> Result<Vec<PullRequest>, HostError> {
        let url = self.repo_url("pulls");
        let response = self.send(self.http.get(&url).query(&[
            ("state", "open"),
            ("head", &format!("{}:{}", self.config.owner, head)),
            ("base", base),
        ]))?;

        if response.status() != StatusCode::OK {
            return Err(Self::api_error(response));
        }
        let pulls: Vec<PullResponse> = response.json()?;
        Ok(pulls.into_iter().map(PullRequest::from).collect())
    }

    fn create_pull(
        &self,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> Result<PullRequest, HostError> {
        let url = self.repo_url("pulls");
        debug!(head, base, "opening pull request");
        let response = self.send(self.http.post(&url).json(&json!({
            "title": title,
            "head": head,
            "base": base,
            "body": body,
        })))?;

        if response.status() != StatusCode::CREATED {
            return Err(Self::api_error(response));
        }
        let pull: PullResponse = response.json()?;
        Ok(pull.into())
    }

    fn get_pull(&self, number: u64) -> Result<PullDetails, HostError> {
        let url = self.repo_url(&format!("pulls/{number}"));
        let response = self.send(self.http.get(&url))?;
        if response.status() != StatusCode::OK {
            return Err(Self::api_error(response));
        }
        let pull: PullDetailsResponse = response.json()?;
        Ok(PullDetails {
            number: pull.number,
            url: pull.html_url,
            title: pull.title,
            commits: pull.commits,
            additions: pull.additions,
            deletions: pull.deletions,
        })
    }

    fn merge_pull(
        &self,
        number: u64,
        strategy: MergeStrategy,
        title: &str,
    ) -> Result<bool, HostError> {
        let url = self.repo_url(&format!("pulls/{number}/merge"));
        debug!(number, strategy = strategy.as_str(), "merging pull request");
        let response = self.send(self.http.put(&url).json(&json!({
            "merge_method": strategy.as_str(),
            "commit_title": title,
        })))?;

        if response.status() != StatusCode::OK {
            return Err(Self::api_error(response));
        }
        let body: MergePullResponse = response.json()?;
        Ok(body.merged)
    }
}
