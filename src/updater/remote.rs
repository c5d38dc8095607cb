//! Latest upstream revision, queried from the GitHub REST API.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::DateTime;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::config::UpstreamConfig;
use crate::report::Reporter;
use crate::updater::{FULL_ID_LEN, SHORT_ID_LEN};

/// Media type requested from the GitHub API.
pub const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

/// Longest subject shown in the version summary.
const SUBJECT_PREVIEW_LEN: usize = 50;

/// The head commit of the upstream branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRevision {
    /// First seven characters of `full_id`.
    pub short_id: String,
    /// Full 40-character commit hash.
    pub full_id: String,
    /// First line of the commit message.
    pub message: String,
    /// Commit author name.
    pub author: String,
    /// Commit date as `YYYY-MM-DD`.
    pub date: String,
}

impl RemoteRevision {
    fn from_payload(payload: CommitPayload) -> Result<Self, FetchError> {
        let full_id = payload.sha;
        if full_id.len() != FULL_ID_LEN || !full_id.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(FetchError::Malformed(format!(
                "commit sha is not a {FULL_ID_LEN}-character hex string: {full_id:?}"
            )));
        }

        let date = DateTime::parse_from_rfc3339(&payload.commit.author.date)
            .map_err(|e| {
                FetchError::Malformed(format!(
                    "commit date {:?} is not RFC 3339: {e}",
                    payload.commit.author.date
                ))
            })?
            .format("%Y-%m-%d")
            .to_string();

        let message = payload
            .commit
            .message
            .lines()
            .next()
            .unwrap_or_default()
            .trim_end()
            .to_string();

        Ok(Self {
            short_id: full_id[..SHORT_ID_LEN].to_string(),
            full_id,
            message,
            author: payload.commit.author.name,
            date,
        })
    }

    /// Returns the subject, cut to fit the version summary.
    pub fn subject_preview(&self) -> String {
        self.message.chars().take(SUBJECT_PREVIEW_LEN).collect()
    }

    /// Returns `<short id> - <subject preview>`.
    pub fn headline(&self) -> String {
        format!("{} - {}", self.short_id, self.subject_preview())
    }
}

#[derive(Debug, Deserialize)]
struct CommitPayload {
    sha: String,
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    message: String,
    author: CommitAuthor,
}

#[derive(Debug, Deserialize)]
struct CommitAuthor {
    name: String,
    date: String,
}

/// Why the upstream revision could not be determined.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The API answered with a non-success status.
    #[error("GitHub API returned HTTP {0}")]
    Status(u16),
    /// The API could not be reached.
    #[error("could not connect to the GitHub API")]
    Connection(#[source] reqwest::Error),
    /// The request did not finish in time.
    #[error("GitHub API did not answer within {0:?}")]
    Timeout(Duration),
    /// The request failed for another reason.
    #[error("GitHub API request failed")]
    Request(#[source] reqwest::Error),
    /// The response body was not a commit.
    #[error("unexpected GitHub API response: {0}")]
    Malformed(String),
}

/// Client for the commits endpoint of one repository branch.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl GithubClient {
    /// Creates a client for the configured repository and branch.
    pub fn new(upstream: &UpstreamConfig) -> Result<Self> {
        let base = Url::parse(&format!("{}/", upstream.api_base.trim_end_matches('/')))
            .with_context(|| format!("Invalid API base URL: {}", upstream.api_base))?;
        let endpoint = base
            .join(&format!(
                "repos/{}/commits/{}",
                upstream.repository, upstream.branch
            ))
            .context("Failed to build commits endpoint")?;

        let http = reqwest::Client::builder()
            .user_agent(&upstream.user_agent)
            .timeout(upstream.timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            endpoint,
            timeout: upstream.timeout(),
        })
    }

    /// Returns the endpoint queried by [`Self::latest_revision`].
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Queries the head commit of the branch.
    pub async fn latest_revision(&self) -> Result<RemoteRevision, FetchError> {
        tracing::debug!(endpoint = %self.endpoint, "Querying upstream revision");

        let response = self
            .http
            .get(self.endpoint.clone())
            .header(ACCEPT, GITHUB_ACCEPT)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        let payload: CommitPayload =
            serde_json::from_str(&body).map_err(|e| FetchError::Malformed(e.to_string()))?;

        RemoteRevision::from_payload(payload)
    }

    fn classify(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else if error.is_connect() {
            FetchError::Connection(error)
        } else {
            FetchError::Request(error)
        }
    }
}

/// Fetches the upstream revision, logging a categorised error on failure.
pub async fn fetch_remote_revision(
    client: &GithubClient,
    reporter: &Reporter,
) -> Option<RemoteRevision> {
    match client.latest_revision().await {
        Ok(revision) => Some(revision),
        Err(e) => {
            let headline = match &e {
                FetchError::Status(_) => "HTTP error while querying GitHub",
                FetchError::Connection(_) => "Connection error while querying GitHub",
                FetchError::Timeout(_) => "Timed out while querying GitHub",
                FetchError::Request(_) | FetchError::Malformed(_) => {
                    "Unexpected error while querying GitHub"
                }
            };
            let _ = reporter.error(headline, Some(&anyhow::Error::new(e)));
            None
        }
    }
}
