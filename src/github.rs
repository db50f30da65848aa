//! GitHub [`RepoSource`]: recursive tree listing plus raw file download.
//!
//! - Listing: `GET {api_url}/repos/{owner}/{repo}/git/trees/{branch}?recursive=1`
//! - Content: `GET {raw_url}/{owner}/{repo}/{branch}/{path}`
//!
//! An optional token is sent as `Authorization: token <T>` on every
//! request. Non-2xx responses become [`RagError::Fetch`] and are not
//! retried. Listed paths pass through include/exclude globs before
//! being returned.

use std::fmt::Display;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;

use repochat_core::error::RagError;
use repochat_core::models::FileRecord;
use repochat_core::repo::RepoRef;
use repochat_core::source::RepoSource;

use crate::config::GithubConfig;

const ACCEPT: &str = "application/vnd.github.v3+json";

/// Include/exclude glob filter over repository-relative paths.
pub struct PathFilter {
    /// `None` includes everything.
    include: Option<GlobSet>,
    exclude: GlobSet,
}

impl PathFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let include = if include.is_empty() {
            None
        } else {
            Some(build_globset(include)?)
        };
        Ok(Self {
            include,
            exclude: build_globset(exclude)?,
        })
    }

    pub fn accepts(&self, path: &str) -> bool {
        if self.exclude.is_match(path) {
            return false;
        }
        self.include.as_ref().map_or(true, |set| set.is_match(path))
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[derive(Deserialize)]
struct TreeResponse {
    tree: Vec<FileRecord>,
    #[serde(default)]
    truncated: bool,
}

pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    raw_url: String,
    token: Option<String>,
    filter: PathFilter,
}

impl GitHubClient {
    pub fn new(config: &GithubConfig, token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("repochat/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            raw_url: config.raw_url.trim_end_matches('/').to_string(),
            token,
            filter: PathFilter::new(&config.include_globs, &config.exclude_globs)?,
        })
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let req = self.http.get(url).header("Accept", ACCEPT);
        match &self.token {
            Some(token) => req.header("Authorization", format!("token {}", token)),
            None => req,
        }
    }

    async fn send(&self, url: &str) -> repochat_core::Result<reqwest::Response> {
        let response = self.get(url).send().await.map_err(fetch_err)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RagError::Fetch(format!("GitHub API error {}: {}", status, body.trim())))
    }
}

fn fetch_err(e: impl Display) -> RagError {
    RagError::Fetch(e.to_string())
}

/// Escape the characters that would otherwise end the URL path.
fn encode_path(path: &str) -> String {
    path.replace('%', "%25").replace('#', "%23").replace('?', "%3F")
}

#[async_trait]
impl RepoSource for GitHubClient {
    async fn list_files(&self, repo: &RepoRef, branch: &str) -> repochat_core::Result<Vec<FileRecord>> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.api_url, repo.owner, repo.repo, branch
        );
        let listing: TreeResponse = self.send(&url).await?.json().await.map_err(fetch_err)?;

        if listing.truncated {
            tracing::warn!(repo = %repo, "tree listing truncated by GitHub; some files are missing");
        }

        let total = listing.tree.len();
        let files: Vec<FileRecord> = listing
            .tree
            .into_iter()
            .filter(|entry| entry.is_blob() && self.filter.accepts(&entry.path))
            .collect();
        tracing::debug!(repo = %repo, entries = total, kept = files.len(), "filtered tree listing");
        Ok(files)
    }

    async fn file_content(&self, repo: &RepoRef, path: &str, branch: &str) -> repochat_core::Result<String> {
        let url = format!(
            "{}/{}/{}/{}/{}",
            self.raw_url,
            repo.owner,
            repo.repo,
            branch,
            encode_path(path)
        );
        self.send(&url).await?.text().await.map_err(fetch_err)
    }
}
