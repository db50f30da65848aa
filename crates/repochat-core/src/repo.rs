//! Repository identity and URL parsing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::collection::sanitize_collection_name;
use crate::error::{RagError, Result};

const GITHUB_PREFIX: &str = "https://github.com/";
const QUERY_DELIMS: &[char] = &['?', '#'];

/// An `owner/repo` pair identifying a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Extract owner and repo from a `https://github.com/{owner}/{repo}...` URL.
    ///
    /// Only the first two path segments are read. Anything after them
    /// (subpaths, a `.git` suffix, query strings, fragments) is ignored.
    ///
    /// ```rust
    /// use repochat_core::repo::RepoRef;
    ///
    /// let r = RepoRef::parse("https://github.com/rust-lang/cargo/tree/master/src").unwrap();
    /// assert_eq!(r.owner, "rust-lang");
    /// assert_eq!(r.repo, "cargo");
    /// ```
    pub fn parse(url: &str) -> Result<Self> {
        let invalid = || RagError::Validation("Invalid GitHub URL".to_string());

        let rest = url.trim().strip_prefix(GITHUB_PREFIX).ok_or_else(invalid)?;
        let mut segments = rest.splitn(3, '/');
        let owner = segments.next().unwrap_or_default();
        let repo_segment = segments.next().unwrap_or_default();

        let repo = repo_segment.split(QUERY_DELIMS).next().unwrap_or_default();
        let repo = repo.strip_suffix(".git").unwrap_or(repo);

        if owner.is_empty() || owner.contains(QUERY_DELIMS) || repo.is_empty() {
            return Err(invalid());
        }

        Ok(Self::new(owner, repo))
    }

    /// Canonical `https://github.com/{owner}/{repo}` URL.
    pub fn url(&self) -> String {
        format!("{}{}/{}", GITHUB_PREFIX, self.owner, self.repo)
    }

    /// Storage collection name for this repository.
    pub fn collection_name(&self) -> String {
        sanitize_collection_name(&self.owner, &self.repo)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}
