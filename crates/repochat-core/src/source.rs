//! Repository content source.
//!
//! A [`RepoSource`] lists the files of one branch and returns raw file
//! text. The GitHub implementation lives in the `repochat` app crate;
//! tests use in-memory fakes.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::FileRecord;
use crate::repo::RepoRef;

/// Default branch fetched when none is configured.
pub const DEFAULT_BRANCH: &str = "main";

/// A code host that can list and read repository files.
#[async_trait]
pub trait RepoSource: Send + Sync {
    /// All blob entries of `branch`, in listing order.
    ///
    /// Non-2xx responses (missing repository or branch, rate limiting)
    /// fail with [`RagError::Fetch`](crate::RagError::Fetch) and are not retried.
    async fn list_files(&self, repo: &RepoRef, branch: &str) -> Result<Vec<FileRecord>>;

    /// Raw text of one file.
    async fn file_content(&self, repo: &RepoRef, path: &str, branch: &str) -> Result<String>;
}
