//! Repository ingestion: fetch → chunk → embed → store.
//!
//! [`ingest_repository`] runs the whole path for one repository,
//! sequentially. Every re-ingestion is a full re-crawl; identifiers that
//! already exist are resolved by the configured [`DuplicatePolicy`], so
//! re-ingesting an unchanged repository does not grow its collection.

use serde::Serialize;

use crate::chunk::{chunk_by_lines, ChunkerConfig, TokenCounter};
use crate::embedding::{embed_batch, Embedder, DEFAULT_BATCH_SIZE};
use crate::error::{RagError, Result};
use crate::models::Chunk;
use crate::repo::RepoRef;
use crate::source::{RepoSource, DEFAULT_BRANCH};
use crate::store::{store_chunks, DuplicatePolicy, StoreReport, VectorStore};

/// Message for a repository whose listing has no files.
pub const NO_FILES: &str = "No code files found in the repository";

/// Message for a repository whose files are all empty.
pub const NO_CONTENT: &str = "No content could be extracted from the repository";

/// Tunables for one ingestion run.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOptions {
    pub branch: String,
    pub chunker: ChunkerConfig,
    pub batch_size: usize,
    pub policy: DuplicatePolicy,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            branch: DEFAULT_BRANCH.to_string(),
            chunker: ChunkerConfig::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            policy: DuplicatePolicy::default(),
        }
    }
}

/// Collaborators needed to ingest a repository.
#[derive(Clone, Copy)]
pub struct IngestContext<'a> {
    pub source: &'a dyn RepoSource,
    pub counter: &'a dyn TokenCounter,
    pub embedder: &'a dyn Embedder,
    pub store: &'a dyn VectorStore,
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub repo: RepoRef,
    pub collection: String,
    pub branch: String,
    pub files_listed: usize,
    pub files_indexed: usize,
    pub files_empty: usize,
    pub chunks: usize,
    pub store: StoreReport,
}

/// Fetch, chunk, embed and store every blob of `repo`.
///
/// Fails with [`RagError::EmptyContent`] when the listing is empty or
/// every file is empty, and with the first fetch/embedding/store error
/// otherwise. Nothing is written until all chunks are embedded.
pub async fn ingest_repository(
    ctx: IngestContext<'_>,
    repo: &RepoRef,
    options: &IngestOptions,
) -> Result<IngestReport> {
    let files = ctx.source.list_files(repo, &options.branch).await?;
    let blobs: Vec<_> = files.into_iter().filter(|f| f.is_blob()).collect();
    tracing::info!(repo = %repo, branch = %options.branch, files = blobs.len(), "listed repository");

    if blobs.is_empty() {
        return Err(RagError::EmptyContent(NO_FILES.to_string()));
    }

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut files_indexed = 0usize;
    let mut files_empty = 0usize;

    for file in &blobs {
        let content = ctx
            .source
            .file_content(repo, &file.path, &options.branch)
            .await?;
        if content.is_empty() {
            tracing::debug!(path = %file.path, "skipping empty file");
            files_empty += 1;
            continue;
        }
        let file_chunks = chunk_by_lines(ctx.counter, &options.chunker, &content, &file.path, repo);
        tracing::debug!(path = %file.path, chunks = file_chunks.len(), "chunked file");
        files_indexed += 1;
        chunks.extend(file_chunks);
    }

    if chunks.is_empty() {
        return Err(RagError::EmptyContent(NO_CONTENT.to_string()));
    }
    tracing::info!(repo = %repo, files = files_indexed, chunks = chunks.len(), "chunked repository");

    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let embeddings = embed_batch(ctx.embedder, &texts, options.batch_size).await?;
    tracing::info!(repo = %repo, embeddings = embeddings.len(), model = ctx.embedder.model_name(), "embedded chunks");

    let collection_name = repo.collection_name();
    let collection = ctx.store.get_or_create_collection(&collection_name).await?;
    let store = store_chunks(ctx.store, &collection, &chunks, &embeddings, options.policy).await?;
    tracing::info!(
        collection = %collection_name,
        inserted = store.inserted,
        replaced = store.replaced,
        skipped = store.skipped,
        "stored chunks"
    );

    Ok(IngestReport {
        repo: repo.clone(),
        collection: collection_name,
        branch: options.branch.clone(),
        files_listed: blobs.len(),
        files_indexed,
        files_empty,
        chunks: chunks.len(),
        store,
    })
}
