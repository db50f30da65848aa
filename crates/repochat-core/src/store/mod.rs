//! Vector store abstraction.
//!
//! The [`VectorStore`] trait partitions records into named collections
//! (one per repository) and supports duplicate-aware inserts plus exact
//! k-nearest-neighbour queries. Embeddings are always supplied by the
//! caller; stores never compute them.
//!
//! Backends: [`memory::InMemoryStore`] here, and the SQLite store in the
//! `repochat` app crate.

pub mod memory;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{RagError, Result};
use crate::models::{Chunk, QueryHit};

/// Number of hits returned by a retrieval query unless configured otherwise.
pub const DEFAULT_TOP_K: usize = 5;

/// Opaque reference to an existing collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionHandle {
    pub name: String,
}

impl CollectionHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// What to do when a record identifier is already stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Leave the stored record untouched.
    #[default]
    Skip,
    /// Overwrite the stored record when its content hash differs.
    Replace,
}

impl FromStr for DuplicatePolicy {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "skip" => Ok(DuplicatePolicy::Skip),
            "replace" => Ok(DuplicatePolicy::Replace),
            other => Err(RagError::Config(format!(
                "unknown duplicate policy '{}' (expected skip or replace)",
                other
            ))),
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicatePolicy::Skip => f.write_str("skip"),
            DuplicatePolicy::Replace => f.write_str("replace"),
        }
    }
}

/// A chunk, its embedding, and the derived identifier, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: String,
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
    /// SHA-256 of the chunk content, hex-encoded.
    pub content_hash: String,
}

impl StoredRecord {
    pub fn new(chunk: Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: chunk.record_id(),
            content_hash: content_hash(&chunk.content),
            chunk,
            embedding,
        }
    }
}

/// Hex SHA-256 of `text`.
pub fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// Outcome of one [`store_chunks`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreReport {
    pub submitted: usize,
    pub inserted: usize,
    pub replaced: usize,
    pub skipped: usize,
}

impl StoreReport {
    /// Fold another report into this one.
    pub fn absorb(&mut self, other: StoreReport) {
        self.submitted += other.submitted;
        self.inserted += other.inserted;
        self.replaced += other.replaced;
        self.skipped += other.skipped;
    }
}

/// Per-collection listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionSummary {
    pub name: String,
    pub records: usize,
    /// Unix timestamp (seconds) of creation.
    pub created_at: i64,
}

/// Storage backend for chunk embeddings.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get_or_create_collection`](VectorStore::get_or_create_collection) | Idempotent collection lookup/creation |
/// | [`insert_records`](VectorStore::insert_records) | Write records, honouring a [`DuplicatePolicy`] |
/// | [`query`](VectorStore::query) | Nearest neighbours by cosine distance |
/// | [`count`](VectorStore::count) | Records in one collection |
/// | [`list_collections`](VectorStore::list_collections) | All collections with record counts |
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn get_or_create_collection(&self, name: &str) -> Result<CollectionHandle>;

    /// Write `records`, which carry unique identifiers.
    ///
    /// Identifiers already present in the collection are resolved by
    /// `policy`. The returned report's `submitted` equals `records.len()`.
    async fn insert_records(
        &self,
        collection: &CollectionHandle,
        records: &[StoredRecord],
        policy: DuplicatePolicy,
    ) -> Result<StoreReport>;

    /// Up to `k` hits ordered by ascending cosine distance.
    ///
    /// An empty or unknown collection yields no hits.
    async fn query(
        &self,
        collection: &CollectionHandle,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<QueryHit>>;

    async fn count(&self, collection: &CollectionHandle) -> Result<usize>;

    async fn list_collections(&self) -> Result<Vec<CollectionSummary>>;
}

/// Persist `chunks` with their `embeddings` in one submission.
///
/// Requires `chunks.len() == embeddings.len()`. Repeated identifiers
/// inside the batch keep their first occurrence; the rest count as
/// skipped. Suppressed duplicates are logged, never returned as errors.
pub async fn store_chunks(
    store: &dyn VectorStore,
    collection: &CollectionHandle,
    chunks: &[Chunk],
    embeddings: &[Vec<f32>],
    policy: DuplicatePolicy,
) -> Result<StoreReport> {
    if chunks.len() != embeddings.len() {
        return Err(RagError::Store(format!(
            "{} chunks but {} embeddings",
            chunks.len(),
            embeddings.len()
        )));
    }

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(chunks.len());
    let mut in_batch_dupes = 0usize;
    for (chunk, embedding) in chunks.iter().zip(embeddings) {
        let record = StoredRecord::new(chunk.clone(), embedding.clone());
        if seen.insert(record.id.clone()) {
            records.push(record);
        } else {
            in_batch_dupes += 1;
        }
    }

    let mut report = store.insert_records(collection, &records, policy).await?;
    report.submitted += in_batch_dupes;
    report.skipped += in_batch_dupes;

    if report.skipped > 0 {
        tracing::warn!(
            collection = %collection.name,
            skipped = report.skipped,
            policy = %policy,
            "duplicate record ids suppressed"
        );
    }
    tracing::debug!(
        collection = %collection.name,
        inserted = report.inserted,
        replaced = report.replaced,
        "stored records"
    );

    Ok(report)
}

/// Dimensionality shared by every vector in `records`.
///
/// `expected` is the collection's established dimension, if any. An
/// empty vector, a mixed batch, or a batch disagreeing with `expected`
/// is a [`RagError::Store`]. Returns `expected` for an empty batch.
pub fn batch_dims(
    collection: &str,
    expected: Option<usize>,
    records: &[StoredRecord],
) -> Result<Option<usize>> {
    let mut dims = expected;
    for record in records {
        let len = record.embedding.len();
        if len == 0 {
            return Err(RagError::Store(format!(
                "record {} has an empty embedding",
                record.id
            )));
        }
        match dims {
            None => dims = Some(len),
            Some(d) if d != len => {
                return Err(RagError::Store(format!(
                    "record {} has {} dimensions but collection {} holds {}-dimensional vectors",
                    record.id, len, collection, d
                )))
            }
            Some(_) => {}
        }
    }
    Ok(dims)
}

/// Reject a query vector whose length differs from the collection's.
pub fn check_query_dims(collection: &str, expected: Option<usize>, query: &[f32]) -> Result<()> {
    match expected {
        Some(d) if d != query.len() => Err(RagError::Store(format!(
            "query has {} dimensions but collection {} holds {}-dimensional vectors",
            query.len(),
            collection,
            d
        ))),
        _ => Ok(()),
    }
}

/// Nearest-neighbour retrieval for one query vector.
pub async fn query_similar(
    store: &dyn VectorStore,
    collection: &CollectionHandle,
    embedding: &[f32],
    k: usize,
) -> Result<Vec<QueryHit>> {
    if k == 0 {
        return Ok(Vec::new());
    }
    store.query(collection, embedding, k).await
}

/// Sort hits best-first and keep `k`. Shared by store backends.
pub fn rank_hits(mut hits: Vec<QueryHit>, k: usize) -> Vec<QueryHit> {
    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    hits.truncate(k);
    hits
}
