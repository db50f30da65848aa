//! In-memory [`VectorStore`] for tests and ephemeral sessions.
//!
//! Collections live in a `HashMap` behind `std::sync::RwLock`. Queries
//! are brute-force cosine distance over every record in the collection.
//! The first insert fixes a collection's vector dimensionality.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::embedding::cosine_distance;
use crate::error::{RagError, Result};
use crate::models::QueryHit;

use super::{
    batch_dims, check_query_dims, rank_hits, CollectionHandle, CollectionSummary, DuplicatePolicy, StoreReport, StoredRecord,
    VectorStore,
};

struct MemCollection {
    created_at: i64,
    /// Set by the first non-empty insert.
    dims: Option<usize>,
    /// Insertion-ordered records; ids are unique.
    records: Vec<StoredRecord>,
}

/// In-memory vector store.
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, MemCollection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: PoisonError<T>) -> RagError {
    RagError::Store("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn get_or_create_collection(&self, name: &str) -> Result<CollectionHandle> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        collections
            .entry(name.to_string())
            .or_insert_with(|| MemCollection {
                created_at: chrono::Utc::now().timestamp(),
                dims: None,
                records: Vec::new(),
            });
        Ok(CollectionHandle::new(name))
    }

    async fn insert_records(
        &self,
        collection: &CollectionHandle,
        records: &[StoredRecord],
        policy: DuplicatePolicy,
    ) -> Result<StoreReport> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let coll = collections
            .get_mut(&collection.name)
            .ok_or_else(|| RagError::Store(format!("no such collection: {}", collection.name)))?;
        coll.dims = batch_dims(&collection.name, coll.dims, records)?;

        let mut report = StoreReport {
            submitted: records.len(),
            ..StoreReport::default()
        };

        for record in records {
            match coll.records.iter_mut().find(|r| r.id == record.id) {
                None => {
                    coll.records.push(record.clone());
                    report.inserted += 1;
                }
                Some(existing)
                    if policy == DuplicatePolicy::Replace
                        && existing.content_hash != record.content_hash =>
                {
                    *existing = record.clone();
                    report.replaced += 1;
                }
                Some(_) => report.skipped += 1,
            }
        }

        Ok(report)
    }

    async fn query(
        &self,
        collection: &CollectionHandle,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<QueryHit>> {
        let collections = self.collections.read().map_err(poisoned)?;
        let Some(coll) = collections.get(&collection.name) else {
            return Ok(Vec::new());
        };
        check_query_dims(&collection.name, coll.dims, embedding)?;

        let hits = coll
            .records
            .iter()
            .map(|r| QueryHit {
                id: r.id.clone(),
                document: r.chunk.content.clone(),
                metadata: r.chunk.clone(),
                distance: cosine_distance(embedding, &r.embedding),
            })
            .collect();

        Ok(rank_hits(hits, k))
    }

    async fn count(&self, collection: &CollectionHandle) -> Result<usize> {
        let collections = self.collections.read().map_err(poisoned)?;
        Ok(collections
            .get(&collection.name)
            .map(|c| c.records.len())
            .unwrap_or(0))
    }

    async fn list_collections(&self) -> Result<Vec<CollectionSummary>> {
        let collections = self.collections.read().map_err(poisoned)?;
        let mut out: Vec<CollectionSummary> = collections
            .iter()
            .map(|(name, c)| CollectionSummary {
                name: name.clone(),
                records: c.records.len(),
                created_at: c.created_at,
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;
    use crate::store::{query_similar, store_chunks};

    fn chunk(path: &str, start: usize, end: usize, content: &str) -> Chunk {
        Chunk {
            content: content.to_string(),
            file_path: path.to_string(),
            start_line: start,
            end_line: end,
            owner: "octo".to_string(),
            repo: "demo".to_string(),
        }
    }

    async fn seeded() -> (InMemoryStore, CollectionHandle) {
        let store = InMemoryStore::new();
        let coll = store.get_or_create_collection("octo_demo").await.unwrap();
        let chunks = vec![
            chunk("a.rs", 1, 10, "alpha"),
            chunk("b.rs", 1, 5, "beta"),
            chunk("c.rs", 3, 8, "gamma"),
        ];
        let embeddings = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]];
        store_chunks(&store, &coll, &chunks, &embeddings, DuplicatePolicy::Skip)
            .await
            .unwrap();
        (store, coll)
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = InMemoryStore::new();
        let a = store.get_or_create_collection("x_y").await.unwrap();
        let b = store.get_or_create_collection("x_y").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.list_collections().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_query_orders_best_first() {
        let (store, coll) = seeded().await;
        let hits = query_similar(&store, &coll, &[1.0, 0.1], 5).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].id, "a.rs_1_10");
        assert_eq!(hits[0].document, "alpha");
        assert_eq!(hits[0].metadata.file_path, "a.rs");
        assert_eq!(hits[2].id, "b.rs_1_5");
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[tokio::test]
    async fn test_query_respects_k() {
        let (store, coll) = seeded().await;
        assert_eq!(query_similar(&store, &coll, &[1.0, 0.0], 2).await.unwrap().len(), 2);
        assert!(query_similar(&store, &coll, &[1.0, 0.0], 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_empty_collection_returns_nothing() {
        let store = InMemoryStore::new();
        let coll = store.get_or_create_collection("empty_one").await.unwrap();
        assert!(store.query(&coll, &[1.0], 5).await.unwrap().is_empty());
        let missing = CollectionHandle::new("never_created");
        assert!(store.query(&missing, &[1.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reingest_unchanged_does_not_grow() {
        let (store, coll) = seeded().await;
        let report = store_chunks(
            &store,
            &coll,
            &[chunk("a.rs", 1, 10, "alpha")],
            &[vec![1.0, 0.0]],
            DuplicatePolicy::Skip,
        )
        .await
        .unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.inserted, 0);
        assert_eq!(store.count(&coll).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_skip_policy_keeps_stale_record() {
        let (store, coll) = seeded().await;
        store_chunks(
            &store,
            &coll,
            &[chunk("a.rs", 1, 10, "alpha v2")],
            &[vec![0.0, 1.0]],
            DuplicatePolicy::Skip,
        )
        .await
        .unwrap();
        let hits = store.query(&coll, &[1.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].document, "alpha");
    }

    #[tokio::test]
    async fn test_replace_policy_overwrites_changed_content() {
        let (store, coll) = seeded().await;
        let report = store_chunks(
            &store,
            &coll,
            &[chunk("a.rs", 1, 10, "alpha v2"), chunk("b.rs", 1, 5, "beta")],
            &[vec![1.0, 0.0], vec![0.0, 1.0]],
            DuplicatePolicy::Replace,
        )
        .await
        .unwrap();
        assert_eq!(report.replaced, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(store.count(&coll).await.unwrap(), 3);
        let hits = store.query(&coll, &[1.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].document, "alpha v2");
    }

    #[tokio::test]
    async fn test_in_batch_duplicate_first_wins() {
        let store = InMemoryStore::new();
        let coll = store.get_or_create_collection("octo_demo").await.unwrap();
        let report = store_chunks(
            &store,
            &coll,
            &[chunk("a.rs", 1, 2, "first"), chunk("a.rs", 1, 2, "second")],
            &[vec![1.0], vec![1.0]],
            DuplicatePolicy::Replace,
        )
        .await
        .unwrap();
        assert_eq!(
            report,
            StoreReport {
                submitted: 2,
                inserted: 1,
                replaced: 0,
                skipped: 1
            }
        );
        let hits = store.query(&coll, &[1.0], 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document, "first");
    }

    #[tokio::test]
    async fn test_length_mismatch_is_store_error() {
        let store = InMemoryStore::new();
        let coll = store.get_or_create_collection("octo_demo").await.unwrap();
        let err = store_chunks(
            &store,
            &coll,
            &[chunk("a.rs", 1, 2, "x")],
            &[],
            DuplicatePolicy::Skip,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "store");
        assert_eq!(store.count(&coll).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_into_missing_collection_fails() {
        let store = InMemoryStore::new();
        let err = store
            .insert_records(
                &CollectionHandle::new("ghost"),
                &[StoredRecord::new(chunk("a", 1, 1, "x"), vec![1.0])],
                DuplicatePolicy::Skip,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "store");
    }

    #[tokio::test]
    async fn test_mismatched_dimensions_are_rejected() {
        let (store, coll) = seeded().await;

        let err = store_chunks(
            &store,
            &coll,
            &[chunk("d.rs", 1, 1, "delta")],
            &[vec![1.0, 0.0, 0.0]],
            DuplicatePolicy::Skip,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "store");
        assert_eq!(store.count(&coll).await.unwrap(), 3);

        let err = query_similar(&store, &coll, &[1.0, 0.0, 0.0, 0.0, 0.0], 5)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "store");
    }

    #[tokio::test]
    async fn test_mixed_batch_is_rejected_whole() {
        let store = InMemoryStore::new();
        let coll = store.get_or_create_collection("octo_demo").await.unwrap();
        let err = store_chunks(
            &store,
            &coll,
            &[chunk("a.rs", 1, 1, "a"), chunk("b.rs", 1, 1, "b")],
            &[vec![1.0, 0.0, 0.0], vec![1.0, 0.0]],
            DuplicatePolicy::Skip,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "store");
        assert_eq!(store.count(&coll).await.unwrap(), 0);

        // Nothing was fixed by the failed batch.
        store_chunks(&store, &coll, &[chunk("b.rs", 1, 1, "b")], &[vec![1.0, 0.0]], DuplicatePolicy::Skip)
            .await
            .unwrap();
        assert_eq!(store.query(&coll, &[1.0, 0.0], 5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_collections_counts() {
        let (store, _) = seeded().await;
        store.get_or_create_collection("aaa_first").await.unwrap();
        let list = store.list_collections().await.unwrap();
        let names: Vec<&str> = list.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["aaa_first", "octo_demo"]);
        assert_eq!(list[0].records, 0);
        assert_eq!(list[1].records, 3);
    }
}
