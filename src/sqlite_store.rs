//! SQLite-backed [`VectorStore`].
//!
//! Collections are rows of `collections`; records live in `records`
//! keyed by `(collection, id)`. Embeddings are little-endian f32 BLOBs
//! and queries are exact brute-force cosine distance over one collection.
//! `collections.dims` records the vector length fixed by the first insert.

use std::fmt::Display;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use repochat_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use repochat_core::error::{RagError, Result};
use repochat_core::models::{Chunk, QueryHit};
use repochat_core::store::{
    batch_dims, check_query_dims, rank_hits, CollectionHandle, CollectionSummary,
    DuplicatePolicy, StoreReport, StoredRecord, VectorStore,
};

use crate::config::Config;
use crate::{db, migrate};

/// SQLite implementation of [`VectorStore`].
pub struct SqliteVectorStore {
    pool: SqlitePool,
}

fn store_err(e: impl Display) -> RagError {
    RagError::Store(e.to_string())
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured index and make sure the schema exists.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(config).await?;
        migrate::migrate_pool(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// `None` if the collection does not exist, else its recorded dimension.
    async fn collection_dims(&self, name: &str) -> Result<Option<Option<usize>>> {
        let dims: Option<Option<i64>> =
            sqlx::query_scalar("SELECT dims FROM collections WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_err)?;
        Ok(dims.map(|d| d.map(|d| d as usize)))
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn get_or_create_collection(&self, name: &str) -> Result<CollectionHandle> {
        sqlx::query(
            "INSERT INTO collections (name, created_at) VALUES (?, ?) ON CONFLICT(name) DO NOTHING",
        )
        .bind(name)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(CollectionHandle::new(name))
    }

    async fn insert_records(
        &self,
        collection: &CollectionHandle,
        records: &[StoredRecord],
        policy: DuplicatePolicy,
    ) -> Result<StoreReport> {
        let Some(known_dims) = self.collection_dims(&collection.name).await? else {
            return Err(RagError::Store(format!(
                "no such collection: {}",
                collection.name
            )));
        };
        let dims = batch_dims(&collection.name, known_dims, records)?;

        let mut report = StoreReport {
            submitted: records.len(),
            ..StoreReport::default()
        };

        let mut tx = self.pool.begin().await.map_err(store_err)?;

        if known_dims.is_none() {
            if let Some(d) = dims {
                // Guarded so a concurrent first insert of another length loses.
                let updated = sqlx::query(
                    "UPDATE collections SET dims = ? WHERE name = ? AND (dims IS NULL OR dims = ?)",
                )
                .bind(d as i64)
                .bind(&collection.name)
                .bind(d as i64)
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
                if updated.rows_affected() == 0 {
                    return Err(RagError::Store(format!(
                        "collection {} already holds vectors of another dimension",
                        collection.name
                    )));
                }
            }
        }

        for record in records {
            let existing: Option<String> = sqlx::query_scalar(
                "SELECT content_hash FROM records WHERE collection = ? AND id = ?",
            )
            .bind(&collection.name)
            .bind(&record.id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(store_err)?;

            let metadata_json = serde_json::to_string(&record.chunk).map_err(store_err)?;
            let blob = vec_to_blob(&record.embedding);

            match existing {
                None => {
                    sqlx::query(
                        r#"
                        INSERT INTO records (collection, id, document, embedding, metadata_json, content_hash)
                        VALUES (?, ?, ?, ?, ?, ?)
                        "#,
                    )
                    .bind(&collection.name)
                    .bind(&record.id)
                    .bind(&record.chunk.content)
                    .bind(&blob)
                    .bind(&metadata_json)
                    .bind(&record.content_hash)
                    .execute(&mut *tx)
                    .await
                    .map_err(store_err)?;
                    report.inserted += 1;
                }
                Some(hash) if policy == DuplicatePolicy::Replace && hash != record.content_hash => {
                    sqlx::query(
                        r#"
                        UPDATE records
                        SET document = ?, embedding = ?, metadata_json = ?, content_hash = ?
                        WHERE collection = ? AND id = ?
                        "#,
                    )
                    .bind(&record.chunk.content)
                    .bind(&blob)
                    .bind(&metadata_json)
                    .bind(&record.content_hash)
                    .bind(&collection.name)
                    .bind(&record.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(store_err)?;
                    report.replaced += 1;
                }
                Some(_) => report.skipped += 1,
            }
        }

        tx.commit().await.map_err(store_err)?;
        Ok(report)
    }

    async fn query(
        &self,
        collection: &CollectionHandle,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<QueryHit>> {
        let Some(dims) = self.collection_dims(&collection.name).await? else {
            return Ok(Vec::new());
        };
        check_query_dims(&collection.name, dims, embedding)?;

        let rows = sqlx::query(
            "SELECT id, document, embedding, metadata_json FROM records WHERE collection = ?",
        )
        .bind(&collection.name)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let metadata_json: String = row.get("metadata_json");
            let metadata: Chunk = serde_json::from_str(&metadata_json).map_err(store_err)?;
            hits.push(QueryHit {
                id: row.get("id"),
                document: row.get("document"),
                metadata,
                distance: cosine_distance(embedding, &blob_to_vec(&blob)),
            });
        }

        Ok(rank_hits(hits, k))
    }

    async fn count(&self, collection: &CollectionHandle) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?")
            .bind(&collection.name)
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(n as usize)
    }

    async fn list_collections(&self) -> Result<Vec<CollectionSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT c.name, c.created_at, COUNT(r.id) AS records
            FROM collections c
            LEFT JOIN records r ON r.collection = c.name
            GROUP BY c.name, c.created_at
            ORDER BY c.name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows
            .iter()
            .map(|row| CollectionSummary {
                name: row.get("name"),
                created_at: row.get("created_at"),
                records: row.get::<i64, _>("records") as usize,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repochat_core::store::{query_similar, store_chunks};
    use tempfile::TempDir;

    async fn open_store(dir: &TempDir) -> SqliteVectorStore {
        let pool = db::connect_path(&dir.path().join("index.sqlite")).await.unwrap();
        migrate::migrate_pool(&pool).await.unwrap();
        SqliteVectorStore::new(pool)
    }

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

    #[tokio::test]
    async fn test_store_and_query_roundtrip_metadata() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let coll = store.get_or_create_collection("octo_demo").await.unwrap();

        let chunks = vec![chunk("src/a.rs", 1, 12, "fn a() {}"), chunk("src/b.rs", 4, 9, "fn b() {}")];
        let embeddings = vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]];
        let report = store_chunks(&store, &coll, &chunks, &embeddings, DuplicatePolicy::Skip)
            .await
            .unwrap();
        assert_eq!(report.inserted, 2);

        let hits = query_similar(&store, &coll, &[0.1, 0.9, 0.0], 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "src/b.rs_4_9");
        assert_eq!(hits[0].document, "fn b() {}");
        assert_eq!(hits[0].metadata, chunks[1]);
        assert!(hits[0].distance < hits[1].distance);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let a = store.get_or_create_collection("one_repo").await.unwrap();
        let b = store.get_or_create_collection("two_repo").await.unwrap();
        store_chunks(&store, &a, &[chunk("x", 1, 1, "x")], &[vec![1.0]], DuplicatePolicy::Skip)
            .await
            .unwrap();
        assert_eq!(store.count(&a).await.unwrap(), 1);
        assert_eq!(store.count(&b).await.unwrap(), 0);
        assert!(store.query(&b, &[1.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_skip_policy_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let coll = store.get_or_create_collection("octo_demo").await.unwrap();
        let chunks = vec![chunk("a", 1, 2, "one"), chunk("b", 1, 1, "two")];
        let embeddings = vec![vec![1.0, 0.0], vec![0.0, 1.0]];

        store_chunks(&store, &coll, &chunks, &embeddings, DuplicatePolicy::Skip)
            .await
            .unwrap();
        let again = store_chunks(&store, &coll, &chunks, &embeddings, DuplicatePolicy::Skip)
            .await
            .unwrap();

        assert_eq!(again.inserted, 0);
        assert_eq!(again.skipped, 2);
        assert_eq!(store.count(&coll).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_replace_policy_updates_changed_rows() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let coll = store.get_or_create_collection("octo_demo").await.unwrap();
        store_chunks(
            &store,
            &coll,
            &[chunk("a", 1, 2, "old body")],
            &[vec![1.0, 0.0]],
            DuplicatePolicy::Replace,
        )
        .await
        .unwrap();

        let report = store_chunks(
            &store,
            &coll,
            &[chunk("a", 1, 2, "new body")],
            &[vec![0.0, 1.0]],
            DuplicatePolicy::Replace,
        )
        .await
        .unwrap();
        assert_eq!(report.replaced, 1);

        let hits = store.query(&coll, &[0.0, 1.0], 1).await.unwrap();
        assert_eq!(hits[0].document, "new body");
        assert_eq!(hits[0].metadata.content, "new body");
        assert!(hits[0].distance.abs() < 1e-6);
        assert_eq!(store.count(&coll).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_insert_requires_collection() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let err = store
            .insert_records(
                &CollectionHandle::new("missing"),
                &[StoredRecord::new(chunk("a", 1, 1, "a"), vec![1.0])],
                DuplicatePolicy::Skip,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "store");
    }

    #[tokio::test]
    async fn test_dimension_is_fixed_by_first_insert() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let coll = store.get_or_create_collection("octo_demo").await.unwrap();
        store_chunks(&store, &coll, &[chunk("a", 1, 1, "a")], &[vec![1.0, 0.0, 0.0]], DuplicatePolicy::Skip)
            .await
            .unwrap();

        let err = store_chunks(&store, &coll, &[chunk("b", 1, 1, "b")], &[vec![1.0, 0.0]], DuplicatePolicy::Skip)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "store");
        assert_eq!(store.count(&coll).await.unwrap(), 1);

        let err = query_similar(&store, &coll, &[1.0, 0.0, 0.0, 0.0, 0.0], 5)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "store");
        assert!(err.to_string().contains("query has 5 dimensions"));

        assert_eq!(query_similar(&store, &coll, &[1.0, 0.0, 0.0], 5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dimension_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = open_store(&dir).await;
            let coll = store.get_or_create_collection("octo_demo").await.unwrap();
            store_chunks(&store, &coll, &[chunk("a", 1, 1, "a")], &[vec![1.0, 0.0]], DuplicatePolicy::Skip)
                .await
                .unwrap();
            store.pool().close().await;
        }

        let store = open_store(&dir).await;
        let coll = CollectionHandle::new("octo_demo");
        let err = store_chunks(&store, &coll, &[chunk("b", 1, 1, "b")], &[vec![1.0; 4]], DuplicatePolicy::Skip)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "store");
    }

    #[tokio::test]
    async fn test_migration_adds_dims_to_old_schema() {
        let dir = TempDir::new().unwrap();
        let pool = db::connect_path(&dir.path().join("index.sqlite")).await.unwrap();
        sqlx::query("CREATE TABLE collections (name TEXT PRIMARY KEY, created_at INTEGER NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO collections (name, created_at) VALUES ('old_repo', 1)")
            .execute(&pool)
            .await
            .unwrap();

        migrate::migrate_pool(&pool).await.unwrap();
        migrate::migrate_pool(&pool).await.unwrap();

        let store = SqliteVectorStore::new(pool);
        let coll = CollectionHandle::new("old_repo");
        store_chunks(&store, &coll, &[chunk("a", 1, 1, "a")], &[vec![0.5, 0.5]], DuplicatePolicy::Skip)
            .await
            .unwrap();
        assert!(store.query(&coll, &[1.0], 1).await.is_err());
    }

    #[tokio::test]
    async fn test_list_collections_and_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = open_store(&dir).await;
            let coll = store.get_or_create_collection("octo_demo").await.unwrap();
            store.get_or_create_collection("octo_demo").await.unwrap();
            store.get_or_create_collection("empty_repo").await.unwrap();
            store_chunks(&store, &coll, &[chunk("a", 1, 1, "a")], &[vec![1.0]], DuplicatePolicy::Skip)
                .await
                .unwrap();
            store.pool().close().await;
        }

        let store = open_store(&dir).await;
        let list = store.list_collections().await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "empty_repo");
        assert_eq!(list[0].records, 0);
        assert_eq!(list[1].name, "octo_demo");
        assert_eq!(list[1].records, 1);
        assert!(list[1].created_at > 0);
    }
}
