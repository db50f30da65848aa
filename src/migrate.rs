use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the schema in the configured database. Idempotent.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            created_at INTEGER NOT NULL,
            dims INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Indexes created before vector dimensions were tracked.
    let has_dims: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('collections') WHERE name = 'dims'",
    )
    .fetch_one(pool)
    .await?;
    if has_dims == 0 {
        sqlx::query("ALTER TABLE collections ADD COLUMN dims INTEGER")
            .execute(pool)
            .await?;
    }

    // One row per chunk; `id` is "{file_path}_{start_line}_{end_line}".
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            document TEXT NOT NULL,
            embedding BLOB NOT NULL,
            metadata_json TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            PRIMARY KEY (collection, id),
            FOREIGN KEY (collection) REFERENCES collections(name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection)")
        .execute(pool)
        .await?;

    Ok(())
}
