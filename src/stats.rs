//! `repochat collections`: what is indexed.
//!
//! Prints the database location and size followed by one row per
//! collection with its record count and creation time.

use anyhow::Result;

use repochat_core::store::VectorStore;

use crate::config::Config;
use crate::sqlite_store::SqliteVectorStore;

pub async fn run_stats(config: &Config) -> Result<()> {
    let store = SqliteVectorStore::open(config).await?;
    let collections = store.list_collections().await?;

    let db_path = config.db_path();
    let db_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    println!("repochat index");
    println!("  database: {}", db_path.display());
    println!("  size: {}", format_bytes(db_size));
    println!("  collections: {}", collections.len());

    if !collections.is_empty() {
        println!();
        println!("  {:<48} {:>8}   {}", "COLLECTION", "RECORDS", "CREATED");
        println!("  {}", "-".repeat(72));
        for c in &collections {
            println!(
                "  {:<48} {:>8}   {}",
                c.name,
                c.records,
                format_ts_relative(c.created_at)
            );
        }
    }

    store.pool().close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// "3 hours ago" for recent timestamps, otherwise an ISO date.
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;
    match delta {
        d if d < 0 => format_ts_iso(ts),
        d if d < 60 => "just now".to_string(),
        d if d < 3600 => plural(d / 60, "min"),
        d if d < 86400 => plural(d / 3600, "hour"),
        d if d < 86400 * 30 => plural(d / 86400, "day"),
        _ => format_ts_iso(ts),
    }
}

fn plural(n: i64, unit: &str) -> String {
    format!("{} {}{} ago", n, unit, if n == 1 { "" } else { "s" })
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
