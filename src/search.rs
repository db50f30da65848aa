//! `repochat search <url> <query>`: raw nearest-neighbour hits.
//!
//! Embeds the query and prints the closest chunks of the repository's
//! collection with their distances, without calling the chat model.
//! Useful for checking what context a question would retrieve.

use anyhow::{bail, Result};

use repochat_core::embedding::Embedder;
use repochat_core::models::QueryHit;
use repochat_core::repo::RepoRef;
use repochat_core::store::{query_similar, CollectionHandle};

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::sqlite_store::SqliteVectorStore;

const EXCERPT_CHARS: usize = 160;

pub async fn run_search(config: &Config, url: &str, query: &str, limit: Option<usize>) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }
    if config.embedding.provider == "disabled" {
        bail!("search requires embeddings. Set [embedding] provider in config.");
    }

    let repo = RepoRef::parse(url)?;
    let store = SqliteVectorStore::open(config).await?;
    let embedder = create_embedder(&config.embedding, &config.env)?;
    let collection = CollectionHandle::new(repo.collection_name());
    let k = limit.unwrap_or(config.chat.answer.top_k);

    let vector = embedder.embed(query).await?;
    let hits = query_similar(&store, &collection, &vector, k).await?;

    if hits.is_empty() {
        println!("No results.");
    } else {
        for (i, hit) in hits.iter().enumerate() {
            print_hit(i + 1, hit);
        }
    }

    store.pool().close().await;
    Ok(())
}

fn print_hit(rank: usize, hit: &QueryHit) {
    println!(
        "{}. [{:.3}] {}:{}-{}",
        rank, hit.distance, hit.metadata.file_path, hit.metadata.start_line, hit.metadata.end_line
    );
    println!("    excerpt: \"{}\"", excerpt(&hit.document));
    println!("    id: {}", hit.id);
    println!();
}

/// Single-line preview of a chunk, cut on a character boundary.
fn excerpt(document: &str) -> String {
    let flat = document.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}
