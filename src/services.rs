//! Wiring: concrete clients and stores behind the core traits.

use std::sync::Arc;

use anyhow::Result;

use repochat_core::answer::ChatModel;
use repochat_core::embedding::Embedder;
use repochat_core::workflow::{Services, Workflow};

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::github::GitHubClient;
use crate::llm::OpenAiChat;
use crate::sqlite_store::SqliteVectorStore;
use crate::tokenizer::BpeTokenCounter;

/// Build the production service set for `config`.
///
/// Opens (and migrates) the SQLite index. Missing API keys are not an
/// error here; the affected calls fail when first made.
pub async fn build_services(config: &Config) -> Result<Services> {
    let store = SqliteVectorStore::open(config).await?;
    Ok(Services {
        source: Arc::new(GitHubClient::new(
            &config.github,
            config.env.github_token.clone(),
        )?),
        counter: Arc::new(BpeTokenCounter::new()?),
        embedder: create_embedder(&config.embedding, &config.env)?,
        store: Arc::new(store),
        chat: Arc::new(OpenAiChat::new(
            &config.chat,
            config.env.openai_api_key.clone(),
        )?),
    })
}

pub async fn build_workflow(config: &Config) -> Result<Workflow> {
    let services = build_services(config).await?;
    tracing::debug!(
        embedder = services.embedder.model_name(),
        chat = services.chat.model_name(),
        db = %config.db_path().display(),
        "services ready"
    );
    Ok(Workflow::new(
        services,
        config.ingest_options()?,
        config.answer_options(),
    ))
}
