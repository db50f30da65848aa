//! HTTP embedding providers.
//!
//! - **[`OpenAiEmbedder`]** calls `POST {url}/embeddings`.
//! - **[`OllamaEmbedder`]** calls `POST {url}/api/embed` on a local Ollama.
//! - **[`DisabledEmbedder`]** always fails; used when `provider = "disabled"`.
//!
//! Each call embeds one group of texts. Batching and order checks live in
//! [`repochat_core::embedding::embed_batch`]. Calls are not retried: a
//! failed request fails the whole ingestion or chat turn.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use repochat_core::embedding::Embedder;
use repochat_core::error::RagError;

use crate::config::{default_openai_url, EmbeddingConfig, EnvConfig};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

fn embed_err(e: impl std::fmt::Display) -> RagError {
    RagError::Embedding(e.to_string())
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

// ============ Disabled ============

/// Embedder that refuses every call.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed_texts(&self, _texts: &[String]) -> repochat_core::Result<Vec<Vec<f32>>> {
        Err(RagError::Embedding("embedding provider is disabled".to_string()))
    }
}

// ============ OpenAI ============

/// Embedder backed by the OpenAI embeddings API.
pub struct OpenAiEmbedder {
    http: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
    /// Missing keys surface as an embedding error on first use.
    api_key: Option<String>,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig, api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            http: http_client(config.timeout_secs)?,
            url: config
                .url
                .clone()
                .unwrap_or_else(default_openai_url)
                .trim_end_matches('/')
                .to_string(),
            model: config.model.clone(),
            dims: config.dims,
            api_key,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_texts(&self, texts: &[String]) -> repochat_core::Result<Vec<Vec<f32>>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| RagError::Embedding("OPENAI_API_KEY not set".to_string()))?;

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .http
            .post(format!("{}/embeddings", self.url))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await
            .map_err(embed_err)?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!(
                "OpenAI API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response.json().await.map_err(embed_err)?;
        parse_openai_response(&json)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> repochat_core::Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| RagError::Embedding("invalid OpenAI response: missing data array".into()))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| RagError::Embedding("invalid OpenAI response: missing embedding".into()))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, to_f32_vec(embedding)));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

fn to_f32_vec(values: &[serde_json::Value]) -> Vec<f32> {
    values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect()
}

// ============ Ollama ============

/// Embedder backed by a local Ollama instance.
pub struct OllamaEmbedder {
    http: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            http: http_client(config.timeout_secs)?,
            url: config
                .url
                .as_deref()
                .unwrap_or(DEFAULT_OLLAMA_URL)
                .trim_end_matches('/')
                .to_string(),
            model: config.model.clone(),
            dims: config.dims,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_texts(&self, texts: &[String]) -> repochat_core::Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .http
            .post(format!("{}/api/embed", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                RagError::Embedding(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!(
                "Ollama API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response.json().await.map_err(embed_err)?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> repochat_core::Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| RagError::Embedding("invalid Ollama response: missing embeddings array".into()))?;

    embeddings
        .iter()
        .map(|e| {
            e.as_array()
                .map(|values| to_f32_vec(values))
                .ok_or_else(|| RagError::Embedding("invalid Ollama response: embedding is not an array".into()))
        })
        .collect()
}

/// Build the embedder named by `config.provider`.
pub fn create_embedder(config: &EmbeddingConfig, env: &EnvConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "openai" => {
            if env.openai_api_key.is_none() {
                tracing::warn!("OPENAI_API_KEY is not set; embedding calls will fail");
            }
            Ok(Arc::new(OpenAiEmbedder::new(config, env.openai_api_key.clone())?))
        }
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
