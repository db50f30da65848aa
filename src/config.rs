//! Configuration parsing and validation.
//!
//! Settings come from an optional TOML file plus a few environment
//! variables read once at startup. Every section and field has a
//! default, so a missing file is equivalent to an empty one.
//!
//! ```toml
//! [store]
//! data_dir = "./repochat_data"
//! on_duplicate = "skip"          # or "replace"
//!
//! [chunking]
//! max_tokens = 1000
//! overlap_lines = 100
//!
//! [embedding]
//! provider = "openai"            # openai | ollama | disabled
//! model = "text-embedding-3-small"
//! dims = 1536
//! batch_size = 20
//!
//! [chat]
//! model = "gpt-4o-mini"
//! temperature = 0.7
//! max_tokens = 1000
//! top_k = 5
//! history_turns = 6
//!
//! [github]
//! branch = "main"
//! include_globs = []
//! exclude_globs = ["**/*.png"]
//! ```
//!
//! Environment: `OPENAI_API_KEY`, `GITHUB_TOKEN`, `REPOCHAT_DATA_DIR`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use repochat_core::answer::AnswerOptions;
use repochat_core::chunk::ChunkerConfig;
use repochat_core::ingest::IngestOptions;
use repochat_core::store::DuplicatePolicy;

pub const DB_FILE_NAME: &str = "index.sqlite";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkerConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub github: GithubConfig,
    /// Secrets and overrides from the environment; never read from TOML.
    #[serde(skip)]
    pub env: EnvConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_on_duplicate")]
    pub on_duplicate: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            on_duplicate: default_on_duplicate(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./repochat_data")
}
fn default_on_duplicate() -> String {
    "skip".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL. OpenAI default: `https://api.openai.com/v1`; Ollama: `http://localhost:11434`.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_batch_size() -> usize {
    20
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_openai_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(flatten)]
    pub answer: AnswerOptions,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            url: default_openai_url(),
            timeout_secs: default_timeout_secs(),
            answer: AnswerOptions::default(),
        }
    }
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}
pub fn default_openai_url() -> String {
    "https://api.openai.com/v1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_raw_url")]
    pub raw_url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Empty means every path is included.
    #[serde(default)]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            raw_url: default_raw_url(),
            branch: default_branch(),
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_raw_url() -> String {
    "https://raw.githubusercontent.com".to_string()
}
fn default_branch() -> String {
    repochat_core::source::DEFAULT_BRANCH.to_string()
}

/// Code-file extensions for `github.include_globs` when only source code
/// should be indexed (`repochat ingest --code-only`).
pub const CODE_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "java", "cpp", "c", "h", "cs", "php", "rb", "go", "rs", "swift", "kt",
    "scala", "r", "sh", "html", "css", "json", "yaml", "yml", "sql",
];

pub fn code_only_globs() -> Vec<String> {
    CODE_EXTENSIONS
        .iter()
        .map(|ext| format!("**/*.{}", ext))
        .collect()
}

/// Values read from the process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub openai_api_key: Option<String>,
    pub github_token: Option<String>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            github_token: non_empty_var("GITHUB_TOKEN"),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Path of the SQLite index inside the data directory.
    pub fn db_path(&self) -> PathBuf {
        self.store.data_dir.join(DB_FILE_NAME)
    }

    pub fn duplicate_policy(&self) -> Result<DuplicatePolicy> {
        Ok(self.store.on_duplicate.parse::<DuplicatePolicy>()?)
    }

    pub fn ingest_options(&self) -> Result<IngestOptions> {
        Ok(IngestOptions {
            branch: self.github.branch.clone(),
            chunker: self.chunking,
            batch_size: self.embedding.batch_size,
            policy: self.duplicate_policy()?,
        })
    }

    pub fn answer_options(&self) -> AnswerOptions {
        self.chat.answer
    }

    /// Apply `REPOCHAT_DATA_DIR` and capture secrets.
    fn apply_env(&mut self) {
        if let Some(dir) = non_empty_var("REPOCHAT_DATA_DIR") {
            self.store.data_dir = PathBuf::from(dir);
        }
        self.env = EnvConfig::from_env();
    }

    fn validate(&self) -> Result<()> {
        if self.chunking.max_tokens == 0 {
            anyhow::bail!("chunking.max_tokens must be > 0");
        }

        if self.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }

        if self.chat.answer.top_k < 1 {
            anyhow::bail!("chat.top_k must be >= 1");
        }

        if !(0.0..=2.0).contains(&self.chat.answer.temperature) {
            anyhow::bail!("chat.temperature must be in [0.0, 2.0]");
        }

        match self.embedding.provider.as_str() {
            "disabled" | "openai" | "ollama" => {}
            other => anyhow::bail!(
                "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
                other
            ),
        }

        if self.embedding.provider != "disabled" && self.embedding.dims == 0 {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                self.embedding.provider
            );
        }

        self.duplicate_policy()?;
        Ok(())
    }
}

/// Parse a TOML string, apply environment overrides, and validate.
pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config =
        toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.apply_env();
    config.validate()?;
    Ok(config)
}

/// Load configuration from `path`. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = if path.exists() {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        String::new()
    };
    parse_config(&content)
}
