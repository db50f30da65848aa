//! # repochat
//!
//! Ask questions about a GitHub repository.
//!
//! `repochat` lists a repository's files through the GitHub API, splits
//! them into overlapping line-based chunks, embeds the chunks and keeps
//! them in a local SQLite index with one collection per repository.
//! Questions are embedded, matched against the collection, and answered
//! by a chat model grounded in the retrieved code.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────┐
//! │  GitHub  │──▶│ Chunk+Embed  │──▶│  SQLite  │
//! │ tree/raw │   │ (BPE tokens) │   │ vectors  │
//! └──────────┘   └──────────────┘   └────┬─────┘
//!                                        │ top-k
//!                                        ▼
//!                 question ──▶ ┌──────────────────┐
//!                              │ prompt + chat LLM │──▶ answer
//!                              └──────────────────┘
//! ```
//!
//! The pipeline logic (chunking, batching, duplicate policy, prompt
//! assembly, the workflow state machine) lives in `repochat-core`; this
//! crate supplies the network clients, persistence and CLI commands.
//!
//! ## Quick Start
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! repochat init
//! repochat ingest https://github.com/owner/repo
//! repochat ask https://github.com/owner/repo "Where is the config parsed?"
//! repochat chat https://github.com/owner/repo
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`github`] | GitHub tree listing and raw file download |
//! | [`tokenizer`] | BPE token counting for the chunker |
//! | [`embedding`] | OpenAI / Ollama embedding providers |
//! | [`llm`] | OpenAI-compatible chat completions |
//! | [`sqlite_store`] | SQLite vector store |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`services`] | Wiring clients into a workflow |
//! | [`ingest`] | `ingest` command |
//! | [`chat`] | `ask` and `chat` commands |
//! | [`search`] | `search` command |
//! | [`stats`] | `collections` command |

pub mod chat;
pub mod config;
pub mod db;
pub mod embedding;
pub mod github;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod search;
pub mod services;
pub mod sqlite_store;
pub mod stats;
pub mod tokenizer;
