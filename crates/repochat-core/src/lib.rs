//! # repochat core
//!
//! Shared, I/O-free logic for repochat: data models, the token-budgeted
//! line chunker, collection naming, the vector store and embedding
//! abstractions, and the ingestion and retrieval-answer pipelines.
//!
//! This crate contains no tokio runtime, sqlx, reqwest, or filesystem
//! access. Every external collaborator (code host, embedding model,
//! chat model, vector store) sits behind a trait so the pipelines can be
//! driven by the SQLite/HTTP implementations in the `repochat` app crate
//! or by in-memory fakes in tests.
//!
//! ## Data Flow
//!
//! ```text
//!  ingestion:  RepoSource ──▶ chunk ──▶ Embedder ──▶ VectorStore
//!  query:      Embedder ──▶ VectorStore ──▶ ChatModel
//! ```
//!
//! Both paths resolve the same collection through
//! [`collection::sanitize_collection_name`].

pub mod answer;
pub mod chunk;
pub mod collection;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod models;
pub mod prompt;
pub mod repo;
pub mod session;
pub mod source;
pub mod store;
pub mod workflow;

pub use error::{RagError, Result};
