//! Core data models shared by the ingestion and query paths.
//!
//! These types are the values that flow between the fetcher, chunker,
//! embedder, vector store, and answer composer.

use serde::{Deserialize, Serialize};

/// Kind of entry in a recursive repository tree listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Blob,
    Tree,
    /// Submodule commits and anything else the host may report.
    #[serde(other)]
    Other,
}

/// One entry of a repository tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

impl FileRecord {
    pub fn blob(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Blob,
        }
    }

    pub fn is_blob(&self) -> bool {
        self.kind == EntryKind::Blob
    }
}

/// A contiguous, token-bounded line range of one source file.
///
/// `start_line` and `end_line` are 1-based and inclusive. `content` is
/// exactly the source lines `[start_line, end_line]` joined by `\n`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub owner: String,
    pub repo: String,
}

impl Chunk {
    /// Storage identifier: `"{file_path}_{start_line}_{end_line}"`.
    pub fn record_id(&self) -> String {
        format!("{}_{}_{}", self.file_path, self.start_line, self.end_line)
    }

    /// Number of source lines covered by this chunk.
    pub fn line_count(&self) -> usize {
        self.end_line + 1 - self.start_line
    }
}

/// A single nearest-neighbour hit, ordered best-first by the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHit {
    pub id: String,
    pub document: String,
    pub metadata: Chunk,
    /// Cosine distance to the query (`0.0` = identical direction).
    pub distance: f32,
}

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn in a conversation history. Histories are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
