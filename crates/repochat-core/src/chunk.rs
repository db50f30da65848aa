//! Token-budgeted line chunker with line-based overlap.
//!
//! Splits one file's text into [`Chunk`]s whose summed per-line token
//! count stays within `max_tokens`. When a chunk closes, its last
//! `overlap_lines` lines are carried into the next chunk so retrieval
//! keeps context across boundaries.
//!
//! # Algorithm
//!
//! 1. Split the text on `\n`. A terminal newline yields a trailing empty line.
//! 2. Count each line as `tokens(line + "\n")`.
//! 3. Accumulate lines until the next one would push the running total past
//!    `max_tokens`. If the buffer is non-empty, emit it as a chunk covering
//!    `[start_line, i - 1]`, then seed the next buffer with the last
//!    `min(overlap_lines, buffer_len)` lines plus line `i`.
//! 4. Emit whatever remains as the final chunk ending at the last line.
//!
//! A single line larger than the budget is never split; it lands in a
//! chunk of its own (possibly alongside carried-over overlap lines).
//!
//! Overlap is measured in lines, not tokens, so carried-over lines are
//! not bounded by the token budget.
//!
//! # Example
//!
//! ```rust
//! use repochat_core::chunk::{chunk_by_lines, ChunkerConfig, TokenCounter};
//! use repochat_core::repo::RepoRef;
//!
//! struct Chars;
//! impl TokenCounter for Chars {
//!     fn count(&self, text: &str) -> usize {
//!         text.chars().count()
//!     }
//! }
//!
//! let repo = RepoRef::new("octo", "demo");
//! let chunks = chunk_by_lines(&Chars, &ChunkerConfig::default(), "hello", "a.txt", &repo);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 1));
//! ```

use serde::Deserialize;

use crate::models::Chunk;
use crate::repo::RepoRef;

/// Counts subword tokens the same way the embedding/chat models do.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Chunk size budget and overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum tokens per chunk (summed per line).
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Lines carried from the end of one chunk into the next.
    #[serde(default = "default_overlap_lines")]
    pub overlap_lines: usize,
}

fn default_max_tokens() -> usize {
    1000
}

fn default_overlap_lines() -> usize {
    100
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            overlap_lines: default_overlap_lines(),
        }
    }
}

/// Split `content` into line chunks stamped with `file_path` and `repo`.
///
/// Always returns at least one chunk (empty text yields a single empty
/// chunk covering line 1).
pub fn chunk_by_lines(
    counter: &dyn TokenCounter,
    config: &ChunkerConfig,
    content: &str,
    file_path: &str,
    repo: &RepoRef,
) -> Vec<Chunk> {
    let lines: Vec<&str> = content.split('\n').collect();

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_tokens = 0usize;
    let mut start_line = 1usize;

    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx + 1;
        let line_tokens = line_token_count(counter, line);

        if current_tokens + line_tokens > config.max_tokens && !current.is_empty() {
            chunks.push(make_chunk(&current, file_path, start_line, line_no - 1, repo));

            let carried = config.overlap_lines.min(current.len());
            let mut next: Vec<&str> = current[current.len() - carried..].to_vec();
            next.push(line);

            current_tokens = next.iter().map(|l| line_token_count(counter, l)).sum();
            current = next;
            start_line = line_no - carried;
        } else {
            current.push(line);
            current_tokens += line_tokens;
        }
    }

    if !current.is_empty() {
        chunks.push(make_chunk(&current, file_path, start_line, lines.len(), repo));
    }

    chunks
}

/// Token count of one line including its newline.
pub fn line_token_count(counter: &dyn TokenCounter, line: &str) -> usize {
    let mut with_newline = String::with_capacity(line.len() + 1);
    with_newline.push_str(line);
    with_newline.push('\n');
    counter.count(&with_newline)
}

fn make_chunk(
    lines: &[&str],
    file_path: &str,
    start_line: usize,
    end_line: usize,
    repo: &RepoRef,
) -> Chunk {
    Chunk {
        content: lines.join("\n"),
        file_path: file_path.to_string(),
        start_line,
        end_line,
        owner: repo.owner.clone(),
        repo: repo.repo.clone(),
    }
}
