//! Embedding model trait, order-preserving batching, and vector utilities.
//!
//! Concrete embedders (OpenAI, Ollama) live in the `repochat` app crate.
//! This module owns the batching contract: [`embed_batch`] splits the
//! input into consecutive groups, issues one call per group, and
//! concatenates the results so that `output[i]` always embeds `texts[i]`.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// Default number of texts sent per embedding call.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// An external embedding model.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed one group of texts in a single model call.
    ///
    /// Must return exactly one vector per input, in input order.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_texts(&[text.to_string()]).await?;
        match vectors.pop() {
            Some(v) if vectors.is_empty() => Ok(v),
            _ => Err(RagError::Embedding(
                "expected exactly one vector for a single input".to_string(),
            )),
        }
    }
}

/// Embed `texts` in consecutive groups of at most `batch_size`.
///
/// A failure in any group aborts the whole batch; no partial results are
/// returned and the failed group is not retried. A `batch_size` of zero
/// is treated as one.
pub async fn embed_batch(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let batch_size = batch_size.max(1);
    let mut out = Vec::with_capacity(texts.len());

    for (batch_no, group) in texts.chunks(batch_size).enumerate() {
        tracing::debug!(
            batch = batch_no,
            size = group.len(),
            model = embedder.model_name(),
            "embedding batch"
        );
        let vectors = embedder.embed_texts(group).await?;
        if vectors.len() != group.len() {
            return Err(RagError::Embedding(format!(
                "model returned {} vectors for {} inputs",
                vectors.len(),
                group.len()
            )));
        }
        out.extend(vectors);
    }

    Ok(out)
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use repochat_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a BLOB produced by [`vec_to_blob`]. Trailing partial bytes are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`.
///
/// Returns `0.0` for empty vectors, mismatched lengths, or zero-norm input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

/// Cosine distance: `1 - cosine_similarity`. Lower is closer.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}
