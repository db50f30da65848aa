//! Retrieval-answer composer.
//!
//! Given a conversation history whose last turn is the current question,
//! [`answer`] embeds the question, retrieves the nearest chunks, builds
//! a grounded prompt and calls the chat model once. Failures never
//! escape: they become a fixed apology plus an error marker, and the
//! history is returned unchanged.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::embedding::Embedder;
use crate::error::Result;
use crate::models::{ConversationTurn, Role};
use crate::prompt;
use crate::repo::RepoRef;
use crate::store::{query_similar, CollectionHandle, VectorStore, DEFAULT_TOP_K};

/// Answer returned when any stage of a chat turn fails.
pub const APOLOGY: &str = "Sorry, I encountered an error while processing your question.";

/// One message of a chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// A single chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A language model that turns a message list into one reply.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, request: &ChatRequest) -> Result<String>;
}

/// Retrieval and sampling knobs for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AnswerOptions {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Prior turns (excluding the current question) rendered into the prompt.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

/// Three full question/answer exchanges. The window is taken after the
/// current question is removed, so it never shrinks to five turns.
fn default_history_turns() -> usize {
    6
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

impl Default for AnswerOptions {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            history_turns: default_history_turns(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Collaborators needed to answer a question.
#[derive(Clone, Copy)]
pub struct AnswerContext<'a> {
    pub embedder: &'a dyn Embedder,
    pub store: &'a dyn VectorStore,
    pub chat: &'a dyn ChatModel,
}

/// Result of one chat turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutcome {
    pub answer: String,
    /// Updated history on success; the input history on failure.
    pub history: Vec<ConversationTurn>,
    pub error: Option<String>,
}

impl TurnOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Answer the last turn of `history` against `collection`.
///
/// An empty history yields the greeting without touching the store,
/// the embedder, or the chat model.
pub async fn answer(
    ctx: AnswerContext<'_>,
    repo: &RepoRef,
    collection: &CollectionHandle,
    history: &[ConversationTurn],
    options: &AnswerOptions,
) -> TurnOutcome {
    let Some((current, prior)) = history.split_last() else {
        let greeting = prompt::greeting(repo);
        return TurnOutcome {
            answer: greeting.clone(),
            history: vec![ConversationTurn::assistant(greeting)],
            error: None,
        };
    };

    match compose(ctx, repo, collection, &current.content, prior, options).await {
        Ok(reply) => {
            let mut updated = history.to_vec();
            updated.push(ConversationTurn::assistant(reply.clone()));
            TurnOutcome {
                answer: reply,
                history: updated,
                error: None,
            }
        }
        Err(e) => {
            tracing::warn!(repo = %repo, error = %e, "chat turn failed");
            TurnOutcome {
                answer: APOLOGY.to_string(),
                history: history.to_vec(),
                error: Some(format!("Error in chat: {}", e)),
            }
        }
    }
}

async fn compose(
    ctx: AnswerContext<'_>,
    repo: &RepoRef,
    collection: &CollectionHandle,
    query: &str,
    prior: &[ConversationTurn],
    options: &AnswerOptions,
) -> Result<String> {
    let query_vec = ctx.embedder.embed(query).await?;
    let hits = query_similar(ctx.store, collection, &query_vec, options.top_k).await?;
    tracing::debug!(collection = %collection.name, hits = hits.len(), "retrieved context");

    let window_start = prior.len().saturating_sub(options.history_turns);
    let context = prompt::build_context(&hits);
    let history = prompt::format_history(&prior[window_start..]);

    let request = ChatRequest {
        messages: vec![
            ChatMessage {
                role: Role::System,
                content: prompt::system_prompt(repo),
            },
            ChatMessage {
                role: Role::User,
                content: prompt::user_prompt(&context, &history, query),
            },
        ],
        temperature: options.temperature,
        max_tokens: options.max_tokens,
    };

    ctx.chat.complete(&request).await
}
