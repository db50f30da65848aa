//! Validate → process → chat dispatcher.
//!
//! A run walks a small state machine:
//!
//! ```text
//!   Validating ──(ProcessRepo)──▶ Processing ──▶ Chatting ──▶ Done
//!        │      ──(ChatOnly)─────────────────────▲     │
//!        ▼                  ▼                           ▼
//!      Failed             Failed                      Failed
//! ```
//!
//! Each step returns a [`StepOutcome`]; the dispatcher only inspects its
//! `error` field to choose the next phase. Errors never propagate out of
//! [`Workflow::run`]; they end the run in [`Phase::Failed`] with a
//! user-facing message.

use std::sync::Arc;

use serde::Serialize;

use crate::answer::{answer, AnswerContext, AnswerOptions, ChatModel, TurnOutcome};
use crate::chunk::TokenCounter;
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::ingest::{ingest_repository, IngestContext, IngestOptions, IngestReport};
use crate::models::ConversationTurn;
use crate::repo::RepoRef;
use crate::session::Session;
use crate::source::RepoSource;
use crate::store::{CollectionHandle, VectorStore};

/// Shared handles to every external collaborator.
#[derive(Clone)]
pub struct Services {
    pub source: Arc<dyn RepoSource>,
    pub counter: Arc<dyn TokenCounter>,
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
    pub chat: Arc<dyn ChatModel>,
}

impl Services {
    pub fn ingest_context(&self) -> IngestContext<'_> {
        IngestContext {
            source: self.source.as_ref(),
            counter: self.counter.as_ref(),
            embedder: self.embedder.as_ref(),
            store: self.store.as_ref(),
        }
    }

    pub fn answer_context(&self) -> AnswerContext<'_> {
        AnswerContext {
            embedder: self.embedder.as_ref(),
            store: self.store.as_ref(),
            chat: self.chat.as_ref(),
        }
    }
}

/// Whether a run ingests before chatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    ProcessRepo,
    ChatOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Validating,
    Processing,
    Chatting,
    Failed,
    Done,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Failed | Phase::Done)
    }
}

/// Structured result of one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome<T> {
    pub value: Option<T>,
    pub error: Option<String>,
}

impl<T> StepOutcome<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value: Some(value),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            value: None,
            error: Some(message.into()),
        }
    }
}

/// Input to [`Workflow::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub repo_url: String,
    pub mode: Mode,
    pub history: Vec<ConversationTurn>,
}

/// Final state of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub phase: Phase,
    /// Phases visited, in order, ending with the terminal phase.
    pub trace: Vec<Phase>,
    pub repo: Option<RepoRef>,
    pub collection: Option<String>,
    pub processed: bool,
    pub ingest: Option<IngestReport>,
    pub answer: Option<String>,
    pub history: Vec<ConversationTurn>,
    pub error: Option<String>,
}

impl RunResult {
    pub fn succeeded(&self) -> bool {
        self.phase == Phase::Done
    }
}

/// Runs requests against one set of services.
pub struct Workflow {
    services: Services,
    ingest: IngestOptions,
    answer: AnswerOptions,
}

impl Workflow {
    pub fn new(services: Services, ingest: IngestOptions, answer: AnswerOptions) -> Self {
        Self {
            services,
            ingest,
            answer,
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn ingest_options(&self) -> &IngestOptions {
        &self.ingest
    }

    /// Drive one request to a terminal phase.
    pub async fn run(&self, request: RunRequest) -> RunResult {
        let mut result = RunResult {
            phase: Phase::Validating,
            trace: Vec::new(),
            repo: None,
            collection: None,
            processed: false,
            ingest: None,
            answer: None,
            history: request.history.clone(),
            error: None,
        };

        let mut phase = Phase::Validating;
        loop {
            result.trace.push(phase);
            if phase.is_terminal() {
                break;
            }
            tracing::debug!(?phase, "workflow step");

            phase = match phase {
                Phase::Validating => {
                    let step = validate(&request.repo_url);
                    match (step.value, step.error) {
                        (Some(repo), None) => {
                            result.collection = Some(repo.collection_name());
                            result.repo = Some(repo);
                            match request.mode {
                                Mode::ProcessRepo => Phase::Processing,
                                Mode::ChatOnly => Phase::Chatting,
                            }
                        }
                        (_, error) => {
                            result.error = error;
                            Phase::Failed
                        }
                    }
                }
                Phase::Processing => {
                    let step = self.process(result.repo.as_ref()).await;
                    match (step.value, step.error) {
                        (Some(report), None) => {
                            result.processed = true;
                            result.ingest = Some(report);
                            Phase::Chatting
                        }
                        (_, error) => {
                            result.error = error;
                            Phase::Failed
                        }
                    }
                }
                Phase::Chatting => {
                    let step = self
                        .chat(result.repo.as_ref(), result.collection.as_deref(), &request.history)
                        .await;
                    if let Some(turn) = step.value {
                        result.answer = Some(turn.answer);
                        result.history = turn.history;
                    }
                    match step.error {
                        None => Phase::Done,
                        Some(error) => {
                            result.error = Some(error);
                            Phase::Failed
                        }
                    }
                }
                Phase::Failed | Phase::Done => phase,
            };
        }

        result.phase = phase;
        if let Some(error) = &result.error {
            tracing::warn!(url = %request.repo_url, %error, "workflow failed");
        }
        result
    }

    async fn process(&self, repo: Option<&RepoRef>) -> StepOutcome<IngestReport> {
        let Some(repo) = repo else {
            return StepOutcome::failed("Invalid GitHub URL");
        };
        match ingest_repository(self.services.ingest_context(), repo, &self.ingest).await {
            Ok(report) => StepOutcome::ok(report),
            Err(RagError::EmptyContent(message)) => StepOutcome::failed(message),
            Err(e) => StepOutcome::failed(format!("Error processing repository: {}", e)),
        }
    }

    async fn chat(
        &self,
        repo: Option<&RepoRef>,
        collection: Option<&str>,
        history: &[ConversationTurn],
    ) -> StepOutcome<TurnOutcome> {
        let (Some(repo), Some(collection)) = (repo, collection) else {
            return StepOutcome::failed("Invalid GitHub URL");
        };
        let collection = CollectionHandle::new(collection);
        let turn = answer(
            self.services.answer_context(),
            repo,
            &collection,
            history,
            &self.answer,
        )
        .await;
        let error = turn.error.clone();
        StepOutcome {
            value: Some(turn),
            error,
        }
    }

    /// Ingest `url` into `session`. On success the session is attached
    /// to the repository, marked processed, and its history cleared.
    pub async fn process_session(&self, session: &mut Session, url: &str) -> RunResult {
        let result = self
            .run(RunRequest {
                repo_url: url.to_string(),
                mode: Mode::ProcessRepo,
                history: Vec::new(),
            })
            .await;

        match (&result.error, &result.repo) {
            (None, Some(repo)) => {
                session.attach(repo.clone());
                session.processed = true;
            }
            (error, _) => {
                session.processed = false;
                session.last_error = error.clone();
            }
        }
        result
    }

    /// Ask `question` in `session`. The user turn and the answer are
    /// committed to the session only when the turn succeeds.
    pub async fn ask_session(&self, session: &mut Session, question: &str) -> Result<RunResult> {
        let (repo, _) = session.target()?;
        let mut history = session.history.clone();
        history.push(ConversationTurn::user(question));

        let result = self
            .run(RunRequest {
                repo_url: repo.url(),
                mode: Mode::ChatOnly,
                history,
            })
            .await;

        if result.succeeded() {
            session.history = result.history.clone();
            session.last_error = None;
        } else {
            session.last_error = result.error.clone();
        }
        Ok(result)
    }
}

/// Parse and validate a repository URL.
pub fn validate(url: &str) -> StepOutcome<RepoRef> {
    match RepoRef::parse(url) {
        Ok(repo) => StepOutcome::ok(repo),
        Err(e) => StepOutcome::failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::testing::ScriptedChat;
    use crate::answer::APOLOGY;
    use crate::embedding::testing::HashEmbedder;
    use crate::source::testing::FakeSource;
    use crate::store::memory::InMemoryStore;

    struct WordCounter;

    impl TokenCounter for WordCounter {
        fn count(&self, text: &str) -> usize {
            text.split_whitespace().count() + 1
        }
    }

    struct Harness {
        source: Arc<FakeSource>,
        embedder: Arc<HashEmbedder>,
        store: Arc<InMemoryStore>,
        chat: Arc<ScriptedChat>,
        workflow: Workflow,
    }

    fn harness(source: FakeSource, chat: ScriptedChat) -> Harness {
        let source = Arc::new(source);
        let embedder = Arc::new(HashEmbedder::new(8));
        let store = Arc::new(InMemoryStore::new());
        let chat = Arc::new(chat);
        let services = Services {
            source: source.clone(),
            counter: Arc::new(WordCounter),
            embedder: embedder.clone(),
            store: store.clone(),
            chat: chat.clone(),
        };
        Harness {
            source,
            embedder,
            store,
            chat,
            workflow: Workflow::new(services, IngestOptions::default(), AnswerOptions::default()),
        }
    }

    fn demo_source() -> FakeSource {
        FakeSource::with_files(&[
            ("README.md", "# Demo\nExplains the demo."),
            ("src/lib.rs", "pub fn add(a: i32, b: i32) -> i32 {\n    a + b\n}"),
        ])
    }

    #[test]
    fn test_validate_step() {
        let ok = validate("https://github.com/octo/demo");
        assert_eq!(ok.value, Some(RepoRef::new("octo", "demo")));
        assert!(ok.error.is_none());
        let bad = validate("ftp://nope");
        assert_eq!(bad.error.as_deref(), Some("Invalid GitHub URL"));
    }

    #[tokio::test]
    async fn test_invalid_url_fails_without_side_effects() {
        let h = harness(demo_source(), ScriptedChat::replying("x"));
        let result = h
            .workflow
            .run(RunRequest {
                repo_url: "https://example.com/x/y".to_string(),
                mode: Mode::ProcessRepo,
                history: Vec::new(),
            })
            .await;
        assert_eq!(result.trace, vec![Phase::Validating, Phase::Failed]);
        assert_eq!(result.error.as_deref(), Some("Invalid GitHub URL"));
        assert_eq!(h.source.listing_count(), 0);
    }

    #[tokio::test]
    async fn test_process_then_greet() {
        let h = harness(demo_source(), ScriptedChat::replying("x"));
        let result = h
            .workflow
            .run(RunRequest {
                repo_url: "https://github.com/octo/demo".to_string(),
                mode: Mode::ProcessRepo,
                history: Vec::new(),
            })
            .await;

        assert!(result.succeeded());
        assert_eq!(
            result.trace,
            vec![Phase::Validating, Phase::Processing, Phase::Chatting, Phase::Done]
        );
        assert!(result.processed);
        assert_eq!(result.collection.as_deref(), Some("octo_demo"));
        assert_eq!(result.ingest.as_ref().map(|r| r.chunks), Some(2));
        assert!(result.answer.unwrap().contains("octo/demo"));
        // One embedding call for the ingest batch; the greeting makes none.
        assert_eq!(h.embedder.call_count(), 1);
        assert_eq!(h.chat.request_count(), 0);
    }

    #[tokio::test]
    async fn test_chat_only_skips_processing() {
        let h = harness(demo_source(), ScriptedChat::replying("It adds."));
        let result = h
            .workflow
            .run(RunRequest {
                repo_url: "https://github.com/octo/demo".to_string(),
                mode: Mode::ChatOnly,
                history: vec![ConversationTurn::user("what does add do?")],
            })
            .await;
        assert_eq!(
            result.trace,
            vec![Phase::Validating, Phase::Chatting, Phase::Done]
        );
        assert_eq!(result.answer.as_deref(), Some("It adds."));
        assert_eq!(result.history.len(), 2);
        assert_eq!(h.source.listing_count(), 0);
        assert!(!result.processed);
    }

    #[tokio::test]
    async fn test_processing_failure_messages() {
        let h = harness(FakeSource::default(), ScriptedChat::replying("x"));
        let result = h
            .workflow
            .run(RunRequest {
                repo_url: "https://github.com/octo/empty".to_string(),
                mode: Mode::ProcessRepo,
                history: Vec::new(),
            })
            .await;
        assert_eq!(result.phase, Phase::Failed);
        assert_eq!(result.error.as_deref(), Some("No code files found in the repository"));

        let mut source = FakeSource::default();
        source.fail_listing = true;
        let h = harness(source, ScriptedChat::replying("x"));
        let result = h
            .workflow
            .run(RunRequest {
                repo_url: "https://github.com/octo/missing".to_string(),
                mode: Mode::ProcessRepo,
                history: Vec::new(),
            })
            .await;
        assert_eq!(
            result.trace,
            vec![Phase::Validating, Phase::Processing, Phase::Failed]
        );
        let error = result.error.unwrap();
        assert!(error.starts_with("Error processing repository: fetch failed"));
        assert!(h.store.list_collections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chat_failure_ends_failed_with_apology() {
        let h = harness(demo_source(), ScriptedChat::failing());
        let history = vec![ConversationTurn::user("q")];
        let result = h
            .workflow
            .run(RunRequest {
                repo_url: "https://github.com/octo/demo".to_string(),
                mode: Mode::ChatOnly,
                history: history.clone(),
            })
            .await;
        assert_eq!(result.phase, Phase::Failed);
        assert_eq!(result.answer.as_deref(), Some(APOLOGY));
        assert_eq!(result.history, history);
        assert!(result.error.unwrap().starts_with("Error in chat:"));
    }

    #[tokio::test]
    async fn test_session_process_and_ask() {
        let h = harness(demo_source(), ScriptedChat::replying("It adds two numbers."));
        let mut session = Session::new();

        let processed = h
            .workflow
            .process_session(&mut session, "https://github.com/octo/demo")
            .await;
        assert!(processed.succeeded());
        assert!(session.processed);
        assert!(session.history.is_empty());
        assert_eq!(session.collection.as_deref(), Some("octo_demo"));

        let turn = h.workflow.ask_session(&mut session, "what is add?").await.unwrap();
        assert!(turn.succeeded());
        assert_eq!(
            session.history,
            vec![
                ConversationTurn::user("what is add?"),
                ConversationTurn::assistant("It adds two numbers."),
            ]
        );

        h.workflow.ask_session(&mut session, "and then?").await.unwrap();
        assert_eq!(session.history.len(), 4);
        assert!(h.chat.last_user_prompt().contains("Previous Question: what is add?\n"));
    }

    #[tokio::test]
    async fn test_failed_ask_does_not_commit_turn() {
        let h = harness(demo_source(), ScriptedChat::failing());
        let mut session = Session::new();
        session.attach(RepoRef::new("octo", "demo"));
        let result = h.workflow.ask_session(&mut session, "hello?").await.unwrap();
        assert!(!result.succeeded());
        assert!(session.history.is_empty());
        assert!(session.last_error.is_some());
    }

    #[tokio::test]
    async fn test_ask_without_repository_is_rejected() {
        let h = harness(demo_source(), ScriptedChat::replying("x"));
        let mut session = Session::new();
        let err = h.workflow.ask_session(&mut session, "hi").await.unwrap_err();
        assert_eq!(err.code(), "validation");
    }

    #[tokio::test]
    async fn test_failed_process_keeps_session_unprocessed() {
        let h = harness(FakeSource::default(), ScriptedChat::replying("x"));
        let mut session = Session::new();
        let result = h
            .workflow
            .process_session(&mut session, "https://github.com/octo/empty")
            .await;
        assert!(!result.succeeded());
        assert!(!session.processed);
        assert!(session.repo.is_none());
        assert_eq!(
            session.last_error.as_deref(),
            Some("No code files found in the repository")
        );
    }
}
