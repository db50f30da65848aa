//! `repochat ask` and `repochat chat`.
//!
//! `ask` runs one chat-only turn. `chat` keeps a [`Session`] in a
//! [`SessionStore`] and answers questions read line by line from stdin.
//! `/reset` clears the conversation and `/quit` ends it.

use std::io::Write;

use anyhow::{anyhow, bail, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use repochat_core::models::ConversationTurn;
use repochat_core::prompt::greeting;
use repochat_core::session::{Session, SessionStore};
use repochat_core::store::{CollectionHandle, VectorStore};
use repochat_core::workflow::{validate, Mode, RunRequest, Workflow};

use crate::config::Config;
use crate::services::build_workflow;

/// One-shot question against an already ingested repository.
pub async fn run_ask(config: &Config, url: &str, question: &str) -> Result<()> {
    let workflow = build_workflow(config).await?;
    let result = workflow
        .run(RunRequest {
            repo_url: url.to_string(),
            mode: Mode::ChatOnly,
            history: vec![ConversationTurn::user(question)],
        })
        .await;

    if let Some(answer) = &result.answer {
        println!("{}", answer);
    }
    match result.error {
        Some(error) => bail!(error),
        None => Ok(()),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Quit,
    Reset,
    Blank,
    Question(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Blank,
        "/quit" | "/exit" => Input::Quit,
        "/reset" => Input::Reset,
        question => Input::Question(question),
    }
}

fn prompt() -> Result<()> {
    print!("> ");
    std::io::stdout().flush()?;
    Ok(())
}

/// Interactive session. With `process`, the repository is ingested first.
pub async fn run_chat(config: &Config, url: &str, process: bool) -> Result<()> {
    let workflow = build_workflow(config).await?;
    let sessions = SessionStore::new();
    let id = sessions.create()?;

    let mut session = load(&sessions, id)?;
    open_session(&workflow, &mut session, url, process).await?;
    sessions.put(session)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;
    while let Some(line) = lines.next_line().await? {
        let input = parse_input(&line);
        if input == Input::Quit {
            break;
        }
        if let Some(reply) = handle_input(&workflow, &sessions, id, input).await? {
            println!("{}", reply);
            println!();
        }
        prompt()?;
    }

    if let Some(session) = sessions.remove(id)? {
        tracing::debug!(session = %session.id, turns = session.history.len(), "chat ended");
    }
    Ok(())
}

fn load(sessions: &SessionStore, id: Uuid) -> Result<Session> {
    sessions
        .get(id)?
        .ok_or_else(|| anyhow!("session {} vanished", id))
}

/// Apply one line of input to session `id`; returns what to print.
async fn handle_input(
    workflow: &Workflow,
    sessions: &SessionStore,
    id: Uuid,
    input: Input<'_>,
) -> Result<Option<String>> {
    match input {
        Input::Blank | Input::Quit => Ok(None),
        Input::Reset => {
            sessions.update(id, Session::clear_history)?;
            Ok(Some("(conversation cleared)".to_string()))
        }
        Input::Question(question) => {
            let mut session = load(sessions, id)?;
            let result = workflow.ask_session(&mut session, question).await?;
            sessions.put(session)?;
            Ok(result.answer)
        }
    }
}

async fn open_session(
    workflow: &Workflow,
    session: &mut Session,
    url: &str,
    process: bool,
) -> Result<()> {
    if process {
        let result = workflow.process_session(session, url).await;
        if let Some(error) = result.error {
            bail!(error);
        }
        if let Some(report) = &result.ingest {
            println!(
                "indexed {} files into {} ({} chunks)",
                report.files_indexed, report.collection, report.chunks
            );
        }
        if let Some(answer) = &result.answer {
            println!("{}", answer);
        }
        return Ok(());
    }

    let step = validate(url);
    let repo = match (step.value, step.error) {
        (Some(repo), None) => repo,
        (_, error) => bail!(error.unwrap_or_else(|| "Invalid GitHub URL".to_string())),
    };

    let store = &workflow.services().store;
    let records = store
        .count(&CollectionHandle::new(repo.collection_name()))
        .await?;
    if records == 0 {
        tracing::warn!(repo = %repo, "collection is empty; run `repochat ingest` or pass --process");
    }

    println!("{}", greeting(&repo));
    session.attach(repo);
    Ok(())
}
