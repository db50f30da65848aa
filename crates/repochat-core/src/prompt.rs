//! Prompt templates for the retrieval-answer path.

use crate::models::{ConversationTurn, QueryHit, Role};
use crate::repo::RepoRef;

/// Greeting returned for an empty history. No model is called.
pub fn greeting(repo: &RepoRef) -> String {
    format!(
        "Hello! I'm ready to help you with questions about the {} repository. What would you like to know?",
        repo
    )
}

/// Join retrieved documents, best hit first, separated by a blank line.
pub fn build_context(hits: &[QueryHit]) -> String {
    hits.iter()
        .map(|h| h.document.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render prior turns as `Previous Question:` / `Previous Answer:` lines.
///
/// `prior` must already exclude the current query. System turns are dropped.
pub fn format_history(prior: &[ConversationTurn]) -> String {
    let mut out = String::new();
    for turn in prior {
        match turn.role {
            Role::User => {
                out.push_str("Previous Question: ");
                out.push_str(&turn.content);
                out.push('\n');
            }
            Role::Assistant => {
                out.push_str("Previous Answer: ");
                out.push_str(&turn.content);
                out.push('\n');
            }
            Role::System => {}
        }
    }
    out
}

pub fn system_prompt(repo: &RepoRef) -> String {
    format!(
        "You are a helpful codebase assistant for the GitHub repository {repo}. \n        \n\
Your task is to answer questions about the codebase using the provided context from the repository's code.\n\
\n\
Guidelines:\n\
- Provide clear, concise answers based on the code context\n\
- Include relevant code snippets when helpful\n\
- If the context doesn't contain enough information to answer the question, say so\n\
- Reference specific files or functions when relevant\n\
- Be conversational and helpful\n\
- Consider the conversation history when providing context-aware responses"
    )
}

pub fn user_prompt(context: &str, history: &str, query: &str) -> String {
    format!(
        "Context from codebase:\n{context}\n\n{history}\n\nCurrent Question: {query}\n\n\
Please provide a helpful answer based on the codebase context."
    )
}
