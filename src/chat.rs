// ============================================================================
// Resume Chat
// ============================================================================
//
// Answers visitor questions from a resume text through a generative
// completion API. The conversation is kept by the caller and passed back in
// on every question; only the most recent turns are forwarded.
//
// ============================================================================

use crate::core::{Result, SyncError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Longest question accepted from a visitor
pub const MAX_QUESTION_CHARS: usize = 2000;

/// Turns of history forwarded with each question
pub const DEFAULT_HISTORY_TURNS: usize = 10;

const SYSTEM_PROMPT: &str = "You answer questions about the person described in the resume below. \
Only use facts from the resume. If the resume does not answer the question, say so briefly.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

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

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Sends `messages` and returns the generated text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    text: String,
}

/// Completion API over HTTP: `{model, messages}` in, `{text}` out.
pub struct HttpCompletionClient {
    endpoint: String,
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

impl HttpCompletionClient {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key,
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let mut request = self.client.post(&self.endpoint).json(&CompletionRequest {
            model: &self.model,
            messages,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::upstream(format!(
                "completion API returned {}: {}",
                status, body
            )));
        }

        let body: CompletionResponse = response.json().await?;
        Ok(body.text)
    }
}

/// Replays canned replies in order and records every request.
#[derive(Debug, Clone, Default)]
pub struct ScriptedCompletion {
    replies: Arc<Mutex<VecDeque<Result<String>>>>,
    requests: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()));
        self
    }

    pub fn fail(self, message: impl Into<String>) -> Self {
        self.push(Err(SyncError::upstream(message)));
        self
    }

    fn push(&self, item: Result<String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(item);
        }
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.requests.lock()?.push(messages.to_vec());
        self.replies
            .lock()?
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::upstream("no scripted reply left")))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub reply: String,
    /// `history` plus this question and its reply
    pub history: Vec<ChatMessage>,
}

pub struct ResumeChat {
    client: Arc<dyn CompletionClient>,
    resume: String,
    history_turns: usize,
}

impl ResumeChat {
    pub fn new(client: Arc<dyn CompletionClient>, resume: impl Into<String>) -> Self {
        Self {
            client,
            resume: resume.into(),
            history_turns: DEFAULT_HISTORY_TURNS,
        }
    }

    pub fn history_turns(mut self, turns: usize) -> Self {
        self.history_turns = turns;
        self
    }

    /// Builds the message list sent for `question`.
    pub fn prompt(&self, history: &[ChatMessage], question: &str) -> Vec<ChatMessage> {
        let recent = history
            .iter()
            .filter(|m| m.role != Role::System)
            .cloned()
            .collect::<Vec<_>>();
        let skip = recent.len().saturating_sub(self.history_turns);

        let mut messages = Vec::with_capacity(self.history_turns + 2);
        messages.push(ChatMessage::system(format!(
            "{}\n\nRESUME:\n{}",
            SYSTEM_PROMPT, self.resume
        )));
        messages.extend(recent.into_iter().skip(skip));
        messages.push(ChatMessage::user(question));
        messages
    }

    pub async fn ask(&self, history: &[ChatMessage], question: &str) -> Result<ChatTurn> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SyncError::validation("question is required"));
        }
        if question.chars().count() > MAX_QUESTION_CHARS {
            return Err(SyncError::validation(format!(
                "question is longer than {} characters",
                MAX_QUESTION_CHARS
            )));
        }

        let messages = self.prompt(history, question);
        debug!(messages = messages.len(), "asking completion API");
        let reply = self.client.complete(&messages).await?;
        info!(question_chars = question.len(), reply_chars = reply.len(), "chat answered");

        let mut updated = history.to_vec();
        updated.push(ChatMessage::user(question));
        updated.push(ChatMessage::assistant(reply.clone()));
        Ok(ChatTurn {
            reply,
            history: updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_question_is_rejected_without_a_call() {
        let client = ScriptedCompletion::new().reply("unused");
        let chat = ResumeChat::new(Arc::new(client.clone()), "Rust engineer");

        let err = chat.ask(&[], "   ").await.unwrap_err();
        assert!(err.is_validation());
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn prompt_carries_resume_and_recent_history() {
        let client = ScriptedCompletion::new().reply("Five years.");
        let chat = ResumeChat::new(Arc::new(client.clone()), "Rust engineer since 2019").history_turns(2);

        let history = vec![
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
            ChatMessage::user("where?"),
            ChatMessage::assistant("Berlin"),
        ];
        let turn = chat.ask(&history, "How long with Rust?").await.unwrap();
        assert_eq!(turn.reply, "Five years.");
        assert_eq!(turn.history.len(), 6);

        let sent = &client.requests()[0];
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[0].role, Role::System);
        assert!(sent[0].content.contains("Rust engineer since 2019"));
        assert_eq!(sent[1].content, "where?");
        assert_eq!(sent[3], ChatMessage::user("How long with Rust?"));
    }

    #[tokio::test]
    async fn upstream_failure_is_returned() {
        let chat = ResumeChat::new(Arc::new(ScriptedCompletion::new().fail("503")), "cv");
        let err = chat.ask(&[], "anything?").await.unwrap_err();
        assert!(matches!(err, SyncError::Upstream(_)));
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_value(ChatMessage::assistant("x")).unwrap();
        assert_eq!(json["role"], "assistant");
    }
}
