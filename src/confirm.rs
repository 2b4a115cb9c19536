//! Confirmation round-trips (the "are you sure?" modal).

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// Destructive delete of one stored record
    Delete { collection: String, id: String },
    /// Commit tasks buffered while signed out
    CommitPending { count: usize },
}

impl Prompt {
    pub fn message(&self) -> String {
        match self {
            Prompt::Delete { collection, id } => {
                format!("Delete '{}' from {}? This cannot be undone.", id, collection)
            }
            Prompt::CommitPending { count } => format!(
                "You have {} unsaved task(s) from before signing in. Save them now?",
                count
            ),
        }
    }
}

#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, prompt: &Prompt) -> bool;
}

/// Answers every prompt with a fixed choice and remembers what was asked.
#[derive(Debug, Clone)]
pub struct AutoConfirm {
    answer: bool,
    asked: Arc<Mutex<Vec<Prompt>>>,
}

impl AutoConfirm {
    pub fn accept() -> Self {
        Self::with_answer(true)
    }

    pub fn decline() -> Self {
        Self::with_answer(false)
    }

    fn with_answer(answer: bool) -> Self {
        Self {
            answer,
            asked: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.asked.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Confirm for AutoConfirm {
    async fn confirm(&self, prompt: &Prompt) -> bool {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(prompt.clone());
        }
        self.answer
    }
}

/// A pending modal: the prompt plus the channel its answer goes back on.
pub type ConfirmRequest = (Prompt, oneshot::Sender<bool>);

/// Forwards prompts to a UI task and awaits its answer.
///
/// A dropped UI side (closed channel or dropped responder) counts as "no".
#[derive(Debug, Clone)]
pub struct ChannelConfirm {
    tx: mpsc::Sender<ConfirmRequest>,
}

impl ChannelConfirm {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<ConfirmRequest>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Confirm for ChannelConfirm {
    async fn confirm(&self, prompt: &Prompt) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send((prompt.clone(), reply_tx)).await.is_err() {
            warn!("confirmation surface closed; treating as declined");
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn auto_confirm_records_prompts() {
        let confirm = AutoConfirm::decline();
        let prompt = Prompt::CommitPending { count: 2 };

        assert!(!confirm.confirm(&prompt).await);
        assert_eq!(confirm.prompts(), vec![prompt]);
    }

    #[tokio::test]
    async fn channel_confirm_round_trip() {
        let (confirm, mut rx) = ChannelConfirm::new(1);

        let ui = tokio::spawn(async move {
            let (prompt, reply) = rx.recv().await.unwrap();
            assert!(prompt.message().contains("cars"));
            reply.send(true).unwrap();
        });

        let prompt = Prompt::Delete {
            collection: "cars".into(),
            id: "c1".into(),
        };
        assert!(confirm.confirm(&prompt).await);
        ui.await.unwrap();
    }

    #[tokio::test]
    async fn closed_surface_declines() {
        let (confirm, rx) = ChannelConfirm::new(1);
        drop(rx);
        assert!(!confirm.confirm(&Prompt::CommitPending { count: 1 }).await);
    }
}
