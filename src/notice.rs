//! User-visible notices (toasts, inline validation messages, banners).
//!
//! Every failure caught at a component boundary is published here instead of
//! being thrown past it. Consumers subscribe to the broadcast channel.

use crate::core::SyncError;
use tokio::sync::broadcast;
use tracing::trace;

/// Where a notice is meant to be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Transient message (write failures, confirmations)
    Toast,
    /// Next to the offending form field
    Inline,
    /// Persistent until the condition clears (subscription failures)
    Banner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub severity: Severity,
    pub message: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
        }
    }

    /// Maps an error onto the surface it is reported on.
    pub fn from_error(err: &SyncError) -> Self {
        let kind = match err {
            SyncError::Validation(_) => NoticeKind::Inline,
            SyncError::Subscription { .. } => NoticeKind::Banner,
            _ => NoticeKind::Toast,
        };
        let severity = match err {
            SyncError::Validation(_) | SyncError::Unauthenticated(_) => Severity::Warning,
            _ => Severity::Error,
        };
        Self::new(kind, severity, err.to_string())
    }
}

/// Cloneable publisher for notices.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn publish(&self, notice: Notice) {
        if self.tx.send(notice).is_err() {
            trace!("no subscribers for notice");
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.publish(Notice::new(NoticeKind::Toast, Severity::Info, message));
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.publish(Notice::new(NoticeKind::Toast, Severity::Warning, message));
    }

    pub fn report(&self, err: &SyncError) {
        self.publish(Notice::from_error(err));
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_their_surface() {
        let inline = Notice::from_error(&SyncError::validation("title is required"));
        assert_eq!(inline.kind, NoticeKind::Inline);
        assert_eq!(inline.severity, Severity::Warning);

        let banner = Notice::from_error(&SyncError::Subscription {
            collection: "tasks".into(),
            message: "permission denied".into(),
        });
        assert_eq!(banner.kind, NoticeKind::Banner);

        let toast = Notice::from_error(&SyncError::store("quota exceeded"));
        assert_eq!(toast.kind, NoticeKind::Toast);
        assert_eq!(toast.severity, Severity::Error);
    }

    #[test]
    fn publish_reaches_subscribers() {
        let notifier = Notifier::new(8);
        let mut rx = notifier.subscribe();

        notifier.warn("sign in to save tasks");

        let notice = rx.try_recv().unwrap();
        assert_eq!(notice.severity, Severity::Warning);
        assert_eq!(notice.message, "sign in to save tasks");
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let notifier = Notifier::new(8);
        notifier.info("nobody listening");
    }
}
