// ============================================================================
// Pending-Item Reconciler
// ============================================================================
//
// Holds task drafts submitted before an identity existed. Once an identity
// is available the user is asked once whether to keep them:
//
//   Empty ──buffer──> Buffered(n) ──confirm──> replay via TaskGateway::add ──> Empty
//                          └────────discard──> Empty
//
// Drafts never reach the store from here; replay goes through the normal
// gateway path and its validation.
//
// ============================================================================

use crate::confirm::{Confirm, Prompt};
use crate::core::{Result, SyncError};
use crate::domain::{Record, Task, TaskDraft};
use crate::gateway::{AddOutcome, TaskGateway};
use crate::notice::Notifier;
use std::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    Empty,
    Buffered(usize),
}

impl ReconcileState {
    pub fn is_empty(&self) -> bool {
        matches!(self, ReconcileState::Empty)
    }
}

/// What one reconciliation pass did.
#[derive(Debug, Default, PartialEq)]
pub struct ReplayReport {
    /// Store ids of the drafts that were written
    pub committed: Vec<String>,
    /// Drafts the gateway refused, with the reason
    pub rejected: Vec<(TaskDraft, SyncError)>,
    /// Drafts buffered again because the identity went away mid-replay
    pub deferred: usize,
    /// Drafts dropped because the user declined
    pub discarded: usize,
}

impl ReplayReport {
    pub fn committed_count(&self) -> usize {
        self.committed.len()
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }
}

pub struct PendingReconciler {
    items: Mutex<Vec<Record<TaskDraft>>>,
    notifier: Notifier,
}

impl PendingReconciler {
    pub fn new(notifier: Notifier) -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            notifier,
        }
    }

    pub fn state(&self) -> ReconcileState {
        match self.len() {
            0 => ReconcileState::Empty,
            n => ReconcileState::Buffered(n),
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Holds `draft` under a fresh temporary id.
    pub fn buffer(&self, draft: TaskDraft) -> Result<Uuid> {
        let temp_id = Uuid::new_v4();
        let mut items = self.items.lock()?;
        items.push(Record::Pending {
            temp_id,
            value: draft,
        });
        info!(%temp_id, buffered = items.len(), "task buffered until sign-in");
        Ok(temp_id)
    }

    /// Buffered drafts shown as unsaved tasks, oldest first.
    pub fn pending(&self) -> Vec<Record<Task>> {
        let items = match self.items.lock() {
            Ok(items) => items,
            Err(_) => return Vec::new(),
        };
        items
            .iter()
            .filter_map(|record| match record {
                Record::Pending { temp_id, value } => Some(Record::Pending {
                    temp_id: *temp_id,
                    value: value.to_task(),
                }),
                Record::Persisted { .. } => None,
            })
            .collect()
    }

    /// Drops every buffered draft and returns how many there were.
    pub fn discard(&self) -> Result<usize> {
        let dropped = std::mem::take(&mut *self.items.lock()?).len();
        if dropped > 0 {
            info!(dropped, "discarded buffered tasks");
        }
        Ok(dropped)
    }

    fn take(&self) -> Result<Vec<TaskDraft>> {
        let drained = std::mem::take(&mut *self.items.lock()?);
        Ok(drained
            .into_iter()
            .map(|record| match record {
                Record::Pending { value, .. } | Record::Persisted { value, .. } => value,
            })
            .collect())
    }

    /// Offers to commit the buffer and replays or discards it.
    ///
    /// Does nothing while the buffer is empty or no identity is available.
    pub async fn reconcile(&self, gateway: &TaskGateway, confirm: &dyn Confirm) -> Result<ReplayReport> {
        let count = self.len();
        if count == 0 || gateway.identity().is_none() {
            return Ok(ReplayReport::default());
        }

        if !confirm.confirm(&Prompt::CommitPending { count }).await {
            let discarded = self.discard()?;
            return Ok(ReplayReport {
                discarded,
                ..ReplayReport::default()
            });
        }

        let mut report = ReplayReport::default();
        for draft in self.take()? {
            match gateway.add(draft.clone()).await {
                Ok(AddOutcome::Created(id)) => report.committed.push(id),
                Ok(AddOutcome::Buffered(_)) => report.deferred += 1,
                Err(err) => {
                    warn!(title = %draft.title, error = %err, "buffered task rejected on replay");
                    report.rejected.push((draft, err));
                }
            }
        }

        info!(
            committed = report.committed_count(),
            rejected = report.rejected_count(),
            deferred = report.deferred,
            "buffered tasks replayed"
        );
        if report.committed_count() > 0 {
            self.notifier
                .info(format!("Saved {} task(s) from before signing in", report.committed_count()));
        }
        Ok(report)
    }
}
