use super::{Entity, required};
use crate::core::{Fields, Result, server_timestamp};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due < today)
    }
}

impl Entity for Task {
    const COLLECTION: &'static str = "tasks";

    fn validate(&self) -> Result<()> {
        required("Task title", &self.title)
    }
}

/// What the task form submits.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, due_date: Option<NaiveDate>) -> Self {
        Self {
            title: title.into(),
            due_date,
        }
    }

    pub fn validate(&self) -> Result<()> {
        required("Task title", &self.title)
    }

    /// How an unsaved draft is listed next to stored tasks.
    pub fn to_task(&self) -> Task {
        Task {
            title: self.title.trim().to_string(),
            due_date: self.due_date,
            completed: false,
            created_at: None,
        }
    }

    /// Creation payload: trimmed title, `completed=false`, server timestamp.
    pub fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("title".into(), json!(self.title.trim()));
        if let Some(due) = self.due_date {
            fields.insert("dueDate".into(), json!(due));
        }
        fields.insert("completed".into(), Value::Bool(false));
        fields.insert("createdAt".into(), server_timestamp());
        fields
    }
}

/// Partial task update. `None` leaves the stored field untouched;
/// `due_date: Some(None)` clears the due date.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub due_date: Option<Option<NaiveDate>>,
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn completed(done: bool) -> Self {
        Self {
            completed: Some(done),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.due_date.is_none() && self.completed.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        match &self.title {
            Some(title) => required("Task title", title),
            None => Ok(()),
        }
    }

    pub fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        if let Some(title) = self.title {
            fields.insert("title".into(), json!(title.trim()));
        }
        if let Some(due) = self.due_date {
            fields.insert("dueDate".into(), json!(due));
        }
        if let Some(done) = self.completed {
            fields.insert("completed".into(), Value::Bool(done));
        }
        fields
    }
}
