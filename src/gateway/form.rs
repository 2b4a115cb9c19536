/// Which record form is on screen.
///
/// ```text
/// Closed ──open_new──> Creating ──saved──> Closed
///   │                     └──cancelled──> Closed
///   └──open_edit(id)──> Editing(id) ──saved──> Closed
///                          └──deleted(id)──> Closed
/// ```
///
/// A failed save leaves the form where it was so the user can resubmit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FormState {
    #[default]
    Closed,
    Creating,
    Editing(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
    OpenNew,
    OpenEdit(String),
    Saved,
    Failed,
    Cancelled,
    /// A record was deleted; an edit of that record is abandoned
    Deleted(String),
}

impl FormState {
    pub fn apply(self, event: FormEvent) -> FormState {
        match (self, event) {
            (_, FormEvent::OpenNew) => FormState::Creating,
            (_, FormEvent::OpenEdit(id)) => FormState::Editing(id),
            (_, FormEvent::Saved) | (_, FormEvent::Cancelled) => FormState::Closed,
            (state, FormEvent::Failed) => state,
            (FormState::Editing(current), FormEvent::Deleted(id)) if current == id => FormState::Closed,
            (state, FormEvent::Deleted(_)) => state,
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, FormState::Closed)
    }

    /// Record being edited, if any
    pub fn edit_target(&self) -> Option<&str> {
        match self {
            FormState::Editing(id) => Some(id),
            _ => None,
        }
    }
}
