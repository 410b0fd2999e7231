use std::fmt;

use crate::types::{Message, Role};

/// Persistence state of a session.
///
/// A session is `Unsaved` until its first successful write to the session
/// store; from then on it carries the positive row id the store assigned,
/// which never changes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum SessionId {
    /// Never written to the store.
    #[default]
    Unsaved,

    /// Written to the store under this id.
    Persisted(i64),
}

impl SessionId {
    /// Returns the stored id, if the session has been persisted.
    pub fn id(&self) -> Option<i64> {
        match self {
            SessionId::Unsaved => None,
            SessionId::Persisted(id) => Some(*id),
        }
    }

    /// Returns true if the session has never been written.
    pub fn is_unsaved(&self) -> bool {
        matches!(self, SessionId::Unsaved)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionId::Unsaved => write!(f, "unsaved"),
            SessionId::Persisted(id) => write!(f, "{id}"),
        }
    }
}

/// An ordered conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    /// Persistence state.
    pub id: SessionId,

    /// Messages in chronological order.
    pub messages: Vec<Message>,
}

impl Session {
    /// Creates an empty, unsaved session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an unsaved session seeded with a single system message.
    pub fn with_system(context: impl Into<String>) -> Self {
        Self {
            id: SessionId::Unsaved,
            messages: vec![Message::system(context)],
        }
    }

    /// Creates a session that was loaded from the store.
    pub fn persisted(id: i64, messages: Vec<Message>) -> Self {
        Self {
            id: SessionId::Persisted(id),
            messages,
        }
    }

    /// A one-line label for session pickers.
    ///
    /// Uses the first user message, falling back to the first message of any
    /// role so persona-seeded sessions still show what was asked.
    pub fn title(&self) -> &str {
        self.messages
            .iter()
            .find(|m| m.role == Role::User)
            .or_else(|| self.messages.first())
            .map(|m| m.content.trim())
            .unwrap_or("")
    }
}
