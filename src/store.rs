//! SQLite persistence for chat sessions.
//!
//! Each session is one row holding its whole message list as a JSON array.
//! A connection is opened for every operation and dropped when it returns.

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, params};
use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::observability::{STORE_READS, STORE_WRITES};
use crate::types::{Message, Session, SessionId};

/// How many sessions the resume picker offers.
pub const DEFAULT_LIST_LIMIT: usize = 10;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY,
    messages TEXT NOT NULL,
    updated_at INTEGER NOT NULL
)";

// The timestamp written is never below one past the newest existing row, so
// two writes in the same clock tick still order correctly.
const NEXT_UPDATED_AT: &str =
    "MAX(?1, (SELECT COALESCE(MAX(updated_at), 0) + 1 FROM sessions))";

/// Session storage backed by a single SQLite file.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Use the database at `path`.  Nothing is touched until the first
    /// operation.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::io(
                        format!("cannot create database directory {}", parent.display()),
                        e,
                    )
                })?;
            }
        }
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(CREATE_TABLE)?;
        Ok(conn)
    }

    /// Insert a new session and return it with its assigned id.
    pub fn create_session(&self, messages: Vec<Message>) -> Result<Session> {
        let blob = serde_json::to_string(&messages)?;
        let conn = self.connect()?;
        conn.execute(
            &format!("INSERT INTO sessions (messages, updated_at) VALUES (?2, {NEXT_UPDATED_AT})"),
            params![now_micros(), blob],
        )?;
        let id = conn.last_insert_rowid();
        STORE_WRITES.click();
        tracing::debug!(id, messages = messages.len(), "session created");
        Ok(Session::persisted(id, messages))
    }

    /// Overwrite the messages of an existing session.
    pub fn update_session(&self, id: i64, messages: &[Message]) -> Result<()> {
        let blob = serde_json::to_string(messages)?;
        let conn = self.connect()?;
        let changed = conn.execute(
            &format!("UPDATE sessions SET messages = ?2, updated_at = {NEXT_UPDATED_AT} WHERE id = ?3"),
            params![now_micros(), blob, id],
        )?;
        if changed == 0 {
            return Err(Error::not_found(
                "no session with that id",
                Some("session".to_string()),
                Some(id.to_string()),
            ));
        }
        STORE_WRITES.click();
        tracing::debug!(id, messages = messages.len(), "session updated");
        Ok(())
    }

    /// Persist `session`, creating a row the first time it is saved.
    pub fn save(&self, session: &mut Session) -> Result<()> {
        match session.id {
            SessionId::Unsaved => {
                *session = self.create_session(session.messages.clone())?;
            }
            SessionId::Persisted(id) => self.update_session(id, &session.messages)?,
        }
        Ok(())
    }

    /// The most recently modified sessions, newest first.
    pub fn list_recent_sessions(&self, limit: usize) -> Result<Vec<Session>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, messages FROM sessions ORDER BY updated_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        STORE_READS.click();

        if rows.is_empty() {
            return Err(Error::not_found(
                "no sessions found",
                Some("session".to_string()),
                None,
            ));
        }

        let mut sessions = Vec::with_capacity(rows.len());
        for (id, blob) in rows {
            let messages: Vec<Message> = serde_json::from_str(&blob).map_err(|e| {
                Error::storage(
                    format!("session {id} has corrupt messages: {e}"),
                    Some(Box::new(e)),
                )
            })?;
            sessions.push(Session::persisted(id, messages));
        }
        tracing::debug!(count = sessions.len(), "sessions listed");
        Ok(sessions)
    }
}

fn now_micros() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000) as i64
}
