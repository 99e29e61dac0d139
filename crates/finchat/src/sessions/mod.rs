//! Session and conversation store

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::storage::{Database, SessionRecord};
use crate::types::chat::Message;

/// Owns sessions and their message history on top of the record store.
///
/// Sessions belong to exactly one user; cross-user access fails with an
/// authorization error. Message pairs are serialized per session by the
/// store's write transaction, which also keeps timestamps strictly
/// increasing.
pub struct SessionStore {
    db: Arc<Database>,
}

impl SessionStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a new session for a user, returning its id
    pub fn create(&self, user_id: &str) -> Result<String> {
        let session_id = Uuid::new_v4().to_string();
        self.db.insert_session(&session_id, user_id)?;
        tracing::info!(session_id, user_id, "created session");
        Ok(session_id)
    }

    /// Resolve a caller-supplied session id for a user.
    ///
    /// An unknown id creates a fresh session under that id; an existing
    /// session owned by another user is an authorization failure.
    pub fn ensure_owned(&self, session_id: &str, user_id: &str) -> Result<SessionRecord> {
        match self.db.get_session(session_id)? {
            Some(session) => {
                if session.user_id != user_id {
                    return Err(Error::Authorization(
                        "Session does not belong to the authenticated user".to_string(),
                    ));
                }
                Ok(session)
            }
            None => {
                self.db.insert_session(session_id, user_id)?;
                tracing::info!(session_id, user_id, "created session with supplied id");
                self.db.get_session(session_id)?.ok_or_else(|| {
                    Error::internal("Session vanished immediately after creation")
                })
            }
        }
    }

    /// Append one user/assistant exchange
    pub fn append_pair(&self, session_id: &str, user_text: &str, assistant_text: &str) -> Result<()> {
        self.db
            .append_message_pair(session_id, user_text, assistant_text)?;
        Ok(())
    }

    /// Most recent `limit` messages, oldest first
    pub fn history(&self, session_id: &str, limit: i64) -> Result<Vec<Message>> {
        self.db.history(session_id, limit)
    }

    pub fn touch(&self, session_id: &str) -> Result<()> {
        self.db.touch_session(session_id)
    }

    /// Evict sessions idle for longer than `retention_days`, deleting their
    /// messages with them
    pub fn evict_idle(&self, retention_days: i64) -> Result<usize> {
        let cutoff = Utc::now() - Duration::days(retention_days);
        let evicted = self.db.evict_idle_sessions(cutoff)?;
        if evicted > 0 {
            tracing::info!(evicted, retention_days, "evicted idle sessions");
        }
        Ok(evicted)
    }
}
