//! In-memory session store
//!
//! Uses DashMap for thread-safe concurrent access. Suitable for single-instance
//! deployments or testing.

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::traits::{Session, SessionStore, generate_session_id};
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tracing::{debug, trace};

/// In-memory session store
pub struct MemorySessionStore {
    config: SessionConfig,
    sessions: DashMap<String, Session>,
}

impl MemorySessionStore {
    /// Create a new in-memory store
    pub fn new(config: SessionConfig) -> Self {
        debug!(default_ttl = ?config.default_ttl, "Creating new in-memory session store");
        Self {
            config,
            sessions: DashMap::new(),
        }
    }

    /// Store configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, ttl: Option<Duration>) -> SessionResult<Session> {
        let session = Session::new(generate_session_id(), self.config.effective_ttl(ttl));
        trace!(expires_at = %session.expires_at, "Session created");
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn get(&self, session_id: &str) -> SessionResult<Option<Session>> {
        let expired = match self.sessions.get(session_id) {
            Some(entry) if !entry.is_expired() => {
                let mut session = entry.value().clone();
                session.touch();
                return Ok(Some(session));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            trace!("Dropping expired session on read");
            self.sessions.remove(session_id);
        }
        Ok(None)
    }

    async fn save(&self, session: &Session) -> SessionResult<()> {
        if session.id.is_empty() {
            return Err(SessionError::InvalidSessionId(
                "session id must not be empty".to_string(),
            ));
        }
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> SessionResult<()> {
        self.sessions.remove(session_id);
        Ok(())
    }

    async fn regenerate(&self, session_id: &str) -> SessionResult<Session> {
        let (_, mut session) = self
            .sessions
            .remove(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        if session.is_expired() {
            return Err(SessionError::Expired(session_id.to_string()));
        }

        session.id = generate_session_id();
        session.touch();
        debug!("Session identifier regenerated");
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn take_value(&self, session_id: &str, key: &str) -> SessionResult<Option<String>> {
        // The entry guard holds the shard lock across the read and the removal.
        let Some(mut entry) = self.sessions.get_mut(session_id) else {
            return Ok(None);
        };
        if entry.is_expired() {
            return Ok(None);
        }
        Ok(match entry.data.remove(key) {
            Some(serde_json::Value::String(value)) => Some(value),
            Some(other) => {
                entry.data.insert(key.to_string(), other);
                None
            }
            None => None,
        })
    }

    async fn count(&self) -> SessionResult<usize> {
        Ok(self.sessions.len())
    }

    async fn cleanup_expired(&self) -> SessionResult<usize> {
        // len() can change under concurrent inserts, so count in the closure
        let mut removed = 0;
        self.sessions.retain(|_, session| {
            let keep = !session.is_expired();
            if !keep {
                removed += 1;
            }
            keep
        });
        debug!(removed = removed, "Cleaned up expired sessions");
        Ok(removed)
    }
}
