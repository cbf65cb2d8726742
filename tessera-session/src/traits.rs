//! Session data, the per-request session view and the store trait.

use crate::error::{SessionError, SessionResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Per-request view of a server-side session.
///
/// This is the only surface the CSRF layer touches. The identifier may change
/// between requests (for example when a login upgrades the session), which is
/// how previously issued, session-bound tokens stop being accepted.
pub trait SessionAccess {
    /// Current session identifier.
    fn identifier(&self) -> &str;

    /// Read a string value.
    fn get(&self, key: &str) -> Option<String>;

    /// Store a string value, replacing any previous value.
    fn put(&mut self, key: &str, value: String);

    /// Remove a value, returning it if it was present.
    fn remove(&mut self, key: &str) -> Option<String>;
}

/// Session data structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier
    pub id: String,
    /// Session data as key-value pairs
    pub data: HashMap<String, serde_json::Value>,
    /// Session creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last access timestamp
    pub last_accessed_at: DateTime<Utc>,
    /// Session expiration timestamp
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session with the given ID and TTL.
    pub fn new(id: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            data: HashMap::new(),
            created_at: now,
            last_accessed_at: now,
            expires_at: expiry_after(now, ttl),
        }
    }

    /// Check if the session has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Get a typed value from the session data.
    pub fn get_as<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Set a typed value in the session data.
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> SessionResult<()> {
        let json_value =
            serde_json::to_value(value).map_err(|e| SessionError::Serialization(e.to_string()))?;
        self.data.insert(key.to_string(), json_value);
        Ok(())
    }

    /// Check if a key exists in the session data.
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Update the last accessed timestamp.
    pub fn touch(&mut self) {
        self.last_accessed_at = Utc::now();
    }
}

/// `now + ttl`, saturating at the latest representable instant.
fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl SessionAccess for Session {
    fn identifier(&self) -> &str {
        &self.id
    }

    fn get(&self, key: &str) -> Option<String> {
        match self.data.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn put(&mut self, key: &str, value: String) {
        self.data
            .insert(key.to_string(), serde_json::Value::String(value));
    }

    fn remove(&mut self, key: &str) -> Option<String> {
        match self.data.remove(key)? {
            serde_json::Value::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Session store trait for different storage backends.
///
/// The CSRF layer never talks to a store directly: the application loads a
/// [`Session`] for the request, hands it to the middleware as a
/// [`SessionAccess`], and saves it afterwards.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a new session. Uses the configured default TTL if `ttl` is `None`.
    async fn create(&self, ttl: Option<Duration>) -> SessionResult<Session>;

    /// Get a session by ID.
    ///
    /// Returns `Ok(None)` if not found or expired.
    async fn get(&self, session_id: &str) -> SessionResult<Option<Session>>;

    /// Save/update a session.
    async fn save(&self, session: &Session) -> SessionResult<()>;

    /// Delete a session.
    async fn delete(&self, session_id: &str) -> SessionResult<()>;

    /// Move a session to a freshly generated identifier, keeping its data.
    ///
    /// Call this on privilege changes (login, role change) so that anything
    /// bound to the old identifier stops matching.
    async fn regenerate(&self, session_id: &str) -> SessionResult<Session>;

    /// Atomically read and remove a single string value.
    async fn take_value(&self, session_id: &str, key: &str) -> SessionResult<Option<String>>;

    /// Get the number of active sessions.
    async fn count(&self) -> SessionResult<usize>;

    /// Remove expired sessions, returning how many were dropped.
    async fn cleanup_expired(&self) -> SessionResult<usize>;
}

/// Generate a new unique session ID.
pub fn generate_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
