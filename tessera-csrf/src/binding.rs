//! Binding of tokens to the session that received them.
//!
//! The binding is stored as `sessionId/token` under a single session key. A
//! session whose identifier changed since the token was bound no longer finds
//! it, which invalidates tokens across privilege escalation without any
//! revocation bookkeeping.

use tessera_session::SessionAccess;
use tracing::trace;

/// Reads and writes the session binding under a fixed key.
#[derive(Debug, Clone)]
pub struct SessionBinder {
    key: String,
}

impl SessionBinder {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Session key holding the binding.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Bind `token` to the current session identifier, replacing any earlier binding.
    pub fn bind(&self, session: &mut (dyn SessionAccess + '_), token: &str) {
        let value = format!("{}/{}", session.identifier(), token);
        session.put(&self.key, value);
    }

    /// Token bound to this session, if it was bound under the current identifier.
    pub fn lookup(&self, session: &dyn SessionAccess) -> Option<String> {
        let stored = session.get(&self.key)?;
        match stored.split_once('/') {
            Some((id, token)) if id == session.identifier() => Some(token.to_string()),
            _ => {
                trace!("Token has been issued for a different session");
                None
            }
        }
    }

    /// `true` if the session holds a binding at all, current or stale.
    pub fn has_binding(&self, session: &dyn SessionAccess) -> bool {
        session.get(&self.key).is_some()
    }

    /// Drop the binding so the bound token cannot be presented again.
    pub fn consume(&self, session: &mut (dyn SessionAccess + '_)) {
        session.remove(&self.key);
    }
}
