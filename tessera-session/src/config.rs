//! Session configuration.

use crate::error::{SessionError, SessionResult};
use std::time::Duration;

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Default session TTL
    pub default_ttl: Duration,
    /// Maximum session TTL (for security)
    pub max_ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(1800), // 30 minutes
            max_ttl: Duration::from_secs(86400 * 7), // 7 days
        }
    }
}

impl SessionConfig {
    /// Create a configuration with explicit TTLs.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use tessera_session::SessionConfig;
    ///
    /// let config = SessionConfig::new(Duration::from_secs(600), Duration::from_secs(3600)).unwrap();
    /// assert_eq!(config.effective_ttl(None), Duration::from_secs(600));
    /// ```
    pub fn new(default_ttl: Duration, max_ttl: Duration) -> SessionResult<Self> {
        if default_ttl.is_zero() {
            return Err(SessionError::Config(
                "Default TTL must be greater than zero".to_string(),
            ));
        }
        if default_ttl > max_ttl {
            return Err(SessionError::Config(format!(
                "Default TTL ({:?}) exceeds maximum TTL ({:?})",
                default_ttl, max_ttl
            )));
        }

        Ok(Self {
            default_ttl,
            max_ttl,
        })
    }

    /// Set the default session TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the maximum session TTL.
    pub fn with_max_ttl(mut self, ttl: Duration) -> Self {
        self.max_ttl = ttl;
        self
    }

    /// Clamp a requested TTL to the configured maximum.
    pub fn effective_ttl(&self, requested: Option<Duration>) -> Duration {
        requested.unwrap_or(self.default_ttl).min(self.max_ttl)
    }
}
