//! Session abstraction for Tessera.
//!
//! The CSRF layer only needs a narrow, per-request view of a session:
//! [`SessionAccess`] with `get`, `put`, `remove` and `identifier`. Any
//! storage technology can provide it. This crate also ships a concrete
//! [`Session`] value and an in-memory [`MemorySessionStore`].
//!
//! # Examples
//!
//! ```
//! use tessera_session::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), SessionError> {
//!     let store = MemorySessionStore::new(SessionConfig::default());
//!
//!     let mut session = store.create(None).await?;
//!     session.put("theme", "dark".to_string());
//!     store.save(&session).await?;
//!
//!     // Privilege change: same data, new identifier
//!     let upgraded = store.regenerate(&session.id).await?;
//!     assert_ne!(upgraded.identifier(), session.identifier());
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod memory;
pub mod traits;

pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use memory::MemorySessionStore;
pub use traits::{Session, SessionAccess, SessionStore, generate_session_id};
