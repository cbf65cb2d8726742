//! # Tessera CSRF Protection
//!
//! Cross-Site Request Forgery (CSRF) protection using signed double-submit
//! tokens.
//!
//! ## Features
//!
//! - **Signed Tokens** - `salt.timestamp.signature`, HMAC-SHA256 over a random salt
//! - **Double Submit** - header (or form field) must equal the cookie
//! - **Session Binding** - tokens bound to the session id they were issued to
//! - **Single Use** - a session-bound token is consumed by the first mutation
//! - **Expiry** - tokens older than the configured timeout are refused
//! - **Origin Checks** - optional `Origin`/`Referer` same-origin gate
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use tessera_csrf::{CsrfConfig, CsrfMiddleware};
//!
//! let config = CsrfConfig::builder(CsrfConfig::generate_secret())
//!     .with_timeout(Duration::from_secs(30 * 60))
//!     .with_origin("https://app.example")
//!     .build()
//!     .unwrap();
//!
//! let csrf = CsrfMiddleware::new(config);
//! ```
//!
//! ## Request Flow
//!
//! ```rust
//! use http::Method;
//! use std::time::Duration;
//! use tessera_csrf::{CsrfConfig, CsrfMiddleware, CsrfRequest};
//! use tessera_session::Session;
//!
//! let csrf = CsrfMiddleware::new(CsrfConfig::builder("s3cret").build().unwrap());
//! let mut session = Session::new("session-1", Duration::from_secs(3600));
//!
//! // GET: a token is issued, bound to the session and set as a cookie
//! let get = csrf.handle(&CsrfRequest::new(Method::GET), Some(&mut session));
//! let token = get.token().unwrap().to_string();
//! assert!(get.cookie().is_some());
//!
//! // POST: header and cookie carry the same token
//! let post = CsrfRequest::new(Method::POST)
//!     .with_header("X-XSRF-TOKEN", &token)
//!     .with_cookie("csrfToken", &token);
//! let outcome = csrf.handle(&post, Some(&mut session));
//! assert!(outcome.is_continue());
//!
//! // The same token cannot be used twice
//! let replay = csrf.handle(&post, Some(&mut session));
//! assert_eq!(replay.status(), Some(http::StatusCode::FORBIDDEN));
//! ```
//!
//! ## Token Codec
//!
//! ```rust
//! use std::time::Duration;
//! use tessera_csrf::{TokenCodec, token::now_millis};
//!
//! let codec = TokenCodec::new(b"s3cret").unwrap();
//! let token = codec.issue();
//!
//! let now = now_millis();
//! assert!(codec.verify(&token, now, Duration::from_secs(60)).is_ok());
//! ```

pub mod binding;
pub mod config;
pub mod cookie;
pub mod error;
pub mod middleware;
pub mod origin;
pub mod request;
pub mod settings;
pub mod token;

pub use binding::SessionBinder;
pub use config::{CsrfConfig, CsrfConfigBuilder};
pub use cookie::TokenCookie;
pub use error::{CsrfError, RejectReason, Result, TokenRejection};
pub use middleware::{CsrfMiddleware, CsrfOutcome, MethodClass, REJECTION_STATUS};
pub use origin::{OriginValidator, TrustedOrigin};
pub use request::CsrfRequest;
pub use settings::CsrfSettings;
pub use token::TokenCodec;
