use thiserror::Error;

/// Construction-time failures. Nothing in here is produced while serving a
/// request; request-time problems become a [`RejectReason`].
#[derive(Error, Debug)]
pub enum CsrfError {
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    #[error("Invalid trusted origin '{origin}': {reason}")]
    InvalidOrigin { origin: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CsrfError>;

/// Why a token failed [`TokenCodec::verify`](crate::TokenCodec::verify).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    #[error("token is not of the form salt.timestamp.signature")]
    Malformed,

    #[error("token signature does not match")]
    BadSignature,

    #[error("token timestamp is unparsable or too old")]
    Expired,
}

/// Diagnostic reason for a rejected request.
///
/// Every variant produces the same 403 outcome; the distinction is only ever
/// written to logs, never sent to the client.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    #[error("Origin/Referer does not match the trusted origin")]
    OriginMismatch,

    #[error("token absent from header/body or cookie")]
    MissingToken,

    #[error("header/body token and cookie token differ")]
    TokenMismatch,

    #[error("no token bound to the session")]
    NoSessionToken,

    #[error("token was issued for a different session")]
    ForeignSession,

    #[error("token has been used or is outdated")]
    SessionMismatch,

    #[error(transparent)]
    Token(#[from] TokenRejection),
}
