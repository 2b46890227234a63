use std::fmt::{Display, Formatter};

/// The error kinds from the error-handling design: callers match on these to
/// decide how to surface a failure (direct to the SDK, retry, or fatal at
/// startup). Never carries a `Box<dyn Error>` — every variant that wraps an
/// upstream failure stores the information callers need as plain data.
#[derive(Debug, Clone)]
pub enum RelayError {
    /// Bad or missing credentials.
    Unauthorized(String),
    /// Missing resource.
    NotFound(String),
    /// Network/IO/timeout, retried where the caller says so.
    Transient(String),
    /// Unexpected: malformed JWT, JSON decode failure, etc.
    Internal(String),
    /// Structural problem with offline config; fatal at startup.
    Config(String),
}

impl RelayError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        RelayError::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        RelayError::NotFound(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        RelayError::Transient(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        RelayError::Internal(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        RelayError::Config(msg.into())
    }
}

impl std::error::Error for RelayError {}

impl Display for RelayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayError::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
            RelayError::NotFound(msg) => write!(f, "not found: {msg}"),
            RelayError::Transient(msg) => write!(f, "transient error: {msg}"),
            RelayError::Internal(msg) => write!(f, "internal error: {msg}"),
            RelayError::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(value: serde_json::Error) -> Self {
        RelayError::Internal(value.to_string())
    }
}

pub type RelayResult<T> = Result<T, RelayError>;
