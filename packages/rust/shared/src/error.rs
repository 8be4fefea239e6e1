//! Error types for the Stundenplan crawler.
//!
//! Library crates use [`StundenplanError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Failures of the login handshake. Every variant aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The landing URL lacks one of `FH`, `Lang`, `User`, `Session`.
    #[error("landing page is missing the `{0}` session field")]
    MissingField(&'static str),

    /// The application redirected back to the login page.
    #[error("login rejected: landing page {0} is the login page, check your credentials")]
    LoginRejected(String),

    /// The session token does not have the expected length.
    #[error("invalid session token: expected {expected} characters, got {actual}")]
    InvalidToken { expected: usize, actual: usize },
}

/// Top-level error type for all crawler operations.
#[derive(Debug, thiserror::Error)]
pub enum StundenplanError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Login handshake failed.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Network/HTTP error while talking to the application.
    #[error("network error: {0}")]
    Network(String),

    /// A structured-data payload could not be decoded.
    #[error("decode error: {message}")]
    Decode { message: String },

    /// A structured-data payload did not have the expected shape.
    #[error("shape error: {message}")]
    Shape { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Record sink failed to accept a record.
    #[error("output error: {0}")]
    Output(String),

    /// Data validation error (missing context axis, invalid URL, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, StundenplanError>;

impl StundenplanError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a decode error from any displayable message.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
            message: msg.into(),
        }
    }

    /// Create a shape error from any displayable message.
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::Shape {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error only affects a single node of the crawl tree.
    ///
    /// Node-level errors are reported per branch; everything else aborts the run.
    pub fn is_node_level(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Decode { .. } | Self::Shape { .. } | Self::Output(_)
        )
    }
}
