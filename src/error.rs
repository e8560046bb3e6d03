//! Error types shared by the backend client and both stores.

use thiserror::Error;

/// Coarse failure category, used by front-ends to decide how to present
/// an error (retry prompt, login form, transient notice).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network or service failure.
    TransportFailure,
    /// Invalid credentials or no active session.
    AuthFailure,
    /// Request rejected by the backend (duplicate account, bad input).
    ValidationFailure,
    /// Missing or malformed configuration.
    ConfigFailure,
    /// The owning scope closed before the request resolved.
    Detached,
}

/// Crate error type.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed before a response was received, or the body
    /// could not be decoded.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The service answered with a non-auth, non-validation error.
    #[error("Service error ({status}): {message}")]
    Service {
        /// HTTP status code.
        status: u16,
        /// Error message from the service.
        message: String,
    },

    /// Invalid credentials or missing session.
    #[error("Authentication failed: {message}")]
    Auth {
        /// Error message from the service.
        message: String,
    },

    /// The request was rejected.
    #[error("Rejected: {message}")]
    Validation {
        /// Error message from the service or the local check.
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Result arrived after the owning scope was closed; nothing was applied.
    #[error("Scope closed before the request resolved")]
    Detached,
}

impl Error {
    /// Build an auth error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Build a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Map a failed HTTP status and the service's message to an error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Auth { message },
            400 | 404 | 409 | 422 => Self::Validation { message },
            _ => Self::Service { status, message },
        }
    }

    /// Category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Http(_) | Self::Json(_) | Self::Service { .. } => ErrorKind::TransportFailure,
            Self::Auth { .. } => ErrorKind::AuthFailure,
            Self::Validation { .. } => ErrorKind::ValidationFailure,
            Self::InvalidUrl(_) | Self::Config(_) => ErrorKind::ConfigFailure,
            Self::Detached => ErrorKind::Detached,
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias for crate operations.
pub type Result<T> = std::result::Result<T, Error>;
