//! Error types for table gateway operations.

use std::fmt;
use thiserror::Error;

/// Gateway error type.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The remote could not be reached (connect, timeout, broken transfer).
    #[error("Transport error: {0}")]
    Transport(String),

    /// A required field was missing or a unique key was duplicated.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// No row with the given id.
    #[error("Row not found: {table}/{id}")]
    NotFound { table: String, id: String },

    /// Credentials were rejected.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Any other non-success response.
    #[error("Remote error: {status} - {message}")]
    Remote { status: u16, message: String },

    /// A payload could not be encoded or decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Invalid client setup.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            GatewayError::Config(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Transport,
    Constraint,
    NotFound,
    Other,
}

impl GatewayError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            GatewayError::Transport(_) => ErrorCategory::Transport,
            GatewayError::Constraint(_) => ErrorCategory::Constraint,
            GatewayError::NotFound { .. } => ErrorCategory::NotFound,
            GatewayError::Unauthorized(_)
            | GatewayError::Remote { .. }
            | GatewayError::Decode(_)
            | GatewayError::Config(_) => ErrorCategory::Other,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Transport => "transport",
            ErrorCategory::Constraint => "constraint",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Other => "other",
        };
        f.write_str(name)
    }
}

/// Result type alias using GatewayError.
pub type GatewayResult<T> = Result<T, GatewayError>;
