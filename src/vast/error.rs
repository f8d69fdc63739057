//! Error types for the Vast.ai marketplace client.

use thiserror::Error;

use crate::config::ConfigError;
use crate::marketplace::Transient;

/// Errors raised by the Vast.ai client.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum VastError {
    /// Raised when the connection settings are incomplete.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raised when the HTTP client cannot be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    /// Raised when a request never produced a response (connect failure,
    /// timeout, interrupted body).
    #[error("request to {endpoint} failed: {message}")]
    Transport {
        /// Method and path of the request.
        endpoint: String,
        /// Message returned by the HTTP stack.
        message: String,
    },
    /// Raised for non-success HTTP statuses without a more specific variant.
    #[error("{endpoint} returned HTTP {status}: {message}")]
    Http {
        /// Method and path of the request.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },
    /// Raised when the API key is missing, wrong, or lacks permission.
    #[error("{endpoint} rejected the API key (HTTP {status})")]
    Unauthorized {
        /// Method and path of the request.
        endpoint: String,
        /// HTTP status code.
        status: u16,
    },
    /// Raised when the addressed resource does not exist.
    #[error("{resource} not found")]
    NotFound {
        /// Description of the missing resource.
        resource: String,
    },
    /// Raised when the marketplace refuses an operation. The reason is the
    /// upstream text, unmodified.
    #[error("{reason}")]
    Rejected {
        /// Reason reported by the marketplace.
        reason: String,
    },
    /// Raised when a response body cannot be decoded.
    #[error("unexpected response from {endpoint}: {message}")]
    Decode {
        /// Method and path of the request.
        endpoint: String,
        /// Parser error message.
        message: String,
    },
}

impl Transient for VastError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Decode { .. } => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Config(_)
            | Self::Client(_)
            | Self::Unauthorized { .. }
            | Self::NotFound { .. }
            | Self::Rejected { .. } => false,
        }
    }
}

impl From<ConfigError> for VastError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}
