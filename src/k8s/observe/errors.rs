/**
 * Failures reported by a resource client, classified for retry decisions
 */
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The addressed object does not exist (yet)
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// The API server answered with an error status
    #[error("api error {code} ({reason}): {message}")]
    Api {
        code: u16,
        reason: String,
        message: String,
    },

    /// Connection could not be made or broke while reading
    #[error("connection error: {0}")]
    Connection(String),

    /// The operation did not finish within its deadline
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The server does not serve the requested resource type
    #[error("unknown resource type {0}")]
    UnknownResource(String),

    /// The request could not be built or was rejected as malformed
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A response or event could not be decoded
    #[error("decode error: {0}")]
    Decode(String),
}

impl ClientError {
    /// Transient errors are expected to resolve on retry; all others abort
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) => true,
            Self::Api { code, .. } => matches!(*code, 408 | 410 | 429 | 500..=599),
            Self::NotFound { .. }
            | Self::UnknownResource(_)
            | Self::InvalidRequest(_)
            | Self::Decode(_) => false,
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn api(code: u16, reason: &str, message: &str) -> Self {
        Self::Api {
            code,
            reason: reason.to_string(),
            message: message.to_string(),
        }
    }
}
