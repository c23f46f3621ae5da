//! Collaborator traits for target transports and AI providers
//!
//! The core only talks to the outside world through these two traits.
//! Implementations live in the vendors crate; tests use in-memory mocks.

use crate::provider::ProviderDescriptor;
use crate::target::{ActionSpec, TargetDescriptor};
use async_trait::async_trait;
use std::time::Duration;

// ============================================================================
// Transport
// ============================================================================

/// Performs simulated user actions against a target
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport identifier (e.g., "http")
    fn name(&self) -> &str;

    /// Perform one action and report what came back
    ///
    /// Response bodies are not inspected beyond their length.
    async fn perform(
        &self,
        target: &TargetDescriptor,
        action: &ActionSpec,
    ) -> Result<ActionOutcome, TransportError>;
}

/// What a completed action returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Status code reported by the target
    pub status_code: u16,
    /// Response body length in bytes
    pub content_length: usize,
    /// Time spent on the action
    pub elapsed: Duration,
}

impl ActionOutcome {
    /// True when the status code is below 400
    pub fn is_success(&self) -> bool {
        self.status_code < 400
    }
}

/// Transport-level failures of a single action
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Could not connect or the connection broke
    #[error("connection failed: {0}")]
    Connect(String),

    /// No response within the action timeout
    #[error("action timed out after {0:?}")]
    Timeout(Duration),

    /// The resolved URL or action is unusable
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// Anything else
    #[error("transport error: {0}")]
    Other(String),
}

// ============================================================================
// AI provider
// ============================================================================

/// Sends an opaque JSON payload to an AI provider and returns its JSON reply
///
/// Implementations handle authentication and the HTTP exchange; building
/// the payload and interpreting the reply is the synthesis client's job.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Issue one request
    async fn call(
        &self,
        provider: &ProviderDescriptor,
        payload: &serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value, ProviderError>;
}

/// Provider-level failures; never surfaced past the synthesis client
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    /// Network failure
    #[error("transport error: {0}")]
    Transport(String),

    /// No reply within the provider timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Provider or local limiter refused the request
    #[error("rate limited: retry after {retry_after:?}")]
    RateLimited {
        /// Suggested delay
        retry_after: Option<Duration>,
    },

    /// Server error (5xx)
    #[error("server error: {status} - {message}")]
    ServerError {
        /// HTTP status code
        status: u16,
        /// Error message
        message: String,
    },

    /// Credentials missing or rejected
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Provider rejected the request as malformed
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Reply did not match the structured-output contract
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Check if this error is worth retrying on the same provider
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Transport(_)
                | ProviderError::Timeout(_)
                | ProviderError::RateLimited { .. }
                | ProviderError::ServerError { .. }
        )
    }

    /// Provider-suggested delay before the next attempt
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Short label for logs and counters
    pub fn label(&self) -> &'static str {
        match self {
            ProviderError::Transport(_) => "transport",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::RateLimited { .. } => "rate_limited",
            ProviderError::ServerError { .. } => "server_error",
            ProviderError::Auth(_) => "auth",
            ProviderError::InvalidRequest(_) => "invalid_request",
            ProviderError::Malformed(_) => "malformed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_retryable() {
        assert!(ProviderError::RateLimited { retry_after: None }.is_retryable());
        assert!(ProviderError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(ProviderError::Transport("reset".into()).is_retryable());
        assert!(ProviderError::ServerError {
            status: 503,
            message: "busy".into()
        }
        .is_retryable());

        assert!(!ProviderError::Malformed("no behaviors".into()).is_retryable());
        assert!(!ProviderError::Auth("bad key".into()).is_retryable());
        assert!(!ProviderError::InvalidRequest("bad".into()).is_retryable());
    }

    #[test]
    fn test_provider_error_retry_after() {
        let limited = ProviderError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(ProviderError::Auth("x".into()).retry_after(), None);
    }

    #[test]
    fn test_action_outcome_success() {
        let ok = ActionOutcome {
            status_code: 200,
            content_length: 10,
            elapsed: Duration::from_millis(5),
        };
        assert!(ok.is_success());
        let redirect = ActionOutcome {
            status_code: 302,
            ..ok
        };
        assert!(redirect.is_success());
        let missing = ActionOutcome {
            status_code: 404,
            ..ok
        };
        assert!(!missing.is_success());
    }
}
