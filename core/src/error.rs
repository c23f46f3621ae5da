//! Error types for phaseload-core
//!
//! Only configuration-level violations travel out of the core as errors.
//! Provider, transport and per-session failures are absorbed and recorded
//! as data on `SessionResult`s and in the `MetricsAggregator`.

use thiserror::Error;

pub use crate::config::ConfigError;
pub use crate::session::SessionSetupError;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or missing configuration; fatal and caller-fixable
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A single session could not be set up
    #[error("session setup error: {0}")]
    SessionSetup(#[from] SessionSetupError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors a caller can fix by changing configuration
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_converts() {
        let err: Error = ConfigError::NoProviders.into();
        assert!(err.is_config());
        assert!(err.to_string().contains("no AI providers"));
    }

    #[test]
    fn test_session_setup_error_is_not_config() {
        let err: Error = SessionSetupError::MalformedProfile {
            profile: "gamer".into(),
            reason: "session duration is zero".into(),
        }
        .into();
        assert!(!err.is_config());
        assert!(err.to_string().contains("gamer"));
    }
}
