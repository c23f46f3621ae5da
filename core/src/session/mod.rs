//! Single-session execution
//!
//! A [`SessionRunner`] executes one simulated visit:
//!
//! 1. Compute the session rate from the phase and profile factor
//! 2. Derive the planned action count from rate and session length
//! 3. Ask behavior synthesis for a plan, or fall back to the profile's patterns
//! 4. For each planned action: wait the phase delay, perform it, record it
//! 5. Settle the verdict and hand the result to the metrics aggregator
//!
//! Failed actions are data, not errors. Only [`SessionSetupError`] leaves
//! the runner.

mod builder;
mod result;
mod runner;
mod throttle;

pub use builder::SessionRunnerBuilder;
pub use result::{InteractionRecord, PlanSource, SessionId, SessionOutcome, SessionResult};
pub use runner::{SessionRunner, SessionSpec};
pub use throttle::ActionThrottle;

use crate::config::ConfigError;

/// Errors that stop a single session before its first action
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionSetupError {
    /// The profile cannot drive a session
    #[error("malformed profile {profile}: {reason}")]
    MalformedProfile {
        /// Profile name
        profile: String,
        /// What is wrong with it
        reason: String,
    },

    /// Behavior synthesis is misconfigured
    #[error("behavior synthesis unavailable: {0}")]
    Synthesis(#[from] ConfigError),
}
