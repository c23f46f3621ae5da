//! phaseload-core: phase-based synthetic session orchestration
//!
//! This crate provides everything a run needs apart from the wire-level
//! adapters, including:
//!
//! - Configuration types (rate schedule, delay curve, scheduler settings)
//! - Behavior profiles, patterns and targets
//! - Core traits (Transport, ProviderClient)
//! - The sliding-window provider rate limiter
//! - The behavior synthesis client with provider fallback
//! - The session runner and the phase scheduler
//! - Metrics collection and aggregation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod behavior;
pub mod config;
pub mod error;
pub mod metrics;
pub mod profile;
pub mod provider;
pub mod rate_limiter;
pub mod scheduler;
pub mod session;
pub mod synthesis;
pub mod target;
pub mod traits;

pub use behavior::*;
pub use config::*;
pub use error::{Error, Result};
pub use metrics::*;
pub use profile::*;
pub use provider::*;
pub use rate_limiter::RateLimiter;
pub use scheduler::{
    FinalReport, PhaseReport, PhaseScheduler, PhaseSchedulerBuilder, PhaseSummary, RunOutcome,
    SchedulerState,
};
pub use session::{
    ActionThrottle, InteractionRecord, PlanSource, SessionId, SessionOutcome, SessionResult,
    SessionRunner, SessionRunnerBuilder, SessionSetupError, SessionSpec,
};
pub use synthesis::{
    BehaviorSynthesisClient, SessionContext, SynthesisRequest, SynthesisStats,
    SynthesisStatsSnapshot,
};
pub use target::*;
pub use traits::*;
