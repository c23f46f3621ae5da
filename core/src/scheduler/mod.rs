//! Phase scheduler for run lifecycle management
//!
//! The [`PhaseScheduler`] drives a complete run:
//! - Stepping through phases, each at a higher rate than the last
//! - Launching each phase's sessions concurrently under a semaphore
//! - Waiting at the phase barrier, bounded by an optional phase deadline
//! - Summarizing each phase from the metrics delta
//! - Draining gracefully on cancellation
//!
//! State machine: `Idle -> Running(p) -> Draining -> Completed`, with
//! `Interrupted` reachable on cancellation.
//!
//! # Example
//!
//! ```ignore
//! use phaseload_core::PhaseSchedulerBuilder;
//!
//! let scheduler = PhaseSchedulerBuilder::from_run_config(&config)
//!     .transport(transport)
//!     .build()?;
//!
//! let report = scheduler
//!     .run_with_signal_handling(3, 4, Duration::from_secs(30))
//!     .await;
//! ```

mod builder;
mod executor;
mod report;

pub use builder::PhaseSchedulerBuilder;
pub use executor::{PhaseScheduler, SchedulerState};
pub use report::{FinalReport, PhaseReport, PhaseSummary, RunOutcome};
