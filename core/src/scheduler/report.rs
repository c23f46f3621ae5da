//! Phase summaries and the final run report

use crate::metrics::{AggregateMetrics, LatencyPercentiles};
use crate::session::{SessionOutcome, SessionResult};
use crate::synthesis::SynthesisStatsSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Counters for one phase
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PhaseSummary {
    /// Phase number
    pub phase: u32,
    /// Sessions launched
    pub sessions: usize,
    /// Sessions that succeeded
    pub successful_sessions: usize,
    /// Actions attempted during the phase
    pub interactions: u64,
    /// Successful actions
    pub successful_interactions: u64,
    /// Failed actions
    pub failed_interactions: u64,
    /// Highest planned session rate, in requests per minute
    pub peak_rate: f64,
    /// Wall-clock phase duration in milliseconds
    pub duration_ms: f64,
    /// Action latency percentiles for this phase
    pub latency: LatencyPercentiles,
    /// Sessions cut off by the phase deadline
    pub timed_out_sessions: usize,
    /// Cancellation arrived while the phase ran
    pub interrupted: bool,
}

impl PhaseSummary {
    /// Summarize a phase from its results and the metrics delta around it
    pub(crate) fn build(
        phase: u32,
        results: &[SessionResult],
        before: &AggregateMetrics,
        after: &AggregateMetrics,
        elapsed: Duration,
        interrupted: bool,
    ) -> Self {
        let latencies: Vec<f64> = results
            .iter()
            .flat_map(|r| r.interactions.iter().map(|i| i.latency_ms))
            .collect();

        Self {
            phase,
            sessions: results.len(),
            successful_sessions: results.iter().filter(|r| r.succeeded).count(),
            interactions: after.total_requests.saturating_sub(before.total_requests),
            successful_interactions: after
                .successful_requests
                .saturating_sub(before.successful_requests),
            failed_interactions: after.failed_requests.saturating_sub(before.failed_requests),
            peak_rate: results
                .iter()
                .map(|r| r.planned_rate)
                .fold(0.0, f64::max),
            duration_ms: elapsed.as_secs_f64() * 1000.0,
            latency: LatencyPercentiles::from_values(&latencies),
            timed_out_sessions: results
                .iter()
                .filter(|r| r.outcome == SessionOutcome::TimedOut)
                .count(),
            interrupted,
        }
    }

    /// Fraction of sessions that succeeded, 0 when none ran
    pub fn session_success_rate(&self) -> f64 {
        if self.sessions == 0 {
            0.0
        } else {
            self.successful_sessions as f64 / self.sessions as f64
        }
    }
}

/// One phase: its summary and every session it launched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseReport {
    /// Phase counters
    pub summary: PhaseSummary,
    /// Session results, in launch order
    pub sessions: Vec<SessionResult>,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every planned phase ran
    Completed,
    /// Stopped early by cancellation
    Interrupted,
}

/// Everything a run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    /// How the run ended
    pub outcome: RunOutcome,
    /// Phases requested
    pub phases_planned: u32,
    /// Sessions requested per phase
    pub sessions_per_phase: usize,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run ended
    pub finished_at: DateTime<Utc>,
    /// Phases that ran, the interrupted one included
    pub phases: Vec<PhaseReport>,
    /// Run-wide counters at the end of the run
    pub totals: AggregateMetrics,
    /// Synthesis counters, when synthesis was enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthesis: Option<SynthesisStatsSnapshot>,
}

impl FinalReport {
    /// Number of session results across all phases
    pub fn session_count(&self) -> usize {
        self.phases.iter().map(|p| p.sessions.len()).sum()
    }

    /// Every session result, phase by phase
    pub fn sessions(&self) -> impl Iterator<Item = &SessionResult> {
        self.phases.iter().flat_map(|p| p.sessions.iter())
    }

    /// Sum of per-phase interaction counts
    pub fn total_interactions(&self) -> u64 {
        self.phases.iter().map(|p| p.summary.interactions).sum()
    }

    /// Phases that ran without interruption
    pub fn phases_completed(&self) -> usize {
        self.phases.iter().filter(|p| !p.summary.interrupted).count()
    }

    /// True when the run was cut short
    pub fn is_interrupted(&self) -> bool {
        self.outcome == RunOutcome::Interrupted
    }

    /// Run duration
    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}
