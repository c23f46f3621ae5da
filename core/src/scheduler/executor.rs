//! Phase loop

use super::report::{FinalReport, PhaseReport, PhaseSummary, RunOutcome};
use crate::config::SchedulerConfig;
use crate::metrics::MetricsAggregator;
use crate::profile::ProfileSelector;
use crate::session::{SessionId, SessionResult, SessionRunner, SessionSpec};
use crate::target::TargetDescriptor;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Where the scheduler is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SchedulerState {
    /// Not started
    Idle,
    /// Sessions of `phase` are running
    Running {
        /// Current phase
        phase: u32,
    },
    /// Waiting for in-flight sessions of `phase` to return
    Draining {
        /// Current phase
        phase: u32,
    },
    /// Every planned phase ran
    Completed,
    /// Stopped early by cancellation
    Interrupted,
}

/// Runs phases of concurrent sessions at exponentially growing rates
///
/// Phases are strictly sequential; sessions within a phase run as
/// independent tokio tasks, bounded by a semaphore. The scheduler holds no
/// session state of its own: everything shared goes through the
/// [`MetricsAggregator`].
pub struct PhaseScheduler {
    pub(super) config: SchedulerConfig,
    pub(super) runner: Arc<SessionRunner>,
    pub(super) profiles: ProfileSelector,
    pub(super) targets: Vec<TargetDescriptor>,
    pub(super) metrics: Arc<MetricsAggregator>,
    pub(super) cancel: CancellationToken,
    pub(super) state: Mutex<SchedulerState>,
    pub(super) next_session: AtomicU64,
    pub(super) next_target: AtomicUsize,
}

impl PhaseScheduler {
    /// Run with the phase plan from the configuration
    pub async fn run_configured(&self) -> FinalReport {
        self.run(
            self.config.max_phases,
            self.config.sessions_per_phase,
            self.config.inter_phase_delay(),
        )
        .await
    }

    /// Run `max_phases` phases of `sessions_per_phase` sessions each
    ///
    /// Never fails: session and provider failures end up in the report.
    /// Cancellation lets the current phase drain and returns a partial report.
    pub async fn run(
        &self,
        max_phases: u32,
        sessions_per_phase: usize,
        inter_phase_delay: Duration,
    ) -> FinalReport {
        let started_at = Utc::now();
        let mut phases = Vec::with_capacity(max_phases as usize);
        let mut outcome = RunOutcome::Completed;

        tracing::info!(
            max_phases,
            sessions_per_phase,
            max_concurrent = self.config.max_concurrent_sessions,
            max_actions_per_second = ?self.runner.throttle().limit(),
            targets = self.targets.len(),
            profiles = self.profiles.profiles().len(),
            "Scheduler starting"
        );

        for phase in 0..max_phases {
            if self.cancel.is_cancelled() {
                outcome = RunOutcome::Interrupted;
                break;
            }

            self.set_state(SchedulerState::Running { phase });
            let report = self.run_phase(phase, sessions_per_phase).await;
            let interrupted = report.summary.interrupted;
            phases.push(report);

            if interrupted {
                outcome = RunOutcome::Interrupted;
                break;
            }

            let last = phase + 1 == max_phases;
            if !last && !inter_phase_delay.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        outcome = RunOutcome::Interrupted;
                        break;
                    }
                    _ = tokio::time::sleep(inter_phase_delay) => {}
                }
            }
        }

        self.set_state(match outcome {
            RunOutcome::Completed => SchedulerState::Completed,
            RunOutcome::Interrupted => SchedulerState::Interrupted,
        });

        let report = FinalReport {
            outcome,
            phases_planned: max_phases,
            sessions_per_phase,
            started_at,
            finished_at: Utc::now(),
            phases,
            totals: self.metrics.snapshot(),
            synthesis: self.runner.synthesis().map(|client| client.stats()),
        };

        tracing::info!(
            outcome = ?report.outcome,
            phases = report.phases.len(),
            sessions = report.session_count(),
            interactions = report.totals.total_requests,
            successful = report.totals.successful_requests,
            peak_rate = report.totals.peak_rate_observed,
            "Scheduler finished"
        );

        report
    }

    /// Run with Ctrl+C signal handling
    ///
    /// Ctrl+C cancels the run; the current phase drains and a partial
    /// report is returned.
    pub async fn run_with_signal_handling(
        &self,
        max_phases: u32,
        sessions_per_phase: usize,
        inter_phase_delay: Duration,
    ) -> FinalReport {
        let cancel = self.cancel.clone();

        let signal_handle = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Received Ctrl+C, draining current phase...");
                    cancel.cancel();
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                }
            }
        });

        let report = self
            .run(max_phases, sessions_per_phase, inter_phase_delay)
            .await;

        signal_handle.abort();
        report
    }

    async fn run_phase(&self, phase: u32, sessions: usize) -> PhaseReport {
        let before = self.metrics.snapshot();
        let clock = Instant::now();
        let deadline = self.config.phase_timeout().map(|t| clock + t);
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_sessions));

        tracing::info!(phase, sessions, "Phase starting");

        let mut launched = Vec::with_capacity(sessions);
        for profile in self.profiles.take(sessions) {
            let spec = SessionSpec {
                id: SessionId(self.next_session.fetch_add(1, Ordering::Relaxed)),
                profile,
                target: self.next_target(),
                phase,
                deadline,
            };
            let fallback = (spec.id, spec.profile.name.clone(), spec.target.name.clone());

            let runner = Arc::clone(&self.runner);
            let cancel = self.cancel.clone();
            let semaphore = Arc::clone(&semaphore);
            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                runner.run(spec, &cancel).await
            });
            launched.push((fallback, handle));
        }

        let (fallbacks, handles): (Vec<_>, Vec<_>) = launched.into_iter().unzip();
        let barrier = futures::future::join_all(handles);
        tokio::pin!(barrier);

        // Only a cancellation that lands while sessions are in flight marks the phase
        let (joined, interrupted) = tokio::select! {
            biased;
            joined = &mut barrier => (joined, false),
            _ = self.cancel.cancelled() => {
                self.set_state(SchedulerState::Draining { phase });
                tracing::warn!(phase, "Cancellation requested, draining in-flight sessions");
                (barrier.await, true)
            }
        };

        let results: Vec<SessionResult> = fallbacks
            .into_iter()
            .zip(joined)
            .map(|((id, profile, target), joined)| match joined {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    tracing::warn!(session_id = %id, profile = %profile, error = %e, "Session setup failed");
                    self.record_failure(id, profile, target, phase, e.to_string())
                }
                Err(e) => {
                    tracing::warn!(session_id = %id, error = %e, "Session task failed");
                    self.record_failure(id, profile, target, phase, format!("session task failed: {}", e))
                }
            })
            .collect();

        let summary = PhaseSummary::build(
            phase,
            &results,
            &before,
            &self.metrics.snapshot(),
            clock.elapsed(),
            interrupted,
        );

        if interrupted {
            tracing::warn!(
                phase,
                sessions = summary.sessions,
                interactions = summary.interactions,
                "Phase interrupted"
            );
        } else {
            tracing::info!(
                phase,
                sessions = summary.sessions,
                successful_sessions = summary.successful_sessions,
                interactions = summary.interactions,
                timed_out = summary.timed_out_sessions,
                peak_rate = summary.peak_rate,
                "Phase finished"
            );
        }

        PhaseReport {
            summary,
            sessions: results,
        }
    }

    fn record_failure(
        &self,
        id: SessionId,
        profile: String,
        target: String,
        phase: u32,
        reason: String,
    ) -> SessionResult {
        let result = SessionResult::setup_failed(id, profile, target, phase, reason);
        self.metrics.session_finished(result.clone());
        result
    }

    fn next_target(&self) -> TargetDescriptor {
        let index = self.next_target.fetch_add(1, Ordering::Relaxed) % self.targets.len();
        self.targets[index].clone()
    }

    fn set_state(&self, state: SchedulerState) {
        *self.state.lock() = state;
    }

    /// Current lifecycle state
    pub fn state(&self) -> SchedulerState {
        *self.state.lock()
    }

    /// Token that cancels the run when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Shared metrics
    pub fn metrics(&self) -> &Arc<MetricsAggregator> {
        &self.metrics
    }

    /// Scheduler settings
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }
}

impl std::fmt::Debug for PhaseScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseScheduler")
            .field("state", &self.state())
            .field("config", &self.config)
            .field("targets", &self.targets.len())
            .field("runner", &self.runner)
            .finish()
    }
}
