//! Session execution loop

use super::result::{InteractionRecord, PlanSource, SessionId, SessionOutcome, SessionResult};
use super::throttle::ActionThrottle;
use super::SessionSetupError;
use crate::behavior::{cycle_plan, BehaviorPattern};
use crate::config::{DelayCurve, RateSpec};
use crate::metrics::MetricsAggregator;
use crate::profile::BehaviorProfile;
use crate::synthesis::{BehaviorSynthesisClient, SynthesisRequest};
use crate::target::{ActionSpec, TargetDescriptor};
use crate::traits::{Transport, TransportError};

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// One session to run
#[derive(Debug, Clone)]
pub struct SessionSpec {
    /// Session identifier
    pub id: SessionId,
    /// Profile driving the session
    pub profile: BehaviorProfile,
    /// Target to send actions to
    pub target: TargetDescriptor,
    /// Phase the session belongs to
    pub phase: u32,
    /// Phase deadline; reaching it ends the session as timed out
    pub deadline: Option<Instant>,
}

enum PlanStep {
    Ready(Vec<BehaviorPattern>, PlanSource),
    Interrupted(SessionOutcome),
}

/// Runs single sessions: plan, then delayed actions in order
///
/// A failed action is recorded and the session carries on. Only an
/// unusable profile or a synthesis client without providers stops a
/// session before it starts.
pub struct SessionRunner {
    pub(super) rate: RateSpec,
    pub(super) delays: DelayCurve,
    pub(super) transport: Arc<dyn Transport>,
    pub(super) synthesis: Option<Arc<BehaviorSynthesisClient>>,
    pub(super) metrics: Arc<MetricsAggregator>,
    pub(super) throttle: Arc<ActionThrottle>,
    pub(super) action_timeout: Duration,
    pub(super) max_actions: Option<usize>,
}

impl SessionRunner {
    /// Run one session to completion, cancellation or deadline
    ///
    /// The result is stored in the metrics aggregator before it is returned.
    pub async fn run(
        &self,
        spec: SessionSpec,
        cancel: &CancellationToken,
    ) -> Result<SessionResult, SessionSetupError> {
        spec.profile
            .check()
            .map_err(|reason| SessionSetupError::MalformedProfile {
                profile: spec.profile.name.clone(),
                reason,
            })?;

        let rate = self.rate.compute(spec.phase, spec.profile.exponential_factor);
        let planned =
            RateSpec::planned_actions(rate, spec.profile.session_duration_secs, self.max_actions);
        let clock = Instant::now();

        let mut result = SessionResult {
            session_id: spec.id,
            profile_name: spec.profile.name.clone(),
            target: spec.target.name.clone(),
            phase: spec.phase,
            planned_rate: rate,
            planned_actions: planned,
            plan_source: None,
            started_at: Utc::now(),
            duration_ms: 0.0,
            interactions: Vec::with_capacity(planned),
            outcome: SessionOutcome::Completed,
            succeeded: false,
        };

        let step = self.plan(&spec, rate, planned, cancel).await?;
        self.metrics
            .session_started(spec.id, &spec.profile.name, spec.phase, rate, planned);

        let plan = match step {
            PlanStep::Ready(plan, source) => {
                self.metrics.record_plan(source);
                result.plan_source = Some(source);
                plan
            }
            PlanStep::Interrupted(outcome) => {
                return Ok(self.finish(result, outcome, clock));
            }
        };

        tracing::debug!(
            session_id = %spec.id,
            profile = %spec.profile.name,
            target_name = %spec.target.name,
            phase = spec.phase,
            rate,
            planned,
            source = ?result.plan_source,
            "Session started"
        );

        let delay = self.delays.delay_for(spec.phase, rate);
        let mut outcome = SessionOutcome::Completed;

        for (index, pattern) in plan.iter().enumerate() {
            if cancel.is_cancelled() {
                outcome = SessionOutcome::Cancelled;
                break;
            }
            if let Some(interrupt) = self.pause(delay, spec.deadline, cancel).await {
                outcome = interrupt;
                break;
            }

            let action = ActionSpec::from_pattern(pattern, &spec.target, index);
            let (record, deadline_hit) = self
                .perform(index, &spec.target, &action, delay, spec.deadline)
                .await;
            self.metrics.record_interaction(spec.id, &record);
            result.interactions.push(record);

            if deadline_hit {
                outcome = SessionOutcome::TimedOut;
                break;
            }
        }

        Ok(self.finish(result, outcome, clock))
    }

    /// Obtain the session plan, from synthesis when available
    async fn plan(
        &self,
        spec: &SessionSpec,
        rate: f64,
        planned: usize,
        cancel: &CancellationToken,
    ) -> Result<PlanStep, SessionSetupError> {
        let synthesized = match &self.synthesis {
            Some(client) => {
                let request =
                    SynthesisRequest::for_session(&spec.profile, &spec.target, spec.phase, rate, planned);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return Ok(PlanStep::Interrupted(SessionOutcome::Cancelled));
                    }
                    _ = deadline_reached(spec.deadline) => {
                        return Ok(PlanStep::Interrupted(SessionOutcome::TimedOut));
                    }
                    plan = client.synthesize(&request) => plan?,
                }
            }
            None => Vec::new(),
        };

        if synthesized.is_empty() {
            Ok(PlanStep::Ready(
                spec.profile.static_plan(planned),
                PlanSource::Static,
            ))
        } else {
            Ok(PlanStep::Ready(
                cycle_plan(&synthesized, planned),
                PlanSource::Synthesized,
            ))
        }
    }

    /// Inter-action delay plus the global throttle, cut short by cancel or deadline
    async fn pause(
        &self,
        delay: Duration,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
    ) -> Option<SessionOutcome> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Some(SessionOutcome::Cancelled),
            _ = deadline_reached(deadline) => Some(SessionOutcome::TimedOut),
            _ = async {
                tokio::time::sleep(delay).await;
                self.throttle.wait().await;
            } => None,
        }
    }

    /// Perform one action; the flag reports that the deadline cut it off
    async fn perform(
        &self,
        index: usize,
        target: &TargetDescriptor,
        action: &ActionSpec,
        delay: Duration,
        deadline: Option<Instant>,
    ) -> (InteractionRecord, bool) {
        let url = target.resolve(&action.path);
        let timestamp = Utc::now();
        let start = Instant::now();

        let (outcome, deadline_hit) = tokio::select! {
            biased;
            _ = deadline_reached(deadline) => {
                (Err(TransportError::Other("phase deadline reached".into())), true)
            }
            r = tokio::time::timeout(self.action_timeout, self.transport.perform(target, action)) => {
                let r = r.unwrap_or(Err(TransportError::Timeout(self.action_timeout)));
                (r, false)
            }
        };

        let mut record = InteractionRecord {
            index,
            target: url,
            kind: action.kind,
            action: action.action.clone(),
            status_code: None,
            error: None,
            content_length: 0,
            delay_before_ms: delay.as_millis() as u64,
            latency_ms: start.elapsed().as_secs_f64() * 1000.0,
            timestamp,
        };

        match outcome {
            Ok(o) => {
                record.status_code = Some(o.status_code);
                record.content_length = o.content_length;
                record.latency_ms = o.elapsed.as_secs_f64() * 1000.0;
            }
            Err(e) => {
                tracing::debug!(
                    target_url = %record.target,
                    index,
                    error = %e,
                    "Action failed"
                );
                record.error = Some(e.to_string());
            }
        }

        (record, deadline_hit)
    }

    fn finish(
        &self,
        mut result: SessionResult,
        outcome: SessionOutcome,
        clock: Instant,
    ) -> SessionResult {
        result.finalize(outcome, clock.elapsed());

        match result.outcome {
            SessionOutcome::TimedOut => tracing::warn!(
                session_id = %result.session_id,
                interactions = result.interactions.len(),
                planned = result.planned_actions,
                "Session hit phase deadline"
            ),
            _ => tracing::debug!(
                session_id = %result.session_id,
                outcome = ?result.outcome,
                interactions = result.interactions.len(),
                successful = result.successful_interactions(),
                succeeded = result.succeeded,
                "Session finished"
            ),
        }

        self.metrics.session_finished(result.clone());
        result
    }

    /// Metrics this runner records into
    pub fn metrics(&self) -> &Arc<MetricsAggregator> {
        &self.metrics
    }

    /// Synthesis client, if plans are synthesized
    pub fn synthesis(&self) -> Option<&Arc<BehaviorSynthesisClient>> {
        self.synthesis.as_ref()
    }

    /// Run-wide action throttle
    pub fn throttle(&self) -> &ActionThrottle {
        &self.throttle
    }
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

impl std::fmt::Debug for SessionRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRunner")
            .field("transport", &self.transport.name())
            .field("rate", &self.rate)
            .field("delays", &self.delays)
            .field("synthesis", &self.synthesis.is_some())
            .field("action_timeout", &self.action_timeout)
            .field("max_actions", &self.max_actions)
            .finish()
    }
}
