//! Session and interaction records

use crate::behavior::BehaviorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Identifier of one session, unique within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

impl From<u64> for SessionId {
    fn from(id: u64) -> Self {
        SessionId(id)
    }
}

/// Where a session's plan came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    /// Behavior synthesis returned a plan
    Synthesized,
    /// The profile's interaction patterns
    Static,
}

impl PlanSource {
    /// Short label for logs and exports
    pub fn label(&self) -> &'static str {
        match self {
            PlanSource::Synthesized => "synthesized",
            PlanSource::Static => "static",
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Every planned action was attempted
    Completed,
    /// Stopped early by the run's cancellation signal
    Cancelled,
    /// Cut off by the phase deadline
    TimedOut,
    /// Never started
    SetupFailed {
        /// Why setup failed
        reason: String,
    },
}

impl SessionOutcome {
    /// Short label for logs and exports
    pub fn label(&self) -> &'static str {
        match self {
            SessionOutcome::Completed => "completed",
            SessionOutcome::Cancelled => "cancelled",
            SessionOutcome::TimedOut => "timed_out",
            SessionOutcome::SetupFailed { .. } => "setup_failed",
        }
    }
}

/// One attempted action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// Position in the session plan
    pub index: usize,
    /// Resolved URL the action was sent to
    pub target: String,
    /// Behavior category
    pub kind: BehaviorKind,
    /// Action description
    pub action: String,
    /// Status returned by the target, when it answered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Transport error, when it did not
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Response body length in bytes
    pub content_length: usize,
    /// Delay waited before the action, in milliseconds
    pub delay_before_ms: u64,
    /// Time the action took, in milliseconds
    pub latency_ms: f64,
    /// When the action started
    pub timestamp: DateTime<Utc>,
}

impl InteractionRecord {
    /// True when the target answered with a status below 400
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.status_code.is_some_and(|status| status < 400)
    }
}

/// Everything one session did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    /// Session identifier
    pub session_id: SessionId,
    /// Profile that drove the session
    pub profile_name: String,
    /// Target name
    pub target: String,
    /// Phase the session ran in
    pub phase: u32,
    /// Planned rate in requests per minute
    pub planned_rate: f64,
    /// Planned action count
    pub planned_actions: usize,
    /// Plan origin; absent when setup failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_source: Option<PlanSource>,
    /// When the session started
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: f64,
    /// Attempted actions, in plan order
    pub interactions: Vec<InteractionRecord>,
    /// How the session ended
    pub outcome: SessionOutcome,
    /// Overall verdict
    pub succeeded: bool,
}

impl SessionResult {
    /// Result for a session that could not be set up
    pub fn setup_failed(
        session_id: SessionId,
        profile_name: impl Into<String>,
        target: impl Into<String>,
        phase: u32,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            session_id,
            profile_name: profile_name.into(),
            target: target.into(),
            phase,
            planned_rate: 0.0,
            planned_actions: 0,
            plan_source: None,
            started_at: Utc::now(),
            duration_ms: 0.0,
            interactions: Vec::new(),
            outcome: SessionOutcome::SetupFailed {
                reason: reason.into(),
            },
            succeeded: false,
        }
    }

    /// Settle `outcome`, `duration_ms` and `succeeded`
    ///
    /// Completed and cancelled sessions succeed when at least one action
    /// succeeded; a completed session with nothing planned succeeds
    /// vacuously. Timed-out and setup-failed sessions never succeed.
    pub(crate) fn finalize(&mut self, outcome: SessionOutcome, duration: Duration) {
        self.succeeded = match outcome {
            SessionOutcome::Completed if self.planned_actions == 0 => true,
            SessionOutcome::Completed | SessionOutcome::Cancelled => {
                self.interactions.iter().any(InteractionRecord::succeeded)
            }
            SessionOutcome::TimedOut | SessionOutcome::SetupFailed { .. } => false,
        };
        self.outcome = outcome;
        self.duration_ms = duration.as_secs_f64() * 1000.0;
    }

    /// Successful interactions
    pub fn successful_interactions(&self) -> usize {
        self.interactions.iter().filter(|i| i.succeeded()).count()
    }

    /// Failed interactions
    pub fn failed_interactions(&self) -> usize {
        self.interactions.len() - self.successful_interactions()
    }

    /// Wall-clock duration
    pub fn duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.duration_ms / 1000.0).unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: Option<u16>, error: Option<&str>) -> InteractionRecord {
        InteractionRecord {
            index: 0,
            target: "http://t".into(),
            kind: BehaviorKind::Browsing,
            action: "browse".into(),
            status_code: status,
            error: error.map(String::from),
            content_length: 0,
            delay_before_ms: 0,
            latency_ms: 1.0,
            timestamp: Utc::now(),
        }
    }

    fn result(planned: usize, interactions: Vec<InteractionRecord>) -> SessionResult {
        let mut r = SessionResult::setup_failed(SessionId(1), "p", "t", 0, "");
        r.planned_actions = planned;
        r.interactions = interactions;
        r
    }

    #[test]
    fn test_interaction_success_threshold() {
        assert!(record(Some(200), None).succeeded());
        assert!(record(Some(399), None).succeeded());
        assert!(!record(Some(400), None).succeeded());
        assert!(!record(None, Some("refused")).succeeded());
    }

    #[test]
    fn test_finalize_requires_one_success() {
        let mut r = result(2, vec![record(Some(500), None), record(Some(200), None)]);
        r.finalize(SessionOutcome::Completed, Duration::from_millis(1500));
        assert!(r.succeeded);
        assert_eq!(r.duration_ms, 1500.0);
        assert_eq!(r.successful_interactions(), 1);
        assert_eq!(r.failed_interactions(), 1);

        let mut r = result(2, vec![record(Some(500), None), record(None, Some("x"))]);
        r.finalize(SessionOutcome::Completed, Duration::ZERO);
        assert!(!r.succeeded);
    }

    #[test]
    fn test_finalize_vacuous_and_cut_off() {
        let mut r = result(0, Vec::new());
        r.finalize(SessionOutcome::Completed, Duration::ZERO);
        assert!(r.succeeded);

        let mut r = result(3, Vec::new());
        r.finalize(SessionOutcome::Cancelled, Duration::ZERO);
        assert!(!r.succeeded);

        let mut r = result(3, vec![record(Some(200), None)]);
        r.finalize(SessionOutcome::TimedOut, Duration::ZERO);
        assert!(!r.succeeded);
        assert_eq!(r.interactions.len(), 1);
    }

    #[test]
    fn test_setup_failed_result() {
        let r = SessionResult::setup_failed(SessionId(7), "gamer", "local", 2, "bad profile");
        assert!(!r.succeeded);
        assert!(r.plan_source.is_none());
        assert!(matches!(r.outcome, SessionOutcome::SetupFailed { ref reason } if reason == "bad profile"));
        assert_eq!(r.session_id.to_string(), "session-7");
    }
}
