//! Builder pattern for SessionRunner construction

use super::runner::SessionRunner;
use super::throttle::ActionThrottle;
use crate::config::{ConfigError, DelayCurve, RateSpec};
use crate::metrics::MetricsAggregator;
use crate::synthesis::BehaviorSynthesisClient;
use crate::traits::Transport;

use std::sync::Arc;
use std::time::Duration;

/// Builder for [`SessionRunner`]
///
/// # Example
/// ```ignore
/// let runner = SessionRunnerBuilder::new()
///     .transport(transport)
///     .metrics(metrics)
///     .rate(RateSpec::default())
///     .delays(DelayCurve::default())
///     .synthesis(Some(client))
///     .build()?;
/// ```
#[derive(Default)]
pub struct SessionRunnerBuilder {
    rate: Option<RateSpec>,
    delays: Option<DelayCurve>,
    transport: Option<Arc<dyn Transport>>,
    synthesis: Option<Arc<BehaviorSynthesisClient>>,
    metrics: Option<Arc<MetricsAggregator>>,
    throttle: Option<Arc<ActionThrottle>>,
    action_timeout: Option<Duration>,
    max_actions: Option<usize>,
}

impl SessionRunnerBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rate schedule
    pub fn rate(mut self, rate: RateSpec) -> Self {
        self.rate = Some(rate);
        self
    }

    /// Set the inter-action delay curve
    pub fn delays(mut self, delays: DelayCurve) -> Self {
        self.delays = Some(delays);
        self
    }

    /// Set the transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the synthesis client; `None` runs on static plans
    pub fn synthesis(mut self, client: Option<Arc<BehaviorSynthesisClient>>) -> Self {
        self.synthesis = client;
        self
    }

    /// Set the shared metrics aggregator
    pub fn metrics(mut self, metrics: Arc<MetricsAggregator>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Set the shared action throttle
    pub fn throttle(mut self, throttle: Arc<ActionThrottle>) -> Self {
        self.throttle = Some(throttle);
        self
    }

    /// Set the per-action timeout
    pub fn action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = Some(timeout);
        self
    }

    /// Cap planned actions per session
    pub fn max_actions(mut self, cap: Option<usize>) -> Self {
        self.max_actions = cap;
        self
    }

    /// Build the runner
    ///
    /// # Errors
    /// Returns an error if the transport or metrics are missing, or if the
    /// rate schedule or delay curve is invalid.
    pub fn build(self) -> Result<SessionRunner, ConfigError> {
        let transport = self.transport.ok_or(ConfigError::missing("transport"))?;
        let metrics = self.metrics.ok_or(ConfigError::missing("metrics"))?;

        let rate = self.rate.unwrap_or_default();
        rate.validate()?;
        let delays = self.delays.unwrap_or_default();
        delays.validate()?;

        let action_timeout = self.action_timeout.unwrap_or(Duration::from_secs(30));
        if action_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(0.0));
        }
        if self.max_actions == Some(0) {
            return Err(ConfigError::InvalidSessionCap(
                "max_actions_per_session must be at least 1".into(),
            ));
        }

        Ok(SessionRunner {
            rate,
            delays,
            transport,
            synthesis: self.synthesis,
            metrics,
            throttle: self.throttle.unwrap_or_default(),
            action_timeout,
            max_actions: self.max_actions,
        })
    }
}
