//! Builder pattern for PhaseScheduler construction

use super::executor::{PhaseScheduler, SchedulerState};
use crate::config::{ConfigError, DelayCurve, RateSpec, RunConfig, SchedulerConfig};
use crate::metrics::MetricsAggregator;
use crate::profile::{default_profiles, BehaviorProfile, ProfileSelector};
use crate::session::{ActionThrottle, SessionRunnerBuilder};
use crate::synthesis::BehaviorSynthesisClient;
use crate::target::TargetDescriptor;
use crate::traits::Transport;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Builder for creating a PhaseScheduler with proper configuration
///
/// # Example
///
/// ```ignore
/// let scheduler = PhaseSchedulerBuilder::from_run_config(&config)
///     .transport(transport)
///     .synthesis(Some(client))
///     .build()?;
///
/// let report = scheduler.run_configured().await;
/// ```
pub struct PhaseSchedulerBuilder {
    config: SchedulerConfig,
    rate: RateSpec,
    delays: DelayCurve,
    profiles: Vec<BehaviorProfile>,
    targets: Vec<TargetDescriptor>,
    transport: Option<Arc<dyn Transport>>,
    synthesis: Option<Arc<BehaviorSynthesisClient>>,
    metrics: Option<Arc<MetricsAggregator>>,
    cancel: Option<CancellationToken>,
}

impl PhaseSchedulerBuilder {
    /// Create a builder with default settings and the built-in profile table
    pub fn new() -> Self {
        Self {
            config: SchedulerConfig::default(),
            rate: RateSpec::default(),
            delays: DelayCurve::default(),
            profiles: default_profiles(),
            targets: Vec::new(),
            transport: None,
            synthesis: None,
            metrics: None,
            cancel: None,
        }
    }

    /// Start from a whole run configuration
    ///
    /// Providers and synthesis settings are not applied here; build the
    /// synthesis client separately and pass it to [`synthesis`](Self::synthesis).
    pub fn from_run_config(config: &RunConfig) -> Self {
        Self::new()
            .config(config.scheduler.clone())
            .rate(config.rate)
            .delays(config.delays)
            .profiles(config.profiles.clone())
            .targets(config.targets.clone())
    }

    /// Set the scheduler settings
    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the rate schedule
    pub fn rate(mut self, rate: RateSpec) -> Self {
        self.rate = rate;
        self
    }

    /// Set the inter-action delay curve
    pub fn delays(mut self, delays: DelayCurve) -> Self {
        self.delays = delays;
        self
    }

    /// Replace the profile table
    pub fn profiles(mut self, profiles: Vec<BehaviorProfile>) -> Self {
        self.profiles = profiles;
        self
    }

    /// Set the targets
    pub fn targets(mut self, targets: Vec<TargetDescriptor>) -> Self {
        self.targets = targets;
        self
    }

    /// Add one target
    pub fn target(mut self, target: TargetDescriptor) -> Self {
        self.targets.push(target);
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

    /// Share an existing metrics aggregator
    pub fn metrics(mut self, metrics: Arc<MetricsAggregator>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Use an external cancellation token
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Build the scheduler
    ///
    /// # Errors
    /// Returns an error if the transport is missing, the profile table or
    /// target list is empty, a synthesis client has no providers, or any
    /// setting is invalid.
    pub fn build(self) -> Result<PhaseScheduler, ConfigError> {
        self.config.validate()?;
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        for target in &self.targets {
            target.validate()?;
        }

        if let Some(client) = &self.synthesis {
            if client.providers().is_empty() {
                return Err(ConfigError::NoProviders);
            }
        }

        let profiles = ProfileSelector::new(self.profiles, self.config.profile_selection)
            .ok_or(ConfigError::EmptyProfileTable)?;
        let transport = self.transport.ok_or(ConfigError::missing("transport"))?;
        let metrics = self
            .metrics
            .unwrap_or_else(|| Arc::new(MetricsAggregator::new()));
        let throttle = Arc::new(ActionThrottle::new(self.config.max_actions_per_second));

        let runner = SessionRunnerBuilder::new()
            .rate(self.rate)
            .delays(self.delays)
            .transport(transport)
            .synthesis(self.synthesis)
            .metrics(Arc::clone(&metrics))
            .throttle(throttle)
            .action_timeout(self.config.action_timeout())
            .max_actions(self.config.max_actions_per_session)
            .build()?;

        Ok(PhaseScheduler {
            config: self.config,
            runner: Arc::new(runner),
            profiles,
            targets: self.targets,
            metrics,
            cancel: self.cancel.unwrap_or_default(),
            state: Mutex::new(SchedulerState::Idle),
            next_session: AtomicU64::new(0),
            next_target: AtomicUsize::new(0),
        })
    }
}

impl Default for PhaseSchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
