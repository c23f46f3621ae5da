//! Run configuration types
//!
//! Everything here is plain data loaded once at startup. The core never
//! mutates configuration after a run starts. Durations are expressed as
//! fractional seconds so configuration files stay readable.

use crate::profile::{default_profiles, BehaviorProfile};
use crate::provider::ProviderDescriptor;
use crate::target::TargetDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Convert fractional seconds to a `Duration`, clamping invalid input to zero
pub(crate) fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

// ============================================================================
// Rate schedule
// ============================================================================

/// Exponential rate schedule shared by all phases
///
/// The rate for phase `p` and profile factor `f` is
/// `min(base_rate * f * growth_factor^p, max_rate)` requests per minute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateSpec {
    /// Requests per minute at phase 0 for a profile factor of 1.0
    pub base_rate: f64,
    /// Multiplier applied per phase (> 1.0)
    pub growth_factor: f64,
    /// Upper bound on the computed rate
    pub max_rate: f64,
}

impl Default for RateSpec {
    fn default() -> Self {
        Self {
            base_rate: 10.0,
            growth_factor: 1.5,
            max_rate: 1000.0,
        }
    }
}

impl RateSpec {
    /// Create a new rate spec
    pub fn new(base_rate: f64, growth_factor: f64, max_rate: f64) -> Self {
        Self {
            base_rate,
            growth_factor,
            max_rate,
        }
    }

    /// Requests per minute for `phase` and `profile_factor`
    ///
    /// Pure: identical inputs always produce identical outputs.
    pub fn compute(&self, phase: u32, profile_factor: f64) -> f64 {
        let rate = self.base_rate * profile_factor * self.growth_factor.powf(f64::from(phase));
        if rate.is_nan() {
            return 0.0;
        }
        rate.min(self.max_rate)
    }

    /// Number of actions a session of `duration_secs` performs at `rate` rpm
    ///
    /// Always at least 1; `cap` bounds the result from above.
    pub fn planned_actions(rate: f64, duration_secs: u64, cap: Option<usize>) -> usize {
        let raw = (rate / 60.0 * duration_secs as f64).floor();
        let planned = if raw.is_finite() && raw >= 1.0 {
            raw as usize
        } else {
            1
        };
        match cap {
            Some(cap) => planned.min(cap.max(1)),
            None => planned,
        }
    }

    /// Validate the rate bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_rate.is_finite() || self.base_rate <= 0.0 {
            return Err(ConfigError::InvalidRateBounds {
                base: self.base_rate,
                max: self.max_rate,
            });
        }
        if !self.max_rate.is_finite() || self.max_rate < self.base_rate {
            return Err(ConfigError::InvalidRateBounds {
                base: self.base_rate,
                max: self.max_rate,
            });
        }
        if !self.growth_factor.is_finite() || self.growth_factor <= 1.0 {
            return Err(ConfigError::InvalidGrowthFactor(self.growth_factor));
        }
        Ok(())
    }
}

// ============================================================================
// Inter-action delay curve
// ============================================================================

/// Inter-action delay as a function of phase
///
/// `delay = min + (max - min) * (1 - e^(-decay * phase))`. With
/// `rate_anchored` set, the bounds follow the session rate: `base = 60 / rate`,
/// `min = max(min_delay_secs, base / 2)`, `max = max(min, base * 2)`, so the
/// faster sessions of later phases pause for less.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayCurve {
    /// Lower bound in seconds
    pub min_delay_secs: f64,
    /// Upper bound in seconds
    pub max_delay_secs: f64,
    /// Decay constant `k`
    pub decay: f64,
    /// Derive the bounds from the session rate instead of the fixed values
    #[serde(default)]
    pub rate_anchored: bool,
}

impl Default for DelayCurve {
    fn default() -> Self {
        Self {
            min_delay_secs: 0.5,
            max_delay_secs: 3.0,
            decay: 0.5,
            rate_anchored: false,
        }
    }
}

impl DelayCurve {
    /// Create a new delay curve
    pub fn new(min_delay_secs: f64, max_delay_secs: f64, decay: f64) -> Self {
        Self {
            min_delay_secs,
            max_delay_secs,
            decay,
            rate_anchored: false,
        }
    }

    /// Anchor the bounds to the session rate
    pub fn with_rate_anchor(mut self, anchored: bool) -> Self {
        self.rate_anchored = anchored;
        self
    }

    /// A curve that never waits (useful for tests and dry runs)
    pub fn none() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Delay bounds for a session running at `rate` requests per minute
    pub fn bounds(&self, rate: f64) -> (f64, f64) {
        if self.rate_anchored && rate.is_finite() && rate > 0.0 {
            let base = 60.0 / rate;
            let min = self.min_delay_secs.max(base * 0.5);
            (min, min.max(base * 2.0))
        } else {
            (self.min_delay_secs, self.max_delay_secs)
        }
    }

    /// Delay before each action of a session in `phase` running at `rate`
    pub fn delay_for(&self, phase: u32, rate: f64) -> Duration {
        let (min, max) = self.bounds(rate);
        let factor = 1.0 - (-self.decay * f64::from(phase)).exp();
        secs(min + (max - min) * factor)
    }

    /// Validate the curve
    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite = self.min_delay_secs.is_finite()
            && self.max_delay_secs.is_finite()
            && self.decay.is_finite();
        if !finite
            || self.min_delay_secs < 0.0
            || self.max_delay_secs < self.min_delay_secs
            || self.decay < 0.0
        {
            return Err(ConfigError::InvalidDelayBounds {
                min: self.min_delay_secs,
                max: self.max_delay_secs,
            });
        }
        Ok(())
    }
}

// ============================================================================
// Behavior synthesis
// ============================================================================

/// Settings for the behavior synthesis client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Patterns below this confidence are dropped
    pub confidence_threshold: f64,
    /// Retries on the same provider after the first attempt
    pub max_retries: u32,
    /// Base of the exponential backoff, in seconds
    pub retry_base_delay_secs: f64,
    /// Backoff cap, in seconds
    pub max_backoff_secs: f64,
    /// How many times a denied rate-limit admission is re-checked
    pub admission_retries: u32,
    /// Wait between admission checks; `None` waits one full window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admission_wait_secs: Option<f64>,
    /// Upper bound on patterns requested per call
    pub max_patterns_per_request: usize,
    /// Sampling temperature forwarded to providers
    pub temperature: f64,
    /// Token budget forwarded to providers
    pub max_tokens: u32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            max_retries: 3,
            retry_base_delay_secs: 1.0,
            max_backoff_secs: 30.0,
            admission_retries: 3,
            admission_wait_secs: None,
            max_patterns_per_request: 10,
            temperature: 0.7,
            max_tokens: 1000,
        }
    }
}

impl SynthesisConfig {
    /// Set the confidence threshold
    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Set the retry count
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the backoff base and cap
    pub fn with_backoff(mut self, base_secs: f64, max_secs: f64) -> Self {
        self.retry_base_delay_secs = base_secs;
        self.max_backoff_secs = max_secs;
        self
    }

    /// Set the admission retry policy
    pub fn with_admission(mut self, retries: u32, wait_secs: Option<f64>) -> Self {
        self.admission_retries = retries;
        self.admission_wait_secs = wait_secs;
        self
    }

    /// Backoff before retry number `attempt` (0-based): `base * 2^attempt`, capped
    pub fn backoff(&self, attempt: u32) -> Duration {
        let raw = self.retry_base_delay_secs * 2f64.powi(attempt.min(31) as i32);
        secs(raw.min(self.max_backoff_secs))
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::InvalidThreshold(self.confidence_threshold));
        }
        if self.max_patterns_per_request == 0 {
            return Err(ConfigError::InvalidSessionCap(
                "max_patterns_per_request must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// How profiles are assigned to sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ProfileSelection {
    /// Cycle through the profile table in order
    #[default]
    RoundRobin,
    /// Draw uniformly at random from a seeded generator
    Random {
        /// Seed for reproducible draws
        seed: u64,
    },
}

/// Phase scheduler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of phases to run
    pub max_phases: u32,
    /// Sessions launched per phase
    pub sessions_per_phase: usize,
    /// Pause between phases, in seconds
    pub inter_phase_delay_secs: f64,
    /// Upper bound on sessions running at the same time
    pub max_concurrent_sessions: usize,
    /// Phase-level deadline, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_timeout_secs: Option<f64>,
    /// Timeout for a single transport action, in seconds
    pub action_timeout_secs: f64,
    /// Cap on planned actions per session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_actions_per_session: Option<usize>,
    /// Aggregate cap on actions per second across all sessions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_actions_per_second: Option<f64>,
    /// Profile assignment strategy
    pub profile_selection: ProfileSelection,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_phases: 5,
            sessions_per_phase: 4,
            inter_phase_delay_secs: 30.0,
            max_concurrent_sessions: 10,
            phase_timeout_secs: None,
            action_timeout_secs: 30.0,
            max_actions_per_session: None,
            max_actions_per_second: None,
            profile_selection: ProfileSelection::RoundRobin,
        }
    }
}

impl SchedulerConfig {
    /// Set the phase plan
    pub fn with_phases(mut self, max_phases: u32, sessions_per_phase: usize) -> Self {
        self.max_phases = max_phases;
        self.sessions_per_phase = sessions_per_phase;
        self
    }

    /// Set the concurrency bound
    pub fn with_max_concurrent_sessions(mut self, n: usize) -> Self {
        self.max_concurrent_sessions = n;
        self
    }

    /// Set the phase deadline
    pub fn with_phase_timeout(mut self, secs: f64) -> Self {
        self.phase_timeout_secs = Some(secs);
        self
    }

    /// Set the per-action timeout
    pub fn with_action_timeout(mut self, secs: f64) -> Self {
        self.action_timeout_secs = secs;
        self
    }

    /// Cap planned actions per session
    pub fn with_max_actions_per_session(mut self, cap: usize) -> Self {
        self.max_actions_per_session = Some(cap);
        self
    }

    /// Cap aggregate actions per second
    pub fn with_max_actions_per_second(mut self, rps: f64) -> Self {
        self.max_actions_per_second = Some(rps);
        self
    }

    /// Set the profile selection strategy
    pub fn with_profile_selection(mut self, selection: ProfileSelection) -> Self {
        self.profile_selection = selection;
        self
    }

    /// Pause between phases
    pub fn inter_phase_delay(&self) -> Duration {
        secs(self.inter_phase_delay_secs)
    }

    /// Phase deadline, if any
    pub fn phase_timeout(&self) -> Option<Duration> {
        self.phase_timeout_secs.map(secs)
    }

    /// Timeout for one action
    pub fn action_timeout(&self) -> Duration {
        secs(self.action_timeout_secs)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_sessions == 0 {
            return Err(ConfigError::InvalidConcurrency(
                "max_concurrent_sessions must be at least 1".into(),
            ));
        }
        if self.max_actions_per_session == Some(0) {
            return Err(ConfigError::InvalidSessionCap(
                "max_actions_per_session must be at least 1".into(),
            ));
        }
        if let Some(rps) = self.max_actions_per_second {
            if !rps.is_finite() || rps <= 0.0 {
                return Err(ConfigError::InvalidConcurrency(
                    "max_actions_per_second must be positive".into(),
                ));
            }
        }
        if !self.action_timeout_secs.is_finite() || self.action_timeout_secs <= 0.0 {
            return Err(ConfigError::InvalidTimeout(self.action_timeout_secs));
        }
        if let Some(t) = self.phase_timeout_secs {
            if !t.is_finite() || t <= 0.0 {
                return Err(ConfigError::InvalidTimeout(t));
            }
        }
        if !self.inter_phase_delay_secs.is_finite() || self.inter_phase_delay_secs < 0.0 {
            return Err(ConfigError::InvalidTimeout(self.inter_phase_delay_secs));
        }
        Ok(())
    }
}

// ============================================================================
// Whole-run configuration
// ============================================================================

/// Everything a driver needs to assemble a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Rate schedule
    #[serde(default)]
    pub rate: RateSpec,
    /// Inter-action delay curve
    #[serde(default)]
    pub delays: DelayCurve,
    /// Synthesis settings; `None` runs on static profile plans only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthesis: Option<SynthesisConfig>,
    /// Providers in fallback order
    #[serde(default)]
    pub providers: Vec<ProviderDescriptor>,
    /// Behavior profile table
    #[serde(default = "default_profiles")]
    pub profiles: Vec<BehaviorProfile>,
    /// Target endpoints
    pub targets: Vec<TargetDescriptor>,
}

impl RunConfig {
    /// Parse a configuration from JSON text
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rate.validate()?;
        self.delays.validate()?;
        self.scheduler.validate()?;
        if self.profiles.is_empty() {
            return Err(ConfigError::EmptyProfileTable);
        }
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        for target in &self.targets {
            target.validate()?;
        }
        if let Some(synthesis) = &self.synthesis {
            synthesis.validate()?;
            validate_providers(&self.providers)?;
        }
        Ok(())
    }
}

/// Check a provider list is non-empty with unique, well-formed entries
pub fn validate_providers(providers: &[ProviderDescriptor]) -> Result<(), ConfigError> {
    if providers.is_empty() {
        return Err(ConfigError::NoProviders);
    }
    let mut seen = HashSet::new();
    for provider in providers {
        provider.validate()?;
        if !seen.insert(provider.id.as_str()) {
            return Err(ConfigError::DuplicateProvider(provider.id.clone()));
        }
    }
    Ok(())
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Synthesis requested but no AI providers are configured
    #[error("no AI providers configured")]
    NoProviders,

    /// Two providers share an identifier
    #[error("duplicate provider id: {0}")]
    DuplicateProvider(String),

    /// A provider descriptor is unusable
    #[error("invalid provider {id}: {reason}")]
    InvalidProvider {
        /// Provider identifier
        id: String,
        /// What is wrong with it
        reason: String,
    },

    /// The behavior profile table is empty
    #[error("behavior profile table is empty")]
    EmptyProfileTable,

    /// No targets to send traffic to
    #[error("no target endpoints configured")]
    NoTargets,

    /// A target descriptor is unusable
    #[error("invalid target {name}: {reason}")]
    InvalidTarget {
        /// Target name
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// `max_rate < base_rate` or a non-positive base rate
    #[error("invalid rate bounds: base {base} rpm, max {max} rpm")]
    InvalidRateBounds {
        /// Configured base rate
        base: f64,
        /// Configured maximum rate
        max: f64,
    },

    /// Growth factor must exceed 1.0
    #[error("growth factor must be greater than 1.0, got {0}")]
    InvalidGrowthFactor(f64),

    /// Delay bounds are negative or inverted
    #[error("invalid delay bounds: min {min}s, max {max}s")]
    InvalidDelayBounds {
        /// Configured minimum
        min: f64,
        /// Configured maximum
        max: f64,
    },

    /// Confidence threshold outside [0, 1]
    #[error("confidence threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),

    /// Invalid concurrency setting
    #[error("invalid concurrency: {0}")]
    InvalidConcurrency(String),

    /// Invalid per-session cap
    #[error("invalid session cap: {0}")]
    InvalidSessionCap(String),

    /// Timeout or delay is negative or not finite
    #[error("invalid timeout: {0}s")]
    InvalidTimeout(f64),

    /// Configuration text could not be parsed
    #[error("could not parse configuration: {0}")]
    Parse(String),

    /// A builder was finished without a required component
    #[error("missing required component: {0}")]
    MissingComponent(&'static str),
}

impl ConfigError {
    /// Create a missing-component error
    pub fn missing(component: &'static str) -> Self {
        ConfigError::MissingComponent(component)
    }
}
