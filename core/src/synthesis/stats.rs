//! Counters kept by the synthesis client

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Live synthesis counters
#[derive(Debug, Default)]
pub struct SynthesisStats {
    requests: AtomicU64,
    attempts: AtomicU64,
    plans_served: AtomicU64,
    provider_failures: AtomicU64,
    admission_denials: AtomicU64,
    fallbacks: AtomicU64,
    exhausted: AtomicU64,
}

impl SynthesisStats {
    pub(crate) fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_plan(&self) {
        self.plans_served.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.provider_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_denial(&self) {
        self.admission_denials.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy
    pub fn snapshot(&self) -> SynthesisStatsSnapshot {
        SynthesisStatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            plans_served: self.plans_served.load(Ordering::Relaxed),
            provider_failures: self.provider_failures.load(Ordering::Relaxed),
            admission_denials: self.admission_denials.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
        }
    }
}

/// Synthesis counters at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisStatsSnapshot {
    /// Calls to `synthesize`
    pub requests: u64,
    /// Provider calls issued, retries included
    pub attempts: u64,
    /// Calls that returned a non-empty plan
    pub plans_served: u64,
    /// Failed provider calls, parse failures included
    pub provider_failures: u64,
    /// Times a provider stayed over its rate limit after all admission checks
    pub admission_denials: u64,
    /// Cursor advances to the next provider
    pub fallbacks: u64,
    /// Calls that found every provider exhausted
    pub exhausted: u64,
}
