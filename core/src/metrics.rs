//! Shared run metrics and latency percentiles
//!
//! One [`MetricsAggregator`] is created per run and handed to every
//! component that records into it. Counters are atomics; the latency
//! histogram and the per-session tables sit behind short-lived locks that
//! are never held across an await point.

use crate::session::{InteractionRecord, PlanSource, SessionId, SessionResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Latency percentiles (all values in milliseconds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct LatencyPercentiles {
    /// Minimum value
    pub min: f64,
    /// 50th percentile (median)
    pub p50: f64,
    /// 90th percentile
    pub p90: f64,
    /// 95th percentile
    pub p95: f64,
    /// 99th percentile
    pub p99: f64,
    /// Maximum value
    pub max: f64,
    /// Mean value
    pub mean: f64,
}

impl LatencyPercentiles {
    /// Calculate percentiles from a slice of values
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let mut sorted: Vec<f64> = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let len = sorted.len();
        Self {
            min: sorted[0],
            p50: percentile(&sorted, 0.50),
            p90: percentile(&sorted, 0.90),
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
            max: sorted[len - 1],
            mean: sorted.iter().sum::<f64>() / len as f64,
        }
    }
}

/// Calculate percentile from sorted values using linear interpolation
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let idx = p * (sorted.len() - 1) as f64;
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    let frac = idx - lower as f64;

    if upper >= sorted.len() {
        sorted[sorted.len() - 1]
    } else {
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

/// HDR histogram of action latencies, microsecond precision up to one hour
pub struct LatencyHistogram {
    histogram: Option<hdrhistogram::Histogram<u64>>,
}

impl LatencyHistogram {
    const MAX_MICROS: u64 = 3_600_000_000;

    /// Create an empty histogram
    pub fn new() -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, Self::MAX_MICROS, 3).ok();
        Self { histogram }
    }

    /// Record a duration; values beyond one hour are clamped
    pub fn record(&mut self, duration: Duration) {
        let micros = (duration.as_micros() as u64).clamp(1, Self::MAX_MICROS);
        if let Some(h) = self.histogram.as_mut() {
            let _ = h.record(micros);
        }
    }

    /// Record a value in milliseconds
    pub fn record_ms(&mut self, ms: f64) {
        self.record(Duration::try_from_secs_f64(ms / 1000.0).unwrap_or(Duration::ZERO));
    }

    /// Get the number of recorded values
    pub fn len(&self) -> u64 {
        self.histogram.as_ref().map_or(0, |h| h.len())
    }

    /// Check if the histogram is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calculate percentiles from the histogram
    pub fn percentiles(&self) -> LatencyPercentiles {
        let Some(h) = self.histogram.as_ref().filter(|h| !h.is_empty()) else {
            return LatencyPercentiles::default();
        };

        LatencyPercentiles {
            min: h.min() as f64 / 1000.0,
            p50: h.value_at_quantile(0.50) as f64 / 1000.0,
            p90: h.value_at_quantile(0.90) as f64 / 1000.0,
            p95: h.value_at_quantile(0.95) as f64 / 1000.0,
            p99: h.value_at_quantile(0.99) as f64 / 1000.0,
            max: h.max() as f64 / 1000.0,
            mean: h.mean() / 1000.0,
        }
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LatencyHistogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencyHistogram")
            .field("len", &self.len())
            .finish()
    }
}

/// Live counters of one running session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCounters {
    /// Profile driving the session
    pub profile_name: String,
    /// Phase the session runs in
    pub phase: u32,
    /// Planned action count
    pub planned_actions: usize,
    /// Actions attempted so far
    pub completed_actions: usize,
    /// Successful actions so far
    pub successful: usize,
    /// Failed actions so far
    pub failed: usize,
    /// Response bytes received so far
    pub bytes_received: u64,
    /// When the session started
    pub started_at: DateTime<Utc>,
}

/// Point-in-time copy of the run counters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregateMetrics {
    /// Actions attempted
    pub total_requests: u64,
    /// Actions with a status below 400
    pub successful_requests: u64,
    /// Actions that errored or returned 400 and above
    pub failed_requests: u64,
    /// Highest planned rate seen, in requests per minute
    pub peak_rate_observed: f64,
    /// Finished sessions, setup failures included
    pub session_count: u64,
    /// Finished sessions that succeeded
    pub successful_sessions: u64,
    /// Sessions currently running
    pub active_sessions: u64,
    /// Sessions whose plan came from synthesis
    pub synthesized_plans: u64,
    /// Sessions that used the static profile plan
    pub static_plans: u64,
    /// Response bytes received
    pub bytes_received: u64,
    /// Mean action latency in milliseconds
    pub average_latency_ms: f64,
    /// Action latency percentiles
    pub latency: LatencyPercentiles,
}

impl AggregateMetrics {
    /// Fraction of actions that succeeded, 0 when none ran
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        }
    }
}

/// Concurrency-safe metrics shared by every session of a run
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    session_count: AtomicU64,
    successful_sessions: AtomicU64,
    active_sessions: AtomicU64,
    synthesized_plans: AtomicU64,
    static_plans: AtomicU64,
    bytes_received: AtomicU64,
    total_latency_us: AtomicU64,
    peak_rate_bits: AtomicU64,
    latency: Mutex<LatencyHistogram>,
    live: Mutex<HashMap<SessionId, SessionCounters>>,
    finished: Mutex<Vec<SessionResult>>,
}

impl MetricsAggregator {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session that is about to run
    pub fn session_started(
        &self,
        id: SessionId,
        profile_name: &str,
        phase: u32,
        planned_rate: f64,
        planned_actions: usize,
    ) {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
        self.observe_rate(planned_rate);
        self.live.lock().insert(
            id,
            SessionCounters {
                profile_name: profile_name.to_string(),
                phase,
                planned_actions,
                completed_actions: 0,
                successful: 0,
                failed: 0,
                bytes_received: 0,
                started_at: Utc::now(),
            },
        );
    }

    /// Count where a session's plan came from
    pub fn record_plan(&self, source: PlanSource) {
        match source {
            PlanSource::Synthesized => self.synthesized_plans.fetch_add(1, Ordering::Relaxed),
            PlanSource::Static => self.static_plans.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Record one attempted action
    pub fn record_interaction(&self, id: SessionId, record: &InteractionRecord) {
        let ok = record.succeeded();
        let bytes = record.content_length as u64;

        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if ok {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
        self.total_latency_us
            .fetch_add((record.latency_ms * 1000.0) as u64, Ordering::Relaxed);
        self.latency.lock().record_ms(record.latency_ms);

        if let Some(counters) = self.live.lock().get_mut(&id) {
            counters.completed_actions += 1;
            counters.bytes_received += bytes;
            if ok {
                counters.successful += 1;
            } else {
                counters.failed += 1;
            }
        }
    }

    /// Raise the peak rate if `rate` exceeds it
    pub fn observe_rate(&self, rate: f64) {
        if !rate.is_finite() {
            return;
        }
        let mut current = self.peak_rate_bits.load(Ordering::Relaxed);
        while rate > f64::from_bits(current) {
            match self.peak_rate_bits.compare_exchange_weak(
                current,
                rate.to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    /// Store a finished session
    ///
    /// Sessions that never registered (setup failures) are counted too.
    pub fn session_finished(&self, result: SessionResult) {
        if self.live.lock().remove(&result.session_id).is_some() {
            self.active_sessions.fetch_sub(1, Ordering::Relaxed);
        }
        self.session_count.fetch_add(1, Ordering::Relaxed);
        if result.succeeded {
            self.successful_sessions.fetch_add(1, Ordering::Relaxed);
        }
        self.finished.lock().push(result);
    }

    /// Live counters of a running session
    pub fn session(&self, id: SessionId) -> Option<SessionCounters> {
        self.live.lock().get(&id).cloned()
    }

    /// Finished sessions, in finish order
    pub fn results(&self) -> Vec<SessionResult> {
        self.finished.lock().clone()
    }

    /// Action latency percentiles
    pub fn latency_percentiles(&self) -> LatencyPercentiles {
        self.latency.lock().percentiles()
    }

    /// Current counters
    pub fn snapshot(&self) -> AggregateMetrics {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let total_latency_us = self.total_latency_us.load(Ordering::Relaxed);
        let average_latency_ms = if total_requests == 0 {
            0.0
        } else {
            total_latency_us as f64 / total_requests as f64 / 1000.0
        };

        AggregateMetrics {
            total_requests,
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            peak_rate_observed: f64::from_bits(self.peak_rate_bits.load(Ordering::Relaxed)),
            session_count: self.session_count.load(Ordering::Relaxed),
            successful_sessions: self.successful_sessions.load(Ordering::Relaxed),
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
            synthesized_plans: self.synthesized_plans.load(Ordering::Relaxed),
            static_plans: self.static_plans.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            average_latency_ms,
            latency: self.latency_percentiles(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::BehaviorKind;
    use crate::session::SessionOutcome;
    use std::sync::Arc;

    fn interaction(status: Option<u16>, latency_ms: f64) -> InteractionRecord {
        InteractionRecord {
            index: 0,
            target: "http://t".into(),
            kind: BehaviorKind::Browsing,
            action: "browse".into(),
            status_code: status,
            error: status.is_none().then(|| "refused".to_string()),
            content_length: 100,
            delay_before_ms: 0,
            latency_ms,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_percentile_calculation() {
        let values: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let percentiles = LatencyPercentiles::from_values(&values);

        assert_eq!(percentiles.min, 1.0);
        assert_eq!(percentiles.max, 10.0);
        assert!((percentiles.p50 - 5.5).abs() < 0.01);
        assert!((percentiles.mean - 5.5).abs() < 0.01);
    }

    #[test]
    fn test_percentile_empty() {
        let percentiles = LatencyPercentiles::from_values(&[]);
        assert_eq!(percentiles, LatencyPercentiles::default());
    }

    #[test]
    fn test_histogram_percentiles() {
        let mut histogram = LatencyHistogram::new();
        for i in 1..=100 {
            histogram.record_ms(i as f64);
        }

        let percentiles = histogram.percentiles();
        assert_eq!(histogram.len(), 100);
        assert!((percentiles.min - 1.0).abs() < 0.1);
        assert!((percentiles.max - 100.0).abs() < 0.1);
        assert!((percentiles.p50 - 50.0).abs() < 1.0);
    }

    #[test]
    fn test_empty_histogram() {
        let histogram = LatencyHistogram::new();
        assert!(histogram.is_empty());
        assert_eq!(histogram.percentiles().max, 0.0);
    }

    #[test]
    fn test_interaction_counters() {
        let metrics = MetricsAggregator::new();
        let id = SessionId(1);
        metrics.session_started(id, "gamer", 0, 18.0, 3);
        metrics.record_interaction(id, &interaction(Some(200), 10.0));
        metrics.record_interaction(id, &interaction(Some(503), 20.0));
        metrics.record_interaction(id, &interaction(None, 30.0));

        let live = metrics.session(id).unwrap();
        assert_eq!(live.completed_actions, 3);
        assert_eq!(live.successful, 1);
        assert_eq!(live.failed, 2);
        assert_eq!(live.bytes_received, 300);

        let snap = metrics.snapshot();
        assert_eq!(snap.total_requests, 3);
        assert_eq!(snap.successful_requests, 1);
        assert_eq!(snap.failed_requests, 2);
        assert_eq!(snap.active_sessions, 1);
        assert!((snap.average_latency_ms - 20.0).abs() < 0.01);
        assert!((snap.success_rate() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_session_finished_moves_to_results() {
        let metrics = MetricsAggregator::new();
        let id = SessionId(4);
        metrics.session_started(id, "gamer", 1, 27.0, 1);

        let mut result = SessionResult::setup_failed(id, "gamer", "local", 1, "");
        result.outcome = SessionOutcome::Completed;
        result.succeeded = true;
        metrics.session_finished(result);

        assert!(metrics.session(id).is_none());
        let snap = metrics.snapshot();
        assert_eq!(snap.active_sessions, 0);
        assert_eq!(snap.session_count, 1);
        assert_eq!(snap.successful_sessions, 1);
        assert_eq!(metrics.results().len(), 1);
    }

    #[test]
    fn test_unregistered_session_counts_without_underflow() {
        let metrics = MetricsAggregator::new();
        metrics.session_finished(SessionResult::setup_failed(SessionId(9), "x", "t", 0, "bad"));
        let snap = metrics.snapshot();
        assert_eq!(snap.session_count, 1);
        assert_eq!(snap.active_sessions, 0);
        assert_eq!(snap.successful_sessions, 0);
    }

    #[test]
    fn test_peak_rate_only_rises() {
        let metrics = MetricsAggregator::new();
        metrics.observe_rate(10.0);
        metrics.observe_rate(40.0);
        metrics.observe_rate(25.0);
        metrics.observe_rate(f64::NAN);
        assert_eq!(metrics.snapshot().peak_rate_observed, 40.0);
    }

    #[test]
    fn test_plan_source_counters() {
        let metrics = MetricsAggregator::new();
        metrics.record_plan(PlanSource::Synthesized);
        metrics.record_plan(PlanSource::Static);
        metrics.record_plan(PlanSource::Static);
        let snap = metrics.snapshot();
        assert_eq!(snap.synthesized_plans, 1);
        assert_eq!(snap.static_plans, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let metrics = Arc::new(MetricsAggregator::new());
        let mut handles = Vec::new();
        for session in 0..8u64 {
            let metrics = Arc::clone(&metrics);
            handles.push(tokio::spawn(async move {
                let id = SessionId(session);
                metrics.session_started(id, "p", 0, session as f64, 100);
                for _ in 0..100 {
                    metrics.record_interaction(id, &interaction(Some(200), 1.0));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let snap = metrics.snapshot();
        assert_eq!(snap.total_requests, 800);
        assert_eq!(snap.successful_requests, 800);
        assert_eq!(snap.peak_rate_observed, 7.0);
    }
}
