//! Multi-provider behavior synthesis with retry and sticky fallback

use super::parse;
use super::prompt;
use super::request::SynthesisRequest;
use super::stats::{SynthesisStats, SynthesisStatsSnapshot};
use crate::behavior::{retain_confident, BehaviorPattern};
use crate::config::{secs, ConfigError, SynthesisConfig};
use crate::provider::ProviderDescriptor;
use crate::rate_limiter::RateLimiter;
use crate::traits::{ProviderClient, ProviderError};

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Produces behavior plans from an ordered chain of AI providers
///
/// The client keeps a sticky cursor into the provider list. A provider
/// that cannot deliver a usable plan (retries exhausted, non-retryable
/// error, malformed or empty reply) moves the cursor forward for good;
/// only [`reset_provider`](Self::reset_provider) moves it back.
pub struct BehaviorSynthesisClient {
    providers: Vec<ProviderDescriptor>,
    client: Arc<dyn ProviderClient>,
    limiter: Arc<RateLimiter>,
    config: SynthesisConfig,
    cursor: AtomicUsize,
    stats: SynthesisStats,
}

impl BehaviorSynthesisClient {
    /// Create a client over `providers`, in fallback order
    ///
    /// Each provider's `rate_limit_per_minute` is installed as its limit in
    /// `limiter`. An empty provider list is accepted here; `synthesize`
    /// reports it and the scheduler builder rejects it.
    pub fn new(
        providers: Vec<ProviderDescriptor>,
        client: Arc<dyn ProviderClient>,
        limiter: Arc<RateLimiter>,
        config: SynthesisConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut seen = HashSet::new();
        for provider in &providers {
            provider.validate()?;
            if !seen.insert(provider.id.clone()) {
                return Err(ConfigError::DuplicateProvider(provider.id.clone()));
            }
            limiter.set_limit(provider.id.clone(), provider.rate_limit_per_minute as usize);
        }

        Ok(Self {
            providers,
            client,
            limiter,
            config,
            cursor: AtomicUsize::new(0),
            stats: SynthesisStats::default(),
        })
    }

    /// Produce a plan for `request`
    ///
    /// Provider failures never surface here: when no provider yields a
    /// confident pattern the result is an empty list. The only error is a
    /// client built without providers.
    pub async fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> Result<Vec<BehaviorPattern>, ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }
        self.stats.record_request();

        let prompt = prompt::render(request, &self.config);

        loop {
            let index = self.cursor.load(Ordering::Acquire);
            let Some(provider) = self.providers.get(index) else {
                tracing::debug!(
                    providers = self.providers.len(),
                    "All providers exhausted, no synthesized plan"
                );
                self.stats.record_exhausted();
                return Ok(Vec::new());
            };

            match self.call_provider(provider, &prompt).await {
                Ok(patterns) => {
                    let total = patterns.len();
                    let kept = retain_confident(patterns, self.config.confidence_threshold);
                    if !kept.is_empty() {
                        tracing::debug!(
                            provider = %provider.id,
                            kept = kept.len(),
                            total,
                            "Synthesized behavior plan"
                        );
                        self.stats.record_plan();
                        return Ok(kept);
                    }
                    tracing::warn!(
                        provider = %provider.id,
                        total,
                        threshold = self.config.confidence_threshold,
                        "No behaviors above confidence threshold"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        provider = %provider.id,
                        error = %e,
                        "Provider failed, falling back"
                    );
                }
            }

            self.advance_from(index);
        }
    }

    /// Move the cursor past `index`
    ///
    /// Concurrent callers that failed on the same provider advance it once.
    fn advance_from(&self, index: usize) {
        if self
            .cursor
            .compare_exchange(index, index + 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.stats.record_fallback();
            match self.providers.get(index + 1) {
                Some(next) => tracing::info!(provider = %next.id, "Switched to next provider"),
                None => tracing::warn!("Provider fallback chain exhausted"),
            }
        }
    }

    /// One provider's full retry budget
    async fn call_provider(
        &self,
        provider: &ProviderDescriptor,
        prompt: &str,
    ) -> Result<Vec<BehaviorPattern>, ProviderError> {
        let payload = prompt::payload(provider, prompt, &self.config);
        let timeout = provider.timeout();
        let mut attempt = 0u32;

        loop {
            if !self.wait_for_admission(provider).await {
                self.stats.record_denial();
                return Err(ProviderError::RateLimited { retry_after: None });
            }

            self.stats.record_attempt();
            tracing::debug!(provider = %provider.id, attempt, "Requesting behavior plan");

            let reply = match tokio::time::timeout(
                timeout,
                self.client.call(provider, &payload, timeout),
            )
            .await
            {
                Ok(reply) => reply,
                Err(_) => Err(ProviderError::Timeout(timeout)),
            };

            let error = match reply.and_then(|r| parse::parse_reply(provider.kind, &r)) {
                Ok(patterns) => return Ok(patterns),
                Err(e) => e,
            };
            self.stats.record_failure();

            if !error.is_retryable() || attempt >= self.config.max_retries {
                return Err(error);
            }

            let cap = secs(self.config.max_backoff_secs);
            let delay = match error.retry_after() {
                Some(hint) => hint.min(cap).max(self.config.backoff(attempt)),
                None => self.config.backoff(attempt),
            };
            tracing::warn!(
                provider = %provider.id,
                error = %error,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Provider call failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Check the rate limiter, waiting and re-checking a bounded number of times
    async fn wait_for_admission(&self, provider: &ProviderDescriptor) -> bool {
        let wait = self
            .config
            .admission_wait_secs
            .map(secs)
            .unwrap_or_else(|| self.limiter.window());

        for check in 0..=self.config.admission_retries {
            if self.limiter.admit(&provider.id) {
                return true;
            }
            if check < self.config.admission_retries {
                tracing::debug!(
                    provider = %provider.id,
                    wait_ms = wait.as_millis() as u64,
                    "Provider over rate limit, waiting"
                );
                tokio::time::sleep(wait).await;
            }
        }
        false
    }

    /// Point the cursor back at the first provider
    pub fn reset_provider(&self) {
        self.cursor.store(0, Ordering::Release);
        tracing::info!("Provider cursor reset");
    }

    /// Index of the provider the next call starts with
    ///
    /// Equals the provider count once every provider has been exhausted.
    pub fn current_provider_index(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// Provider the next call starts with, if any remains
    pub fn current_provider(&self) -> Option<&ProviderDescriptor> {
        self.providers.get(self.current_provider_index())
    }

    /// Providers in fallback order
    pub fn providers(&self) -> &[ProviderDescriptor] {
        &self.providers
    }

    /// Synthesis settings
    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Counter snapshot
    pub fn stats(&self) -> SynthesisStatsSnapshot {
        self.stats.snapshot()
    }
}

impl std::fmt::Debug for BehaviorSynthesisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<&str> = self.providers.iter().map(|p| p.id.as_str()).collect();
        f.debug_struct("BehaviorSynthesisClient")
            .field("providers", &ids)
            .field("cursor", &self.current_provider_index())
            .field("confidence_threshold", &self.config.confidence_threshold)
            .finish()
    }
}
