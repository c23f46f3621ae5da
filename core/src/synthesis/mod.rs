//! Behavior synthesis through AI providers
//!
//! [`BehaviorSynthesisClient`] hides N interchangeable providers behind one
//! call. For each request it builds a provider-specific payload, asks the
//! shared [`RateLimiter`](crate::RateLimiter) for admission, calls the
//! provider with a timeout, parses the structured reply and drops
//! low-confidence patterns. Transient failures are retried with capped
//! exponential backoff on the same provider; anything else moves a sticky
//! cursor to the next provider.
//!
//! # Example
//!
//! ```ignore
//! let client = BehaviorSynthesisClient::new(providers, provider_client, limiter, config)?;
//! let request = SynthesisRequest::for_session(&profile, &target, phase, rate, planned);
//! let plan = client.synthesize(&request).await?;
//! if plan.is_empty() {
//!     // fall back to the profile's static plan
//! }
//! ```

mod client;
mod parse;
mod prompt;
mod request;
mod stats;

pub use client::BehaviorSynthesisClient;
pub use request::{SessionContext, SynthesisRequest};
pub use stats::{SynthesisStats, SynthesisStatsSnapshot};
