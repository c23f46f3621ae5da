//! Wire adapters for phaseload
//!
//! This crate provides the network side of the core traits:
//!
//! - [`HttpTransport`]: session actions as HTTP GETs against a target
//! - [`HttpProviderClient`]: behavior synthesis calls to OpenAI-compatible
//!   and Anthropic APIs
//!
//! Both share the pooled client from [`http`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod http;
pub mod provider_client;
pub mod transport;

pub use http::{HttpClientPool, HttpConfig};
pub use provider_client::HttpProviderClient;
pub use transport::HttpTransport;
