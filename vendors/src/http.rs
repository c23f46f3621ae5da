//! One pooled reqwest client shared by the transport and provider clients

use reqwest::Client;
use std::time::Duration;

/// Connection setup never waits longer than this, whatever the request timeout
const CONNECT_TIMEOUT_CAP: Duration = Duration::from_secs(10);

/// Knobs the driver sets on the shared client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    /// Whole-request timeout; also bounds connection setup
    pub request_timeout: Duration,
    /// Idle connections kept per host, usually the session concurrency
    pub max_idle_per_host: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_idle_per_host: 10,
        }
    }
}

impl HttpConfig {
    /// Set the request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Size the idle pool, usually to the number of concurrent sessions
    pub fn with_max_idle_per_host(mut self, max_idle: usize) -> Self {
        self.max_idle_per_host = max_idle.max(1);
        self
    }

    fn connect_timeout(&self) -> Duration {
        self.request_timeout.min(CONNECT_TIMEOUT_CAP)
    }
}

/// Cloneable handle on the shared client
///
/// Clones share one connection pool, so every session hitting a target
/// reuses the same idle connections.
#[derive(Debug, Clone)]
pub struct HttpClientPool {
    client: Client,
    request_timeout: Duration,
}

impl HttpClientPool {
    /// Build the client; every request carries the `phaseload/<version>` user agent
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .pool_max_idle_per_host(config.max_idle_per_host)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout())
            .user_agent(concat!("phaseload/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            request_timeout: config.request_timeout,
        })
    }

    /// The underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Timeout applied to every request
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_timeout_is_capped() {
        let short = HttpConfig::default().with_request_timeout(Duration::from_secs(2));
        assert_eq!(short.connect_timeout(), Duration::from_secs(2));

        let long = HttpConfig::default().with_request_timeout(Duration::from_secs(120));
        assert_eq!(long.connect_timeout(), CONNECT_TIMEOUT_CAP);
    }

    #[test]
    fn test_pool_keeps_request_timeout() {
        let config = HttpConfig::default()
            .with_request_timeout(Duration::from_secs(5))
            .with_max_idle_per_host(0);
        assert_eq!(config.max_idle_per_host, 1);

        let pool = HttpClientPool::new(&config).unwrap();
        assert_eq!(pool.request_timeout(), Duration::from_secs(5));
    }
}
