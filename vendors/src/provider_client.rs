//! HTTP client for AI providers
//!
//! One POST per call. The request body is the payload built by the
//! synthesis client; this module only adds the endpoint, the credential
//! headers for the provider kind and the mapping from HTTP failures to
//! [`ProviderError`].

use crate::http::{HttpClientPool, HttpConfig};
use async_trait::async_trait;
use phaseload_core::{ProviderClient, ProviderDescriptor, ProviderError, ProviderKind};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// API version header value for the Anthropic messages API
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Upper bound on how much of an error body is kept in messages
const MAX_ERROR_BODY: usize = 512;

/// Provider client over reqwest
///
/// Credentials come from the environment variable each descriptor names in
/// `credential_ref`, unless one was registered with
/// [`with_credential`](Self::with_credential).
#[derive(Debug, Clone)]
pub struct HttpProviderClient {
    pool: HttpClientPool,
    credentials: HashMap<String, String>,
}

impl HttpProviderClient {
    /// Create a client over a fresh pool
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::with_pool(HttpClientPool::new(config)?))
    }

    /// Create a client over an existing pool
    pub fn with_pool(pool: HttpClientPool) -> Self {
        Self {
            pool,
            credentials: HashMap::new(),
        }
    }

    /// Use `secret` for `provider_id` instead of the environment
    pub fn with_credential(mut self, provider_id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.credentials.insert(provider_id.into(), secret.into());
        self
    }

    fn credential(&self, provider: &ProviderDescriptor) -> Option<String> {
        if let Some(secret) = self.credentials.get(&provider.id) {
            return Some(secret.clone());
        }
        if provider.credential_ref.is_empty() {
            return None;
        }
        std::env::var(&provider.credential_ref)
            .ok()
            .filter(|v| !v.is_empty())
    }
}

/// Request URL for a provider
pub fn endpoint_url(provider: &ProviderDescriptor) -> String {
    let base = provider.base_endpoint.trim_end_matches('/');
    match provider.kind {
        ProviderKind::OpenAiCompatible => format!("{}/chat/completions", base),
        ProviderKind::Anthropic => format!("{}/messages", base),
    }
}

/// Parse a `Retry-After` header given in whole seconds
///
/// HTTP-date values are ignored; the synthesis client then falls back to
/// its own backoff.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Map a non-success reply to a provider error
pub fn classify_status(status: StatusCode, headers: &HeaderMap, body: &str) -> ProviderError {
    let message = truncate(body);
    match status.as_u16() {
        401 | 403 => ProviderError::Auth(format!("{}: {}", status, message)),
        429 => ProviderError::RateLimited {
            retry_after: headers
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after),
        },
        code @ 500..=599 => ProviderError::ServerError {
            status: code,
            message,
        },
        _ => ProviderError::InvalidRequest(format!("{}: {}", status, message)),
    }
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((end, _)) => format!("{}...", &body[..end]),
        None => body.to_string(),
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn call(
        &self,
        provider: &ProviderDescriptor,
        payload: &Value,
        timeout: Duration,
    ) -> Result<Value, ProviderError> {
        let url = endpoint_url(provider);
        let mut request = self.pool.client().post(&url).timeout(timeout).json(payload);

        let credential = self.credential(provider);
        request = match (provider.kind, credential) {
            (ProviderKind::OpenAiCompatible, Some(key)) => request.bearer_auth(key),
            (ProviderKind::Anthropic, Some(key)) => request
                .header("x-api-key", key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            (ProviderKind::Anthropic, None) => request.header("anthropic-version", ANTHROPIC_VERSION),
            (ProviderKind::OpenAiCompatible, None) => request,
        };

        tracing::trace!(provider = %provider.id, url = %url, "Calling provider");

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(timeout)
            } else {
                ProviderError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            let error = classify_status(status, &headers, &body);
            tracing::debug!(provider = %provider.id, status = status.as_u16(), error = %error, "Provider refused call");
            return Err(error);
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn openai(base: &str) -> ProviderDescriptor {
        ProviderDescriptor::new("primary", ProviderKind::OpenAiCompatible, base)
    }

    #[test]
    fn test_endpoint_per_kind() {
        assert_eq!(
            endpoint_url(&openai("https://api.openai.com/v1/")),
            "https://api.openai.com/v1/chat/completions"
        );
        let anthropic =
            ProviderDescriptor::new("b", ProviderKind::Anthropic, "https://api.anthropic.com/v1");
        assert_eq!(
            endpoint_url(&anthropic),
            "https://api.anthropic.com/v1/messages"
        );
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("30"), Some(Duration::from_secs(30)));
        assert_eq!(parse_retry_after(" 2 "), Some(Duration::from_secs(2)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn test_classify_status() {
        let empty = HeaderMap::new();
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, &empty, "nope"),
            ProviderError::Auth(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, &empty, ""),
            ProviderError::Auth(_)
        ));
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY, &empty, "upstream"),
            ProviderError::ServerError {
                status: 502,
                message: "upstream".into()
            }
        );
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, &empty, "bad"),
            ProviderError::InvalidRequest(_)
        ));

        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, &headers, ""),
            ProviderError::RateLimited {
                retry_after: Some(Duration::from_secs(7))
            }
        );
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, &empty, ""),
            ProviderError::RateLimited { retry_after: None }
        );
    }

    #[test]
    fn test_error_body_truncated() {
        let body = "x".repeat(2000);
        match classify_status(StatusCode::INTERNAL_SERVER_ERROR, &HeaderMap::new(), &body) {
            ProviderError::ServerError { message, .. } => {
                assert_eq!(message.len(), MAX_ERROR_BODY + 3);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_registered_credential_wins() {
        let client = HttpProviderClient::new(&HttpConfig::default())
            .unwrap()
            .with_credential("primary", "sk-test");
        let provider = openai("https://x").with_credential_ref("PHASELOAD_TEST_UNSET_VAR");
        assert_eq!(client.credential(&provider).as_deref(), Some("sk-test"));

        let other = ProviderDescriptor::new("other", ProviderKind::OpenAiCompatible, "https://x");
        assert_eq!(client.credential(&other), None);
    }

    /// Read one request, headers and body
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        let line = line.to_lowercase();
                        line.strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                    })
                    .unwrap_or(0);
                if data.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).to_string()
    }

    /// Serve one canned response and hand back the raw request
    async fn serve_once(response: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/v1", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            request
        });
        (base, handle)
    }

    fn http_response(status: &str, extra_headers: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n{}",
            status,
            body.len(),
            extra_headers,
            body
        )
    }

    #[tokio::test]
    async fn test_call_posts_payload_with_bearer() {
        let body = json!({ "behaviors": [] }).to_string();
        let (base, server) = serve_once(http_response("200 OK", "", &body)).await;
        let client = HttpProviderClient::new(&HttpConfig::default())
            .unwrap()
            .with_credential("primary", "sk-test");

        let reply = client
            .call(&openai(&base), &json!({ "model": "gpt-4" }), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(reply, json!({ "behaviors": [] }));
        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("post /v1/chat/completions http/1.1"));
        assert!(request.contains("authorization: bearer sk-test"));
        assert!(request.contains("\"model\":\"gpt-4\""));
    }

    #[tokio::test]
    async fn test_call_maps_rate_limit() {
        let (base, _server) =
            serve_once(http_response("429 Too Many Requests", "Retry-After: 12\r\n", "{}")).await;
        let client = HttpProviderClient::new(&HttpConfig::default()).unwrap();

        let err = client
            .call(&openai(&base), &json!({}), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ProviderError::RateLimited {
                retry_after: Some(Duration::from_secs(12))
            }
        );
    }

    #[tokio::test]
    async fn test_call_maps_non_json_body_to_malformed() {
        let (base, _server) = serve_once(http_response("200 OK", "", "not json")).await;
        let client = HttpProviderClient::new(&HttpConfig::default()).unwrap();

        let err = client
            .call(&openai(&base), &json!({}), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_anthropic_headers() {
        let body = json!({ "content": [] }).to_string();
        let (base, server) = serve_once(http_response("200 OK", "", &body)).await;
        let provider = ProviderDescriptor::new("claude", ProviderKind::Anthropic, base.as_str());
        let client = HttpProviderClient::new(&HttpConfig::default())
            .unwrap()
            .with_credential("claude", "ak-test");

        client
            .call(&provider, &json!({}), Duration::from_secs(5))
            .await
            .unwrap();

        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("post /v1/messages http/1.1"));
        assert!(request.contains("x-api-key: ak-test"));
        assert!(request.contains("anthropic-version: 2023-06-01"));
    }
}
