//! Plain HTTP transport for session actions

use crate::http::{HttpClientPool, HttpConfig};
use async_trait::async_trait;
use phaseload_core::{ActionOutcome, ActionSpec, TargetDescriptor, Transport, TransportError};
use std::time::Instant;

/// Sends each action as a GET to the resolved target URL
///
/// Any HTTP status is a completed action; only network-level failures
/// become [`TransportError`]s.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    pool: HttpClientPool,
}

impl HttpTransport {
    /// Create a transport over a fresh pool
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            pool: HttpClientPool::new(config)?,
        })
    }

    /// Create a transport over an existing pool
    pub fn with_pool(pool: HttpClientPool) -> Self {
        Self { pool }
    }

    fn map_error(&self, url: &str, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(self.pool.request_timeout())
        } else if e.is_builder() {
            TransportError::InvalidTarget(format!("{}: {}", url, e))
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn perform(
        &self,
        target: &TargetDescriptor,
        action: &ActionSpec,
    ) -> Result<ActionOutcome, TransportError> {
        let url = target.resolve(&action.path);
        let start = Instant::now();

        let response = self
            .pool
            .client()
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_error(&url, e))?;

        let status_code = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_error(&url, e))?;

        tracing::trace!(url = %url, status = status_code, bytes = body.len(), "Action completed");

        Ok(ActionOutcome {
            status_code,
            content_length: body.len(),
            elapsed: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phaseload_core::BehaviorKind;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn action(path: &str) -> ActionSpec {
        ActionSpec {
            kind: BehaviorKind::Browsing,
            action: "view".into(),
            target_element: None,
            path: path.into(),
            parameters: Default::default(),
        }
    }

    /// Serve one canned response and hand back the request line
    async fn serve_once(response: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            request.lines().next().unwrap_or_default().to_string()
        });
        (base, handle)
    }

    #[tokio::test]
    async fn test_get_reports_status_and_length() {
        let (base, server) =
            serve_once("HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello")
                .await;
        let transport = HttpTransport::new(&HttpConfig::default()).unwrap();
        let target = TargetDescriptor::new("local", base);

        let outcome = transport.perform(&target, &action("news")).await.unwrap();

        assert_eq!(outcome.status_code, 200);
        assert_eq!(outcome.content_length, 5);
        assert!(outcome.is_success());
        assert_eq!(server.await.unwrap(), "GET /news HTTP/1.1");
    }

    #[tokio::test]
    async fn test_error_status_is_not_transport_error() {
        let (base, _server) = serve_once(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        let transport = HttpTransport::new(&HttpConfig::default()).unwrap();
        let target = TargetDescriptor::new("local", base);

        let outcome = transport.perform(&target, &action("")).await.unwrap();

        assert_eq!(outcome.status_code, 503);
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_refused_connection_maps_to_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let config = HttpConfig::default().with_request_timeout(Duration::from_secs(2));
        let transport = HttpTransport::new(&config).unwrap();
        let target = TargetDescriptor::new("gone", base);

        let err = transport.perform(&target, &action("")).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect(_)), "got {err:?}");
    }
}
