//! HTTP client for the Prometheus instant query API.
//!
//! Right after the process is spawned nothing listens on the address yet, so
//! connection failures are retried with a linearly growing pause.

pub mod transport;

use crate::config::PromBenchConfig;
use crate::error::{PromBenchError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
pub use transport::{QueryTransport, ReqwestTransport, TransportError};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_BACKOFF_STEP: Duration = Duration::from_millis(100);

/// How the query string is placed in the request URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryEncoding {
    /// Pasted as is. Characters such as `+`, `&` or `#` are misread by the
    /// server.
    #[default]
    Raw,
    Percent,
}

pub fn query_url(address: &str, query: &str, encoding: QueryEncoding) -> String {
    match encoding {
        QueryEncoding::Raw => format!("http://{}/api/v1/query?query={}", address, query),
        QueryEncoding::Percent => format!(
            "http://{}/api/v1/query?query={}",
            address,
            urlencoding::encode(query)
        ),
    }
}

pub struct QueryClient {
    address: String,
    transport: Arc<dyn QueryTransport>,
    max_attempts: u32,
    backoff_step: Duration,
    encoding: QueryEncoding,
}

impl QueryClient {
    pub fn new(address: impl Into<String>) -> Result<Self> {
        let transport = ReqwestTransport::new()
            .map_err(|e| PromBenchError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self::with_transport(address, Arc::new(transport)))
    }

    pub fn with_transport(address: impl Into<String>, transport: Arc<dyn QueryTransport>) -> Self {
        Self {
            address: address.into(),
            transport,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_step: DEFAULT_BACKOFF_STEP,
            encoding: QueryEncoding::Raw,
        }
    }

    pub fn from_config(address: impl Into<String>, config: &PromBenchConfig) -> Result<Self> {
        let encoding = config
            .parse_query_encoding()
            .map_err(|e| PromBenchError::Configuration(e.to_string()))?;
        Ok(Self::new(address)?
            .max_attempts(config.max_attempts)
            .backoff_step(config.backoff_step())
            .encoding(encoding))
    }

    /// Zero is treated as one attempt.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn backoff_step(mut self, backoff_step: Duration) -> Self {
        self.backoff_step = backoff_step;
        self
    }

    pub fn encoding(mut self, encoding: QueryEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn url_for(&self, query: &str) -> String {
        query_url(&self.address, query, self.encoding)
    }

    /// Runs the query and returns the raw response body.
    pub async fn query(&self, query: &str) -> Result<String> {
        self.query_with_cancel(query, &CancellationToken::new()).await
    }

    /// Like [`QueryClient::query`], `cancel` interrupts both the request in
    /// flight and the pause between attempts.
    ///
    /// Attempt `i + 1` follows a failed attempt `i` (counted from zero) after
    /// `i * backoff_step`. The last attempt is not guarded: its error is
    /// returned as is, not wrapped into an exhaustion error.
    pub async fn query_with_cancel(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let url = self.url_for(query);
        let attempts = self.max_attempts.max(1);

        for attempt in 0..attempts - 1 {
            match self.query_once(&url, cancel).await {
                Err(e) if e.is_retryable() => {
                    let delay = self.backoff_step * attempt;
                    warn!(
                        attempt = attempt + 1,
                        delay = ?delay,
                        error = %e,
                        "Prometheus not reachable yet, retrying"
                    );
                    self.pause(delay, cancel).await?;
                }
                result => return result,
            }
        }

        self.query_once(&url, cancel).await
    }

    async fn query_once(&self, url: &str, cancel: &CancellationToken) -> Result<String> {
        debug!(url = %url, "Querying Prometheus");
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PromBenchError::Cancelled),
            result = self.transport.get(url) => result,
        };
        result.map_err(|e| match e {
            TransportError::Refused => PromBenchError::ConnectionRefused {
                address: self.address.clone(),
            },
            TransportError::Connect(message) => PromBenchError::Connection {
                address: self.address.clone(),
                message,
            },
            TransportError::InvalidUrl(message) => PromBenchError::InvalidUrl {
                url: url.to_string(),
                message,
            },
            TransportError::Http(message) => PromBenchError::Http {
                url: url.to_string(),
                message,
            },
        })
    }

    async fn pause(&self, delay: Duration, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PromBenchError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    const OK_BODY: &str = r#"{"status":"success","data":{"resultType":"vector","result":[]}}"#;

    /// Replays canned outcomes and records when each attempt happened.
    struct ScriptedTransport {
        outcomes: Mutex<VecDeque<Result<String, TransportError>>>,
        fallback: Result<String, TransportError>,
        calls: Mutex<Vec<(Instant, String)>>,
    }

    impl ScriptedTransport {
        fn new(
            outcomes: Vec<Result<String, TransportError>>,
            fallback: Result<String, TransportError>,
        ) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                fallback,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn attempts(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn gaps(&self) -> Vec<Duration> {
            let calls = self.calls.lock().unwrap();
            calls.windows(2).map(|w| w[1].0 - w[0].0).collect()
        }
    }

    #[async_trait]
    impl QueryTransport for ScriptedTransport {
        async fn get(&self, url: &str) -> Result<String, TransportError> {
            let attempt = {
                let mut calls = self.calls.lock().unwrap();
                calls.push((Instant::now(), url.to_string()));
                calls.len()
            };
            let outcome = self.outcomes.lock().unwrap().pop_front();
            match outcome {
                Some(outcome) => outcome,
                None => self.fallback.clone().map_err(|e| match e {
                    TransportError::Connect(message) => {
                        TransportError::Connect(format!("{} (attempt {})", message, attempt))
                    }
                    other => other,
                }),
            }
        }
    }

    /// The paused clock may round timers up to the next millisecond.
    fn assert_gaps(actual: &[Duration], expected_ms: &[u64]) {
        assert_eq!(actual.len(), expected_ms.len(), "gaps: {:?}", actual);
        for (gap, &ms) in actual.iter().zip(expected_ms) {
            let expected = Duration::from_millis(ms);
            assert!(
                *gap >= expected && *gap <= expected + Duration::from_millis(10),
                "gap {:?} expected around {:?} in {:?}",
                gap,
                expected,
                actual
            );
        }
    }

    fn client(transport: Arc<ScriptedTransport>) -> QueryClient {
        QueryClient::with_transport("localhost:12345", transport)
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_refusals() {
        let transport = ScriptedTransport::new(
            vec![
                Err(TransportError::Refused),
                Err(TransportError::Refused),
                Err(TransportError::Refused),
            ],
            Ok(OK_BODY.to_string()),
        );
        let body = client(transport.clone()).query("up").await.unwrap();

        assert_eq!(body, OK_BODY);
        assert_eq!(transport.attempts(), 4);
        // Linear pauses: 0 after the first failure, then one step more each time
        assert_gaps(&transport.gaps(), &[0, 100, 200]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generic_connection_errors_are_retried() {
        let transport = ScriptedTransport::new(
            vec![Err(TransportError::Connect("reset by peer".to_string()))],
            Ok(OK_BODY.to_string()),
        );
        client(transport.clone()).query("up").await.unwrap();
        assert_eq!(transport.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_raw_error() {
        let transport = ScriptedTransport::new(
            vec![],
            Err(TransportError::Connect("unreachable".to_string())),
        );
        let started = Instant::now();
        let err = client(transport.clone()).query("up").await.unwrap_err();

        assert_eq!(transport.attempts(), 10);
        match err {
            PromBenchError::Connection { address, message } => {
                assert_eq!(address, "localhost:12345");
                assert_eq!(message, "unreachable (attempt 10)");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        // 0 + 100 + ... + 800 ms
        assert_gaps(&[started.elapsed()], &[3600]);
        assert_gaps(&transport.gaps(), &[0, 100, 200, 300, 400, 500, 600, 700, 800]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_with_refusals() {
        let transport = ScriptedTransport::new(vec![], Err(TransportError::Refused));
        let err = client(transport.clone()).query("up").await.unwrap_err();
        assert!(matches!(err, PromBenchError::ConnectionRefused { .. }));
        assert_eq!(transport.attempts(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_errors_are_not_retried() {
        let transport = ScriptedTransport::new(
            vec![Err(TransportError::InvalidUrl("bad url".to_string()))],
            Ok(OK_BODY.to_string()),
        );
        let err = client(transport.clone()).query("up").await.unwrap_err();
        assert!(matches!(err, PromBenchError::InvalidUrl { .. }));
        assert_eq!(transport.attempts(), 1);

        let transport = ScriptedTransport::new(
            vec![Err(TransportError::Http("body truncated".to_string()))],
            Ok(OK_BODY.to_string()),
        );
        let err = client(transport.clone()).query("up").await.unwrap_err();
        assert!(matches!(err, PromBenchError::Http { .. }));
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_budget() {
        let transport = ScriptedTransport::new(vec![], Err(TransportError::Refused));
        let err = client(transport.clone())
            .max_attempts(3)
            .backoff_step(Duration::from_secs(1))
            .query("up")
            .await
            .unwrap_err();
        assert!(matches!(err, PromBenchError::ConnectionRefused { .. }));
        assert_gaps(&transport.gaps(), &[0, 1000]);

        let transport = ScriptedTransport::new(vec![], Err(TransportError::Refused));
        client(transport.clone())
            .max_attempts(0)
            .query("up")
            .await
            .unwrap_err();
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let transport = ScriptedTransport::new(vec![], Err(TransportError::Refused));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            trigger.cancel();
        });

        let err = client(transport.clone())
            .query_with_cancel("up", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, PromBenchError::Cancelled));
        // Attempts at 0, 0 and 100 ms, cancelled while waiting 200 ms
        assert_eq!(transport.attempts(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let transport = ScriptedTransport::new(vec![], Ok(OK_BODY.to_string()));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = client(transport.clone())
            .query_with_cancel("up", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, PromBenchError::Cancelled));
        assert_eq!(transport.attempts(), 0);
    }

    #[tokio::test]
    async fn test_retries_server_closing_before_response() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // First connection is dropped unanswered, the second gets a body
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            let mut connections = 0;
            while let Ok((mut socket, _)) = listener.accept().await {
                connections += 1;
                let mut buffer = [0u8; 1024];
                let _ = socket.read(&mut buffer).await;
                if connections == 1 {
                    continue;
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    OK_BODY.len(),
                    OK_BODY
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
                return connections;
            }
            connections
        });

        let client = QueryClient::new(address)
            .unwrap()
            .backoff_step(Duration::from_millis(10));
        let body = client.query("up").await.unwrap();

        assert_eq!(body, OK_BODY);
        assert_eq!(server.await.unwrap(), 2);
    }

    #[test]
    fn test_raw_url_keeps_query_text() {
        let query = r#"rate(http_requests_total{job="api server"}[5m]) + 1"#;
        assert_eq!(
            query_url("localhost:12345", query, QueryEncoding::Raw),
            format!("http://localhost:12345/api/v1/query?query={}", query)
        );
    }

    #[test]
    fn test_percent_url() {
        assert_eq!(
            query_url("localhost:12345", "up{job=\"a b\"} + 1", QueryEncoding::Percent),
            "http://localhost:12345/api/v1/query?query=up%7Bjob%3D%22a%20b%22%7D%20%2B%201"
        );
    }

    #[tokio::test]
    async fn test_query_uses_url() {
        let transport = ScriptedTransport::new(vec![], Ok(OK_BODY.to_string()));
        client(transport.clone()).query("up[5m]").await.unwrap();
        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls[0].1, "http://localhost:12345/api/v1/query?query=up[5m]");
    }
}
