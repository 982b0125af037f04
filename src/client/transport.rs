use async_trait::async_trait;
use std::io;
use thiserror::Error;

/// Failure of a single HTTP exchange, before the client attaches the
/// server address.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection refused")]
    Refused,
    #[error("{0}")]
    Connect(String),
    #[error("{0}")]
    InvalidUrl(String),
    #[error("{0}")]
    Http(String),
}

/// One GET round trip returning the response body, whatever the status code.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<String, TransportError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        Ok(Self {
            // Only ever talks to a local process
            client: reqwest::Client::builder().no_proxy().build()?,
        })
    }
}

#[async_trait]
impl QueryTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<String, TransportError> {
        // Error responses from Prometheus carry a JSON body, the status code
        // is left to the decoder.
        let response = self.client.get(url).send().await.map_err(classify_send)?;
        response
            .text()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))
    }
}

/// Any failure before a response arrived counts as a connection failure,
/// including a server that accepts the connection and closes it unanswered.
fn classify_send(error: reqwest::Error) -> TransportError {
    if error.is_builder() {
        return TransportError::InvalidUrl(error.to_string());
    }
    match io_error_kind(&error) {
        Some(io::ErrorKind::ConnectionRefused) => TransportError::Refused,
        _ => TransportError::Connect(error.to_string()),
    }
}

fn io_error_kind(error: &(dyn std::error::Error + 'static)) -> Option<io::ErrorKind> {
    let mut source = error.source();
    while let Some(err) = source {
        if let Some(io_error) = err.downcast_ref::<io::Error>() {
            return Some(io_error.kind());
        }
        source = err.source();
    }
    None
}
