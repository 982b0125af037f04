use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while supervising the Prometheus process, querying it,
/// or decoding its answers.
#[derive(Error, Debug)]
pub enum PromBenchError {
    /// The Prometheus process could not be launched
    #[error("Failed to start {binary}: {source}")]
    Startup {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Another live handle already binds this storage directory and address
    #[error("Storage directory {storage_dir:?} on {address} is already in use")]
    AddressInUse {
        storage_dir: PathBuf,
        address: String,
    },

    /// Nothing is listening on the address yet
    #[error("Connection refused by {address}")]
    ConnectionRefused { address: String },

    /// Any other failure to reach the server
    #[error("Connection error with {address}: {message}")]
    Connection { address: String, message: String },

    #[error("Invalid query URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    /// The request reached the server but the exchange failed afterwards
    #[error("HTTP request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("Query cancelled")]
    Cancelled,

    #[error("Response body is not valid JSON: {0}")]
    MalformedBody(#[from] serde_json::Error),

    /// The server understood the request and rejected the query
    #[error("Query \"{query}\" resulted in error: {message}")]
    QueryExecution {
        query: String,
        error_type: Option<String>,
        message: String,
    },

    #[error("Unknown status {status}")]
    UnknownStatus { status: String },

    /// A field of the response is missing or has the wrong shape
    #[error("Invalid response: {field} {reason}")]
    Decode { field: &'static str, reason: String },

    #[error("Unsupported result type: {result_type}")]
    UnsupportedResultType { result_type: String },
}

impl PromBenchError {
    pub fn missing_field(field: &'static str) -> Self {
        PromBenchError::Decode {
            field,
            reason: "is missing".to_string(),
        }
    }

    pub fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        PromBenchError::Decode {
            field,
            reason: reason.into(),
        }
    }

    /// Only the two connection kinds are worth another attempt while the
    /// server warms up.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PromBenchError::ConnectionRefused { .. } | PromBenchError::Connection { .. }
        )
    }
}

pub type Result<T, E = PromBenchError> = std::result::Result<T, E>;
