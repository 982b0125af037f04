//! One Prometheus process and the queries run against it.
//!
//! ```no_run
//! # async fn run() -> prombench::error::Result<()> {
//! use prombench::session::MetricsSession;
//!
//! let mut session = MetricsSession::open("data/").await?;
//! let table = session.query("up[24h]").await?;
//! println!("{} series", table.num_columns());
//! session.close();
//! # Ok(())
//! # }
//! ```
//!
//! Dropping the session has the same effect as `close`, so the process is
//! terminated on every exit path of the caller.

use crate::client::QueryClient;
use crate::config::{self, PromBenchConfig};
use crate::datamodel::ResultTable;
use crate::error::{PromBenchError, Result};
use crate::parsing::prometheus::ResultDecoder;
use crate::supervisor::{ProcessSupervisor, ServerHandle};
use std::path::Path;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Level, event};

pub struct MetricsSession {
    server: ServerHandle,
    client: QueryClient,
    shutdown_timeout: Duration,
}

impl MetricsSession {
    /// Starts Prometheus on `storage_dir` with the global configuration.
    pub async fn open(storage_dir: impl AsRef<Path>) -> Result<Self> {
        config::load_configuration().map_err(|e| PromBenchError::Configuration(e.to_string()))?;
        let config = config::get().map_err(|e| PromBenchError::Configuration(e.to_string()))?;
        Self::open_with_config(storage_dir, config).await
    }

    pub async fn open_with_config(
        storage_dir: impl AsRef<Path>,
        config: Arc<PromBenchConfig>,
    ) -> Result<Self> {
        let client = QueryClient::from_config(config.listen_address.clone(), &config)?;
        Self::open_with_client(storage_dir, &config, client).await
    }

    /// Uses `client` for the queries; the process listens on the client's
    /// address.
    pub async fn open_with_client(
        storage_dir: impl AsRef<Path>,
        config: &PromBenchConfig,
        client: QueryClient,
    ) -> Result<Self> {
        let server = ProcessSupervisor::from_config(config).start(storage_dir, client.address())?;
        event!(
            Level::INFO,
            "Session opened on {} for {}",
            server.address(),
            server.storage_dir().display()
        );
        Ok(Self {
            server,
            client,
            shutdown_timeout: config.shutdown_timeout(),
        })
    }

    pub fn address(&self) -> &str {
        self.server.address()
    }

    pub fn storage_dir(&self) -> &Path {
        self.server.storage_dir()
    }

    pub fn pid(&self) -> Option<u32> {
        self.server.pid()
    }

    pub fn is_closed(&self) -> bool {
        self.server.is_stopped()
    }

    pub async fn query(&self, promql: &str) -> Result<ResultTable> {
        self.query_with_cancel(promql, &CancellationToken::new()).await
    }

    pub async fn query_with_cancel(
        &self,
        promql: &str,
        cancel: &CancellationToken,
    ) -> Result<ResultTable> {
        let body = self.client.query_with_cancel(promql, cancel).await?;
        ResultDecoder::decode(promql, &body)
    }

    /// Requests termination of the process; later calls do nothing.
    pub fn close(&mut self) {
        if !self.server.is_stopped() {
            event!(Level::INFO, "Closing session on {}", self.server.address());
        }
        self.server.stop();
    }

    /// Terminates the process and waits for it to exit, killing it after the
    /// configured timeout.
    pub async fn shutdown(self) -> std::io::Result<ExitStatus> {
        let timeout = self.shutdown_timeout;
        self.server.shutdown(timeout).await
    }
}
