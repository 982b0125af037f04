use anyhow::Error;
use confique::Config;
use std::{
    path::PathBuf,
    sync::{Arc, OnceLock},
    time::Duration,
};

use crate::client::QueryEncoding;

#[derive(Debug, Config)]
pub struct PromBenchConfig {
    #[config(env = "PROMBENCH_PROMETHEUS_BINARY", default = "prometheus")]
    pub prometheus_binary: String,

    #[config(env = "PROMBENCH_LISTEN_ADDRESS", default = "localhost:12345")]
    pub listen_address: String,

    /// Prometheus is started with an empty configuration written here.
    /// The path is shared by every session on the host.
    #[config(env = "PROMBENCH_CONFIG_FILE", default = "/tmp/empty_prometheus.yml")]
    pub config_file: PathBuf,

    #[config(env = "PROMBENCH_MAX_ATTEMPTS", default = 10)]
    pub max_attempts: u32,

    #[config(env = "PROMBENCH_BACKOFF_STEP_MS", default = 100)]
    pub backoff_step_ms: u64,

    #[config(env = "PROMBENCH_QUERY_ENCODING", default = "raw")]
    pub query_encoding: String,

    #[config(env = "PROMBENCH_SHUTDOWN_TIMEOUT_SECONDS", default = 5)]
    pub shutdown_timeout_seconds: u64,
}

impl PromBenchConfig {
    pub fn load() -> Result<PromBenchConfig, Error> {
        let c = PromBenchConfig::builder()
            .env()
            .file("prombench.toml")
            .load()?;

        Ok(c)
    }

    pub fn backoff_step(&self) -> Duration {
        Duration::from_millis(self.backoff_step_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    pub fn parse_query_encoding(&self) -> Result<QueryEncoding, Error> {
        match self.query_encoding.to_ascii_lowercase().as_str() {
            "raw" => Ok(QueryEncoding::Raw),
            "percent" => Ok(QueryEncoding::Percent),
            other => anyhow::bail!("Unknown query encoding: {} (expected raw or percent)", other),
        }
    }
}

static PROMBENCH_CONFIG: OnceLock<Arc<PromBenchConfig>> = OnceLock::new();

pub fn get() -> Result<Arc<PromBenchConfig>, Error> {
    PROMBENCH_CONFIG.get().cloned().ok_or_else(|| {
        Error::msg(
            "Configuration not loaded. Please call load_configuration() before using the configuration",
        )
    })
}

pub fn load_configuration() -> Result<(), Error> {
    // Check if the configuration has already been loaded
    if PROMBENCH_CONFIG.get().is_some() {
        return Ok(());
    }

    let config = PromBenchConfig::load()?;
    PROMBENCH_CONFIG.get_or_init(|| Arc::new(config));

    Ok(())
}
