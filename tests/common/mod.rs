//! Helpers shared by the integration tests: a fake Prometheus HTTP API and a
//! stand-in for the Prometheus binary.

#![allow(dead_code)]

use anyhow::Result;
use axum::Router;
use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::routing::get;
use prombench::config::PromBenchConfig;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const EMPTY_VECTOR: &str = r#"{"status":"success","data":{"resultType":"vector","result":[]}}"#;

struct FakeState {
    /// Keyed by the raw `query=` parameter as it arrives on the wire
    responses: HashMap<String, (StatusCode, String)>,
    received: Mutex<Vec<String>>,
}

/// Serves canned bodies on `/api/v1/query`.
pub struct FakePrometheus {
    pub address: SocketAddr,
    state: Arc<FakeState>,
}

impl FakePrometheus {
    pub fn builder() -> FakePrometheusBuilder {
        FakePrometheusBuilder::default()
    }

    /// Raw query strings received so far, in order.
    pub fn received(&self) -> Vec<String> {
        self.state.received.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct FakePrometheusBuilder {
    responses: HashMap<String, (StatusCode, String)>,
}

impl FakePrometheusBuilder {
    pub fn respond(self, raw_query: &str, body: &str) -> Self {
        self.respond_with_status(raw_query, StatusCode::OK, body)
    }

    pub fn respond_with_status(mut self, raw_query: &str, status: StatusCode, body: &str) -> Self {
        self.responses
            .insert(raw_query.to_string(), (status, body.to_string()));
        self
    }

    pub async fn serve(self) -> Result<FakePrometheus> {
        self.serve_on("127.0.0.1:0".parse()?).await
    }

    pub async fn serve_on(self, address: SocketAddr) -> Result<FakePrometheus> {
        let state = Arc::new(FakeState {
            responses: self.responses,
            received: Mutex::new(Vec::new()),
        });
        let listener = tokio::net::TcpListener::bind(address).await?;
        let address = listener.local_addr()?;
        let app = Router::new()
            .route("/api/v1/query", get(handle_query))
            .with_state(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(FakePrometheus { address, state })
    }
}

async fn handle_query(
    State(state): State<Arc<FakeState>>,
    RawQuery(raw): RawQuery,
) -> (StatusCode, String) {
    let raw = raw.unwrap_or_default();
    state.received.lock().unwrap().push(raw.clone());
    let key = raw.strip_prefix("query=").unwrap_or(&raw);
    state
        .responses
        .get(key)
        .cloned()
        .unwrap_or((StatusCode::OK, EMPTY_VECTOR.to_string()))
}

/// A free local port, released before returning.
pub fn reserve_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Shell script standing in for the Prometheus binary: ignores its
/// arguments and sleeps until terminated.
pub fn fake_binary(dir: &Path) -> PathBuf {
    let path = dir.join("fake-prometheus");
    std::fs::write(&path, "#!/bin/sh\nexec sleep 60\n").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub fn test_config(dir: &TempDir, listen_address: &str) -> PromBenchConfig {
    PromBenchConfig {
        prometheus_binary: fake_binary(dir.path()).display().to_string(),
        listen_address: listen_address.to_string(),
        config_file: dir.path().join("empty_prometheus.yml"),
        max_attempts: 10,
        backoff_step_ms: 100,
        query_encoding: "raw".to_string(),
        shutdown_timeout_seconds: 5,
    }
}

/// True once no process with this pid is left running, zombies included.
pub async fn wait_for_exit(pid: u32) -> bool {
    for _ in 0..50 {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Err(_) => return true,
            Ok(stat) if stat.contains(") Z ") => return true,
            Ok(_) => tokio::time::sleep(Duration::from_millis(100)).await,
        }
    }
    false
}
