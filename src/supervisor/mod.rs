//! Supervision of the local Prometheus process.
//!
//! A [`ServerHandle`] owns the child process for one (storage directory,
//! listen address) pair. Dropping the handle requests termination, so the
//! process never outlives the scope that started it.

mod registry;

use crate::config::PromBenchConfig;
use crate::error::{PromBenchError, Result};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Starts Prometheus bound to a storage directory.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    binary: String,
    config_file: PathBuf,
}

impl ProcessSupervisor {
    pub fn new(binary: impl Into<String>, config_file: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            config_file: config_file.into(),
        }
    }

    pub fn from_config(config: &PromBenchConfig) -> Self {
        Self::new(config.prometheus_binary.clone(), config.config_file.clone())
    }

    /// Writes the empty configuration file and spawns the process.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, storage_dir: impl AsRef<Path>, address: &str) -> Result<ServerHandle> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        let claim = registry::claim(&storage_dir, address)?;

        // The configuration file is not session-unique: concurrent sessions
        // on one host rewrite the same file.
        std::fs::write(&self.config_file, "").map_err(|source| PromBenchError::Startup {
            binary: self.binary.clone(),
            source,
        })?;

        debug!(
            binary = %self.binary,
            storage_dir = %storage_dir.display(),
            address = %address,
            "Starting Prometheus"
        );

        let mut cmd = Command::new(&self.binary);
        cmd.arg(format!("--config.file={}", self.config_file.display()))
            .arg(format!("--storage.tsdb.path={}", storage_dir.display()))
            .arg(format!("--web.listen-address={}", address))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            // Termination is requested by the handle with SIGTERM, an
            // immediate SIGKILL on drop would cut it short.
            .kill_on_drop(false);

        let child = cmd.spawn().map_err(|source| PromBenchError::Startup {
            binary: self.binary.clone(),
            source,
        })?;

        info!(
            pid = ?child.id(),
            address = %address,
            "Prometheus started"
        );

        Ok(ServerHandle {
            address: address.to_string(),
            storage_dir,
            config_file: self.config_file.clone(),
            child,
            claim: Some(claim),
        })
    }

    /// Requests termination without waiting for the process to exit.
    pub fn stop(&self, handle: &mut ServerHandle) {
        handle.stop();
    }
}

/// The running Prometheus process and the resources it binds.
#[derive(Debug)]
pub struct ServerHandle {
    address: String,
    storage_dir: PathBuf,
    config_file: PathBuf,
    child: Child,
    claim: Option<registry::Claim>,
}

impl ServerHandle {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// `None` once the process has been reaped.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn is_stopped(&self) -> bool {
        self.claim.is_none()
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Sends SIGTERM and returns immediately. Only the first call signals.
    ///
    /// The process may still hold the storage directory and the address for
    /// a while after this returns.
    pub fn stop(&mut self) {
        let Some(claim) = self.claim.take() else {
            return;
        };
        self.terminate();
        drop(claim);
        debug!(address = %self.address, "Prometheus termination requested");
    }

    /// Sends SIGTERM, waits up to `timeout` for the process to exit, then
    /// kills it. Unlike [`ServerHandle::stop`] this waits for the exit.
    pub async fn shutdown(mut self, timeout: Duration) -> std::io::Result<ExitStatus> {
        self.stop();
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                warn!(
                    address = %self.address,
                    timeout = ?timeout,
                    "Prometheus did not exit in time, killing it"
                );
                self.child.kill().await?;
                self.child.wait().await
            }
        }
    }

    #[cfg(unix)]
    fn terminate(&mut self) {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let Some(pid) = self.child.id() else {
            // Already reaped
            return;
        };
        let Ok(pid) = i32::try_from(pid) else {
            warn!(pid = %pid, "Invalid PID, skipping SIGTERM");
            return;
        };
        if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
            if e != nix::errno::Errno::ESRCH {
                warn!(pid = %pid, error = %e, "Failed to send SIGTERM");
            }
        }
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) {
        if let Err(e) = self.child.start_kill() {
            warn!(error = %e, "Failed to kill Prometheus");
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
