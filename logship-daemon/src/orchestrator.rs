//! Agent orchestration -- assembly and lifecycle management.
//!
//! The [`Orchestrator`] owns the loaded configuration and the
//! [`AgentPipeline`]. It writes the PID file, starts the pipeline, waits for
//! a shutdown trigger and drives a graceful stop.
//!
//! # Shutdown Triggers
//!
//! - `SIGTERM` (from systemd, Docker, or `kill`)
//! - `SIGINT` (Ctrl+C)
//! - the pipeline's own shutdown token being cancelled

use std::future::Future;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use logship_core::config::LogshipConfig;
use logship_core::pipeline::{HealthStatus, Pipeline};
use logship_log_pipeline::{
    AgentPipeline, AgentPipelineBuilder, HttpSender, PipelineConfig, SenderSettings,
};

use crate::metrics_server;

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: LogshipConfig,
    /// The tail -> buffer -> send pipeline.
    pipeline: AgentPipeline<HttpSender>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load `logship.toml` (with env overrides) and build the orchestrator.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = LogshipConfig::load(config_path)
            .await
            .with_context(|| format!("failed to load config {}", config_path.display()))?;
        Self::build_from_config(config)
    }

    /// Build from an already-loaded configuration.
    ///
    /// # Errors
    ///
    /// - Configuration validation fails
    /// - The metrics recorder cannot be installed
    /// - The HTTP client or the pipeline cannot be built
    pub fn build_from_config(config: LogshipConfig) -> Result<Self> {
        config.validate().context("config validation failed")?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            record_build_info();
        }

        let sender = HttpSender::new(SenderSettings::from_core(&config))
            .context("failed to build HTTP sender")?;
        let pipeline = AgentPipelineBuilder::new()
            .config(PipelineConfig::from_core(&config))
            .sink(sender)
            .build()
            .context("failed to build agent pipeline")?;

        tracing::info!(
            sources = pipeline.config().sources.len(),
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            pipeline,
            start_time: Instant::now(),
        })
    }

    /// Start the pipeline and block until SIGTERM/SIGINT.
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(wait_for_shutdown_signal()).await
    }

    /// Start the pipeline and block until `shutdown` resolves or the pipeline
    /// cancels itself, then stop gracefully.
    ///
    /// `shutdown` yields the name of the trigger for logging.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = Result<&'static str>>,
    {
        let pid_file = self.config.general.pid_file.clone();
        if !pid_file.is_empty() {
            write_pid_file(Path::new(&pid_file))?;
        }

        tracing::info!(
            agent_id = %self.config.agent.id,
            collector = %self.config.server_url(),
            database = %self.config.server.database,
            collection = %self.config.server.collection,
            "starting logship agent"
        );

        if let Err(e) = self.pipeline.start().await {
            tracing::error!(error = %e, "pipeline startup failed");
            if !pid_file.is_empty() {
                remove_pid_file(Path::new(&pid_file));
            }
            return Err(e).context("failed to start agent pipeline");
        }

        let uptime_cancel = CancellationToken::new();
        let uptime_task = self
            .config
            .metrics
            .enabled
            .then(|| spawn_uptime_updater(self.start_time, uptime_cancel.clone()));

        let pipeline_token = self.pipeline.shutdown_token();
        tracing::info!("agent running");
        let trigger = tokio::select! {
            signal = shutdown => signal,
            _ = pipeline_token.cancelled() => Ok("pipeline cancelled"),
        };
        match &trigger {
            Ok(signal) => tracing::info!(signal = *signal, "shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "failed waiting for shutdown signal"),
        }

        uptime_cancel.cancel();
        if let Some(task) = uptime_task {
            let _ = task.await;
        }

        let stopped = self.pipeline.stop().await;
        if !pid_file.is_empty() {
            remove_pid_file(Path::new(&pid_file));
        }

        trigger?;
        stopped.context("agent pipeline did not stop cleanly")?;
        tracing::info!(
            uptime_secs = self.start_time.elapsed().as_secs(),
            "logship agent shut down"
        );
        Ok(())
    }

    /// Current pipeline health.
    pub async fn health(&self) -> HealthStatus {
        self.pipeline.health_check().await
    }

    /// The loaded configuration.
    pub fn config(&self) -> &LogshipConfig {
        &self.config
    }

    /// The managed pipeline.
    pub fn pipeline(&self) -> &AgentPipeline<HttpSender> {
        &self.pipeline
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Write the current process PID to a file.
///
/// # Security
///
/// - `create_new(true)` creates the file atomically; an existing file means
///   another instance may be running
/// - The created file must be a regular file
/// - Parent directory is created with mode 0o700, the file with 0o600
fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new()
            .mode(0o700)
            .recursive(true)
            .create(parent)
            .with_context(|| format!("failed to create PID directory {}", parent.display()))?;
    }

    let pid = std::process::id();
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing_pid = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing_pid.trim()
            ));
        }
        Err(e) => {
            return Err(e).with_context(|| format!("failed to create PID file {}", path.display()));
        }
    };

    if !file.metadata()?.is_file() {
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file",
            path.display()
        ));
    }

    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    writeln!(file, "{pid}")?;

    tracing::info!(pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file. Failure is logged, not returned.
fn remove_pid_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::info!(path = %path.display(), "PID file removed"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file"),
    }
}

/// Build info gauge (always 1, with version label).
fn record_build_info() {
    use logship_core::metrics as m;

    metrics::gauge!(m::AGENT_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "build info recorded");
}

/// Refresh the uptime gauge every 10 seconds until `cancel` fires.
fn spawn_uptime_updater(
    start_time: Instant,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    use logship_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::AGENT_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs() as f64);
                }
                _ = cancel.cancelled() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_write_pid_file_creates_parent_directory() {
        // Given: A path whose parent directory does not exist
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("run").join("logship.pid");

        // When: Writing the PID file
        write_pid_file(&pid_file).unwrap();

        // Then: It holds the current PID with owner-only permissions
        let content = fs::read_to_string(&pid_file).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());
        let mode = fs::metadata(&pid_file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_write_pid_file_fails_if_already_exists() {
        // Given: An existing PID file
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("logship.pid");
        fs::write(&pid_file, "12345\n").unwrap();

        // When: Writing the PID file again
        let err = write_pid_file(&pid_file).unwrap_err().to_string();

        // Then: The error names the running instance and the file is untouched
        assert!(err.contains("already exists"), "got: {err}");
        assert!(err.contains("12345"), "got: {err}");
        assert_eq!(fs::read_to_string(&pid_file).unwrap(), "12345\n");
    }

    #[test]
    fn test_remove_pid_file_handles_missing_file() {
        // Given: A PID file that was never written
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("missing.pid");

        // When/Then: Removal only logs
        remove_pid_file(&pid_file);
        assert!(!pid_file.exists());
    }

    #[tokio::test]
    async fn test_uptime_updater_stops_on_cancel() {
        // Given: A running uptime updater
        let cancel = CancellationToken::new();
        let task = spawn_uptime_updater(Instant::now(), cancel.clone());

        // When: Cancelling
        cancel.cancel();

        // Then: The task exits promptly
        let result = tokio::time::timeout(std::time::Duration::from_millis(500), task).await;
        assert!(result.is_ok(), "uptime updater should stop after cancel");
    }
}
