//! CLI argument definitions for the logship daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.
//! Flags that mirror config keys take precedence over both the config
//! file and `LOGSHIP_*` environment variables.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use logship_core::config::LogshipConfig;

/// logship host log shipping agent.
///
/// Tails local log files, normalizes each line into a security event and
/// ships batches to a central collector.
#[derive(Parser, Debug)]
#[command(name = "logship")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to logship.toml configuration file.
    #[arg(short, long, default_value = "/etc/logship/logship.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the agent.
    #[arg(long)]
    pub validate: bool,

    /// Override PID file path.
    #[arg(long)]
    pub pid_file: Option<String>,

    /// Override collector host.
    #[arg(long)]
    pub server_host: Option<String>,

    /// Override collector port.
    #[arg(long)]
    pub server_port: Option<u16>,

    /// Override agent identifier.
    #[arg(long)]
    pub agent_id: Option<String>,
}

impl DaemonCli {
    /// Load the config file and apply overrides in precedence order:
    /// CLI flags > environment > file > defaults.
    pub async fn load_config(&self) -> Result<LogshipConfig> {
        let mut config = LogshipConfig::from_file(&self.config)
            .await
            .with_context(|| format!("failed to load config {}", self.config.display()))?;

        config.apply_env_overrides();
        self.apply_overrides(&mut config);
        config.resolve();
        config.validate().context("config validation failed")?;
        Ok(config)
    }

    /// Write every flag that was given on the command line into `config`.
    pub fn apply_overrides(&self, config: &mut LogshipConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(pid_file) = &self.pid_file {
            config.general.pid_file = pid_file.clone();
        }
        if let Some(host) = &self.server_host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.server_port {
            config.server.port = port;
        }
        if let Some(agent_id) = &self.agent_id {
            config.agent.id = agent_id.clone();
        }
    }
}
