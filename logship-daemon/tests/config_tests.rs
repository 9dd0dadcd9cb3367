//! Configuration loading tests through the daemon CLI.
//!
//! Tests precedence: CLI flags > environment variables > file > defaults.

use std::path::Path;

use clap::Parser;
use serial_test::serial;

use logship_daemon::cli::DaemonCli;

fn write_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("logship.toml");
    let toml_str = r#"
[agent]
id = "from-file"

[server]
host = "file-host"
port = 8080

[[sources]]
type = "syslog"
path = "/var/log/syslog"

[[sources]]
type = "auditd"
path = "/var/log/audit/audit.log"
enabled = false
"#;
    std::fs::write(&path, toml_str).unwrap();
    path
}

fn cli(args: &[&str]) -> DaemonCli {
    DaemonCli::parse_from(std::iter::once("logship").chain(args.iter().copied()))
}

#[tokio::test]
#[serial]
async fn test_file_values_are_loaded() {
    // Given: A config file and no overrides
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path());

    // When: Loading through the CLI
    let config = cli(&["--config", &path.display().to_string()])
        .load_config()
        .await
        .unwrap();

    // Then: File values and defaults are combined
    assert_eq!(config.agent.id, "from-file");
    assert_eq!(config.server.host, "file-host");
    assert_eq!(config.server.database, "siem");
    assert_eq!(config.enabled_sources().count(), 1);
    assert!(!config.agent.hostname.is_empty());
}

#[tokio::test]
#[serial]
async fn test_env_overrides_file_and_cli_overrides_env() {
    // Given: A config file, an env override and a CLI override
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path());
    // SAFETY: serialized test, no other thread reads the environment
    unsafe {
        std::env::set_var("LOGSHIP_SERVER_HOST", "env-host");
        std::env::set_var("LOGSHIP_AGENT_ID", "env-agent");
    }

    // When: Loading with --server-host
    let result = cli(&[
        "--config",
        &path.display().to_string(),
        "--server-host",
        "cli-host",
    ])
    .load_config()
    .await;

    // SAFETY: see above
    unsafe {
        std::env::remove_var("LOGSHIP_SERVER_HOST");
        std::env::remove_var("LOGSHIP_AGENT_ID");
    }

    // Then: CLI beats env, env beats file
    let config = result.unwrap();
    assert_eq!(config.server.host, "cli-host");
    assert_eq!(config.agent.id, "env-agent");
}

#[tokio::test]
#[serial]
async fn test_missing_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    let err = cli(&["--config", &missing.display().to_string()])
        .load_config()
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("nope.toml"), "got: {err:#}");
}

#[tokio::test]
#[serial]
async fn test_invalid_override_fails_validation() {
    // Given: A valid file but an invalid log level on the command line
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path());

    // When: Loading
    let result = cli(&[
        "--config",
        &path.display().to_string(),
        "--log-level",
        "loud",
    ])
    .load_config()
    .await;

    // Then: Validation rejects it
    let err = result.unwrap_err();
    assert!(format!("{err:#}").contains("log_level"), "got: {err:#}");
}
