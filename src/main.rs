//! mongo-commander Binary Entry Point
//!
//! Loads the cluster config, starts polling every node and logs a health
//! summary on a fixed cadence. Core functionality lives in the
//! `mongo_commander` library crate.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use mongo_commander::{
    ClusterConfig, ClusterMonitor, Connector, ScriptedConnector, SshConnector,
    config::{AuthType, parse_duration},
    health::ClusterHealth,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// mongo-commander - live MongoDB cluster monitor
#[derive(Parser, Debug)]
#[command(name = "mongo-commander", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yml", env = "MONGO_COMMANDER_CONFIG")]
    config: String,

    /// Staleness window before a worker is unhealthy (overrides config file)
    #[arg(long, value_parser = parse_duration)]
    health_window: Option<Duration>,

    /// How often to log the cluster summary
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    status_interval: Duration,

    /// SSH password for password auth; prompted without echo when absent
    #[arg(long, env = "MONGO_COMMANDER_SSH_PASSWORD", hide_env_values = true)]
    ssh_password: Option<String>,

    /// Use a scripted transport that emits synthetic lines instead of SSH
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,mongo_commander=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    tracing::info!("Loading configuration from: {}", cli.config);
    let mut config = ClusterConfig::load(&cli.config)?;

    // CLI > ENV > config file
    if let Some(window) = cli.health_window {
        config.health.window = window;
    }
    config.validate()?;

    tracing::info!(
        "Cluster: {} nodes, {} collectors, health window {}",
        config.nodes.len(),
        config.collectors.len(),
        humantime::format_duration(config.health.window),
    );

    let password = match config.ssh.auth_type {
        AuthType::Password if !cli.dry_run => match cli.ssh_password {
            Some(password) => Some(password),
            None => Some(prompt_password(&config.ssh.user)?),
        },
        _ => cli.ssh_password,
    };
    let credential = match (cli.dry_run, config.ssh.resolve_credential(password)) {
        (_, Ok(credential)) => credential,
        (true, Err(_)) => mongo_commander::Credential::Password(String::new()),
        (false, Err(e)) => return Err(e.into()),
    };

    let connector: Arc<dyn Connector> = if cli.dry_run {
        tracing::info!("Dry run: using synthetic output");
        Arc::new(dry_run_connector(&config))
    } else {
        Arc::new(SshConnector::new())
    };

    let mut monitor = ClusterMonitor::new(config, credential, connector)?;
    monitor.start_polling()?;

    loop {
        std::thread::sleep(cli.status_interval);
        match monitor.status() {
            Ok(health) => {
                log_summary(&health);
                match serde_json::to_string(&health) {
                    Ok(json) => tracing::trace!(snapshot = %json, "Health snapshot"),
                    Err(e) => tracing::warn!(error = %e, "Failed to serialize health snapshot"),
                }
            }
            Err(e) => tracing::error!(error = %e, "Health evaluation failed"),
        }
        tracing::debug!(keys = ?monitor.store().root_keys(), "Store contents");
    }
}

/// Read the SSH password from the terminal without echo.
fn prompt_password(user: &str) -> io::Result<String> {
    rpassword::prompt_password(format!("SSH password for {user}: "))
}

/// Scripted transport that answers role checks and streams numbered lines.
fn dry_run_connector(config: &ClusterConfig) -> ScriptedConnector {
    let connector = ScriptedConnector::new().with_synthetic_output();
    for (i, node) in config.nodes.iter().enumerate() {
        let role = if i == 0 { "true" } else { "false" };
        connector.respond(
            &node.name,
            &config.identity.probe_command(node.mongo_port),
            Ok(role),
        );
    }
    connector
}

fn log_summary(health: &ClusterHealth) {
    for node in &health.nodes {
        let stale: Vec<&str> = node
            .workers
            .iter()
            .filter(|w| !w.healthy)
            .map(|w| w.collector.as_str())
            .collect();
        if node.is_fully_healthy() {
            tracing::info!(
                node = %node.name,
                role = %node.role,
                "{}/{} workers healthy",
                node.healthy,
                node.total
            );
        } else {
            tracing::warn!(
                node = %node.name,
                role = %node.role,
                unhealthy = ?stale,
                "{}/{} workers healthy",
                node.healthy,
                node.total
            );
        }
    }
}
