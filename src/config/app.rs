//! Cluster configuration structures.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collector::CollectorSpec;
use crate::store::{LATEST_KEY, PRIMARY_KEY};

use super::collector::validate_collectors;
use super::node::{NodeSpec, SshConfig};
use super::validation::ConfigError;

// =============================================================================
// Constants
// =============================================================================

/// Default staleness window before a worker is reported unhealthy (60 seconds).
pub const DEFAULT_HEALTH_WINDOW: Duration = Duration::from_secs(60);

/// Default pause between output batches (1 second).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default upper bound on bytes read per batch.
pub const DEFAULT_BATCH_BYTES: usize = 1024;

/// Default pause before reconnecting a failed session (5 seconds).
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Default mongo shell used for the role check.
pub const DEFAULT_MONGO_SHELL: &str = "mongo";

/// Node names that would alias the `latest.*` and `<node>.primary` keys.
const RESERVED_NODE_NAMES: [&str; 2] = [LATEST_KEY, PRIMARY_KEY];

fn default_health_window() -> Duration {
    DEFAULT_HEALTH_WINDOW
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

fn default_batch_bytes() -> usize {
    DEFAULT_BATCH_BYTES
}

fn default_reconnect_delay() -> Duration {
    DEFAULT_RECONNECT_DELAY
}

fn default_mongo_shell() -> String {
    DEFAULT_MONGO_SHELL.to_string()
}

// =============================================================================
// Sections
// =============================================================================

/// Health evaluation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Maximum data age for a frequent collector to count as healthy.
    #[serde(default = "default_health_window", with = "humantime_serde")]
    pub window: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_HEALTH_WINDOW,
        }
    }
}

/// Poll worker loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Sleep between output batches (default: 1s).
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Maximum bytes consumed per batch (default: 1024).
    #[serde(default = "default_batch_bytes")]
    pub batch_bytes: usize,

    /// Sleep before reconnecting after a failure (default: 5s).
    #[serde(default = "default_reconnect_delay", with = "humantime_serde")]
    pub reconnect_delay: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            batch_bytes: DEFAULT_BATCH_BYTES,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// Role probe settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Mongo shell binary (default: "mongo").
    #[serde(default = "default_mongo_shell")]
    pub shell: String,

    /// Re-probe cadence; probe once when absent.
    #[serde(default, with = "humantime_serde")]
    pub refresh_interval: Option<Duration>,
}

impl IdentityConfig {
    /// Shell command printing `true` when the local mongod is primary.
    pub fn probe_command(&self, mongo_port: u16) -> String {
        format!(
            "{} --quiet --port {mongo_port} --eval 'db.isMaster().ismaster'",
            self.shell
        )
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            shell: DEFAULT_MONGO_SHELL.to_string(),
            refresh_interval: None,
        }
    }
}

// =============================================================================
// Cluster Configuration
// =============================================================================

/// Top-level cluster configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Monitored nodes.
    pub nodes: Vec<NodeSpec>,

    /// SSH settings shared by all nodes.
    pub ssh: SshConfig,

    /// Collectors run on every node.
    #[serde(default)]
    pub collectors: Vec<CollectorSpec>,

    /// Health evaluation settings.
    #[serde(default)]
    pub health: HealthConfig,

    /// Poll loop settings.
    #[serde(default)]
    pub poll: PollConfig,

    /// Role probe settings.
    #[serde(default)]
    pub identity: IdentityConfig,
}

impl ClusterConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nodes.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one node is required".to_string(),
            ));
        }

        let mut seen_names = HashSet::new();
        for node in &self.nodes {
            if node.name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "node name cannot be empty".to_string(),
                ));
            }
            if RESERVED_NODE_NAMES.contains(&node.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "node name '{}' is reserved",
                    node.name
                )));
            }
            if !seen_names.insert(node.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate node name: '{}'",
                    node.name
                )));
            }
            if node.address.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "node '{}': address cannot be empty",
                    node.name
                )));
            }
            if node.mongo_port == 0 || node.ssh_port == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "node '{}': ports must be non-zero",
                    node.name
                )));
            }
        }

        self.ssh.validate()?;
        validate_collectors(&self.collectors, &self.nodes)?;

        if self.health.window.is_zero() {
            return Err(ConfigError::ValidationError(
                "health window must be positive".to_string(),
            ));
        }
        if self.poll.interval.is_zero() || self.poll.reconnect_delay.is_zero() {
            return Err(ConfigError::ValidationError(
                "poll interval and reconnect_delay must be positive".to_string(),
            ));
        }
        if self.poll.batch_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "poll batch_bytes must be positive".to_string(),
            ));
        }
        if self.identity.shell.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "identity shell cannot be empty".to_string(),
            ));
        }
        if self.identity.refresh_interval.is_some_and(|d| d.is_zero()) {
            return Err(ConfigError::ValidationError(
                "identity refresh_interval must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
