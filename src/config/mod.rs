//! Configuration module for the cluster poller.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Nodes (address, mongod and SSH ports)
//! - SSH authentication
//! - Collector definitions
//! - Health window, poll cadence and role probe settings

mod app;
mod collector;
mod node;
mod validation;

pub use app::{ClusterConfig, HealthConfig, IdentityConfig, PollConfig};
pub use collector::validate_collectors;
pub use node::{AuthType, NodeSpec, SshConfig};
pub use validation::{ConfigError, expand_env_vars, expand_path, parse_duration};

// Re-export constants
pub use app::{
    DEFAULT_BATCH_BYTES, DEFAULT_HEALTH_WINDOW, DEFAULT_MONGO_SHELL, DEFAULT_POLL_INTERVAL,
    DEFAULT_RECONNECT_DELAY,
};
pub use node::{DEFAULT_MONGO_PORT, DEFAULT_SSH_PORT};
