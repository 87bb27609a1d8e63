//! mongo-commander - Live MongoDB Cluster Monitor
//!
//! Streams the output of remote monitoring tools (`mongotop`, `mongostat`,
//! log tails) from every node of a cluster into one shared in-memory store,
//! and derives per-node health and replica set role from it.
//!
//! # Architecture
//!
//! - **Store**: hierarchical key/value tree behind one reentrant lock
//! - **Collectors**: closed set of remote commands and how their lines are recorded
//! - **Remote**: session transport (OpenSSH subprocesses, or a scripted stand-in)
//! - **Workers**: one thread per (node, collector), reconnecting forever
//! - **Probe**: one thread per node writing `<node>.primary`
//! - **Health**: staleness and liveness snapshot for a display layer
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mongo_commander::{ClusterConfig, ClusterMonitor, SshConnector};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClusterConfig::load("config.yml")?;
//!     let credential = config.ssh.resolve_credential(None)?;
//!     let mut monitor = ClusterMonitor::new(config, credential, Arc::new(SshConnector::new()))?;
//!     monitor.start_polling()?;
//!
//!     let top = monitor.store().get("top.db1")?;
//!     println!("{} lines", top.datums().len());
//!     Ok(())
//! }
//! ```

pub mod collector;
pub mod config;
pub mod health;
pub mod monitor;
pub mod node;
pub mod probe;
pub mod remote;
pub mod store;
pub mod worker;

pub use collector::{Collector, CollectorKind, CollectorSpec};
pub use config::{ClusterConfig, ConfigError, NodeSpec};
pub use health::{ClusterHealth, HealthEvaluator, NodeHealth, Role, WorkerHealth};
pub use monitor::{ClusterMonitor, MonitorError};
pub use node::NodeSession;
pub use probe::{IdentityProbe, ProbeError};
pub use remote::{Connector, Credential, RemoteError, ScriptedConnector, SshConnector};
pub use store::{ClusterStore, Datum, DottedPath, StoreError, StoreReader, StoreValue};
pub use worker::{PollWorker, ShutdownSignal, WorkerPhase, WorkerState};
