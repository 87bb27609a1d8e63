//! Cluster monitor: the top-level handle.
//!
//! Owns the shared store, the node sessions and the shutdown signal. A
//! display layer keeps one of these, calls [`ClusterMonitor::start_polling`]
//! once, then reads [`ClusterMonitor::store`] and
//! [`ClusterMonitor::status`] as often as it redraws.

use std::sync::Arc;

use thiserror::Error;

use crate::collector::{self, Collector, CollectorError};
use crate::config::{ClusterConfig, ConfigError};
use crate::health::{ClusterHealth, HealthEvaluator};
use crate::node::{NodeSession, PollContext};
use crate::remote::{Connector, Credential};
use crate::store::{ClusterStore, StoreError, StoreReader};
use crate::worker::ShutdownSignal;

/// Errors raised while starting the monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Collector(#[from] CollectorError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A worker or probe thread could not be created.
    #[error("failed to spawn thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("polling already started")]
    AlreadyStarted,
}

pub struct ClusterMonitor {
    config: ClusterConfig,
    credential: Credential,
    connector: Arc<dyn Connector>,
    store: Arc<ClusterStore>,
    evaluator: HealthEvaluator,
    shutdown: ShutdownSignal,
    sessions: Vec<NodeSession>,
}

impl ClusterMonitor {
    /// Create a monitor over `config`. Nothing runs until `start_polling`.
    ///
    /// # Errors
    /// `MonitorError::Config` if the configuration is invalid.
    pub fn new(
        config: ClusterConfig,
        credential: Credential,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, MonitorError> {
        config.validate()?;
        Ok(Self {
            evaluator: HealthEvaluator::new(config.health.window),
            config,
            credential,
            connector,
            store: Arc::new(ClusterStore::new()),
            shutdown: ShutdownSignal::new(),
            sessions: Vec::new(),
        })
    }

    /// Spawn every node's workers and probe.
    ///
    /// # Errors
    /// `MonitorError::AlreadyStarted` on a second call; other variants if a
    /// collector cannot be built or a thread cannot be spawned.
    pub fn start_polling(&mut self) -> Result<(), MonitorError> {
        if !self.sessions.is_empty() {
            return Err(MonitorError::AlreadyStarted);
        }

        let collectors = self
            .config
            .collectors
            .iter()
            .map(collector::build)
            .collect::<Result<Vec<Arc<dyn Collector>>, _>>()?;

        let ctx = PollContext {
            connector: Arc::clone(&self.connector),
            store: Arc::clone(&self.store),
            poll: self.config.poll.clone(),
            identity: self.config.identity.clone(),
            shutdown: self.shutdown.clone(),
        };

        for node in &self.config.nodes {
            let target = node.target(&self.config.ssh, &self.credential);
            let session = NodeSession::start(node, target, &collectors, &ctx)?;
            self.sessions.push(session);
        }

        tracing::info!(
            nodes = self.sessions.len(),
            collectors = collectors.len(),
            threads = self.sessions.len() * (collectors.len() + 1),
            "Polling started"
        );
        Ok(())
    }

    /// Current health and role of every node.
    pub fn status(&self) -> Result<ClusterHealth, StoreError> {
        self.evaluator.evaluate(
            &self.store,
            self.sessions.iter().map(|s| (s.name(), s.workers())),
        )
    }

    /// Read-only handle to the shared store, for a display layer.
    pub fn store(&self) -> StoreReader {
        StoreReader::new(Arc::clone(&self.store))
    }

    pub fn sessions(&self) -> &[NodeSession] {
        &self.sessions
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Ask all worker and probe threads to stop.
    ///
    /// Threads finish their current blocking read before exiting.
    pub fn shutdown(&self) {
        tracing::info!("Stopping pollers");
        self.shutdown.trigger();
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }
}

impl Drop for ClusterMonitor {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}
