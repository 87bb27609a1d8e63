//! Health Evaluation
//!
//! Read-only view combining worker liveness with data staleness. A worker
//! is healthy when its thread is alive and either its collector is
//! infrequent or its last success (`latest.<node>.<collector>`) is younger
//! than the health window. A missing timestamp is infinitely stale.
//!
//! Node role comes from `<node>.primary`; a node never probed is secondary.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum_macros::{AsRefStr, Display};

use crate::store::{self, ClusterStore, StoreError};
use crate::worker::{WorkerPhase, WorkerState};

/// Replica set role as last reported by the identity probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Primary,
    Secondary,
}

impl From<bool> for Role {
    fn from(primary: bool) -> Self {
        if primary { Self::Primary } else { Self::Secondary }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerHealth {
    pub collector: String,
    pub alive: bool,
    pub infrequent: bool,
    pub phase: WorkerPhase,
    pub reconnects: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub healthy: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeHealth {
    pub name: String,
    pub role: Role,
    /// Healthy workers.
    pub healthy: usize,
    /// All workers.
    pub total: usize,
    pub workers: Vec<WorkerHealth>,
}

impl NodeHealth {
    /// Every worker on the node is healthy.
    pub fn is_fully_healthy(&self) -> bool {
        self.healthy == self.total
    }
}

/// Point-in-time health of every node, sorted by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterHealth {
    pub evaluated_at: DateTime<Utc>,
    pub nodes: Vec<NodeHealth>,
}

impl ClusterHealth {
    pub fn node(&self, name: &str) -> Option<&NodeHealth> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn primaries(&self) -> impl Iterator<Item = &NodeHealth> {
        self.nodes.iter().filter(|n| n.role == Role::Primary)
    }

    pub fn secondaries(&self) -> impl Iterator<Item = &NodeHealth> {
        self.nodes.iter().filter(|n| n.role == Role::Secondary)
    }
}

/// Computes [`ClusterHealth`] snapshots on demand.
#[derive(Debug, Clone, Copy)]
pub struct HealthEvaluator {
    window: Duration,
}

impl HealthEvaluator {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Health rule for a single worker.
    pub fn is_healthy(
        &self,
        alive: bool,
        infrequent: bool,
        last_success: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        if !alive {
            return false;
        }
        if infrequent {
            return true;
        }
        let Some(ts) = last_success else {
            return false;
        };
        // Clock skew can put `ts` ahead of `now`; treat that as fresh.
        match (now - ts).to_std() {
            Ok(age) => age < self.window,
            Err(_) => true,
        }
    }

    /// Snapshot the cluster as of now.
    pub fn evaluate<'a, I>(&self, store: &ClusterStore, nodes: I) -> Result<ClusterHealth, StoreError>
    where
        I: IntoIterator<Item = (&'a str, &'a [Arc<WorkerState>])>,
    {
        self.evaluate_at(store, nodes, Utc::now())
    }

    /// Snapshot the cluster as of `now`.
    ///
    /// All store reads happen under one lock acquisition.
    pub fn evaluate_at<'a, I>(
        &self,
        store: &ClusterStore,
        nodes: I,
        now: DateTime<Utc>,
    ) -> Result<ClusterHealth, StoreError>
    where
        I: IntoIterator<Item = (&'a str, &'a [Arc<WorkerState>])>,
    {
        let mut nodes = store.atomically(|store| {
            nodes
                .into_iter()
                .map(|(name, workers)| self.evaluate_node(store, name, workers, now))
                .collect::<Result<Vec<_>, _>>()
        })?;
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(ClusterHealth {
            evaluated_at: now,
            nodes,
        })
    }

    fn evaluate_node(
        &self,
        store: &ClusterStore,
        name: &str,
        workers: &[Arc<WorkerState>],
        now: DateTime<Utc>,
    ) -> Result<NodeHealth, StoreError> {
        let role = Role::from(store.get_bool_or(store::primary_path(name)?, false)?);

        let mut report = Vec::with_capacity(workers.len());
        for worker in workers {
            let last_success = store.get_timestamp(store::latest_path(name, worker.collector())?)?;
            let alive = worker.is_alive();
            report.push(WorkerHealth {
                collector: worker.collector().to_string(),
                alive,
                infrequent: worker.infrequent(),
                phase: worker.phase(),
                reconnects: worker.reconnects(),
                last_success,
                healthy: self.is_healthy(alive, worker.infrequent(), last_success, now),
            });
        }

        Ok(NodeHealth {
            name: name.to_string(),
            role,
            healthy: report.iter().filter(|w| w.healthy).count(),
            total: report.len(),
            workers: report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker(node: &str, collector: &str, infrequent: bool, alive: bool) -> Arc<WorkerState> {
        let state = WorkerState::new(node, collector, infrequent);
        state.set_alive(alive);
        Arc::new(state)
    }

    #[test]
    fn test_staleness_rule() {
        let eval = HealthEvaluator::new(Duration::from_secs(60));
        let now = Utc::now();
        let fresh = Some(now - chrono::Duration::seconds(10));
        let stale = Some(now - chrono::Duration::seconds(120));

        assert!(eval.is_healthy(true, false, fresh, now));
        assert!(!eval.is_healthy(true, false, stale, now));
        assert!(!eval.is_healthy(true, false, None, now));
        assert!(eval.is_healthy(true, true, stale, now));
        assert!(eval.is_healthy(true, true, None, now));
        assert!(!eval.is_healthy(false, true, fresh, now));
        assert!(!eval.is_healthy(false, false, fresh, now));
    }

    #[test]
    fn test_future_timestamp_counts_as_fresh() {
        let eval = HealthEvaluator::new(Duration::from_secs(60));
        let now = Utc::now();
        assert!(eval.is_healthy(true, false, Some(now + chrono::Duration::seconds(5)), now));
    }

    #[test]
    fn test_evaluate_reads_store() {
        let store = ClusterStore::new();
        let now = Utc::now();
        store.set("latest.db1.top", now - chrono::Duration::seconds(5)).unwrap();
        store.set("latest.db1.stat", now - chrono::Duration::seconds(300)).unwrap();
        store.set("latest.db1.log", now - chrono::Duration::seconds(300)).unwrap();
        store.set("db1.primary", true).unwrap();

        let db1 = vec![
            worker("db1", "top", false, true),
            worker("db1", "stat", false, true),
            worker("db1", "log", true, true),
        ];
        let db2 = vec![worker("db2", "top", false, false)];

        let eval = HealthEvaluator::new(Duration::from_secs(60));
        let health = eval
            .evaluate_at(&store, [("db2", db2.as_slice()), ("db1", db1.as_slice())], now)
            .unwrap();

        let names: Vec<&str> = health.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["db1", "db2"]);

        let node = health.node("db1").unwrap();
        assert_eq!(node.role, Role::Primary);
        assert_eq!((node.healthy, node.total), (2, 3));
        assert!(!node.is_fully_healthy());
        assert!(!node.workers[1].healthy);
        assert!(node.workers[2].healthy);

        let node = health.node("db2").unwrap();
        assert_eq!(node.role, Role::Secondary);
        assert_eq!((node.healthy, node.total), (0, 1));

        assert_eq!(health.primaries().count(), 1);
        assert_eq!(health.secondaries().next().unwrap().name, "db2");
    }

    #[test]
    fn test_node_without_workers_is_fully_healthy() {
        let store = ClusterStore::new();
        let eval = HealthEvaluator::new(Duration::from_secs(60));
        let none: Vec<Arc<WorkerState>> = Vec::new();
        let health = eval.evaluate(&store, [("db1", none.as_slice())]).unwrap();
        assert!(health.nodes[0].is_fully_healthy());
        assert_eq!(health.nodes[0].role, Role::Secondary);
    }

    #[test]
    fn test_snapshot_serializes() {
        let store = ClusterStore::new();
        let workers = vec![worker("db1", "top", false, true)];
        let health = HealthEvaluator::new(Duration::from_secs(60))
            .evaluate(&store, [("db1", workers.as_slice())])
            .unwrap();
        let json = serde_json::to_value(&health).unwrap();
        assert_eq!(json["nodes"][0]["role"], "secondary");
        assert_eq!(json["nodes"][0]["workers"][0]["phase"], "connecting");
    }
}
