//! Per-node thread group.

use std::sync::Arc;

use crate::collector::Collector;
use crate::config::{IdentityConfig, NodeSpec, PollConfig};
use crate::monitor::MonitorError;
use crate::probe::IdentityProbe;
use crate::remote::{Connector, RemoteTarget};
use crate::store::ClusterStore;
use crate::worker::{PollWorker, ShutdownSignal, WorkerState};

/// Everything a node's threads share with the rest of the cluster.
#[derive(Clone)]
pub(crate) struct PollContext {
    pub connector: Arc<dyn Connector>,
    pub store: Arc<ClusterStore>,
    pub poll: PollConfig,
    pub identity: IdentityConfig,
    pub shutdown: ShutdownSignal,
}

/// One node's poll workers and identity probe.
///
/// Spawns `collectors + 1` detached threads; each opens its own session.
#[derive(Debug)]
pub struct NodeSession {
    spec: NodeSpec,
    workers: Vec<Arc<WorkerState>>,
}

impl NodeSession {
    pub(crate) fn start(
        spec: &NodeSpec,
        target: RemoteTarget,
        collectors: &[Arc<dyn Collector>],
        ctx: &PollContext,
    ) -> Result<Self, MonitorError> {
        let mut workers = Vec::with_capacity(collectors.len());
        for collector in collectors {
            let worker = PollWorker::new(
                target.clone(),
                Arc::clone(collector),
                Arc::clone(&ctx.connector),
                Arc::clone(&ctx.store),
                ctx.poll.clone(),
                ctx.shutdown.clone(),
            )?;
            workers.push(worker.state());
            worker.spawn()?;
        }

        let probe = IdentityProbe::new(
            target,
            ctx.identity.probe_command(spec.mongo_port),
            Arc::clone(&ctx.connector),
            Arc::clone(&ctx.store),
            ctx.shutdown.clone(),
        )
        .with_refresh(ctx.identity.refresh_interval);
        probe.spawn()?;

        tracing::info!(node = %spec.name, workers = workers.len(), "Node session started");
        Ok(Self {
            spec: spec.clone(),
            workers,
        })
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &NodeSpec {
        &self.spec
    }

    /// Worker states in collector order.
    pub fn workers(&self) -> &[Arc<WorkerState>] {
        &self.workers
    }
}
