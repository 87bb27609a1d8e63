//! Primary/secondary role detection.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;

use crate::remote::{Connector, RemoteError, RemoteTarget};
use crate::store::{self, ClusterStore, StoreError};
use crate::worker::ShutdownSignal;

/// Errors from a single probe attempt. None are fatal.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Last output line was not a boolean.
    #[error("unrecognised role output: {0:?}")]
    Unparseable(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Interpret role-check output.
///
/// The last non-empty line decides; `true`/`false` in any case.
pub fn parse_role(output: &str) -> Result<bool, ProbeError> {
    let last = output
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .unwrap_or_default();
    if last.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if last.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ProbeError::Unparseable(last.to_string()))
    }
}

/// Asks a node whether it is primary and records `<node>.primary`.
///
/// Uses a session of its own, opened and closed per attempt. A failed
/// attempt writes nothing, leaving any previous role in place.
pub struct IdentityProbe {
    target: RemoteTarget,
    command: String,
    connector: Arc<dyn Connector>,
    store: Arc<ClusterStore>,
    refresh: Option<Duration>,
    shutdown: ShutdownSignal,
}

impl IdentityProbe {
    pub fn new(
        target: RemoteTarget,
        command: impl Into<String>,
        connector: Arc<dyn Connector>,
        store: Arc<ClusterStore>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            target,
            command: command.into(),
            connector,
            store,
            refresh: None,
            shutdown,
        }
    }

    /// Re-probe every `interval` instead of once.
    pub fn with_refresh(mut self, interval: Option<Duration>) -> Self {
        self.refresh = interval;
        self
    }

    /// Run the role check once and store the result.
    pub fn probe_once(&self) -> Result<bool, ProbeError> {
        let mut session = self.connector.connect(&self.target)?;
        let output = session.run(&self.command);
        session.close();

        let primary = parse_role(&output?)?;
        self.store
            .set(store::primary_path(&self.target.node)?, primary)?;
        Ok(primary)
    }

    /// Run on a named, detached thread.
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("probe-{}", self.target.node))
            .spawn(move || self.run())
    }

    fn run(self) {
        let node = self.target.node.as_str();
        loop {
            if self.shutdown.is_triggered() {
                break;
            }
            match self.probe_once() {
                Ok(primary) => tracing::info!(node, primary, "Role detected"),
                Err(e) => tracing::warn!(node, error = %e, "Role probe failed"),
            }
            match self.refresh {
                Some(interval) if !self.shutdown.sleep(interval) => {}
                _ => break,
            }
        }
    }
}
