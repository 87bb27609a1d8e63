//! Poll workers.
//!
//! One [`PollWorker`] runs per (node, collector) pair on its own thread. It
//! owns a single remote session, runs the collector's command and streams
//! output into the store until the monitor shuts down:
//!
//! ```text
//! Connecting ──ok──▶ Running ──eof/error──▶ Disconnected ──▶ Connecting
//!     │                                                          ▲
//!     └──────────────fail (wait reconnect_delay)─────────────────┘
//! ```
//!
//! Nothing inside the loop ends the thread. Transport errors, store shape
//! errors and collector panics all become a transition to `Disconnected`.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

use crate::collector::Collector;
use crate::config::PollConfig;
use crate::remote::{Connector, RemoteError, RemoteSession, RemoteTarget};
use crate::store::{self, ClusterStore, DottedPath, StoreError};

/// Granularity of interruptible sleeps.
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

// =============================================================================
// Shutdown
// =============================================================================

/// Monitor-wide stop flag checked by every loop.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    /// New, untriggered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every loop holding this signal to stop.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether `trigger` has been called.
    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early on shutdown.
    ///
    /// Returns `true` if the signal was raised.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_triggered() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            thread::sleep(remaining.min(SHUTDOWN_POLL));
        }
    }
}

// =============================================================================
// Worker State
// =============================================================================

/// Where a worker is in its connect/stream cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WorkerPhase {
    /// Opening a session.
    Connecting,
    /// Command attached and streaming.
    Running,
    /// Session torn down; about to reconnect.
    Disconnected,
    /// Loop exited, on shutdown or by unwinding.
    Terminated,
}

/// Liveness of one poll worker.
///
/// Written only by the owning worker thread; everyone else reads.
#[derive(Debug)]
pub struct WorkerState {
    node: String,
    collector: String,
    infrequent: bool,
    alive: AtomicBool,
    reconnects: AtomicU64,
    phase: Mutex<WorkerPhase>,
    last_success: Mutex<Option<DateTime<Utc>>>,
}

impl WorkerState {
    /// Fresh state for a worker that has not started yet.
    pub fn new(node: impl Into<String>, collector: impl Into<String>, infrequent: bool) -> Self {
        Self {
            node: node.into(),
            collector: collector.into(),
            infrequent,
            alive: AtomicBool::new(false),
            reconnects: AtomicU64::new(0),
            phase: Mutex::new(WorkerPhase::Connecting),
            last_success: Mutex::new(None),
        }
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn collector(&self) -> &str {
        &self.collector
    }

    /// Collector output is irregular; exempt from staleness checks.
    pub fn infrequent(&self) -> bool {
        self.infrequent
    }

    /// Worker thread is running its loop.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn phase(&self) -> WorkerPhase {
        *self.phase.lock()
    }

    /// Times the worker went back to connecting after a failure or EOF.
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    /// Time of the last successfully processed batch.
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        *self.last_success.lock()
    }

    pub(crate) fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    pub(crate) fn set_phase(&self, phase: WorkerPhase) {
        *self.phase.lock() = phase;
    }

    fn record_success(&self, at: DateTime<Utc>) {
        *self.last_success.lock() = Some(at);
    }

    fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }
}

// =============================================================================
// Worker
// =============================================================================

/// Why a streaming session ended.
#[derive(Debug, Error)]
enum StreamError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("store update failed: {0}")]
    Store(#[from] StoreError),

    #[error("collector panicked: {0}")]
    Panicked(String),
}

/// Streams one collector's output from one node into the store.
pub struct PollWorker {
    target: RemoteTarget,
    collector: Arc<dyn Collector>,
    connector: Arc<dyn Connector>,
    store: Arc<ClusterStore>,
    settings: PollConfig,
    shutdown: ShutdownSignal,
    state: Arc<WorkerState>,
    command: String,
    latest: DottedPath,
}

impl PollWorker {
    /// Prepare a worker for `collector` on `target.node`.
    ///
    /// # Errors
    /// `StoreError::InvalidPath` if the node or collector name cannot form a
    /// store path.
    pub fn new(
        target: RemoteTarget,
        collector: Arc<dyn Collector>,
        connector: Arc<dyn Connector>,
        store: Arc<ClusterStore>,
        settings: PollConfig,
        shutdown: ShutdownSignal,
    ) -> Result<Self, StoreError> {
        let latest = store::latest_path(&target.node, collector.name())?;
        let state = Arc::new(WorkerState::new(
            target.node.clone(),
            collector.name(),
            collector.infrequent(),
        ));
        let command = collector.command();
        Ok(Self {
            target,
            collector,
            connector,
            store,
            settings,
            shutdown,
            state,
            command,
            latest,
        })
    }

    /// Shared handle to this worker's liveness.
    pub fn state(&self) -> Arc<WorkerState> {
        Arc::clone(&self.state)
    }

    /// Run the worker on a named, detached thread.
    ///
    /// The state is marked alive before this returns.
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        let name = format!("poll-{}-{}", self.target.node, self.collector.name());
        self.state.set_alive(true);
        let state = self.state();
        thread::Builder::new()
            .name(name)
            .spawn(move || self.run())
            .inspect_err(|_| state.set_alive(false))
    }

    /// Worker loop; returns only on shutdown.
    pub fn run(self) {
        let node = self.target.node.as_str();
        let collector = self.collector.name();
        self.state.set_alive(true);
        // Clears `alive` on any exit, unwinding included.
        let _alive = AliveGuard(&self.state);
        tracing::debug!(node, collector, command = %self.command, "Poll worker started");

        while !self.shutdown.is_triggered() {
            self.state.set_phase(WorkerPhase::Connecting);
            let mut session = match self.connector.connect(&self.target) {
                Ok(session) => session,
                Err(e) => {
                    tracing::warn!(node, collector, error = %e, "Connection failed, retrying");
                    self.state.record_reconnect();
                    if self.shutdown.sleep(self.settings.reconnect_delay) {
                        break;
                    }
                    continue;
                }
            };
            tracing::info!(node, collector, "Connected");

            let outcome = self.stream(session.as_mut());
            session.close();
            drop(session);
            self.state.set_phase(WorkerPhase::Disconnected);

            match outcome {
                Ok(()) if self.shutdown.is_triggered() => break,
                Ok(()) => tracing::info!(node, collector, "Remote command ended, reconnecting"),
                Err(StreamError::Remote(e @ RemoteError::Exited { .. })) => {
                    tracing::warn!(node, collector, error = %e, "Remote command failed, reconnecting");
                }
                Err(StreamError::Remote(e)) => {
                    tracing::info!(node, collector, error = %e, "Disconnected, reconnecting");
                }
                Err(e) => tracing::error!(node, collector, error = %e, "Processing failed, reconnecting"),
            }

            self.state.record_reconnect();
            if self.shutdown.sleep(self.settings.reconnect_delay) {
                break;
            }
        }

        tracing::debug!(node, collector, "Poll worker stopped");
    }

    fn stream(&self, session: &mut dyn RemoteSession) -> Result<(), StreamError> {
        let mut process = session.exec(&self.command)?;
        self.state.set_phase(WorkerPhase::Running);

        loop {
            if self.shutdown.is_triggered() {
                return Ok(());
            }

            let batch = process.read_batch(self.settings.batch_bytes)?;
            if !batch.lines.is_empty() {
                let written = self.process(&batch.lines)?;
                tracing::debug!(
                    node = %self.target.node,
                    collector = self.collector.name(),
                    written,
                    "Processed batch"
                );
            }
            if batch.finished {
                return Ok(());
            }

            let now = Utc::now();
            self.store.set(&self.latest, now)?;
            self.state.record_success(now);

            if self.shutdown.sleep(self.settings.interval) {
                return Ok(());
            }
        }
    }

    fn process(&self, lines: &[String]) -> Result<usize, StreamError> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.collector
                .process(&self.target.node, lines, &self.store)
        }));
        match result {
            Ok(written) => Ok(written?),
            Err(payload) => Err(StreamError::Panicked(panic_message(payload.as_ref()))),
        }
    }
}

struct AliveGuard<'a>(&'a WorkerState);

impl Drop for AliveGuard<'_> {
    fn drop(&mut self) {
        self.0.set_phase(WorkerPhase::Terminated);
        self.0.set_alive(false);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{self, CollectorKind, CollectorSpec};
    use crate::remote::{Credential, ScriptedConnector};
    use crate::store::{Datum, StoreValue};

    fn target(node: &str) -> RemoteTarget {
        RemoteTarget {
            node: node.to_string(),
            address: "127.0.0.1".to_string(),
            port: 22,
            user: "test".to_string(),
            credential: Credential::Password("pw".to_string()),
        }
    }

    fn fast() -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(5),
            batch_bytes: 1024,
            reconnect_delay: Duration::from_millis(5),
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    struct PanickingCollector;

    impl Collector for PanickingCollector {
        fn name(&self) -> &str {
            "boom"
        }

        fn kind(&self) -> CollectorKind {
            CollectorKind::MongoStat
        }

        fn command(&self) -> String {
            "mongostat".to_string()
        }

        fn process(&self, _: &str, _: &[String], _: &ClusterStore) -> Result<usize, StoreError> {
            panic!("bad line");
        }
    }

    struct PanickingConnector;

    impl Connector for PanickingConnector {
        fn connect(&self, _: &RemoteTarget) -> Result<Box<dyn RemoteSession>, RemoteError> {
            panic!("transport bug");
        }
    }

    #[test]
    fn test_thread_death_clears_alive() {
        let top = collector::build(&CollectorSpec::new("top", CollectorKind::MongoTop)).unwrap();
        let worker = PollWorker::new(
            target("db1"),
            top,
            Arc::new(PanickingConnector),
            Arc::new(ClusterStore::new()),
            fast(),
            ShutdownSignal::new(),
        )
        .unwrap();
        let state = worker.state();
        let handle = worker.spawn().unwrap();

        assert!(handle.join().is_err());
        assert!(!state.is_alive());
        assert_eq!(state.phase(), WorkerPhase::Terminated);
    }

    #[test]
    fn test_shutdown_sleep_wakes_early() {
        let signal = ShutdownSignal::new();
        assert!(!signal.sleep(Duration::from_millis(1)));
        let remote = signal.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.trigger();
        });
        let started = Instant::now();
        assert!(signal.sleep(Duration::from_secs(30)));
        assert!(started.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn test_worker_streams_lines_in_order() {
        let connector = ScriptedConnector::new();
        connector.stream("db1", "mongotop", [vec!["a", "b"], vec!["c"]]);
        let store = Arc::new(ClusterStore::new());
        let shutdown = ShutdownSignal::new();
        let top = collector::build(&CollectorSpec::new("top", CollectorKind::MongoTop)).unwrap();

        let worker = PollWorker::new(
            target("db1"),
            top,
            Arc::new(connector.clone()),
            Arc::clone(&store),
            fast(),
            shutdown.clone(),
        )
        .unwrap();
        let state = worker.state();
        let handle = worker.spawn().unwrap();

        assert!(wait_until(|| store
            .get("top.db1")
            .map(|v| v.datums().len() == 3)
            .unwrap_or(false)));
        shutdown.trigger();
        handle.join().unwrap();

        let datums: Vec<String> = store
            .get("top.db1")
            .unwrap()
            .datums()
            .into_iter()
            .map(|d: &Datum| d.payload.clone())
            .collect();
        assert_eq!(datums, ["a", "b", "c"]);
        assert!(store.get_timestamp("latest.db1.top").unwrap().is_some());
        assert!(state.last_success().is_some());
        assert!(!state.is_alive());
        assert_eq!(state.phase(), WorkerPhase::Terminated);
    }

    #[test]
    fn test_collector_panic_is_contained() {
        let connector = ScriptedConnector::new().with_synthetic_output();
        let store = Arc::new(ClusterStore::new());
        let shutdown = ShutdownSignal::new();

        let worker = PollWorker::new(
            target("db1"),
            Arc::new(PanickingCollector),
            Arc::new(connector.clone()),
            Arc::clone(&store),
            fast(),
            shutdown.clone(),
        )
        .unwrap();
        let state = worker.state();
        let handle = worker.spawn().unwrap();

        assert!(wait_until(|| connector.connects("db1") >= 2));
        assert!(state.is_alive());
        assert!(state.reconnects() >= 1);
        shutdown.trigger();
        handle.join().unwrap();
        assert!(store.get("latest.db1.boom").is_err());
    }

    #[test]
    fn test_store_conflict_forces_reconnect() {
        let connector = ScriptedConnector::new().with_synthetic_output();
        let store = Arc::new(ClusterStore::new());
        // `top.db1` already holds a scalar, so pushes conflict.
        store.set("top.db1", StoreValue::from("occupied")).unwrap();
        let shutdown = ShutdownSignal::new();
        let top = collector::build(&CollectorSpec::new("top", CollectorKind::MongoTop)).unwrap();

        let worker = PollWorker::new(
            target("db1"),
            top,
            Arc::new(connector.clone()),
            Arc::clone(&store),
            fast(),
            shutdown.clone(),
        )
        .unwrap();
        let state = worker.state();
        let handle = worker.spawn().unwrap();

        assert!(wait_until(|| state.reconnects() >= 2));
        assert!(state.is_alive());
        shutdown.trigger();
        handle.join().unwrap();
        assert_eq!(store.get("top.db1").unwrap().as_text(), Some("occupied"));
    }
}
