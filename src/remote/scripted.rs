//! In-memory transport driven by a script.
//!
//! Used by tests and `--dry-run` to exercise workers, probes and health
//! without a network. Every call is recorded so callers can assert on
//! connects, commands and teardown.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::remote::{
    Connector, OutputBatch, RemoteError, RemoteProcess, RemoteSession, RemoteTarget,
};

type Key = (String, String);

#[derive(Debug, Default)]
struct ScriptState {
    connect_failures: HashMap<String, usize>,
    streams: HashMap<Key, VecDeque<Vec<Vec<String>>>>,
    runs: HashMap<Key, Result<String, String>>,
    synthetic: bool,
    connects: HashMap<String, usize>,
    execs: Vec<Key>,
    closes: usize,
}

/// Connector whose sessions replay canned output.
///
/// - A command with no queued stream finishes immediately, unless synthetic
///   output is enabled, in which case it yields one generated line per read
///   forever.
/// - A `run` with no scripted response fails.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedConnector {
    /// Empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate output for unscripted streams.
    pub fn with_synthetic_output(self) -> Self {
        self.state.lock().synthetic = true;
        self
    }

    /// Make the next `count` connects to `node` fail.
    pub fn fail_connects(&self, node: &str, count: usize) -> &Self {
        *self
            .state
            .lock()
            .connect_failures
            .entry(node.to_string())
            .or_default() += count;
        self
    }

    /// Queue the output of the next `exec(command)` on `node`, as batches.
    ///
    /// The process finishes after the last batch.
    pub fn stream<L, S>(&self, node: &str, command: &str, batches: L) -> &Self
    where
        L: IntoIterator<Item = Vec<S>>,
        S: Into<String>,
    {
        let batches = batches
            .into_iter()
            .map(|batch| batch.into_iter().map(|l| format!("{}\n", l.into())).collect())
            .collect();
        self.state
            .lock()
            .streams
            .entry((node.to_string(), command.to_string()))
            .or_default()
            .push_back(batches);
        self
    }

    /// Set the result of `run(command)` on `node`.
    pub fn respond(&self, node: &str, command: &str, result: Result<&str, &str>) -> &Self {
        self.state.lock().runs.insert(
            (node.to_string(), command.to_string()),
            result.map(str::to_string).map_err(str::to_string),
        );
        self
    }

    /// Successful connects made to `node` so far.
    pub fn connects(&self, node: &str) -> usize {
        self.state.lock().connects.get(node).copied().unwrap_or(0)
    }

    /// `(node, command)` for every exec, in order.
    pub fn execs(&self) -> Vec<(String, String)> {
        self.state.lock().execs.clone()
    }

    /// Number of sessions closed.
    pub fn closes(&self) -> usize {
        self.state.lock().closes
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self, target: &RemoteTarget) -> Result<Box<dyn RemoteSession>, RemoteError> {
        let mut state = self.state.lock();
        if let Some(remaining) = state.connect_failures.get_mut(&target.node)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(RemoteError::Connect {
                target: target.to_string(),
                reason: "scripted failure".to_string(),
            });
        }
        *state.connects.entry(target.node.clone()).or_default() += 1;
        Ok(Box::new(ScriptedSession {
            node: target.node.clone(),
            state: Arc::clone(&self.state),
            open: true,
        }))
    }
}

struct ScriptedSession {
    node: String,
    state: Arc<Mutex<ScriptState>>,
    open: bool,
}

impl RemoteSession for ScriptedSession {
    fn exec(&mut self, command: &str) -> Result<Box<dyn RemoteProcess>, RemoteError> {
        if !self.open {
            return Err(RemoteError::Closed);
        }
        let key = (self.node.clone(), command.to_string());
        let mut state = self.state.lock();
        state.execs.push(key.clone());
        let scripted = state.streams.get_mut(&key).and_then(VecDeque::pop_front);
        let process = match scripted {
            Some(batches) => ScriptedProcess::Batches(batches.into()),
            None if state.synthetic => ScriptedProcess::Synthetic {
                prefix: format!("{} {}", self.node, command),
                seq: 0,
            },
            None => ScriptedProcess::Batches(VecDeque::new()),
        };
        Ok(Box::new(process))
    }

    fn run(&mut self, command: &str) -> Result<String, RemoteError> {
        if !self.open {
            return Err(RemoteError::Closed);
        }
        let key = (self.node.clone(), command.to_string());
        match self.state.lock().runs.get(&key) {
            Some(Ok(out)) => Ok(out.clone()),
            Some(Err(stderr)) => Err(RemoteError::Exited {
                status: "exit status: 1".to_string(),
                stderr: stderr.clone(),
            }),
            None => Err(RemoteError::Exited {
                status: "exit status: 127".to_string(),
                stderr: format!("{command}: not scripted"),
            }),
        }
    }

    fn close(&mut self) {
        if std::mem::replace(&mut self.open, false) {
            self.state.lock().closes += 1;
        }
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        self.close();
    }
}

enum ScriptedProcess {
    Batches(VecDeque<Vec<String>>),
    Synthetic { prefix: String, seq: u64 },
}

impl RemoteProcess for ScriptedProcess {
    fn read_batch(&mut self, _max_bytes: usize) -> Result<OutputBatch, RemoteError> {
        match self {
            Self::Batches(batches) => Ok(match batches.pop_front() {
                Some(lines) => OutputBatch {
                    lines,
                    finished: false,
                },
                None => OutputBatch {
                    lines: Vec::new(),
                    finished: true,
                },
            }),
            Self::Synthetic { prefix, seq } => {
                *seq += 1;
                Ok(OutputBatch {
                    lines: vec![format!("{prefix} #{seq}\n")],
                    finished: false,
                })
            }
        }
    }
}
