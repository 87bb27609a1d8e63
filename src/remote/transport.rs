//! Transport traits and connection targets.

use std::fmt;
use std::path::PathBuf;

use crate::remote::RemoteError;

/// Authentication material resolved once before polling starts.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Password authentication.
    Password(String),
    /// Private key file.
    KeyFile(PathBuf),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password(<redacted>)"),
            Self::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
        }
    }
}

/// Everything needed to open a session to one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    /// Node name, used for logging and store paths.
    pub node: String,
    /// Host name or IP address.
    pub address: String,
    /// SSH port.
    pub port: u16,
    /// Login user.
    pub user: String,
    /// Authentication material.
    pub credential: Credential,
}

impl fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{} ({})", self.user, self.address, self.port, self.node)
    }
}

/// Lines read from a remote process in one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputBatch {
    /// Complete lines in the order produced, newlines included.
    pub lines: Vec<String>,
    /// The process has exited; no further batches will follow.
    pub finished: bool,
}

/// Opens remote sessions.
///
/// One connector is shared by every worker; each call returns a fresh,
/// exclusively-owned session.
pub trait Connector: Send + Sync + 'static {
    /// Establish a session to `target`.
    fn connect(&self, target: &RemoteTarget) -> Result<Box<dyn RemoteSession>, RemoteError>;
}

/// An open session to one node.
pub trait RemoteSession: Send {
    /// Start a long-running command and attach to its output.
    fn exec(&mut self, command: &str) -> Result<Box<dyn RemoteProcess>, RemoteError>;

    /// Run a command to completion and return its standard output.
    fn run(&mut self, command: &str) -> Result<String, RemoteError>;

    /// Tear down the session. Idempotent.
    fn close(&mut self);
}

/// A running remote command.
pub trait RemoteProcess: Send {
    /// Block until output is available, then return the complete lines
    /// already received, stopping once `max_bytes` is reached. A command
    /// that exits non-zero ends with `RemoteError::Exited` instead of a
    /// finished batch.
    fn read_batch(&mut self, max_bytes: usize) -> Result<OutputBatch, RemoteError>;
}
