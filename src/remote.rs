//! Remote Transport
//!
//! Seam between the polling engine and the remote shell channel.
//!
//! - [`Connector`]: opens a [`RemoteSession`] to a [`RemoteTarget`]
//! - [`RemoteSession`]: runs commands; owned by exactly one worker or probe
//! - [`RemoteProcess`]: a running command read in bounded batches
//! - [`SshConnector`]: OpenSSH client with one multiplexed master per session
//! - [`ScriptedConnector`]: canned output for tests and dry runs

mod error;
mod scripted;
mod ssh;
mod transport;

pub use error::RemoteError;
pub use scripted::ScriptedConnector;
pub use ssh::{DEFAULT_CONNECT_TIMEOUT, SshConnector, SshSession};
pub use transport::{
    Connector, Credential, OutputBatch, RemoteProcess, RemoteSession, RemoteTarget,
};
