//! Remote transport error types.

use thiserror::Error;

/// Errors raised by remote sessions and processes.
///
/// None of these escape a poll worker: connect failures are retried and
/// stream failures trigger a reconnect.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Session could not be established.
    #[error("connect to {target} failed: {reason}")]
    Connect { target: String, reason: String },

    /// Remote command could not be started.
    #[error("failed to start remote command: {0}")]
    Exec(String),

    /// Remote command ran but reported failure.
    #[error("remote command exited with {status}: {stderr}")]
    Exited { status: String, stderr: String },

    /// Transport I/O failed mid-stream.
    #[error("stream error: {0}")]
    Stream(#[from] std::io::Error),

    /// Session was already closed.
    #[error("session closed")]
    Closed,
}
