//! OpenSSH transport.
//!
//! Each session owns one multiplexing master (`ssh -M -N`) bound to a
//! private control socket; commands run as lightweight clients over that
//! socket. Host keys are accepted without verification. Password
//! authentication goes through `sshpass -e` so the secret never appears on
//! a command line.

use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::remote::{
    Connector, Credential, OutputBatch, RemoteError, RemoteProcess, RemoteSession, RemoteTarget,
};

/// Default `ConnectTimeout` handed to ssh.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Extra time allowed for the master to create its socket after connecting.
const MASTER_GRACE: Duration = Duration::from_secs(5);

/// How often the control socket is checked while the master starts.
const MASTER_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Bytes of a command's stderr kept for error reports.
const STDERR_LIMIT: u64 = 4096;

/// Read `pipe` to the end on a helper thread so the writer never blocks.
/// The handle yields the first `STDERR_LIMIT` bytes, trimmed.
fn drain_stderr(mut pipe: ChildStderr) -> io::Result<JoinHandle<String>> {
    thread::Builder::new()
        .name("ssh-stderr".to_string())
        .spawn(move || {
            let mut kept = Vec::new();
            let _ = pipe.by_ref().take(STDERR_LIMIT).read_to_end(&mut kept);
            let _ = io::copy(&mut pipe, &mut io::sink());
            String::from_utf8_lossy(&kept).trim().to_string()
        })
}

/// Connector that shells out to the `ssh` client.
#[derive(Debug, Clone)]
pub struct SshConnector {
    ssh_binary: String,
    sshpass_binary: String,
    control_dir: PathBuf,
    connect_timeout: Duration,
}

impl Default for SshConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl SshConnector {
    /// Connector using `ssh` and `sshpass` from `PATH` and sockets in the
    /// system temp directory.
    pub fn new() -> Self {
        Self {
            ssh_binary: "ssh".to_string(),
            sshpass_binary: "sshpass".to_string(),
            control_dir: std::env::temp_dir(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Use a different ssh client binary.
    pub fn with_ssh_binary(mut self, binary: impl Into<String>) -> Self {
        self.ssh_binary = binary.into();
        self
    }

    /// Place control sockets in `dir`.
    pub fn with_control_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.control_dir = dir.into();
        self
    }

    /// Set the TCP connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Options shared by the master and every client.
    fn base_args(&self, target: &RemoteTarget) -> Vec<String> {
        let mut args: Vec<String> = [
            "-o",
            "StrictHostKeyChecking=no",
            "-o",
            "UserKnownHostsFile=/dev/null",
            "-o",
            "LogLevel=ERROR",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        args.push("-o".into());
        args.push(format!(
            "ConnectTimeout={}",
            self.connect_timeout.as_secs().max(1)
        ));
        args.extend(["-p".to_string(), target.port.to_string()]);
        args.extend(["-l".to_string(), target.user.clone()]);
        args
    }

    /// Arguments for the long-lived master process.
    pub(crate) fn master_args(&self, target: &RemoteTarget, control_path: &Path) -> Vec<String> {
        let mut args = vec![
            "-M".to_string(),
            "-N".to_string(),
            "-S".to_string(),
            control_path.display().to_string(),
            "-o".to_string(),
            "ServerAliveInterval=15".to_string(),
        ];
        args.extend(self.base_args(target));
        match &target.credential {
            Credential::KeyFile(path) => {
                args.extend(["-i".to_string(), path.display().to_string()]);
                args.extend(["-o".to_string(), "IdentitiesOnly=yes".to_string()]);
                args.extend(["-o".to_string(), "BatchMode=yes".to_string()]);
            }
            Credential::Password(_) => {
                args.extend([
                    "-o".to_string(),
                    "PreferredAuthentications=password,keyboard-interactive".to_string(),
                ]);
                args.extend(["-o".to_string(), "PubkeyAuthentication=no".to_string()]);
                args.extend(["-o".to_string(), "NumberOfPasswordPrompts=1".to_string()]);
            }
        }
        args.push(target.address.clone());
        args
    }

    fn spawn_master(&self, target: &RemoteTarget, control_path: &Path) -> std::io::Result<Child> {
        let mut command = match &target.credential {
            Credential::Password(secret) => {
                let mut command = Command::new(&self.sshpass_binary);
                command.arg("-e").arg(&self.ssh_binary).env("SSHPASS", secret);
                command
            }
            Credential::KeyFile(_) => Command::new(&self.ssh_binary),
        };
        command
            .args(self.master_args(target, control_path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
    }
}

impl Connector for SshConnector {
    fn connect(&self, target: &RemoteTarget) -> Result<Box<dyn RemoteSession>, RemoteError> {
        let connect_err = |reason: String| RemoteError::Connect {
            target: target.to_string(),
            reason,
        };

        let control_path = self
            .control_dir
            .join(format!("mc-{}.sock", uuid::Uuid::new_v4().simple()));
        let mut master = self
            .spawn_master(target, &control_path)
            .map_err(|e| connect_err(format!("failed to spawn ssh: {e}")))?;

        let deadline = Instant::now() + self.connect_timeout + MASTER_GRACE;
        while !control_path.exists() {
            let exited = match master.try_wait() {
                Ok(exited) => exited,
                Err(e) => {
                    let _ = master.kill();
                    let _ = master.wait();
                    return Err(connect_err(e.to_string()));
                }
            };
            if let Some(status) = exited {
                let mut stderr = String::new();
                if let Some(mut pipe) = master.stderr.take() {
                    let _ = pipe.read_to_string(&mut stderr);
                }
                return Err(connect_err(format!("ssh exited with {status}: {}", stderr.trim())));
            }
            if Instant::now() >= deadline {
                let _ = master.kill();
                let _ = master.wait();
                return Err(connect_err("timed out waiting for control socket".to_string()));
            }
            thread::sleep(MASTER_POLL_INTERVAL);
        }

        // The master lives as long as the session; keep its stderr flowing.
        if let Some(pipe) = master.stderr.take()
            && let Err(e) = drain_stderr(pipe)
        {
            tracing::warn!(remote = %target, error = %e, "Failed to drain ssh master stderr");
        }

        tracing::debug!(remote = %target, control = %control_path.display(), "SSH master ready");
        Ok(Box::new(SshSession {
            ssh_binary: self.ssh_binary.clone(),
            base_args: self.base_args(target),
            address: target.address.clone(),
            control_path,
            master: Some(master),
        }))
    }
}

/// A session multiplexed over one ssh master.
#[derive(Debug)]
pub struct SshSession {
    ssh_binary: String,
    base_args: Vec<String>,
    address: String,
    control_path: PathBuf,
    master: Option<Child>,
}

impl SshSession {
    fn client(&self, command: &str) -> Result<Command, RemoteError> {
        if self.master.is_none() {
            return Err(RemoteError::Closed);
        }
        let mut client = Command::new(&self.ssh_binary);
        client
            .arg("-S")
            .arg(&self.control_path)
            .args(["-o", "ControlMaster=no"])
            .args(&self.base_args)
            .arg(&self.address)
            .arg(command)
            .stdin(Stdio::null());
        Ok(client)
    }
}

impl RemoteSession for SshSession {
    fn exec(&mut self, command: &str) -> Result<Box<dyn RemoteProcess>, RemoteError> {
        let mut child = self
            .client(command)?
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RemoteError::Exec(e.to_string()))?;
        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(RemoteError::Exec("output was not captured".to_string()));
        };
        let stderr = match drain_stderr(stderr) {
            Ok(handle) => handle,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RemoteError::Exec(e.to_string()));
            }
        };
        Ok(Box::new(SshProcess {
            child,
            stdout: BufReader::new(stdout),
            stderr: Some(stderr),
        }))
    }

    fn run(&mut self, command: &str) -> Result<String, RemoteError> {
        let output = self
            .client(command)?
            .output()
            .map_err(|e| RemoteError::Exec(e.to_string()))?;
        if !output.status.success() {
            return Err(RemoteError::Exited {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn close(&mut self) {
        let Some(mut master) = self.master.take() else {
            return;
        };
        let _ = Command::new(&self.ssh_binary)
            .arg("-S")
            .arg(&self.control_path)
            .args(["-O", "exit"])
            .arg(&self.address)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        let _ = master.kill();
        let _ = master.wait();
        let _ = std::fs::remove_file(&self.control_path);
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// A remote command attached through an ssh client process.
struct SshProcess {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
}

impl RemoteProcess for SshProcess {
    fn read_batch(&mut self, max_bytes: usize) -> Result<OutputBatch, RemoteError> {
        let mut batch = OutputBatch::default();
        let mut bytes = 0;
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let n = self.stdout.read_until(b'\n', &mut buf)?;
            if n == 0 {
                let status = self.child.wait()?;
                if !status.success() {
                    let stderr = self
                        .stderr
                        .take()
                        .and_then(|handle| handle.join().ok())
                        .unwrap_or_default();
                    return Err(RemoteError::Exited {
                        status: status.to_string(),
                        stderr,
                    });
                }
                batch.finished = true;
                return Ok(batch);
            }
            bytes += n;
            batch.lines.push(String::from_utf8_lossy(&buf).into_owned());
            // Only keep going while another full line is already buffered.
            if bytes >= max_bytes || !self.stdout.buffer().contains(&b'\n') {
                return Ok(batch);
            }
        }
    }
}

impl Drop for SshProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
