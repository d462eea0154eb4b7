//! Packet-capture processes.
//!
//! A capture runs inside one node's namespace and prints one or more text
//! lines per matching packet. The `CaptureLauncher` trait is the seam between
//! listeners and the process that produces those lines.

use std::io::{BufRead, BufReader};
use std::process::ExitStatus;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver};
use tracing::debug;

use crate::config::CaptureFilter;
use crate::error::{ConfigError, ListenerError};
use crate::node::{MonitoredNode, NodeId};

/// Capture tool run inside each node.
pub const CAPTURE_TOOL: &str = "tcpdump";
/// Wrapper that executes a command inside a node's namespace.
pub const NODE_EXEC_TOOL: &str = "vcmd";

/// Lines buffered between the reader thread and the listener.
const LINE_BUFFER: usize = 1024;

/// Starts a capture for one node.
pub trait CaptureLauncher: Send + Sync {
    /// Launches a capture scoped to `node` and filtered by `filter`.
    ///
    /// # Errors
    ///
    /// Returns `ListenerError::SpawnFailed` if the capture cannot be started.
    fn launch(&self, node: &MonitoredNode, filter: &CaptureFilter) -> Result<CaptureHandle, ListenerError>;
}

/// Running capture: a stream of output lines plus whatever produces them.
///
/// The line channel disconnects when the producer ends.
#[derive(Debug)]
pub struct CaptureHandle {
    node: NodeId,
    lines: Receiver<String>,
    child: Option<Child>,
    reader: Option<JoinHandle<()>>,
}

impl CaptureHandle {
    /// Handle over a plain line channel with no process behind it.
    #[must_use]
    pub fn from_lines(node: NodeId, lines: Receiver<String>) -> Self {
        Self {
            node,
            lines,
            child: None,
            reader: None,
        }
    }

    /// Spawns `command` with stdout piped and forwards its lines.
    ///
    /// # Errors
    ///
    /// Returns `ListenerError::SpawnFailed` if the process cannot be started.
    pub fn spawn(node: NodeId, mut command: Command) -> Result<Self, ListenerError> {
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ListenerError::SpawnFailed {
                node,
                message: e.to_string(),
            })?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ListenerError::SpawnFailed {
                node,
                message: "capture stdout was not piped".to_string(),
            });
        };

        let (tx, rx) = bounded::<String>(LINE_BUFFER);
        let reader = thread::Builder::new()
            .name(format!("routemon-capture-{node}"))
            .spawn(move || {
                let mut stdout = BufReader::new(stdout);
                let mut buf = Vec::new();
                loop {
                    buf.clear();
                    match stdout.read_until(b'\n', &mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                    // Undecodable bytes must not end the stream; the parser skips the line.
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']).to_string();
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| ListenerError::SpawnFailed {
                node,
                message: e.to_string(),
            });

        let reader = match reader {
            Ok(reader) => reader,
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(err);
            }
        };

        Ok(Self {
            node,
            lines: rx,
            child: Some(child),
            reader: Some(reader),
        })
    }

    /// Output lines; disconnected once the producer has ended.
    #[must_use]
    pub const fn lines(&self) -> &Receiver<String> {
        &self.lines
    }

    /// Stops the producer and reaps it.
    ///
    /// A producer that has already exited is reaped and its status checked;
    /// one still running is killed. Termination by that kill is not an error.
    ///
    /// # Errors
    ///
    /// Returns `ListenerError::AbnormalExit` if the process exited
    /// unsuccessfully on its own.
    pub fn release(self) -> Result<(), ListenerError> {
        let Self {
            node,
            lines,
            child,
            reader,
        } = self;

        let mut outcome = Ok(());
        if let Some(mut child) = child {
            match reap(&mut child) {
                Ok(status) if exited_unsuccessfully(status) => {
                    outcome = Err(ListenerError::AbnormalExit {
                        node,
                        status: status.to_string(),
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    outcome = Err(ListenerError::Io {
                        node,
                        message: e.to_string(),
                    });
                }
            }
        }

        // Dropping the receiver unblocks a reader stuck on a full channel.
        drop(lines);
        if let Some(reader) = reader {
            let _ = reader.join();
        }
        outcome
    }
}

fn reap(child: &mut Child) -> std::io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }
    let _ = child.kill();
    child.wait()
}

/// A status with an exit code; death by signal (our own kill) has none.
fn exited_unsuccessfully(status: ExitStatus) -> bool {
    !status.success() && status.code().is_some()
}

/// Runs `vcmd -c <channel> -- tcpdump -lnvi any <filter>` per node.
#[derive(Debug, Clone, Default)]
pub struct VcmdTcpdump;

impl VcmdTcpdump {
    /// Builds the command line for one node.
    #[must_use]
    pub fn command(node: &MonitoredNode, filter: &CaptureFilter) -> Command {
        let mut command = Command::new(NODE_EXEC_TOOL);
        command
            .arg("-c")
            .arg(&node.channel)
            .arg("--")
            .arg(CAPTURE_TOOL)
            .arg("-lnvi")
            .arg("any")
            .args(filter.expression().split_whitespace());
        command
    }
}

impl CaptureLauncher for VcmdTcpdump {
    fn launch(&self, node: &MonitoredNode, filter: &CaptureFilter) -> Result<CaptureHandle, ListenerError> {
        debug!(node = %node.id, channel = %node.channel, filter = %filter.expression(), "starting capture");
        CaptureHandle::spawn(node.id, Self::command(node, filter))
    }
}

/// Verifies the capture and node-exec tools are installed.
///
/// # Errors
///
/// Returns `ConfigError::CaptureToolMissing` naming the first missing tool.
pub fn check_capture_tools() -> Result<(), ConfigError> {
    for tool in [CAPTURE_TOOL, NODE_EXEC_TOOL] {
        which::which(tool).map_err(|_| ConfigError::CaptureToolMissing {
            tool: tool.to_string(),
        })?;
    }
    Ok(())
}
