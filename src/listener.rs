//! Per-node capture listener.
//!
//! Each monitored node gets one listener thread. It reads capture output
//! with a bounded wait, publishes an ADD for every line carrying a hop-count,
//! and publishes a single DEL once the node has been quiet for the dead time.
//! Listeners only ever write to the shared event channel.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, Sender};
use tracing::{debug, info, trace, warn};

use crate::capture::{CaptureHandle, CaptureLauncher};
use crate::config::CaptureFilter;
use crate::error::ListenerError;
use crate::node::MonitoredNode;
use crate::observation::{parse_hop_count, Observation};
use crate::service::ShutdownFlag;

/// Liveness timer for one node.
///
/// Armed by an observation, fires once when the dead time has passed, then
/// stays disarmed until the next observation. A fresh timer is disarmed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilenceTimer {
    last_seen: Option<Instant>,
}

impl SilenceTimer {
    #[must_use]
    #[allow(missing_docs)]
    pub const fn new() -> Self {
        Self { last_seen: None }
    }

    /// Records an observation at `now` and arms the timer.
    pub fn observed(&mut self, now: Instant) {
        self.last_seen = Some(now);
    }

    /// Returns true exactly once per silence episode.
    pub fn expired(&mut self, now: Instant, dead_time: Duration) -> bool {
        match self.last_seen {
            Some(seen) if now.saturating_duration_since(seen) >= dead_time => {
                self.last_seen = None;
                true
            }
            _ => false,
        }
    }

    /// True while an observation is outstanding.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.last_seen.is_some()
    }
}

/// Listener for one monitored node.
#[derive(Debug)]
pub struct NodeListener {
    node: MonitoredNode,
    filter: CaptureFilter,
    poll_interval: Duration,
    dead_time: Duration,
    events: Sender<Observation>,
    stop: ShutdownFlag,
}

impl NodeListener {
    /// Creates a listener with the default 1s poll and 3s dead time.
    #[must_use]
    pub fn new(
        node: MonitoredNode,
        filter: CaptureFilter,
        events: Sender<Observation>,
        stop: ShutdownFlag,
    ) -> Self {
        Self {
            node,
            filter,
            poll_interval: Duration::from_secs(1),
            dead_time: Duration::from_secs(3),
            events,
            stop,
        }
    }

    /// Overrides the poll interval and dead time.
    #[must_use]
    pub fn with_timing(mut self, poll_interval: Duration, dead_time: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.dead_time = dead_time;
        self
    }

    /// The node this listener watches.
    #[must_use]
    pub const fn node(&self) -> &MonitoredNode {
        &self.node
    }

    /// Runs the listener on a dedicated thread.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn(
        self,
        launcher: Arc<dyn CaptureLauncher>,
    ) -> std::io::Result<JoinHandle<Result<(), ListenerError>>> {
        thread::Builder::new()
            .name(format!("routemon-listener-{}", self.node.id))
            .spawn(move || self.run(launcher.as_ref()))
    }

    /// Launches the capture and runs until it ends or the monitor stops.
    ///
    /// # Errors
    ///
    /// Returns the launch failure, or the capture's abnormal exit.
    pub fn run(self, launcher: &dyn CaptureLauncher) -> Result<(), ListenerError> {
        let capture = launcher.launch(&self.node, &self.filter).map_err(|err| {
            warn!(node = %self.node.id, error = %err, "capture failed to start");
            err
        })?;
        info!(node = %self.node.id, name = %self.node.name, "listening on node");
        self.run_capture(capture)
    }

    /// Drives an already running capture.
    ///
    /// # Errors
    ///
    /// Returns `ListenerError::AbnormalExit` if the capture process failed.
    pub fn run_capture(self, capture: CaptureHandle) -> Result<(), ListenerError> {
        let node = self.node.id;
        let mut silence = SilenceTimer::new();

        while !self.stop.is_stopped() {
            match capture.lines().recv_timeout(self.poll_interval) {
                Ok(line) => match parse_hop_count(&line) {
                    Ok(hop_count) => {
                        trace!(%node, hop_count, "observed");
                        silence.observed(Instant::now());
                        if self.events.send(Observation::add(node, hop_count)).is_err() {
                            break;
                        }
                    }
                    Err(err) => trace!(%node, error = %err, "skipping capture line"),
                },
                Err(RecvTimeoutError::Timeout) => {
                    if silence.expired(Instant::now(), self.dead_time) {
                        debug!(%node, "node went silent");
                        if self.events.send(Observation::del(node)).is_err() {
                            break;
                        }
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    debug!(%node, "capture output ended");
                    break;
                }
            }
        }

        let outcome = capture.release();
        match &outcome {
            Ok(()) => info!(%node, "listener stopped"),
            Err(err) => warn!(%node, error = %err, "listener stopped"),
        }
        outcome
    }
}
