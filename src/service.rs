//! Top-level orchestration.
//!
//! `MonitorService` resolves the monitored nodes once, starts one listener
//! thread per node, then runs the aggregator on the calling thread until the
//! shutdown flag is raised.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::unbounded;
use tracing::{error, info, warn};

use crate::capture::CaptureLauncher;
use crate::config::MonitorConfig;
use crate::error::{ListenerError, RouteMonitorResult};
use crate::inventory::{resolve_monitored_nodes, Inventory};
use crate::listener::NodeListener;
use crate::node::{MonitoredNode, SessionId};
use crate::observation::Observation;
use crate::route::RouteAggregator;
use crate::visualizer::PathSink;

/// Cooperative stop signal shared by every thread of the monitor.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    #[must_use]
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown. Idempotent.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    #[allow(missing_docs)]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// The route monitor.
pub struct MonitorService {
    config: MonitorConfig,
    session: SessionId,
    nodes: Vec<MonitoredNode>,
    launcher: Arc<dyn CaptureLauncher>,
}

impl MonitorService {
    /// Resolves the monitored nodes from `inventory`.
    ///
    /// # Errors
    ///
    /// Fails with an inventory error if there is no usable session or the
    /// session has no plain nodes. No listener has been started at that point.
    pub fn new(
        config: MonitorConfig,
        inventory: &dyn Inventory,
        launcher: Arc<dyn CaptureLauncher>,
    ) -> RouteMonitorResult<Self> {
        let (session, nodes) = resolve_monitored_nodes(inventory, config.session)?;
        info!(%session, nodes = nodes.len(), source = %config.source_node, "resolved monitored nodes");
        Ok(Self {
            config,
            session,
            nodes,
            launcher,
        })
    }

    /// Session being monitored.
    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.session
    }

    /// Nodes a listener will be started for.
    #[must_use]
    pub fn nodes(&self) -> &[MonitoredNode] {
        &self.nodes
    }

    #[must_use]
    #[allow(missing_docs)]
    pub const fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Runs the monitor until `stop` is raised.
    ///
    /// On stop the sink is cleared one last time and closed, then every
    /// listener is joined before returning.
    ///
    /// # Errors
    ///
    /// Returns `RouteMonitorError::Visualization` if the final clear could not
    /// remove every drawn edge. The sink is still closed and the listeners
    /// joined. Steady-state failures are logged rather than returned.
    pub fn run<S: PathSink>(self, sink: S, stop: &ShutdownFlag) -> RouteMonitorResult<()> {
        let (tx, rx) = unbounded::<Observation>();

        let mut listeners: Vec<(MonitoredNode, JoinHandle<Result<(), ListenerError>>)> =
            Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let listener = NodeListener::new(
                node.clone(),
                self.config.filter.clone(),
                tx.clone(),
                stop.clone(),
            )
            .with_timing(self.config.poll_interval, self.config.dead_time);

            match listener.spawn(Arc::clone(&self.launcher)) {
                Ok(handle) => listeners.push((node.clone(), handle)),
                Err(err) => error!(node = %node.id, error = %err, "failed to spawn listener thread"),
            }
        }
        drop(tx);

        let mut aggregator = RouteAggregator::new(self.config.source_node, self.config.route_interval, sink)
            .with_poll_interval(self.config.poll_interval);
        aggregator.run(&rx, stop);

        let mut sink = aggregator.into_sink();
        let cleared = sink.clear_path_edges();
        if let Err(err) = &cleared {
            warn!(error = %err, left = sink.displayed_count(), "failed to clear path on shutdown");
        }
        sink.close();
        drop(rx);

        for (node, handle) in listeners {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(node = %node.id, error = %err, "listener ended with error"),
                Err(_) => error!(node = %node.id, "listener thread panicked"),
            }
        }
        info!("route monitor stopped");
        cleared.map_err(Into::into)
    }
}

impl std::fmt::Debug for MonitorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorService")
            .field("config", &self.config)
            .field("session", &self.session)
            .field("nodes", &self.nodes)
            .finish_non_exhaustive()
    }
}
