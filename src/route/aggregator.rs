use std::time::{Duration, Instant};

use crossbeam_channel::{never, select, Receiver};
use tracing::{debug, warn};

use crate::error::VisualizationError;
use crate::node::NodeId;
use crate::observation::{Observation, ObservationState};
use crate::service::ShutdownFlag;
use crate::visualizer::PathSink;

use super::ordering::{order_path, path_edges};

/// Single consumer of listener events.
///
/// Folds events into its `ObservationState` one at a time and, every
/// `route_interval`, replaces everything drawn on the sink with the current
/// path. Sink I/O only ever happens during reconciliation.
#[derive(Debug)]
pub struct RouteAggregator<S: PathSink> {
    source: NodeId,
    route_interval: Duration,
    poll_interval: Duration,
    state: ObservationState,
    sink: S,
    last_reconcile: Instant,
    failed_reconciliations: u64,
}

impl<S: PathSink> RouteAggregator<S> {
    /// Creates an aggregator publishing to `sink`. The first reconciliation
    /// happens one `route_interval` after construction.
    pub fn new(source: NodeId, route_interval: Duration, sink: S) -> Self {
        Self {
            source,
            route_interval,
            poll_interval: Duration::from_secs(1),
            state: ObservationState::new(),
            sink,
            last_reconcile: Instant::now(),
            failed_reconciliations: 0,
        }
    }

    /// Upper bound on a single wait for the next event (stop-flag latency).
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Folds one event into the observation state. Never touches the sink.
    pub fn apply(&mut self, event: &Observation) {
        self.state.apply(event);
    }

    /// Current observation state.
    #[must_use]
    pub const fn state(&self) -> &ObservationState {
        &self.state
    }

    /// The path the next reconciliation would publish.
    #[must_use]
    pub fn current_path(&self) -> Vec<NodeId> {
        order_path(&self.state, self.source)
    }

    /// Number of reconciliation cycles that failed on sink I/O.
    #[must_use]
    pub const fn failed_reconciliations(&self) -> u64 {
        self.failed_reconciliations
    }

    #[must_use]
    #[allow(missing_docs)]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    #[allow(missing_docs)]
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Consumes the aggregator, handing back the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Clears the sink and republishes the current path.
    ///
    /// Returns the number of edges drawn.
    ///
    /// # Errors
    ///
    /// Aborts the cycle on the first failed command; the next cycle starts
    /// over with a fresh clear.
    pub fn reconcile(&mut self) -> Result<usize, VisualizationError> {
        self.sink.clear_path_edges()?;
        if self.state.is_empty() {
            return Ok(0);
        }

        let path = self.current_path();
        let edges = path_edges(&path);
        for edge in &edges {
            self.sink.add_path_edge(*edge)?;
        }
        Ok(edges.len())
    }

    /// Reconciles if `route_interval` has elapsed since the last cycle.
    ///
    /// Failures are logged and counted, never propagated.
    pub fn reconcile_if_due(&mut self) -> bool {
        if self.last_reconcile.elapsed() < self.route_interval {
            return false;
        }

        match self.reconcile() {
            Ok(edges) => debug!(edges, nodes = self.state.len(), "route published"),
            Err(err) => {
                self.failed_reconciliations += 1;
                warn!(error = %err, "route reconciliation failed");
            }
        }
        self.last_reconcile = Instant::now();
        true
    }

    /// Consumes events until `stop` is set.
    ///
    /// Waits are bounded so reconciliation stays on schedule with no traffic.
    /// Once every sender is gone the loop keeps reconciling until stopped.
    pub fn run(&mut self, events: &Receiver<Observation>, stop: &ShutdownFlag) {
        let closed_rx = never::<Observation>();
        let mut closed = false;

        while !stop.is_stopped() {
            let wait = self
                .route_interval
                .saturating_sub(self.last_reconcile.elapsed())
                .min(self.poll_interval);
            let rx = if closed { &closed_rx } else { events };

            select! {
                recv(rx) -> msg => match msg {
                    Ok(event) => self.apply(&event),
                    Err(_) => {
                        debug!("all listeners have exited");
                        closed = true;
                    }
                },
                default(wait) => {}
            }

            self.reconcile_if_due();
        }
    }
}
