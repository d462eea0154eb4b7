//! Path reconstruction.
//!
//! The aggregator is the single consumer of listener events. It owns the
//! observation state and the visualizer session, and republishes the path on
//! a fixed cadence.

/// Event consumption and periodic reconciliation.
pub mod aggregator;
/// Hop-count ordering of observed nodes.
pub mod ordering;

pub use aggregator::RouteAggregator;
pub use ordering::{order_path, path_edges};
