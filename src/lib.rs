//! # routemon - live route-path monitor for network emulation sessions
//!
//! routemon watches a traced flow (source address, destination address,
//! protocol) on every plain node of an emulation session, works out which
//! nodes the packets traverse from the TTL each node observes, and draws the
//! resulting path on a topology visualizer.
//!
//! ## Architecture
//!
//! - **NodeListener**: one thread per node running a packet capture inside
//!   the node; publishes ADD/DEL `Observation`s
//! - **RouteAggregator**: sole consumer of observations; republishes the
//!   ordered path every few seconds
//! - **TopologyVisualizerClient**: line-protocol session with the visualizer
//! - **MonitorService**: resolves nodes, wires everything up, owns shutdown
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use routemon::{MonitorConfig, MonitorService, NodeId, RestInventory, ShutdownFlag};
//! use routemon::capture::VcmdTcpdump;
//! use routemon::visualizer::TopologyVisualizerClient;
//!
//! let config = MonitorConfig::new(NodeId::new(1));
//! let inventory = RestInventory::new("http://localhost:5000")?;
//! let service = MonitorService::new(config.clone(), &inventory, Arc::new(VcmdTcpdump))?;
//! let sink = TopologyVisualizerClient::connect(&config.visualizer)?;
//! service.run(sink, &ShutdownFlag::new())?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod config;
pub mod error;
pub mod node;
pub mod observation;

// Collaborators
pub mod capture;
pub mod inventory;
pub mod visualizer;

// Engine
pub mod listener;
pub mod route;
pub mod service;

// Re-export primary types at crate root for convenience
pub use config::{CaptureFilter, MonitorConfig, Protocol, VisualizerConfig};
pub use error::{
    ConfigError, InventoryError, ListenerError, ParseError, RouteMonitorError, RouteMonitorResult,
    VisualizationError,
};
pub use inventory::{Inventory, RestInventory, SnapshotInventory};
pub use listener::NodeListener;
pub use node::{MonitoredNode, NodeId, NodeKind, SessionId};
pub use observation::{HopCount, Observation, ObservationState};
pub use route::RouteAggregator;
pub use service::{MonitorService, ShutdownFlag};
pub use visualizer::{PathEdge, PathSink, TopologyVisualizerClient};
