//! Error types for routemon.
//!
//! All errors are strongly typed using thiserror, one enum per failure
//! domain. Startup errors (inventory, configuration) are fatal; steady-state
//! errors (parse, listener, visualization) are logged and the monitor keeps
//! running with whatever partial data it still has.

use thiserror::Error;

use crate::node::{NodeId, SessionId};

/// A capture line did not carry a usable hop-count field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Line has no 'ttl' marker")]
    MissingMarker,

    #[error("Hop count '{value}' is not an integer")]
    InvalidHopCount {
        value: String,
    },
}

/// The capture process behind a listener failed.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Failed to start capture on node {node}: {message}")]
    SpawnFailed {
        node: NodeId,
        message: String,
    },

    #[error("Capture on node {node} exited abnormally: {status}")]
    AbnormalExit {
        node: NodeId,
        status: String,
    },

    #[error("Capture I/O error on node {node}: {message}")]
    Io {
        node: NodeId,
        message: String,
    },
}

/// Sending to (or connecting to) the visualization sink failed.
#[derive(Debug, Error)]
pub enum VisualizationError {
    #[error("Connection to visualizer at {addr} failed: {message}")]
    ConnectFailed {
        addr: String,
        message: String,
    },

    #[error("Failed to send '{command}': {message}")]
    SendFailed {
        command: String,
        message: String,
    },
}

/// The node inventory could not supply a usable session.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Inventory request failed: {message}")]
    Request {
        message: String,
    },

    #[error("Inventory response could not be decoded: {message}")]
    Decode {
        message: String,
    },

    #[error("No sessions are currently running")]
    NoSessions,

    #[error("Session {id} not found")]
    SessionNotFound {
        id: SessionId,
    },

    #[error("Session {session} has no plain nodes to monitor")]
    NoEligibleNodes {
        session: SessionId,
    },
}

/// Invalid process configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Required tool '{tool}' was not found on PATH")]
    CaptureToolMissing {
        tool: String,
    },

    #[error("Unknown protocol '{value}' (expected icmp, tcp or udp)")]
    UnknownProtocol {
        value: String,
    },

    #[error("Invalid address '{value}'")]
    InvalidAddress {
        value: String,
    },
}

/// Top-level error type for routemon.
#[derive(Debug, Error)]
pub enum RouteMonitorError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Listener error: {0}")]
    Listener(#[from] ListenerError),

    #[error("Visualization error: {0}")]
    Visualization(#[from] VisualizationError),

    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl RouteMonitorError {
    /// Returns true if this error must abort startup.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Inventory(_) | Self::Config(_))
    }

    /// Returns true if this is a visualization error.
    #[must_use]
    pub const fn is_visualization(&self) -> bool {
        matches!(self, Self::Visualization(_))
    }

    /// Returns true if this is a listener error.
    #[must_use]
    pub const fn is_listener(&self) -> bool {
        matches!(self, Self::Listener(_))
    }
}

/// Result type alias for routemon operations.
pub type RouteMonitorResult<T> = Result<T, RouteMonitorError>;
