//! Node inventory.
//!
//! The emulator daemon owns sessions and their nodes. The monitor asks it
//! once, at startup, for the plain nodes of one session and never again.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::InventoryError;
use crate::node::{MonitoredNode, NodeId, NodeKind, SessionId};

/// REST-backed inventory.
pub mod rest;
/// File-backed inventory.
pub mod snapshot;

pub use rest::RestInventory;
pub use snapshot::SnapshotInventory;

/// One entry of the session listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session identifier.
    pub id: SessionId,
    /// Daemon session state code, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<u32>,
    /// Node count, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<usize>,
}

/// A node as described by the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryNode {
    /// Node identifier.
    pub id: NodeId,
    /// Node name; defaults to `n<id>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Node kind (integer type code).
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Execution channel; defaults to the session's control socket for the node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl InventoryNode {
    /// Converts to a `MonitoredNode` if this node kind is monitored.
    #[must_use]
    pub fn to_monitored(&self, session: SessionId) -> Option<MonitoredNode> {
        if !self.kind.is_monitored() {
            return None;
        }
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| format!("n{}", self.id));
        let channel = self
            .channel
            .clone()
            .unwrap_or_else(|| format!("/tmp/pycore.{session}/{name}"));
        Some(MonitoredNode::new(self.id, name, channel))
    }
}

/// Full description of one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDetails {
    /// Every node in the session, of any kind.
    #[serde(default)]
    pub nodes: Vec<InventoryNode>,
}

/// Source of session and node information.
pub trait Inventory: Send + Sync {
    /// Lists running sessions.
    ///
    /// # Errors
    ///
    /// Returns an error if the inventory cannot be queried.
    fn list_sessions(&self) -> Result<Vec<SessionSummary>, InventoryError>;

    /// Describes one session.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::SessionNotFound` for unknown ids.
    fn get_session(&self, id: SessionId) -> Result<SessionDetails, InventoryError>;
}

/// Picks the session to monitor and returns its plain nodes ordered by id.
///
/// With `requested == None` the first listed session is used.
///
/// # Errors
///
/// `NoSessions` when nothing is running, `SessionNotFound` when the requested
/// session is not listed, `NoEligibleNodes` when the session has no plain
/// nodes.
pub fn resolve_monitored_nodes(
    inventory: &dyn Inventory,
    requested: Option<SessionId>,
) -> Result<(SessionId, Vec<MonitoredNode>), InventoryError> {
    let sessions = inventory.list_sessions()?;
    let session = match requested {
        Some(id) => sessions
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.id)
            .ok_or(InventoryError::SessionNotFound { id })?,
        None => sessions.first().map(|s| s.id).ok_or(InventoryError::NoSessions)?,
    };

    let details = inventory.get_session(session)?;
    let mut nodes: Vec<MonitoredNode> = details
        .nodes
        .iter()
        .filter_map(|node| node.to_monitored(session))
        .collect();
    nodes.sort_by_key(|node| node.id);
    nodes.dedup_by_key(|node| node.id);

    debug!(%session, total = details.nodes.len(), plain = nodes.len(), "session inventory");
    if nodes.is_empty() {
        return Err(InventoryError::NoEligibleNodes { session });
    }
    Ok((session, nodes))
}
