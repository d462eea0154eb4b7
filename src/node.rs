//! Node identity types.
//!
//! The emulator identifies nodes and sessions with small integers. A
//! `MonitoredNode` pairs the identity with the execution handle used to run
//! commands inside that node's namespace. The monitored set is fixed at
//! startup and never changes afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Emulator node identifier.
///
/// # Examples
///
/// ```
/// use routemon::NodeId;
///
/// let id = NodeId::new(3);
/// assert_eq!(id.to_string(), "3");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Wraps a raw node number.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw node number.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for NodeId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Emulator session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u32);

impl SessionId {
    /// Wraps a raw session number.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw session number.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Node kind as reported by the inventory (integer type code on the wire).
///
/// Only `Plain` nodes run a network stack that can be captured on.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum NodeKind {
    Plain,
    Physical,
    Switch,
    Hub,
    WirelessLan,
    Rj45,
    Tunnel,
    Emane,
    Docker,
    Lxc,
    Other(u32),
}

impl NodeKind {
    /// Returns true if listeners should be started for this kind.
    #[must_use]
    pub const fn is_monitored(self) -> bool {
        matches!(self, Self::Plain)
    }
}

impl From<u32> for NodeKind {
    fn from(code: u32) -> Self {
        match code {
            0 => Self::Plain,
            1 => Self::Physical,
            4 => Self::Switch,
            5 => Self::Hub,
            6 => Self::WirelessLan,
            7 => Self::Rj45,
            8 => Self::Tunnel,
            10 => Self::Emane,
            15 => Self::Docker,
            16 => Self::Lxc,
            other => Self::Other(other),
        }
    }
}

impl From<NodeKind> for u32 {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Plain => 0,
            NodeKind::Physical => 1,
            NodeKind::Switch => 4,
            NodeKind::Hub => 5,
            NodeKind::WirelessLan => 6,
            NodeKind::Rj45 => 7,
            NodeKind::Tunnel => 8,
            NodeKind::Emane => 10,
            NodeKind::Docker => 15,
            NodeKind::Lxc => 16,
            NodeKind::Other(code) => code,
        }
    }
}

/// A node selected for monitoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredNode {
    /// Node identity.
    pub id: NodeId,
    /// Human readable name (used in logs and thread names).
    pub name: String,
    /// Opaque execution handle (the node's control channel).
    pub channel: String,
}

impl MonitoredNode {
    /// Creates a monitored node.
    #[must_use]
    pub fn new(id: NodeId, name: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            channel: channel.into(),
        }
    }
}
