use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::InventoryError;
use crate::node::SessionId;

use super::{Inventory, InventoryNode, SessionDetails, SessionSummary};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotSession {
    id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state: Option<u32>,
    #[serde(default)]
    nodes: Vec<InventoryNode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SnapshotDocument {
    #[serde(default)]
    sessions: Vec<SnapshotSession>,
}

/// Inventory loaded from a JSON document.
///
/// ```json
/// {"sessions": [{"id": 1, "nodes": [{"id": 1, "name": "n1", "type": 0}]}]}
/// ```
#[derive(Debug, Clone, Default)]
pub struct SnapshotInventory {
    sessions: Vec<SnapshotSession>,
}

impl SnapshotInventory {
    /// Parses a snapshot document.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::Decode` if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self, InventoryError> {
        let doc: SnapshotDocument =
            serde_json::from_str(json).map_err(|e| InventoryError::Decode {
                message: e.to_string(),
            })?;
        Ok(Self {
            sessions: doc.sessions,
        })
    }

    /// Reads and parses a snapshot file.
    ///
    /// # Errors
    ///
    /// `InventoryError::Request` if the file cannot be read,
    /// `InventoryError::Decode` if it is malformed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, InventoryError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| InventoryError::Request {
            message: format!("{}: {e}", path.display()),
        })?;
        Self::from_json(&json)
    }
}

impl Inventory for SnapshotInventory {
    fn list_sessions(&self) -> Result<Vec<SessionSummary>, InventoryError> {
        Ok(self
            .sessions
            .iter()
            .map(|s| SessionSummary {
                id: s.id,
                state: s.state,
                nodes: Some(s.nodes.len()),
            })
            .collect())
    }

    fn get_session(&self, id: SessionId) -> Result<SessionDetails, InventoryError> {
        self.sessions
            .iter()
            .find(|s| s.id == id)
            .map(|s| SessionDetails {
                nodes: s.nodes.clone(),
            })
            .ok_or(InventoryError::SessionNotFound { id })
    }
}
