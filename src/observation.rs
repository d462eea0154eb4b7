//! Observation events and the aggregator's per-node hop-count state.
//!
//! Listeners turn capture output into `Observation`s; the aggregator folds
//! them into an `ObservationState` with last-write-wins semantics per node.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::error::ParseError;
use crate::node::NodeId;

/// A hop-count (TTL) seen on a captured packet.
pub type HopCount = u32;

/// Event published by a listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// The node saw a matching packet carrying `hop_count`.
    Add {
        node: NodeId,
        hop_count: HopCount,
        observed_at: DateTime<Utc>,
    },
    /// The node has been silent for longer than the dead time.
    Del {
        node: NodeId,
    },
}

impl Observation {
    /// Builds an ADD event stamped with the current time.
    #[must_use]
    pub fn add(node: NodeId, hop_count: HopCount) -> Self {
        Self::Add {
            node,
            hop_count,
            observed_at: Utc::now(),
        }
    }

    /// Builds a DEL event.
    #[must_use]
    pub const fn del(node: NodeId) -> Self {
        Self::Del { node }
    }

    /// The node this event is about.
    #[must_use]
    pub const fn node(&self) -> NodeId {
        match self {
            Self::Add { node, .. } | Self::Del { node } => *node,
        }
    }
}

/// Last known hop-count per node.
///
/// Iteration is ordered by node id, which keeps path ordering deterministic
/// when two nodes report the same hop-count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservationState {
    hops: BTreeMap<NodeId, HopCount>,
}

impl ObservationState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one event into the state.
    ///
    /// ADD overwrites the node's entry, DEL removes it; deleting an absent
    /// node is a no-op.
    pub fn apply(&mut self, event: &Observation) {
        match event {
            Observation::Add { node, hop_count, .. } => {
                self.hops.insert(*node, *hop_count);
            }
            Observation::Del { node } => {
                self.hops.remove(node);
            }
        }
    }

    /// Hop-count currently recorded for `node`.
    #[must_use]
    pub fn get(&self, node: NodeId) -> Option<HopCount> {
        self.hops.get(&node).copied()
    }

    #[must_use]
    #[allow(missing_docs)]
    pub fn len(&self) -> usize {
        self.hops.len()
    }

    #[must_use]
    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// `(node, hop_count)` pairs in node id order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, HopCount)> + '_ {
        self.hops.iter().map(|(node, hops)| (*node, *hops))
    }
}

fn ttl_regex() -> &'static Regex {
    static TTL: OnceLock<Regex> = OnceLock::new();
    // `ttl`, then any run of delimiters, then everything up to the next comma.
    TTL.get_or_init(|| Regex::new(r"\bttl[\s=:]*([^,]*)").expect("ttl pattern is valid"))
}

/// Extracts the hop-count from one line of capture output.
///
/// Verbose capture output carries the field as `ttl 64, id 1234, ...`.
///
/// # Errors
///
/// `ParseError::MissingMarker` if the line has no `ttl` token,
/// `ParseError::InvalidHopCount` if the value is not a TTL-sized integer.
///
/// # Examples
///
/// ```
/// use routemon::observation::parse_hop_count;
///
/// let line = "IP (tos 0x0, ttl 62, id 4823, offset 0, flags [DF], proto ICMP (1), length 84)";
/// assert_eq!(parse_hop_count(line).unwrap(), 62);
/// ```
pub fn parse_hop_count(line: &str) -> Result<HopCount, ParseError> {
    let captures = ttl_regex()
        .captures(line)
        .ok_or(ParseError::MissingMarker)?;
    let raw = captures.get(1).map_or("", |m| m.as_str()).trim();
    raw.parse::<u8>()
        .map(HopCount::from)
        .map_err(|_| ParseError::InvalidHopCount {
            value: raw.to_string(),
        })
}
