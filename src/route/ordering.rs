use std::cmp::Reverse;

use crate::node::NodeId;
use crate::observation::{HopCount, ObservationState};
use crate::visualizer::PathEdge;

/// Orders observed nodes into the published path.
///
/// Non-source nodes come first by descending hop-count; the source node is
/// always last. Equal hop-counts keep node id order (the sort is stable over
/// the state's id-ordered iteration).
///
/// # Examples
///
/// ```
/// use routemon::{NodeId, Observation, ObservationState};
/// use routemon::route::order_path;
///
/// let (a, b, src) = (NodeId::new(1), NodeId::new(2), NodeId::new(9));
/// let mut state = ObservationState::new();
/// state.apply(&Observation::add(a, 5));
/// state.apply(&Observation::add(b, 3));
/// state.apply(&Observation::add(src, 0));
///
/// assert_eq!(order_path(&state, src), vec![a, b, src]);
/// ```
#[must_use]
pub fn order_path(state: &ObservationState, source: NodeId) -> Vec<NodeId> {
    let mut entries: Vec<(NodeId, HopCount)> = state.iter().collect();
    entries.sort_by_key(|&(node, hops)| rank(node, hops, source));
    entries.into_iter().map(|(node, _)| node).collect()
}

/// Sort key: the source sorts after everything, then larger hop-counts first.
fn rank(node: NodeId, hops: HopCount, source: NodeId) -> (bool, Reverse<HopCount>) {
    (node == source, Reverse(hops))
}

/// One edge per adjacent pair of `path`.
#[must_use]
pub fn path_edges(path: &[NodeId]) -> Vec<PathEdge> {
    path.windows(2)
        .map(|pair| PathEdge::new(pair[0], pair[1]))
        .collect()
}
