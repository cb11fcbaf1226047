//! Cluster-state sink: consumes an opaque cluster state, deactivating every
//! bucket in the default space when the local node is marked down.

use crate::types::BucketSpace;

/// The cluster state collaborator this crate consumes, kept to exactly the
/// surface `setClusterState` needs.
pub trait ClusterState {
    /// Whether the local node is currently up, per this cluster state.
    fn node_up(&self) -> bool;
}

/// A trivial, directly-constructible [`ClusterState`] for callers (and
/// tests) that don't have a real cluster-state object handy.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SimpleClusterState {
    pub node_up: bool,
}

impl ClusterState for SimpleClusterState {
    fn node_up(&self) -> bool {
        self.node_up
    }
}

/// Returns whether applying `cluster_state` for `space` should deactivate
/// every bucket: only the default space drives activity changes, and then
/// only when the local node has gone down.
pub fn should_deactivate_all(space: BucketSpace, cluster_state: &dyn ClusterState) -> bool {
    space.is_default() && !cluster_state.node_up()
}
