//! Inactive-node propagation.

use super::Graph;
use crate::types::NodeId;
use indexmap::IndexSet;

/// Effective activity of every node in a graph.
///
/// A node is effectively active when its stored flag is set and no
/// explicitly inactive node reaches it over outgoing edges. Independent
/// branches are unaffected.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Activity {
    deactivated: IndexSet<NodeId>,
}

impl Activity {
    /// Computes the deactivated set: BFS from each explicitly inactive
    /// node, unioned.
    pub fn compute(graph: &Graph) -> Self {
        let mut deactivated = IndexSet::new();
        for node in graph.nodes().filter(|n| !n.active) {
            // Already covered by an earlier inactive ancestor.
            if !deactivated.insert(node.id.clone()) {
                continue;
            }
            deactivated.extend(graph.downstream_of(&node.id));
        }
        if !deactivated.is_empty() {
            tracing::debug!(count = deactivated.len(), "nodes deactivated by propagation");
        }
        Self { deactivated }
    }

    /// Returns true if `id` should run.
    pub fn is_active(&self, id: &NodeId) -> bool {
        !self.deactivated.contains(id)
    }

    /// Nodes excluded from execution, in discovery order.
    pub fn deactivated(&self) -> &IndexSet<NodeId> {
        &self.deactivated
    }

    /// Active node ids of `graph`, in node insertion order.
    pub fn active_ids<'a>(&'a self, graph: &'a Graph) -> impl Iterator<Item = &'a NodeId> + 'a {
        graph
            .nodes()
            .map(|n| &n.id)
            .filter(move |id| self.is_active(id))
    }
}
