//! Cycle analysis using Tarjan's strongly connected components.
//!
//! Bounded loops are the only cycles a workflow may contain. The analyzer
//! partitions the effectively active nodes into SCCs and checks that every
//! non-trivial component is anchored by exactly one loop-start/loop-end
//! pair joined by a back edge.

use crate::error::FlowError;
use crate::graph::{Activity, Graph};
use crate::types::{NodeId, NodeKindTag};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// A strongly connected component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Component {
    /// Member nodes, in graph insertion order
    pub nodes: Vec<NodeId>,
    /// True for components of size > 1 and for self-loops
    pub cyclic: bool,
}

impl Component {
    /// Returns true if the component is a single node without a self-loop.
    pub fn is_trivial(&self) -> bool {
        !self.cyclic
    }

    /// Returns true if `id` is a member.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains(id)
    }
}

/// Partitions the active nodes of `graph` into SCCs.
///
/// Components come back in Tarjan emission order: a component is emitted
/// only after every component it reaches, so sinks come first. Reverse the
/// result for a topological order of components.
///
/// # Arguments
///
/// * `graph` - The workflow graph
/// * `activity` - Effective activity; inactive nodes and their edges are
///   left out of the analyzed subgraph
pub fn strongly_connected(graph: &Graph, activity: &Activity) -> Vec<Component> {
    let mut dag: DiGraph<NodeId, ()> = DiGraph::new();
    let mut index: HashMap<&NodeId, NodeIndex> = HashMap::new();

    for id in activity.active_ids(graph) {
        index.insert(id, dag.add_node(id.clone()));
    }
    for edge in graph.edges() {
        if let (Some(&from), Some(&to)) = (index.get(&edge.source), index.get(&edge.target)) {
            dag.add_edge(from, to, ());
        }
    }

    tarjan_scc(&dag)
        .into_iter()
        .map(|mut scc| {
            let cyclic = scc.len() > 1 || dag.find_edge(scc[0], scc[0]).is_some();
            // NodeIndex follows insertion order
            scc.sort();
            Component {
                nodes: scc.into_iter().map(|idx| dag[idx].clone()).collect(),
                cyclic,
            }
        })
        .collect()
}

/// Returns the non-trivial components of the active subgraph.
pub fn cycles(graph: &Graph, activity: &Activity) -> Vec<Component> {
    strongly_connected(graph, activity)
        .into_iter()
        .filter(|c| c.cyclic)
        .collect()
}

/// Checks that every cyclic component is a well-formed loop.
///
/// A component is accepted when it holds exactly one loop-start S and one
/// loop-end E and the graph has a direct `E -> S` edge. Components holding
/// two loop-starts are reported as nested loops; anything else is a
/// malformed cycle.
///
/// # Returns
///
/// Every anchoring error found, in component emission order. Empty when
/// all cycles are valid.
pub fn check_anchors(graph: &Graph, components: &[Component]) -> Vec<FlowError> {
    let mut errors = Vec::new();

    for component in components.iter().filter(|c| c.cyclic) {
        let of_kind = |tag: NodeKindTag| -> Vec<&NodeId> {
            component
                .nodes
                .iter()
                .filter(|id| graph.node(id).map(|n| n.tag()) == Some(tag))
                .collect()
        };
        let starts = of_kind(NodeKindTag::LoopStart);
        let ends = of_kind(NodeKindTag::LoopEnd);

        match (starts.as_slice(), ends.as_slice()) {
            ([start], [end]) => {
                let has_back_edge = graph
                    .outgoing(end)
                    .any(|e| &e.target == *start);
                if !has_back_edge {
                    errors.push(FlowError::MalformedCycle(component.nodes.clone()));
                }
            }
            ([outer, inner, ..], _) => errors.push(FlowError::NestedLoop {
                outer: (*outer).clone(),
                inner: (*inner).clone(),
            }),
            _ => errors.push(FlowError::MalformedCycle(component.nodes.clone())),
        }
    }

    errors
}
