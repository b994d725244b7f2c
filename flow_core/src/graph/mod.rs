//! Workflow graph model.
//!
//! The graph owns typed nodes and directed edges. Nodes keep their
//! insertion order; every edge gets a monotonically increasing sequence
//! number when it is inserted, and that number is the tie-breaker the
//! scheduler uses for otherwise ambiguous orderings.

mod activity;

pub use activity::Activity;

use crate::error::{FlowError, Result};
use crate::types::{Edge, EdgeId, Node, NodeId};
use indexmap::{IndexMap, IndexSet};
use std::collections::VecDeque;

/// A directed graph of workflow nodes.
///
/// Every edge endpoint is guaranteed to exist in the graph: edges are
/// checked on insertion and removing a node removes its incident edges.
///
/// # Example
///
/// ```ignore
/// let mut graph = Graph::new();
/// graph.add_node(Node::shell("diff", "git diff"))?;
/// graph.add_node(Node::llm("msg", "Write a commit message for ${1}"))?;
/// graph.add_edge("diff", "msg")?;
/// assert_eq!(graph.downstream_of(&"diff".into()).len(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Graph {
    nodes: IndexMap<NodeId, Node>,
    edges: Vec<Edge>,
    next_seq: u64,
}

impl Graph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from loaded nodes and edges.
    ///
    /// Edge sequence numbers follow the order of `edges`.
    ///
    /// # Returns
    ///
    /// - `Err(FlowError::DuplicateNode)` if two nodes share an id
    /// - `Err(FlowError::DanglingEdge)` if an edge endpoint is missing
    pub fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Self> {
        let mut graph = Self::new();
        for node in nodes {
            graph.add_node(node)?;
        }
        for edge in edges {
            graph.insert_edge(edge)?;
        }
        Ok(graph)
    }

    /// Adds a node.
    pub fn add_node(&mut self, node: Node) -> Result<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(FlowError::DuplicateNode(node.id));
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Removes a node together with every edge touching it.
    ///
    /// Remaining nodes keep their relative order.
    pub fn remove_node(&mut self, id: &NodeId) -> Option<Node> {
        let node = self.nodes.shift_remove(id)?;
        self.remove_edges_touching(id);
        Some(node)
    }

    /// Returns the node with the given id.
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Returns a mutable reference to the node with the given id.
    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Returns true if the node exists.
    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Adds an edge `source -> target` with a generated id.
    ///
    /// # Arguments
    ///
    /// * `source` - Upstream node (produces output)
    /// * `target` - Downstream node (consumes output)
    ///
    /// # Returns
    ///
    /// The id of the new edge, or `FlowError::DanglingEdge` if either
    /// endpoint is not in the graph.
    pub fn add_edge(
        &mut self,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
    ) -> Result<EdgeId> {
        self.insert_edge(Edge::new(source, target))
    }

    /// Inserts a prepared edge, assigning its sequence number.
    pub fn insert_edge(&mut self, mut edge: Edge) -> Result<EdgeId> {
        for endpoint in [&edge.source, &edge.target] {
            if !self.nodes.contains_key(endpoint) {
                return Err(FlowError::DanglingEdge {
                    edge: edge.id.to_string(),
                    missing: endpoint.clone(),
                });
            }
        }
        edge.seq = self.next_seq;
        self.next_seq += 1;
        let id = edge.id.clone();
        self.edges.push(edge);
        Ok(id)
    }

    /// Removes an edge by id.
    pub fn remove_edge(&mut self, id: &EdgeId) -> Option<Edge> {
        let pos = self.edges.iter().position(|e| &e.id == id)?;
        Some(self.edges.remove(pos))
    }

    /// Removes every edge incident to `id`, returning how many were removed.
    pub fn remove_edges_touching(&mut self, id: &NodeId) -> usize {
        let before = self.edges.len();
        self.edges.retain(|e| !e.touches(id));
        before - self.edges.len()
    }

    /// Returns every node reachable from `id` over outgoing edges,
    /// excluding `id` itself unless it lies on a cycle.
    ///
    /// Nodes are returned in BFS discovery order.
    pub fn downstream_of(&self, id: &NodeId) -> IndexSet<NodeId> {
        let mut seen = IndexSet::new();
        let mut queue = VecDeque::from([id.clone()]);
        while let Some(current) = queue.pop_front() {
            for edge in self.outgoing(&current) {
                if seen.insert(edge.target.clone()) {
                    queue.push_back(edge.target.clone());
                }
            }
        }
        seen
    }

    /// Edges leaving `id`, in insertion order.
    pub fn outgoing<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| &e.source == id)
    }

    /// Edges entering `id`, in insertion order.
    pub fn incoming<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| &e.target == id)
    }

    /// Upstream node ids of `id`, ordered by incoming edge insertion.
    pub fn predecessors(&self, id: &NodeId) -> Vec<NodeId> {
        self.incoming(id).map(|e| e.source.clone()).collect()
    }

    /// Insertion index of a node.
    pub fn position_of(&self, id: &NodeId) -> Option<usize> {
        self.nodes.get_index_of(id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Returns true if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
