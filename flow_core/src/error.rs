//! Error types for FlowKit.

use crate::types::NodeId;

/// Main error type for the workflow core.
///
/// All graph, analysis and scheduling operations return
/// `Result<T> = std::result::Result<T, FlowError>`.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FlowError {
    /// A node with the same id is already part of the graph.
    #[error("Duplicate node: {0}")]
    DuplicateNode(NodeId),

    /// Referenced node does not exist.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Edge refers to a node that is not part of the graph.
    #[error("Edge {edge} references missing node {missing}")]
    DanglingEdge {
        /// Edge identifier
        edge: String,
        /// The endpoint that could not be resolved
        missing: NodeId,
    },

    /// Node payload could not be decoded.
    #[error("Invalid data for node {node}: {reason}")]
    InvalidNodeData {
        /// Offending node
        node: NodeId,
        /// Decoder message
        reason: String,
    },

    /// Node `type` is not one of the supported kinds.
    #[error("Unknown node kind '{kind}' for node {node}")]
    UnknownNodeKind {
        /// Offending node
        node: NodeId,
        /// The raw kind string
        kind: String,
    },

    /// A cycle that is not a LoopStart/LoopEnd pair.
    #[error("Cycle is not anchored by a loop-start/loop-end pair: {0:?}")]
    MalformedCycle(Vec<NodeId>),

    /// A loop body contains another loop.
    #[error("Nested loops are not supported: {inner} inside {outer}")]
    NestedLoop {
        /// Enclosing LoopStart
        outer: NodeId,
        /// LoopStart found inside the body
        inner: NodeId,
    },

    /// A LoopStart never reaches a LoopEnd.
    #[error("Loop {0} has no reachable loop-end")]
    UnterminatedLoop(NodeId),

    /// A LoopStart reaches more than one LoopEnd.
    #[error("Loop {start} reaches more than one loop-end: {ends:?}")]
    AmbiguousLoopEnd {
        /// The LoopStart
        start: NodeId,
        /// Every LoopEnd reached from it
        ends: Vec<NodeId>,
    },

    /// A LoopEnd that no LoopStart reaches.
    #[error("Loop-end {0} is not reached by any loop-start")]
    UnmatchedLoopEnd(NodeId),

    /// Two loops claim the same node.
    #[error("Node {node} belongs to both loop {first} and loop {second}")]
    OverlappingLoops {
        /// Shared node
        node: NodeId,
        /// LoopStart that claimed it first
        first: NodeId,
        /// LoopStart that claimed it second
        second: NodeId,
    },

    /// Loop iteration count is not a positive integer.
    #[error("Loop {node} has invalid iteration count {value}")]
    InvalidIterations {
        /// The LoopStart
        node: NodeId,
        /// Raw iteration count
        value: i64,
    },

    /// Serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),
}

impl FlowError {
    /// Returns the node ids this error implicates.
    ///
    /// Used to key structural errors into a per-node validation report.
    pub fn nodes(&self) -> Vec<NodeId> {
        match self {
            FlowError::DuplicateNode(id)
            | FlowError::NodeNotFound(id)
            | FlowError::UnterminatedLoop(id)
            | FlowError::UnmatchedLoopEnd(id) => vec![id.clone()],
            FlowError::DanglingEdge { missing, .. } => vec![missing.clone()],
            FlowError::InvalidNodeData { node, .. }
            | FlowError::UnknownNodeKind { node, .. }
            | FlowError::InvalidIterations { node, .. } => vec![node.clone()],
            FlowError::MalformedCycle(nodes) => nodes.clone(),
            FlowError::NestedLoop { outer, inner } => vec![outer.clone(), inner.clone()],
            FlowError::AmbiguousLoopEnd { start, ends } => {
                let mut nodes = vec![start.clone()];
                nodes.extend(ends.iter().cloned());
                nodes
            }
            FlowError::OverlappingLoops { node, .. } => vec![node.clone()],
            FlowError::Json(_) => Vec::new(),
        }
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        FlowError::Json(err.to_string())
    }
}

/// Type alias for Result with FlowError.
pub type Result<T> = std::result::Result<T, FlowError>;
