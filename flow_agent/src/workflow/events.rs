//! UI-facing messages.
//!
//! Commands arrive from the editor and events flow back to it. Both are
//! serialized as `{ "type": "snake_case_name", ...fields }` with camelCase
//! field names, matching the canvas wire protocol.

use crate::workflow::state::{NodeStatus, RunStatus};
use flow_core::{Edge, Node, NodeId, ValidationReport};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Inbound command from the editor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowCommand {
    /// Validate, schedule and run the given graph
    ExecuteWorkflow {
        /// Nodes on the canvas
        nodes: Vec<Node>,
        /// Edges on the canvas
        edges: Vec<Edge>,
    },
    /// Abort the run in progress
    AbortWorkflow,
    /// Persist the given graph
    SaveWorkflow {
        /// Nodes on the canvas
        nodes: Vec<Node>,
        /// Edges on the canvas
        edges: Vec<Edge>,
        /// Document version; the current version if absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<String>,
    },
    /// Load the persisted graph
    LoadWorkflow,
    /// Estimate tokens for a node's text
    CalculateTokens {
        /// Text to measure
        text: String,
        /// Node the count belongs to
        #[serde(rename = "nodeId")]
        node_id: NodeId,
    },
    /// Discard the current run state
    ClearWorkflow,
}

/// Outbound event to the editor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// A persisted graph was loaded
    WorkflowLoaded {
        /// Loaded nodes
        nodes: Vec<Node>,
        /// Loaded edges
        edges: Vec<Edge>,
    },
    /// A node changed status
    NodeExecutionStatus {
        /// Node that changed
        #[serde(rename = "nodeId")]
        node_id: NodeId,
        /// New status
        status: NodeStatus,
        /// Result or error text, once the node finished
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
    },
    /// Dispatching began
    ExecutionStarted,
    /// The run reached a terminal status
    ExecutionCompleted {
        /// `completed` or `aborted`
        status: RunStatus,
    },
    /// Token estimate for a node
    TokenCount {
        /// Node the count belongs to
        #[serde(rename = "nodeId")]
        node_id: NodeId,
        /// Estimated tokens
        count: usize,
    },
    /// Pre-flight validation failed; nothing ran
    ValidationFailed {
        /// Per-node messages
        errors: IndexMap<NodeId, String>,
        /// Messages not tied to a node
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        general: Vec<String>,
    },
    /// A node was not dispatched because of its upstream
    NodeSkipped {
        /// Node that was skipped
        #[serde(rename = "nodeId")]
        node_id: NodeId,
        /// Why it was skipped
        reason: String,
    },
    /// The graph was persisted
    WorkflowSaved,
    /// A command could not be carried out
    Error {
        /// Human-readable message
        message: String,
    },
}

impl WorkflowEvent {
    /// Builds a `validation_failed` event from a report.
    pub fn validation_failed(report: &ValidationReport) -> Self {
        WorkflowEvent::ValidationFailed {
            errors: report.errors().clone(),
            general: report.general().to_vec(),
        }
    }

    /// Builds a `node_execution_status` event.
    pub fn node_status(node_id: &NodeId, status: NodeStatus, result: Option<String>) -> Self {
        WorkflowEvent::NodeExecutionStatus {
            node_id: node_id.clone(),
            status,
            result,
        }
    }
}

/// Outbound event channel.
///
/// Emitting never fails: a closed receiver only means nobody is watching.
#[derive(Clone, Debug, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<WorkflowEvent>>,
}

impl EventSink {
    /// Creates a sink sending to `tx`.
    pub fn new(tx: mpsc::UnboundedSender<WorkflowEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Creates a channel and a sink feeding it.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<WorkflowEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Creates a sink that drops every event.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Sends an event.
    pub fn emit(&self, event: WorkflowEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                tracing::debug!("event receiver dropped");
            }
        }
    }
}
