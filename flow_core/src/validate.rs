//! Pre-flight workflow validation.
//!
//! Validation runs before any node is dispatched. It checks required
//! fields on every effectively active node and the graph structure
//! (anchored cycles, loop pairing, iteration counts). Any error blocks the
//! run entirely.

use crate::error::FlowError;
use crate::graph::{Activity, Graph};
use crate::schedule;
use crate::types::{Node, NodeId, NodeKind, NodeKindTag};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

/// Validation report keyed by node.
///
/// Several problems on one node are joined with `"; "`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    /// Node id -> message
    errors: IndexMap<NodeId, String>,
    /// Problems not attributable to a node
    general: Vec<String>,
}

impl ValidationReport {
    /// Creates an empty (valid) report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether execution may proceed.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.general.is_empty()
    }

    /// Per-node errors, in discovery order.
    pub fn errors(&self) -> &IndexMap<NodeId, String> {
        &self.errors
    }

    /// Errors not tied to a node.
    pub fn general(&self) -> &[String] {
        &self.general
    }

    /// Message recorded for `id`, if any.
    pub fn error_for(&self, id: &NodeId) -> Option<&str> {
        self.errors.get(id).map(String::as_str)
    }

    /// Records an error against a node.
    pub fn add_error(&mut self, node: NodeId, message: impl Into<String>) {
        let message = message.into();
        match self.errors.get_mut(&node) {
            Some(existing) => {
                if !existing.split("; ").any(|m| m == message) {
                    existing.push_str("; ");
                    existing.push_str(&message);
                }
            }
            None => {
                self.errors.insert(node, message);
            }
        }
    }

    /// Records a structural error against every node it implicates.
    pub fn add_flow_error(&mut self, error: &FlowError) {
        let nodes = error.nodes();
        if nodes.is_empty() {
            self.general.push(error.to_string());
        }
        for node in nodes {
            self.add_error(node, error.to_string());
        }
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (node, message) in &self.errors {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{node}: {message}")?;
            first = false;
        }
        for message in &self.general {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{message}")?;
            first = false;
        }
        Ok(())
    }
}

/// Workflow validator.
///
/// # Example
///
/// ```ignore
/// let validator = WorkflowValidator::new()
///     .with_dispatchable([NodeKindTag::Shell, NodeKindTag::Text]);
/// let report = validator.validate(&graph);
/// if !report.is_valid() {
///     for (node, message) in report.errors() {
///         eprintln!("{node}: {message}");
///     }
/// }
/// ```
#[derive(Clone, Debug, Default)]
pub struct WorkflowValidator {
    /// Executor kinds the host can run; `None` skips the check
    dispatchable: Option<IndexSet<NodeKindTag>>,
}

impl WorkflowValidator {
    /// Creates a validator that checks fields and structure only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also require an executor for every active non-control node.
    pub fn with_dispatchable(mut self, kinds: impl IntoIterator<Item = NodeKindTag>) -> Self {
        self.dispatchable = Some(kinds.into_iter().collect());
        self
    }

    /// Validates the graph.
    ///
    /// Inactive nodes and everything downstream of them are not checked:
    /// they will not run.
    pub fn validate(&self, graph: &Graph) -> ValidationReport {
        let mut report = ValidationReport::new();
        let activity = Activity::compute(graph);

        for node in graph.nodes().filter(|n| activity.is_active(&n.id)) {
            if let Some(message) = missing_field(node) {
                report.add_error(node.id.clone(), message);
            }
            if let Some(kinds) = &self.dispatchable {
                let tag = node.tag();
                if !tag.is_control() && !kinds.contains(&tag) {
                    report.add_error(
                        node.id.clone(),
                        format!("No executor registered for '{tag}' nodes"),
                    );
                }
            }
        }

        for error in schedule::diagnose(graph) {
            report.add_flow_error(&error);
        }

        if !report.is_valid() {
            tracing::debug!(
                nodes = report.errors().len(),
                "workflow failed validation"
            );
        }
        report
    }
}

/// Required-field check for a single node.
fn missing_field(node: &Node) -> Option<&'static str> {
    let blank = |s: &str| s.trim().is_empty();
    match &node.kind {
        NodeKind::Shell if blank(&node.content) => Some("Shell command is empty"),
        NodeKind::Llm(_) if blank(&node.content) => Some("LLM prompt is empty"),
        NodeKind::SearchContext if blank(&node.content) => Some("Search query is empty"),
        NodeKind::IfElse if blank(&node.content) => Some("Condition is empty"),
        NodeKind::LoopStart(settings) if blank(&settings.loop_variable) => {
            Some("Loop variable name is empty")
        }
        NodeKind::Variable(settings) | NodeKind::Accumulator(settings)
            if blank(&settings.variable_name) =>
        {
            Some("Variable name is empty")
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_llm_prompt_is_rejected() {
        let mut graph = Graph::new();
        graph.add_node(Node::llm("llm", "  ")).unwrap();
        graph.add_node(Node::shell("sh", "ls")).unwrap();

        let report = WorkflowValidator::new().validate(&graph);
        assert!(!report.is_valid());
        assert_eq!(report.error_for(&"llm".into()), Some("LLM prompt is empty"));
        assert!(report.error_for(&"sh".into()).is_none());
    }

    #[test]
    fn test_inactive_nodes_are_not_checked() {
        let mut graph = Graph::new();
        graph.add_node(Node::shell("off", "").with_active(false)).unwrap();
        graph.add_node(Node::llm("down", "")).unwrap();
        graph.add_edge("off", "down").unwrap();

        assert!(WorkflowValidator::new().validate(&graph).is_valid());
    }

    #[test]
    fn test_structural_errors_are_keyed_by_node() {
        let mut graph = Graph::new();
        graph.add_node(Node::loop_start("s", 0, "i")).unwrap();
        graph.add_node(Node::loop_end("e")).unwrap();
        graph.add_edge("s", "e").unwrap();

        let report = WorkflowValidator::new().validate(&graph);
        assert_eq!(
            report.error_for(&"s".into()),
            Some("Loop s has invalid iteration count 0")
        );
    }

    #[test]
    fn test_messages_are_joined() {
        let mut graph = Graph::new();
        graph.add_node(Node::loop_start("s", -1, "")).unwrap();
        graph.add_node(Node::loop_end("e")).unwrap();
        graph.add_edge("s", "e").unwrap();

        let report = WorkflowValidator::new().validate(&graph);
        assert_eq!(
            report.error_for(&"s".into()),
            Some("Loop variable name is empty; Loop s has invalid iteration count -1")
        );
    }

    #[test]
    fn test_missing_executor() {
        let mut graph = Graph::new();
        graph.add_node(Node::llm("llm", "hi")).unwrap();
        graph.add_node(Node::loop_start("s", 1, "i")).unwrap();
        graph.add_node(Node::loop_end("e")).unwrap();
        graph.add_edge("s", "e").unwrap();

        let report = WorkflowValidator::new()
            .with_dispatchable([NodeKindTag::Shell])
            .validate(&graph);
        assert_eq!(
            report.error_for(&"llm".into()),
            Some("No executor registered for 'llm' nodes")
        );
        assert!(report.error_for(&"s".into()).is_none());
    }

    #[test]
    fn test_display_lists_errors() {
        let mut report = ValidationReport::new();
        report.add_error("a".into(), "first");
        report.add_error("a".into(), "first");
        report.add_error("b".into(), "second");
        assert_eq!(report.to_string(), "a: first; b: second");
    }
}
