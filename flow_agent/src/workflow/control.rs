//! Control node evaluation.
//!
//! Loop markers, variables, accumulators and conditionals are evaluated by
//! the engine itself. They share per-run state through [`RunContext`]:
//! named bindings for templates and the set of untaken branch edges.

use crate::workflow::node::{NodeError, NodeOutput, NodeRequest};
use flow_core::{EdgeId, Graph, NodeId, NodeKind};
use indexmap::{IndexMap, IndexSet};

/// Mutable state shared by control nodes within one run.
#[derive(Clone, Debug, Default)]
pub(crate) struct RunContext {
    variables: IndexMap<String, String>,
    accumulators: IndexMap<NodeId, String>,
    untaken: IndexSet<EdgeId>,
}

impl RunContext {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Named bindings set by Variable and Accumulator nodes.
    pub(crate) fn variables(&self) -> &IndexMap<String, String> {
        &self.variables
    }

    /// True if an IfElse decided against this edge.
    pub(crate) fn is_untaken(&self, edge: &EdgeId) -> bool {
        self.untaken.contains(edge)
    }

    /// Evaluates a control node.
    ///
    /// `request.node.content` is already rendered.
    pub(crate) fn evaluate(
        &mut self,
        graph: &Graph,
        request: &NodeRequest,
    ) -> Result<NodeOutput, NodeError> {
        let node = &request.node;
        match &node.kind {
            NodeKind::LoopStart(_) | NodeKind::LoopEnd => Ok(NodeOutput::new(request.joined_inputs())),
            NodeKind::Variable(settings) => {
                let value = if !node.content.trim().is_empty() {
                    node.content.clone()
                } else if !request.inputs.is_empty() {
                    request.joined_inputs()
                } else {
                    settings.initial_value.clone()
                };
                self.bind(&settings.variable_name, &value);
                Ok(NodeOutput::new(value))
            }
            NodeKind::Accumulator(settings) => {
                let piece = if !node.content.trim().is_empty() {
                    node.content.clone()
                } else {
                    request.joined_inputs()
                };
                let running = self
                    .accumulators
                    .entry(node.id.clone())
                    .or_insert_with(|| settings.initial_value.clone());
                if running.is_empty() {
                    *running = piece;
                } else {
                    running.push('\n');
                    running.push_str(&piece);
                }
                let value = running.clone();
                self.bind(&settings.variable_name, &value);
                Ok(NodeOutput::new(value))
            }
            NodeKind::IfElse => {
                let taken = evaluate_condition(&node.content);
                let other = if taken { "false" } else { "true" };
                for edge in graph.outgoing(&node.id) {
                    self.untaken.shift_remove(&edge.id);
                    if edge.source_handle.as_deref() == Some(other) {
                        self.untaken.insert(edge.id.clone());
                    }
                }
                tracing::debug!(node_id = %node.id, taken, "evaluated condition");
                Ok(NodeOutput::new(request.joined_inputs()))
            }
            NodeKind::Shell
            | NodeKind::Llm(_)
            | NodeKind::Preview
            | NodeKind::Text
            | NodeKind::SearchContext
            | NodeKind::Output => Err(NodeError::ExecutionFailed(format!(
                "'{}' is not a control node",
                node.tag()
            ))),
        }
    }

    fn bind(&mut self, name: &str, value: &str) {
        let name = name.trim();
        if !name.is_empty() {
            self.variables.insert(name.to_string(), value.to_string());
        }
    }
}

/// Evaluates an IfElse condition.
///
/// `a === b`, `a !== b`, `a == b` and `a != b` compare the trimmed operands
/// with surrounding quotes removed. Anything else is true only if it reads
/// `true`, ignoring case.
pub fn evaluate_condition(condition: &str) -> bool {
    let condition = condition.trim();
    for (op, equal) in [("===", true), ("!==", false), ("==", true), ("!=", false)] {
        if let Some((lhs, rhs)) = condition.split_once(op) {
            return (operand(lhs) == operand(rhs)) == equal;
        }
    }
    condition.eq_ignore_ascii_case("true")
}

fn operand(raw: &str) -> &str {
    let raw = raw.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = raw
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    raw
}
