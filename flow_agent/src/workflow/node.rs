//! Node executor abstraction.
//!
//! Non-control node kinds are performed by a [`NodeExecutor`] looked up in
//! an [`ExecutorRegistry`]. The engine renders the node's template before
//! dispatch, so executors see final text in [`NodeRequest::node`].

use crate::workflow::cancellation::CancellationToken;
use crate::workflow::nodes::{OutputExecutor, PreviewExecutor, ShellConfig, ShellExecutor, TextExecutor};
use async_trait::async_trait;
use flow_core::{LoopFrame, Node, NodeId, NodeKindTag};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Output of a successful dispatch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeOutput {
    /// Result text; becomes the node's result and downstream input
    pub content: String,
}

impl NodeOutput {
    /// Creates an output from text.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

impl From<String> for NodeOutput {
    fn from(content: String) -> Self {
        Self { content }
    }
}

/// Everything an executor needs to know about the node being dispatched.
#[derive(Clone, Debug)]
pub struct NodeRequest {
    /// The node, with `content` already rendered
    pub node: Node,
    /// Upstream results in incoming-edge insertion order
    pub inputs: Vec<String>,
    /// Loop binding, for steps inside a loop body
    pub frame: Option<LoopFrame>,
    /// Bindings visible to this step
    pub variables: IndexMap<String, String>,
}

impl NodeRequest {
    /// Creates a request with no inputs or bindings.
    pub fn new(node: Node) -> Self {
        Self {
            node,
            inputs: Vec::new(),
            frame: None,
            variables: IndexMap::new(),
        }
    }

    /// Sets the upstream inputs.
    pub fn with_inputs(mut self, inputs: Vec<String>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Sets the loop frame.
    pub fn with_frame(mut self, frame: Option<LoopFrame>) -> Self {
        self.frame = frame;
        self
    }

    /// Sets the visible bindings.
    pub fn with_variables(mut self, variables: IndexMap<String, String>) -> Self {
        self.variables = variables;
        self
    }

    /// Inputs joined by newline.
    pub fn joined_inputs(&self) -> String {
        self.inputs.join("\n")
    }
}

/// Per-dispatch execution context.
#[derive(Clone, Debug)]
pub struct NodeContext {
    /// Run this dispatch belongs to
    pub run_id: Uuid,
    /// Node being dispatched
    pub node_id: NodeId,
    token: Option<CancellationToken>,
    /// Engine-level timeout for this dispatch
    pub timeout: Option<Duration>,
}

impl NodeContext {
    /// Creates a new context.
    pub fn new(run_id: Uuid, node_id: NodeId) -> Self {
        Self {
            run_id,
            node_id,
            token: None,
            timeout: None,
        }
    }

    /// Sets the cancellation token for cooperative cancellation.
    ///
    /// The engine drops the dispatch future on abort regardless; the token
    /// lets executors stop work they spawned outside that future.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Sets the dispatch timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the cancellation token if set.
    pub fn cancellation_token(&self) -> Option<&CancellationToken> {
        self.token.as_ref()
    }

    /// Returns true if the run was aborted.
    pub fn is_cancelled(&self) -> bool {
        self.token.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

/// Error types for node execution.
#[derive(thiserror::Error, Debug)]
pub enum NodeError {
    /// Execution failed with a message
    #[error("Node execution failed: {0}")]
    ExecutionFailed(String),

    /// Dispatch exceeded its time limit
    #[error("Node timeout: {0}")]
    Timeout(String),

    /// The run was aborted during execution
    #[error("Node cancelled")]
    Cancelled,

    /// I/O error during execution
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error wrapper
    #[error("Node error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Capability that performs a node's work.
///
/// Implementations must be cancel-safe: the engine may drop the returned
/// future at any await point when the run is aborted.
///
/// # Example
///
/// ```ignore
/// struct Echo;
///
/// #[async_trait]
/// impl NodeExecutor for Echo {
///     async fn execute(&self, request: &NodeRequest, _: &NodeContext) -> Result<NodeOutput, NodeError> {
///         Ok(NodeOutput::new(request.node.content.clone()))
///     }
/// }
/// ```
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Performs the node's work.
    ///
    /// # Arguments
    ///
    /// * `request` - Rendered node, upstream inputs and bindings
    /// * `context` - Run identity, cancellation token and timeout
    ///
    /// # Returns
    ///
    /// The result text, or an error that marks the node `Error`.
    async fn execute(
        &self,
        request: &NodeRequest,
        context: &NodeContext,
    ) -> Result<NodeOutput, NodeError>;
}

/// Maps node kinds to executors.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<NodeKindTag, Arc<dyn NodeExecutor>>,
}

impl ExecutorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in `Shell`, `Text`, `Preview` and
    /// `Output` executors.
    pub fn with_builtins(shell: ShellConfig) -> Self {
        Self::new()
            .with(NodeKindTag::Shell, Arc::new(ShellExecutor::new(shell)))
            .with(NodeKindTag::Text, Arc::new(TextExecutor))
            .with(NodeKindTag::Preview, Arc::new(PreviewExecutor))
            .with(NodeKindTag::Output, Arc::new(OutputExecutor))
    }

    /// Registers an executor, replacing any previous one for the kind.
    ///
    /// Control kinds are evaluated by the engine; registering one is
    /// ignored with a warning.
    pub fn register(&mut self, kind: NodeKindTag, executor: Arc<dyn NodeExecutor>) {
        if kind.is_control() {
            tracing::warn!(%kind, "ignoring executor for control node kind");
            return;
        }
        self.executors.insert(kind, executor);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, kind: NodeKindTag, executor: Arc<dyn NodeExecutor>) -> Self {
        self.register(kind, executor);
        self
    }

    /// Looks up the executor for a kind.
    pub fn get(&self, kind: NodeKindTag) -> Option<Arc<dyn NodeExecutor>> {
        self.executors.get(&kind).cloned()
    }

    /// Returns true if the kind has an executor.
    pub fn contains(&self, kind: NodeKindTag) -> bool {
        self.executors.contains_key(&kind)
    }

    /// Registered kinds.
    pub fn kinds(&self) -> impl Iterator<Item = NodeKindTag> + '_ {
        self.executors.keys().copied()
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&str> = self.executors.keys().map(NodeKindTag::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("ExecutorRegistry").field("kinds", &kinds).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    #[async_trait]
    impl NodeExecutor for Fixed {
        async fn execute(&self, _: &NodeRequest, _: &NodeContext) -> Result<NodeOutput, NodeError> {
            Ok(NodeOutput::new(self.0))
        }
    }

    #[test]
    fn test_builtins_registered() {
        let registry = ExecutorRegistry::with_builtins(ShellConfig::default());
        assert!(registry.contains(NodeKindTag::Shell));
        assert!(registry.contains(NodeKindTag::Text));
        assert!(registry.contains(NodeKindTag::Preview));
        assert!(registry.contains(NodeKindTag::Output));
        assert!(!registry.contains(NodeKindTag::Llm));
        assert!(!registry.contains(NodeKindTag::SearchContext));
    }

    #[test]
    fn test_control_kinds_rejected() {
        let registry = ExecutorRegistry::new().with(NodeKindTag::IfElse, Arc::new(Fixed("x")));
        assert!(!registry.contains(NodeKindTag::IfElse));
        assert_eq!(registry.kinds().count(), 0);
    }

    #[tokio::test]
    async fn test_register_replaces() {
        let registry = ExecutorRegistry::new()
            .with(NodeKindTag::Llm, Arc::new(Fixed("first")))
            .with(NodeKindTag::Llm, Arc::new(Fixed("second")));

        let executor = registry.get(NodeKindTag::Llm).unwrap();
        let request = NodeRequest::new(Node::llm("p", "hi"));
        let context = NodeContext::new(Uuid::new_v4(), NodeId::new("p"));
        let output = executor.execute(&request, &context).await.unwrap();
        assert_eq!(output.content, "second");
    }

    #[test]
    fn test_context_cancellation() {
        let source = crate::workflow::CancellationTokenSource::new();
        let context = NodeContext::new(Uuid::new_v4(), NodeId::new("n"))
            .with_cancellation_token(source.token());
        assert!(!context.is_cancelled());
        source.cancel();
        assert!(context.is_cancelled());

        let bare = NodeContext::new(Uuid::new_v4(), NodeId::new("n"));
        assert!(bare.cancellation_token().is_none());
        assert!(!bare.is_cancelled());
    }

    #[test]
    fn test_joined_inputs() {
        let request = NodeRequest::new(Node::text("t", ""))
            .with_inputs(vec!["a".into(), "b".into()]);
        assert_eq!(request.joined_inputs(), "a\nb");
    }
}
