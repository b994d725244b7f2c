//! Sequential workflow engine.
//!
//! Validates a graph, obtains its execution plan and dispatches the plan's
//! steps strictly one at a time, recording every transition in an
//! [`ExecutionRun`] and mirroring it as [`WorkflowEvent`]s.

use crate::config::EngineConfig;
use crate::workflow::cancellation::{AbortHandle, CancellationToken};
use crate::workflow::control::RunContext;
use crate::workflow::events::{EventSink, WorkflowEvent};
use crate::workflow::node::{
    ExecutorRegistry, NodeContext, NodeError, NodeExecutor, NodeOutput, NodeRequest,
};
use crate::workflow::state::{ExecutionRun, NodeStatus, RunStatus};
use crate::{EngineError, Result};
use flow_core::template;
use flow_core::{Edge, ExecutionPlan, Graph, NodeId, NodeKindTag, Scheduler, Step, WorkflowValidator};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Outcome of one [`WorkflowEngine::execute`] call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Run identifier
    pub run_id: Uuid,
    /// Terminal run status
    pub status: RunStatus,
    /// Number of dispatches, counting every loop pass
    pub dispatched: usize,
    /// Nodes whose final status is `Completed`
    pub completed: Vec<NodeId>,
    /// Nodes whose final status is `Error`
    pub failed: Vec<NodeId>,
    /// Nodes skipped because of their upstream
    pub skipped: Vec<NodeId>,
    /// Node in flight when the run was aborted
    pub interrupted: Option<NodeId>,
}

impl RunSummary {
    fn from_run(run: &ExecutionRun, dispatched: usize) -> Self {
        let with_status = |wanted: NodeStatus| -> Vec<NodeId> {
            run.statuses()
                .iter()
                .filter(|(_, status)| **status == wanted)
                .map(|(id, _)| id.clone())
                .collect()
        };
        Self {
            run_id: run.id(),
            status: run.status(),
            dispatched,
            completed: with_status(NodeStatus::Completed),
            failed: with_status(NodeStatus::Error),
            skipped: run.skipped().iter().cloned().collect(),
            interrupted: with_status(NodeStatus::Interrupted).into_iter().next(),
        }
    }

    /// Returns true if the run completed with no node errors.
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed && self.failed.is_empty()
    }
}

enum Dispatch {
    Done(std::result::Result<NodeOutput, NodeError>),
    Interrupted,
}

/// Sequential workflow engine.
///
/// Owns the execution state for one workflow session. Node N+1 is never
/// dispatched before node N's result is recorded, so downstream templates
/// always see upstream output.
///
/// # Example
///
/// ```ignore
/// let mut engine = WorkflowEngine::new(EngineConfig::default())
///     .with_executor(NodeKindTag::Llm, Arc::new(MyLlm::new()));
///
/// let summary = engine.execute(&graph).await?;
/// for (id, status) in engine.run().statuses() {
///     println!("{id}: {status:?}");
/// }
/// ```
pub struct WorkflowEngine {
    config: EngineConfig,
    registry: ExecutorRegistry,
    scheduler: Scheduler,
    events: EventSink,
    abort: AbortHandle,
    run: ExecutionRun,
}

impl WorkflowEngine {
    /// Creates an engine with the built-in executors.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            registry: ExecutorRegistry::with_builtins(config.shell.clone()),
            scheduler: Scheduler::new(config.plan_cache_size),
            events: EventSink::disabled(),
            abort: AbortHandle::new(),
            run: ExecutionRun::new(),
            config,
        }
    }

    /// Replaces the executor registry.
    pub fn with_registry(mut self, registry: ExecutorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Registers an executor for a node kind.
    pub fn with_executor(mut self, kind: NodeKindTag, executor: Arc<dyn NodeExecutor>) -> Self {
        self.registry.register(kind, executor);
        self
    }

    /// Sends events to `events`.
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Handle that aborts the run in progress. Valid across runs.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// State of the current (or last) run.
    pub fn run(&self) -> &ExecutionRun {
        &self.run
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Executor registry.
    pub fn registry(&self) -> &ExecutorRegistry {
        &self.registry
    }

    /// Event sink.
    pub fn events(&self) -> &EventSink {
        &self.events
    }

    /// Records a token count for a node under `"{nodeId}_tokens"`.
    pub fn set_token_count(&mut self, id: &NodeId, count: usize) {
        self.run.set_token_count(id, count);
    }

    /// Discards the run, returning to `Idle` with no statuses or results.
    pub fn clear(&mut self) {
        tracing::debug!(run_id = %self.run.id(), "clearing run state");
        self.run.clear();
    }

    /// Validates, plans and executes `graph`.
    ///
    /// # Arguments
    ///
    /// * `graph` - The workflow to run
    ///
    /// # Returns
    ///
    /// - `Ok(RunSummary)` once the run is `Completed` or `Aborted`; node
    ///   failures are reported in the summary, not as errors
    /// - `Err(EngineError::Validation)` if pre-flight checks failed; no node
    ///   was dispatched
    pub async fn execute(&mut self, graph: &Graph) -> Result<RunSummary> {
        if self.run.status() == RunStatus::Running {
            tracing::warn!(run_id = %self.run.id(), "discarding run left in progress");
        }
        self.run = ExecutionRun::new();

        let report = WorkflowValidator::new()
            .with_dispatchable(self.registry.kinds())
            .validate(graph);
        if !report.is_valid() {
            tracing::warn!(%report, "workflow failed validation");
            self.events.emit(WorkflowEvent::validation_failed(&report));
            return Err(EngineError::Validation(report));
        }
        let plan = self.scheduler.plan(graph)?;

        let token = self.abort.arm();
        let outcome = self.run_plan(graph, &plan, &token).await;
        self.abort.disarm();

        let dispatched = match outcome {
            Ok(dispatched) => dispatched,
            Err(e) => {
                tracing::error!(error = %e, "run failed, aborting");
                self.run.abort();
                self.events.emit(WorkflowEvent::ExecutionCompleted {
                    status: self.run.status(),
                });
                return Err(e);
            }
        };

        let summary = RunSummary::from_run(&self.run, dispatched);
        tracing::info!(
            run_id = %summary.run_id,
            status = ?summary.status,
            dispatched = summary.dispatched,
            failed = summary.failed.len(),
            skipped = summary.skipped.len(),
            "workflow finished"
        );
        self.events.emit(WorkflowEvent::ExecutionCompleted {
            status: summary.status,
        });
        Ok(summary)
    }

    /// Dispatches every step; returns the number of dispatches.
    async fn run_plan(
        &mut self,
        graph: &Graph,
        plan: &ExecutionPlan,
        token: &CancellationToken,
    ) -> Result<usize> {
        self.run.start()?;
        tracing::info!(
            run_id = %self.run.id(),
            steps = plan.steps().len(),
            key = %plan.key(),
            "workflow started"
        );
        self.events.emit(WorkflowEvent::ExecutionStarted);

        let mut ctx = RunContext::new();
        let mut dispatched = 0;

        for step in plan.steps() {
            if token.is_cancelled() {
                tracing::info!(run_id = %self.run.id(), "aborted between nodes");
                self.run.abort();
                break;
            }
            let Some(node) = graph.node(&step.node) else {
                continue;
            };

            let incoming: Vec<&Edge> = graph
                .incoming(&step.node)
                .filter(|e| !plan.is_back_edge(&e.id))
                .collect();

            if let Some(reason) = self.blocked_by(&incoming, &ctx) {
                tracing::debug!(node_id = %step.node, %reason, "skipping node");
                self.run.mark_skipped(&step.node);
                self.events.emit(WorkflowEvent::NodeSkipped {
                    node_id: step.node.clone(),
                    reason,
                });
                continue;
            }

            let request = self.prepare(node.clone(), step, &incoming, &ctx);

            self.run.begin_node(&step.node)?;
            dispatched += 1;
            self.events
                .emit(WorkflowEvent::node_status(&step.node, NodeStatus::Running, None));

            let outcome = if node.tag().is_control() {
                Dispatch::Done(ctx.evaluate(graph, &request))
            } else {
                self.dispatch(&request, token).await
            };
            let outcome = match outcome {
                Dispatch::Done(Err(NodeError::Cancelled)) if token.is_cancelled() => {
                    Dispatch::Interrupted
                }
                other => other,
            };

            match outcome {
                Dispatch::Interrupted => {
                    if let Some(id) = self.run.abort() {
                        tracing::info!(node_id = %id, "node interrupted");
                        self.events
                            .emit(WorkflowEvent::node_status(&id, NodeStatus::Interrupted, None));
                    }
                    break;
                }
                Dispatch::Done(Ok(output)) => {
                    self.run
                        .on_node_result(&step.node, NodeStatus::Completed, output.content.clone());
                    self.events.emit(WorkflowEvent::node_status(
                        &step.node,
                        NodeStatus::Completed,
                        Some(output.content),
                    ));
                }
                Dispatch::Done(Err(err)) => {
                    let message = err.to_string();
                    tracing::warn!(node_id = %step.node, error = %message, "node failed");
                    self.run
                        .on_node_result(&step.node, NodeStatus::Error, message.clone());
                    self.events.emit(WorkflowEvent::node_status(
                        &step.node,
                        NodeStatus::Error,
                        Some(message),
                    ));
                    if self.config.halt_on_error {
                        tracing::info!(node_id = %step.node, "halting after node error");
                        break;
                    }
                }
            }
        }

        if self.run.status() == RunStatus::Running {
            self.run.complete()?;
        }
        Ok(dispatched)
    }

    /// Reason a step must be skipped, if any upstream failed, was skipped,
    /// or sits behind an untaken branch.
    fn blocked_by(&self, incoming: &[&Edge], ctx: &RunContext) -> Option<String> {
        incoming.iter().find_map(|edge| {
            if ctx.is_untaken(&edge.id) {
                Some(format!("Branch from {} not taken", edge.source))
            } else if self.run.node_status(&edge.source) == NodeStatus::Error {
                Some(format!("Upstream node {} failed", edge.source))
            } else if self.run.skipped().contains(&edge.source) {
                Some(format!("Upstream node {} was skipped", edge.source))
            } else {
                None
            }
        })
    }

    /// Collects inputs and bindings and renders the node's template.
    fn prepare(
        &self,
        mut node: flow_core::Node,
        step: &Step,
        incoming: &[&Edge],
        ctx: &RunContext,
    ) -> NodeRequest {
        let inputs: Vec<String> = incoming
            .iter()
            .map(|edge| self.run.result(&edge.source).unwrap_or_default().to_string())
            .collect();

        let mut variables = ctx.variables().clone();
        if let Some(frame) = &step.frame {
            variables.insert(frame.variable.clone(), frame.index.to_string());
        }

        node.content = template::render(&node.content, &inputs, &variables);
        NodeRequest::new(node)
            .with_inputs(inputs)
            .with_frame(step.frame.clone())
            .with_variables(variables)
    }

    /// Runs an executor, racing it against the abort signal.
    ///
    /// On abort the executor future is dropped.
    async fn dispatch(&self, request: &NodeRequest, token: &CancellationToken) -> Dispatch {
        let tag = request.node.tag();
        let Some(executor) = self.registry.get(tag) else {
            return Dispatch::Done(Err(NodeError::ExecutionFailed(format!(
                "No executor registered for '{tag}' nodes"
            ))));
        };
        let context = NodeContext::new(self.run.id(), request.node.id.clone())
            .with_cancellation_token(token.clone())
            .with_timeout(self.config.node_timeout);

        let timeout = self.config.node_timeout;
        let work = async {
            let call = executor.execute(request, &context);
            match timeout {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(result) => result,
                    Err(_) => Err(NodeError::Timeout(format!(
                        "Node timed out after {:?}",
                        limit
                    ))),
                },
                None => call.await,
            }
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => Dispatch::Interrupted,
            result = work => Dispatch::Done(result),
        }
    }
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("run", &self.run.id())
            .field("status", &self.run.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use flow_core::{Node, NodeKind, VariableSettings};
    use std::sync::Mutex;

    /// Echoes its rendered content and records every dispatch.
    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NodeExecutor for Recording {
        async fn execute(
            &self,
            request: &NodeRequest,
            _context: &NodeContext,
        ) -> std::result::Result<NodeOutput, NodeError> {
            self.seen.lock().unwrap().push(request.node.content.clone());
            Ok(NodeOutput::new(request.node.content.clone()))
        }
    }

    struct Failing;

    #[async_trait]
    impl NodeExecutor for Failing {
        async fn execute(
            &self,
            _request: &NodeRequest,
            _context: &NodeContext,
        ) -> std::result::Result<NodeOutput, NodeError> {
            Err(NodeError::ExecutionFailed("boom".into()))
        }
    }

    /// Fails when its rendered content is `"1"`.
    struct FailsOnOne;

    #[async_trait]
    impl NodeExecutor for FailsOnOne {
        async fn execute(
            &self,
            request: &NodeRequest,
            _context: &NodeContext,
        ) -> std::result::Result<NodeOutput, NodeError> {
            match request.node.content.as_str() {
                "1" => Err(NodeError::ExecutionFailed("pass 1".into())),
                other => Ok(NodeOutput::new(other)),
            }
        }
    }

    struct Slow;

    #[async_trait]
    impl NodeExecutor for Slow {
        async fn execute(
            &self,
            _request: &NodeRequest,
            _context: &NodeContext,
        ) -> std::result::Result<NodeOutput, NodeError> {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            Ok(NodeOutput::default())
        }
    }

    fn engine_with_llm(llm: Arc<dyn NodeExecutor>) -> WorkflowEngine {
        WorkflowEngine::new(EngineConfig::default()).with_executor(NodeKindTag::Llm, llm)
    }

    #[tokio::test]
    async fn test_templates_see_upstream_output() {
        let llm = Arc::new(Recording::default());
        let mut engine = engine_with_llm(llm.clone());

        let mut graph = Graph::new();
        graph.add_node(Node::text("a", "alpha")).unwrap();
        graph.add_node(Node::text("b", "beta")).unwrap();
        graph.add_node(Node::llm("c", "${1}+${2}")).unwrap();
        graph.add_edge("a", "c").unwrap();
        graph.add_edge("b", "c").unwrap();

        let summary = engine.execute(&graph).await.unwrap();
        assert!(summary.is_success());
        assert_eq!(summary.dispatched, 3);
        assert_eq!(engine.run().result(&NodeId::new("c")), Some("alpha+beta"));
        assert_eq!(llm.seen.lock().unwrap().as_slice(), ["alpha+beta"]);
    }

    #[tokio::test]
    async fn test_validation_blocks_dispatch() {
        let llm = Arc::new(Recording::default());
        let mut engine = engine_with_llm(llm.clone());

        let mut graph = Graph::new();
        graph.add_node(Node::text("a", "x")).unwrap();
        graph.add_node(Node::llm("b", "  ")).unwrap();
        graph.add_edge("a", "b").unwrap();

        let err = engine.execute(&graph).await.unwrap_err();
        match err {
            EngineError::Validation(report) => {
                assert!(report.error_for(&NodeId::new("b")).is_some());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(engine.run().status(), RunStatus::Idle);
        assert!(engine.run().statuses().is_empty());
        assert!(llm.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_executor_is_validation_error() {
        let mut engine = WorkflowEngine::new(EngineConfig::default());
        let mut graph = Graph::new();
        graph.add_node(Node::llm("p", "hello")).unwrap();

        let err = engine.execute(&graph).await.unwrap_err();
        match err {
            EngineError::Validation(report) => assert_eq!(
                report.error_for(&NodeId::new("p")),
                Some("No executor registered for 'llm' nodes")
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_error_skips_dependents_only() {
        let mut engine = engine_with_llm(Arc::new(Failing));

        let mut graph = Graph::new();
        graph.add_node(Node::llm("bad", "go")).unwrap();
        graph.add_node(Node::text("child", "${1}")).unwrap();
        graph.add_node(Node::text("grandchild", "${1}")).unwrap();
        graph.add_node(Node::text("independent", "fine")).unwrap();
        graph.add_edge("bad", "child").unwrap();
        graph.add_edge("child", "grandchild").unwrap();

        let summary = engine.execute(&graph).await.unwrap();
        assert_eq!(summary.status, RunStatus::Completed);
        assert_eq!(summary.failed, vec![NodeId::new("bad")]);
        assert_eq!(
            summary.skipped,
            vec![NodeId::new("child"), NodeId::new("grandchild")]
        );
        assert_eq!(summary.completed, vec![NodeId::new("independent")]);

        let run = engine.run();
        assert_eq!(run.node_status(&NodeId::new("child")), NodeStatus::Idle);
        assert_eq!(
            run.result(&NodeId::new("bad")),
            Some("Node execution failed: boom")
        );
    }

    #[tokio::test]
    async fn test_node_skipped_in_later_pass_is_not_completed() {
        let mut engine = engine_with_llm(Arc::new(FailsOnOne));

        let mut graph = Graph::new();
        graph.add_node(Node::loop_start("s", 2, "i")).unwrap();
        graph.add_node(Node::llm("a", "${i}")).unwrap();
        graph.add_node(Node::text("b", "after ${1}")).unwrap();
        graph.add_node(Node::loop_end("e")).unwrap();
        graph.add_edge("s", "a").unwrap();
        graph.add_edge("a", "b").unwrap();
        graph.add_edge("b", "e").unwrap();
        graph.add_edge("e", "s").unwrap();

        let summary = engine.execute(&graph).await.unwrap();
        assert_eq!(summary.dispatched, 4);
        assert_eq!(summary.failed, vec![NodeId::new("a")]);
        assert_eq!(summary.skipped, vec![NodeId::new("b"), NodeId::new("e")]);
        assert_eq!(summary.completed, vec![NodeId::new("s")]);

        let run = engine.run();
        assert_eq!(run.node_status(&NodeId::new("b")), NodeStatus::Idle);
        assert!(run.result(&NodeId::new("b")).is_none());
    }

    #[tokio::test]
    async fn test_halt_on_error() {
        let mut engine = WorkflowEngine::new(EngineConfig::default().with_halt_on_error(true))
            .with_executor(NodeKindTag::Llm, Arc::new(Failing));

        let mut graph = Graph::new();
        graph.add_node(Node::llm("bad", "go")).unwrap();
        graph.add_node(Node::text("independent", "fine")).unwrap();

        let summary = engine.execute(&graph).await.unwrap();
        assert_eq!(summary.status, RunStatus::Completed);
        assert_eq!(summary.dispatched, 1);
        assert_eq!(
            engine.run().node_status(&NodeId::new("independent")),
            NodeStatus::Idle
        );
    }

    #[tokio::test]
    async fn test_node_timeout_marks_error() {
        let mut engine = WorkflowEngine::new(
            EngineConfig::default().with_node_timeout(std::time::Duration::from_millis(20)),
        )
        .with_executor(NodeKindTag::Llm, Arc::new(Slow));

        let mut graph = Graph::new();
        graph.add_node(Node::llm("slow", "wait")).unwrap();

        let summary = engine.execute(&graph).await.unwrap();
        assert_eq!(summary.failed, vec![NodeId::new("slow")]);
        assert!(engine
            .run()
            .result(&NodeId::new("slow"))
            .unwrap()
            .contains("timed out"));
    }

    #[tokio::test]
    async fn test_variable_binding_reaches_templates() {
        let llm = Arc::new(Recording::default());
        let mut engine = engine_with_llm(llm.clone());

        let mut graph = Graph::new();
        graph
            .add_node(
                Node::new("v", NodeKind::Variable(VariableSettings::new("lang", "")))
                    .with_content("rust"),
            )
            .unwrap();
        graph.add_node(Node::llm("p", "Write ${lang} code, keep ${HOME}")).unwrap();
        graph.add_edge("v", "p").unwrap();

        engine.execute(&graph).await.unwrap();
        assert_eq!(
            llm.seen.lock().unwrap().as_slice(),
            ["Write rust code, keep ${HOME}"]
        );
    }

    #[tokio::test]
    async fn test_if_else_skips_untaken_branch() {
        let mut engine = WorkflowEngine::new(EngineConfig::default());

        let mut graph = Graph::new();
        graph.add_node(Node::text("input", "yes")).unwrap();
        graph
            .add_node(Node::new("check", NodeKind::IfElse).with_content("${1} == yes"))
            .unwrap();
        graph.add_node(Node::text("then", "taken")).unwrap();
        graph.add_node(Node::text("else", "not taken")).unwrap();
        graph.add_node(Node::text("after_else", "${1}")).unwrap();
        graph.add_edge("input", "check").unwrap();
        graph
            .insert_edge(Edge::new("check", "then").with_handle("true"))
            .unwrap();
        graph
            .insert_edge(Edge::new("check", "else").with_handle("false"))
            .unwrap();
        graph.add_edge("else", "after_else").unwrap();

        let summary = engine.execute(&graph).await.unwrap();
        let run = engine.run();
        assert_eq!(run.node_status(&NodeId::new("then")), NodeStatus::Completed);
        assert_eq!(run.node_status(&NodeId::new("else")), NodeStatus::Idle);
        assert_eq!(
            summary.skipped,
            vec![NodeId::new("else"), NodeId::new("after_else")]
        );
    }

    #[tokio::test]
    async fn test_events_mirror_transitions() {
        let (sink, mut rx) = EventSink::channel();
        let mut engine = WorkflowEngine::new(EngineConfig::default()).with_events(sink);

        let mut graph = Graph::new();
        graph.add_node(Node::text("only", "hi")).unwrap();
        engine.execute(&graph).await.unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                WorkflowEvent::ExecutionStarted,
                WorkflowEvent::node_status(&NodeId::new("only"), NodeStatus::Running, None),
                WorkflowEvent::node_status(
                    &NodeId::new("only"),
                    NodeStatus::Completed,
                    Some("hi".into())
                ),
                WorkflowEvent::ExecutionCompleted {
                    status: RunStatus::Completed
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_abort_before_first_node() {
        let mut engine = WorkflowEngine::new(EngineConfig::default());
        let mut graph = Graph::new();
        graph.add_node(Node::text("a", "x")).unwrap();

        // Not armed yet: nothing to abort
        assert!(!engine.abort_handle().abort());
        let summary = engine.execute(&graph).await.unwrap();
        assert_eq!(summary.status, RunStatus::Completed);
        assert!(!engine.abort_handle().abort());
    }

    #[tokio::test]
    async fn test_clear_resets_run() {
        let mut engine = WorkflowEngine::new(EngineConfig::default());
        let mut graph = Graph::new();
        graph.add_node(Node::text("a", "x")).unwrap();
        engine.execute(&graph).await.unwrap();
        engine.set_token_count(&NodeId::new("a"), 3);

        engine.clear();
        assert_eq!(engine.run().status(), RunStatus::Idle);
        assert!(engine.run().results().is_empty());
    }

    #[tokio::test]
    async fn test_cycle_is_rejected_before_dispatch() {
        let mut engine = WorkflowEngine::new(EngineConfig::default());
        let mut graph = Graph::new();
        graph.add_node(Node::text("a", "x")).unwrap();
        graph.add_node(Node::text("b", "y")).unwrap();
        graph.add_edge("a", "b").unwrap();
        graph.add_edge("b", "a").unwrap();

        assert!(matches!(
            engine.execute(&graph).await,
            Err(EngineError::Validation(_))
        ));
        assert!(engine.run().statuses().is_empty());
    }
}
