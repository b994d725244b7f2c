//! Command routing between an editor and the engine.
//!
//! A [`WorkflowSession`] owns one engine and consumes
//! [`WorkflowCommand`]s from a channel. While a run is in progress it
//! keeps reading: `abort_workflow` and `calculate_tokens` are served
//! immediately, everything else waits until the run ends.

use crate::workflow::events::{EventSink, WorkflowCommand, WorkflowEvent};
use crate::workflow::executor::WorkflowEngine;
use crate::workflow::store::{StoreError, WorkflowStore};
use crate::workflow::tokens::{ApproximateTokenCounter, TokenCounter};
use crate::EngineError;
use flow_core::{Edge, Graph, Node, NodeId, WorkflowDocument};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Editor-facing session around a [`WorkflowEngine`].
///
/// # Example
///
/// ```ignore
/// let (events, mut rx) = EventSink::channel();
/// let engine = WorkflowEngine::new(EngineConfig::default()).with_events(events);
/// let mut session = WorkflowSession::new(engine)
///     .with_store(Arc::new(FileStore::new("workflow.json")?));
///
/// let (tx, commands) = mpsc::unbounded_channel();
/// tokio::spawn(async move { session.run(commands).await });
/// tx.send(WorkflowCommand::LoadWorkflow)?;
/// ```
pub struct WorkflowSession {
    engine: WorkflowEngine,
    store: Option<Arc<dyn WorkflowStore>>,
    counter: Arc<dyn TokenCounter>,
    events: EventSink,
}

impl WorkflowSession {
    /// Creates a session. Events go to the engine's sink.
    pub fn new(engine: WorkflowEngine) -> Self {
        let events = engine.events().clone();
        Self {
            engine,
            store: None,
            counter: Arc::new(ApproximateTokenCounter),
            events,
        }
    }

    /// Sets the store used by `save_workflow` and `load_workflow`.
    pub fn with_store(mut self, store: Arc<dyn WorkflowStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replaces the token counter.
    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    /// The engine.
    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    /// Consumes commands until the channel closes.
    pub async fn run(&mut self, mut commands: mpsc::UnboundedReceiver<WorkflowCommand>) {
        let mut pending = VecDeque::new();
        loop {
            let command = match pending.pop_front() {
                Some(command) => command,
                None => match commands.recv().await {
                    Some(command) => command,
                    None => break,
                },
            };
            match command {
                WorkflowCommand::ExecuteWorkflow { nodes, edges } => {
                    self.execute_serving(nodes, edges, &mut commands, &mut pending)
                        .await;
                }
                other => self.handle(other).await,
            }
        }
        tracing::debug!("command channel closed, session ended");
    }

    /// Handles a single command to completion.
    ///
    /// An `execute_workflow` handled here runs without serving other
    /// commands; use [`run`](Self::run) for mid-run aborts.
    pub async fn handle(&mut self, command: WorkflowCommand) {
        match command {
            WorkflowCommand::ExecuteWorkflow { nodes, edges } => {
                if let Some(graph) = self.build_graph(nodes, edges) {
                    let result = self.engine.execute(&graph).await;
                    self.report(result.map(|_| ()));
                }
            }
            WorkflowCommand::AbortWorkflow => {
                self.engine.abort_handle().abort();
            }
            WorkflowCommand::SaveWorkflow {
                nodes,
                edges,
                version,
            } => self.save(nodes, edges, version).await,
            WorkflowCommand::LoadWorkflow => self.load().await,
            WorkflowCommand::CalculateTokens { text, node_id } => {
                let count = self.count_tokens(&node_id, &text);
                self.engine.set_token_count(&node_id, count);
            }
            WorkflowCommand::ClearWorkflow => self.engine.clear(),
        }
    }

    /// Runs the graph while still reading commands.
    async fn execute_serving(
        &mut self,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        commands: &mut mpsc::UnboundedReceiver<WorkflowCommand>,
        pending: &mut VecDeque<WorkflowCommand>,
    ) {
        let Some(graph) = self.build_graph(nodes, edges) else {
            return;
        };
        let abort = self.engine.abort_handle();
        let counter = self.counter.clone();
        let events = self.events.clone();
        let mut token_counts: Vec<(NodeId, usize)> = Vec::new();
        let mut open = true;

        let result = {
            let run = self.engine.execute(&graph);
            tokio::pin!(run);
            loop {
                tokio::select! {
                    // Poll the run first so its abort handle is armed before
                    // any queued abort is processed.
                    biased;
                    result = &mut run => break result,
                    command = commands.recv(), if open => match command {
                        Some(WorkflowCommand::AbortWorkflow) => {
                            abort.abort();
                        }
                        Some(WorkflowCommand::CalculateTokens { text, node_id }) => {
                            let count = counter.count(&text);
                            events.emit(WorkflowEvent::TokenCount {
                                node_id: node_id.clone(),
                                count,
                            });
                            token_counts.push((node_id, count));
                        }
                        Some(other) => {
                            tracing::debug!(?other, "deferring command until run ends");
                            pending.push_back(other);
                        }
                        None => open = false,
                    },
                }
            }
        };

        for (node_id, count) in token_counts {
            self.engine.set_token_count(&node_id, count);
        }
        self.report(result.map(|_| ()));
    }

    fn build_graph(&self, nodes: Vec<Node>, edges: Vec<Edge>) -> Option<Graph> {
        match Graph::from_parts(nodes, edges) {
            Ok(graph) => Some(graph),
            Err(e) => {
                tracing::warn!(error = %e, "rejected workflow graph");
                self.events.emit(WorkflowEvent::Error {
                    message: e.to_string(),
                });
                None
            }
        }
    }

    fn report(&self, result: crate::Result<()>) {
        match result {
            Ok(()) => {}
            // Already reported as `validation_failed`
            Err(EngineError::Validation(_)) => {}
            Err(e) => self.events.emit(WorkflowEvent::Error {
                message: e.to_string(),
            }),
        }
    }

    fn count_tokens(&self, node_id: &NodeId, text: &str) -> usize {
        let count = self.counter.count(text);
        self.events.emit(WorkflowEvent::TokenCount {
            node_id: node_id.clone(),
            count,
        });
        count
    }

    async fn save(&self, nodes: Vec<Node>, edges: Vec<Edge>, version: Option<String>) {
        let Some(store) = &self.store else {
            self.report(Err(no_store()));
            return;
        };
        let mut document = WorkflowDocument::new(nodes, edges);
        if let Some(version) = version {
            document = document.with_version(version);
        }
        match store.save(&document).await {
            Ok(()) => self.events.emit(WorkflowEvent::WorkflowSaved),
            Err(e) => self.report(Err(e.into())),
        }
    }

    async fn load(&self) {
        let Some(store) = &self.store else {
            self.report(Err(no_store()));
            return;
        };
        match store.load().await {
            Ok(document) => self.events.emit(WorkflowEvent::WorkflowLoaded {
                nodes: document.nodes,
                edges: document.edges,
            }),
            Err(e) => self.report(Err(e.into())),
        }
    }
}

fn no_store() -> EngineError {
    EngineError::Store(StoreError::NotConfigured)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::workflow::state::RunStatus;
    use crate::workflow::store::FileStore;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn drain(rx: &mut UnboundedReceiver<WorkflowEvent>) -> Vec<WorkflowEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn session() -> (WorkflowSession, UnboundedReceiver<WorkflowEvent>) {
        let (sink, rx) = EventSink::channel();
        let engine = WorkflowEngine::new(EngineConfig::default()).with_events(sink);
        (WorkflowSession::new(engine), rx)
    }

    #[tokio::test]
    async fn test_calculate_tokens_outside_run() {
        let (mut session, mut rx) = session();
        session
            .handle(WorkflowCommand::CalculateTokens {
                text: "12345678".into(),
                node_id: NodeId::new("p"),
            })
            .await;

        assert_eq!(session.engine().run().token_count(&NodeId::new("p")), Some(2));
        assert_eq!(
            drain(&mut rx),
            vec![WorkflowEvent::TokenCount {
                node_id: NodeId::new("p"),
                count: 2
            }]
        );
    }

    #[tokio::test]
    async fn test_dangling_edge_reports_error() {
        let (mut session, mut rx) = session();
        session
            .handle(WorkflowCommand::ExecuteWorkflow {
                nodes: vec![Node::text("a", "x")],
                edges: vec![Edge::new("a", "ghost")],
            })
            .await;

        let events = drain(&mut rx);
        assert!(matches!(events.as_slice(), [WorkflowEvent::Error { .. }]));
        assert_eq!(session.engine().run().status(), RunStatus::Idle);
    }

    #[tokio::test]
    async fn test_save_without_store() {
        let (mut session, mut rx) = session();
        session
            .handle(WorkflowCommand::SaveWorkflow {
                nodes: vec![],
                edges: vec![],
                version: None,
            })
            .await;
        assert!(matches!(drain(&mut rx).as_slice(), [WorkflowEvent::Error { .. }]));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::new(dir.path().join("wf.json")).unwrap());
        let (session, mut rx) = session();
        let mut session = session.with_store(store);

        let nodes = vec![Node::shell("a", "ls"), Node::text("b", "${1}")];
        let edges = vec![Edge::new("a", "b").with_id("e1")];
        session
            .handle(WorkflowCommand::SaveWorkflow {
                nodes: nodes.clone(),
                edges: edges.clone(),
                version: Some("1.2.0".into()),
            })
            .await;
        session.handle(WorkflowCommand::LoadWorkflow).await;

        assert_eq!(
            drain(&mut rx),
            vec![
                WorkflowEvent::WorkflowSaved,
                WorkflowEvent::WorkflowLoaded { nodes, edges },
            ]
        );
    }

    #[tokio::test]
    async fn test_run_processes_commands_in_order() {
        let (mut session, mut rx) = session();
        let (tx, commands) = mpsc::unbounded_channel();

        tx.send(WorkflowCommand::ExecuteWorkflow {
            nodes: vec![Node::text("a", "hello")],
            edges: vec![],
        })
        .unwrap();
        tx.send(WorkflowCommand::ClearWorkflow).unwrap();
        drop(tx);

        session.run(commands).await;

        let events = drain(&mut rx);
        assert_eq!(events.first(), Some(&WorkflowEvent::ExecutionStarted));
        assert_eq!(
            events.last(),
            Some(&WorkflowEvent::ExecutionCompleted {
                status: RunStatus::Completed
            })
        );
        // Clear ran after the execution finished
        assert_eq!(session.engine().run().status(), RunStatus::Idle);
    }
}
