//! Execution state machine.
//!
//! An [`ExecutionRun`] is created for each execution and mutated only
//! through the transitions below. Hosts read it as a snapshot; the engine
//! is its single writer.

use chrono::{DateTime, Utc};
use flow_core::NodeId;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a whole run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Not started
    Idle,
    /// Dispatching nodes
    Running,
    /// Every step was dispatched, skipped, or dispatching halted on error
    Completed,
    /// Stopped by an abort signal
    Aborted,
}

impl RunStatus {
    /// Returns true for `Completed` and `Aborted`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Aborted)
    }
}

/// Status of a single node within a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Not dispatched
    Idle,
    /// Executor in flight
    Running,
    /// Executor returned output
    Completed,
    /// Executor reported a failure
    Error,
    /// Run was aborted while the node was in flight
    Interrupted,
}

impl NodeStatus {
    /// Returns true for `Completed`, `Error` and `Interrupted`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NodeStatus::Completed | NodeStatus::Error | NodeStatus::Interrupted
        )
    }
}

/// Invalid state machine transition.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The operation requires a running run
    #[error("Run is {0:?}, expected Running")]
    NotRunning(RunStatus),

    /// The run was already started
    #[error("Run already started ({0:?})")]
    AlreadyStarted(RunStatus),

    /// Another node is still in flight
    #[error("Node {current} is still running, cannot start {requested}")]
    NodeBusy {
        /// Node currently in flight
        current: NodeId,
        /// Node that was requested
        requested: NodeId,
    },
}

/// State of one execute-to-completion (or abort) cycle.
///
/// # Example
///
/// ```ignore
/// let mut run = ExecutionRun::new();
/// run.start()?;
/// run.begin_node(&id)?;
/// run.on_node_result(&id, NodeStatus::Completed, "ok");
/// run.complete()?;
/// assert_eq!(run.status(), RunStatus::Completed);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRun {
    id: Uuid,
    status: RunStatus,
    node_status: IndexMap<NodeId, NodeStatus>,
    node_result: IndexMap<String, String>,
    current: Option<NodeId>,
    skipped: IndexSet<NodeId>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl Default for ExecutionRun {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionRun {
    /// Creates an idle run with a fresh id.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            status: RunStatus::Idle,
            node_status: IndexMap::new(),
            node_result: IndexMap::new(),
            current: None,
            skipped: IndexSet::new(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Run identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current run status.
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Status of a node; nodes never dispatched are `Idle`.
    pub fn node_status(&self, id: &NodeId) -> NodeStatus {
        self.node_status.get(id).copied().unwrap_or(NodeStatus::Idle)
    }

    /// Statuses of every node dispatched in this run, in first-dispatch order.
    pub fn statuses(&self) -> &IndexMap<NodeId, NodeStatus> {
        &self.node_status
    }

    /// Last result of a node.
    pub fn result(&self, id: &NodeId) -> Option<&str> {
        self.node_result.get(id.as_str()).map(String::as_str)
    }

    /// All results, including derived `"{nodeId}_tokens"` entries.
    pub fn results(&self) -> &IndexMap<String, String> {
        &self.node_result
    }

    /// Node currently in flight.
    pub fn current(&self) -> Option<&NodeId> {
        self.current.as_ref()
    }

    /// Nodes skipped because an upstream dependency failed, was skipped,
    /// or sits on an untaken branch.
    pub fn skipped(&self) -> &IndexSet<NodeId> {
        &self.skipped
    }

    /// When the run started.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// When the run reached a terminal status.
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// `Idle -> Running`.
    pub fn start(&mut self) -> Result<(), StateError> {
        if self.status != RunStatus::Idle {
            return Err(StateError::AlreadyStarted(self.status));
        }
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Marks a node `Running`.
    ///
    /// A node may be dispatched again (loop bodies); its previous result
    /// is kept until the new one arrives.
    pub fn begin_node(&mut self, id: &NodeId) -> Result<(), StateError> {
        if self.status != RunStatus::Running {
            return Err(StateError::NotRunning(self.status));
        }
        if let Some(current) = &self.current {
            return Err(StateError::NodeBusy {
                current: current.clone(),
                requested: id.clone(),
            });
        }
        self.skipped.shift_remove(id);
        self.node_status.insert(id.clone(), NodeStatus::Running);
        self.current = Some(id.clone());
        Ok(())
    }

    /// Applies a node callback.
    ///
    /// Callbacks are ignored unless the run is `Running` and `id` is the
    /// node in flight, which makes duplicate and out-of-order deliveries
    /// harmless. Only `Completed` and `Error` are accepted here;
    /// interruption goes through [`abort`](Self::abort).
    ///
    /// # Returns
    ///
    /// True if the callback was applied.
    pub fn on_node_result(
        &mut self,
        id: &NodeId,
        status: NodeStatus,
        result: impl Into<String>,
    ) -> bool {
        if self.status != RunStatus::Running || self.current.as_ref() != Some(id) {
            tracing::debug!(node_id = %id, ?status, "ignoring stale node callback");
            return false;
        }
        if !matches!(status, NodeStatus::Completed | NodeStatus::Error) {
            tracing::warn!(node_id = %id, ?status, "ignoring non-terminal node callback");
            return false;
        }
        self.node_status.insert(id.clone(), status);
        self.node_result.insert(id.to_string(), result.into());
        self.current = None;
        true
    }

    /// Aborts the run.
    ///
    /// The in-flight node, if any, becomes `Interrupted`. Completed nodes
    /// keep their results. Does nothing unless the run is `Running`.
    ///
    /// # Returns
    ///
    /// The interrupted node.
    pub fn abort(&mut self) -> Option<NodeId> {
        if self.status != RunStatus::Running {
            return None;
        }
        let interrupted = self.current.take();
        if let Some(id) = &interrupted {
            self.node_status.insert(id.clone(), NodeStatus::Interrupted);
        }
        self.status = RunStatus::Aborted;
        self.finished_at = Some(Utc::now());
        interrupted
    }

    /// `Running -> Completed`. No node may be in flight.
    pub fn complete(&mut self) -> Result<(), StateError> {
        if self.status != RunStatus::Running {
            return Err(StateError::NotRunning(self.status));
        }
        if let Some(current) = &self.current {
            return Err(StateError::NodeBusy {
                current: current.clone(),
                requested: current.clone(),
            });
        }
        self.status = RunStatus::Completed;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Records a node as skipped.
    ///
    /// The node goes back to `Idle`: a status or result left from an
    /// earlier loop pass is dropped.
    pub fn mark_skipped(&mut self, id: &NodeId) {
        self.node_status.shift_remove(id);
        self.node_result.shift_remove(id.as_str());
        self.skipped.insert(id.clone());
    }

    /// Stores a token count under the `"{nodeId}_tokens"` key.
    pub fn set_token_count(&mut self, id: &NodeId, count: usize) {
        self.node_result.insert(token_key(id), count.to_string());
    }

    /// Reads a stored token count.
    pub fn token_count(&self, id: &NodeId) -> Option<usize> {
        self.node_result.get(&token_key(id))?.parse().ok()
    }

    /// Discards everything, returning to a fresh `Idle` run.
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

fn token_key(id: &NodeId) -> String {
    format!("{id}_tokens")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> NodeId {
        NodeId::new(raw)
    }

    #[test]
    fn test_happy_path() {
        let mut run = ExecutionRun::new();
        assert_eq!(run.status(), RunStatus::Idle);
        run.start().unwrap();

        run.begin_node(&id("a")).unwrap();
        assert_eq!(run.node_status(&id("a")), NodeStatus::Running);
        assert!(run.on_node_result(&id("a"), NodeStatus::Completed, "out"));

        run.complete().unwrap();
        assert_eq!(run.status(), RunStatus::Completed);
        assert_eq!(run.result(&id("a")), Some("out"));
        assert!(run.finished_at().is_some());
    }

    #[test]
    fn test_duplicate_callback_is_ignored() {
        let mut run = ExecutionRun::new();
        run.start().unwrap();
        run.begin_node(&id("a")).unwrap();
        assert!(run.on_node_result(&id("a"), NodeStatus::Completed, "first"));
        assert!(!run.on_node_result(&id("a"), NodeStatus::Error, "late"));

        assert_eq!(run.node_status(&id("a")), NodeStatus::Completed);
        assert_eq!(run.result(&id("a")), Some("first"));
    }

    #[test]
    fn test_callback_for_other_node_is_ignored() {
        let mut run = ExecutionRun::new();
        run.start().unwrap();
        run.begin_node(&id("a")).unwrap();
        assert!(!run.on_node_result(&id("b"), NodeStatus::Completed, "x"));
        assert_eq!(run.current(), Some(&id("a")));
    }

    #[test]
    fn test_interrupted_is_not_a_callback_status() {
        let mut run = ExecutionRun::new();
        run.start().unwrap();
        run.begin_node(&id("a")).unwrap();
        assert!(!run.on_node_result(&id("a"), NodeStatus::Interrupted, ""));
        assert_eq!(run.node_status(&id("a")), NodeStatus::Running);
    }

    #[test]
    fn test_abort_interrupts_running_node() {
        let mut run = ExecutionRun::new();
        run.start().unwrap();
        run.begin_node(&id("a")).unwrap();
        run.on_node_result(&id("a"), NodeStatus::Completed, "done");
        run.begin_node(&id("b")).unwrap();

        assert_eq!(run.abort(), Some(id("b")));
        assert_eq!(run.status(), RunStatus::Aborted);
        assert_eq!(run.node_status(&id("a")), NodeStatus::Completed);
        assert_eq!(run.node_status(&id("b")), NodeStatus::Interrupted);
        assert_eq!(run.node_status(&id("c")), NodeStatus::Idle);
        assert_eq!(run.result(&id("a")), Some("done"));

        // Terminal states absorb further events
        assert_eq!(run.abort(), None);
        assert!(run.begin_node(&id("c")).is_err());
        assert!(!run.on_node_result(&id("b"), NodeStatus::Completed, "late"));
        assert!(run.complete().is_err());
        assert_eq!(run.status(), RunStatus::Aborted);
    }

    #[test]
    fn test_abort_between_nodes() {
        let mut run = ExecutionRun::new();
        run.start().unwrap();
        assert_eq!(run.abort(), None);
        assert_eq!(run.status(), RunStatus::Aborted);
    }

    #[test]
    fn test_abort_before_start_is_noop() {
        let mut run = ExecutionRun::new();
        assert_eq!(run.abort(), None);
        assert_eq!(run.status(), RunStatus::Idle);
    }

    #[test]
    fn test_one_node_at_a_time() {
        let mut run = ExecutionRun::new();
        run.start().unwrap();
        run.begin_node(&id("a")).unwrap();
        assert!(matches!(
            run.begin_node(&id("b")),
            Err(StateError::NodeBusy { .. })
        ));
        assert!(run.complete().is_err());
    }

    #[test]
    fn test_start_twice() {
        let mut run = ExecutionRun::new();
        run.start().unwrap();
        assert_eq!(
            run.start(),
            Err(StateError::AlreadyStarted(RunStatus::Running))
        );
    }

    #[test]
    fn test_token_count_key() {
        let mut run = ExecutionRun::new();
        run.set_token_count(&id("p"), 42);
        assert_eq!(run.token_count(&id("p")), Some(42));
        assert_eq!(run.results().get("p_tokens").map(String::as_str), Some("42"));
        assert!(run.result(&id("p")).is_none());
    }

    #[test]
    fn test_skipped_node_stays_idle() {
        let mut run = ExecutionRun::new();
        run.start().unwrap();
        run.mark_skipped(&id("x"));
        assert_eq!(run.node_status(&id("x")), NodeStatus::Idle);
        assert!(run.statuses().is_empty());
        assert!(run.skipped().contains(&id("x")));
    }

    #[test]
    fn test_skip_after_completed_pass_resets_node() {
        let mut run = ExecutionRun::new();
        run.start().unwrap();
        run.begin_node(&id("x")).unwrap();
        assert!(run.on_node_result(&id("x"), NodeStatus::Completed, "pass 0"));

        run.mark_skipped(&id("x"));
        assert_eq!(run.node_status(&id("x")), NodeStatus::Idle);
        assert!(run.result(&id("x")).is_none());
        assert!(run.skipped().contains(&id("x")));
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut run = ExecutionRun::new();
        let old = run.id();
        run.start().unwrap();
        run.begin_node(&id("a")).unwrap();
        run.clear();

        assert_eq!(run.status(), RunStatus::Idle);
        assert!(run.statuses().is_empty());
        assert!(run.results().is_empty());
        assert_ne!(run.id(), old);
    }

    #[test]
    fn test_snapshot_serializes_snake_case() {
        let mut run = ExecutionRun::new();
        run.start().unwrap();
        run.begin_node(&id("a")).unwrap();
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["status"], "running");
        assert_eq!(json["nodeStatus"]["a"], "running");
    }
}
