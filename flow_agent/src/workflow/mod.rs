//! Workflow execution for visual node graphs.
//!
//! # Architecture
//!
//! - [`ExecutionRun`](state::ExecutionRun): per-run state machine. The run
//!   moves `Idle -> Running -> {Completed, Aborted}`; each node moves
//!   `Idle -> Running -> {Completed, Error, Interrupted}`.
//! - [`WorkflowEngine`](executor::WorkflowEngine): validates, plans and
//!   dispatches nodes strictly one at a time.
//! - [`NodeExecutor`](node::NodeExecutor): async capability per node kind.
//! - [`WorkflowSession`](session::WorkflowSession): command/event routing.
//!
//! # Execution Model
//!
//! 1. Validate required fields and graph structure; on failure nothing runs
//! 2. Compute (or reuse) the execution plan
//! 3. Dispatch each step, substituting `${...}` placeholders first
//! 4. Skip steps whose upstream failed, was skipped or is an untaken branch
//! 5. Finish in `Completed`, or `Aborted` if the abort handle fired
//!
//! # Example
//!
//! ```ignore
//! use flow_agent::{EngineConfig, WorkflowEngine};
//!
//! let mut engine = WorkflowEngine::new(EngineConfig::default())
//!     .with_executor(NodeKindTag::Llm, Arc::new(MyLlm::new()));
//! let summary = engine.execute(&graph).await?;
//! println!("{:?}", summary.status);
//! ```

pub mod cancellation;
pub mod control;
pub mod events;
pub mod executor;
pub mod node;
pub mod nodes;
pub mod session;
pub mod state;
pub mod store;
pub mod tokens;

pub use cancellation::{AbortHandle, CancellationToken, CancellationTokenSource};
pub use events::{EventSink, WorkflowCommand, WorkflowEvent};
pub use executor::{RunSummary, WorkflowEngine};
pub use node::{ExecutorRegistry, NodeContext, NodeError, NodeExecutor, NodeOutput, NodeRequest};
pub use nodes::{OutputExecutor, PreviewExecutor, ShellConfig, ShellExecutor, TextExecutor};
pub use session::WorkflowSession;
pub use state::{ExecutionRun, NodeStatus, RunStatus, StateError};
pub use store::{FileStore, StoreError, WorkflowStore};
pub use tokens::{ApproximateTokenCounter, TokenCounter};
