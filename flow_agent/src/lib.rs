//! FlowKit agent layer - sequential workflow execution.
//!
//! This crate runs the plans produced by `flow_core`:
//!
//! - [`workflow::WorkflowEngine`]: dispatches nodes one at a time in
//!   scheduler order, tracking an [`ExecutionRun`](workflow::ExecutionRun)
//! - [`workflow::NodeExecutor`]: the capability that actually performs a
//!   node's work; shell, text, preview and output executors are built in,
//!   LLM and search-context executors are supplied by the host
//! - [`workflow::WorkflowSession`]: routes inbound UI commands and streams
//!   outbound events over `tokio::sync::mpsc` channels
//!
//! The library emits `tracing` events and installs no subscriber.

pub mod config;
pub mod workflow;

use flow_core::{FlowError, ValidationReport};

pub use config::EngineConfig;
pub use workflow::state::StateError;
pub use workflow::store::StoreError;

/// Error types for engine operations.
///
/// Runtime node failures are not errors at this level: they become a node
/// `Error` status and the run continues.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// Graph construction or scheduling failed
    #[error("Workflow error: {0}")]
    Flow(#[from] FlowError),

    /// Pre-flight validation failed; nothing was dispatched
    #[error("Validation failed: {0}")]
    Validation(ValidationReport),

    /// Execution state machine misuse
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Workflow persistence failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

pub use workflow::{
    AbortHandle, ApproximateTokenCounter, CancellationToken, CancellationTokenSource,
    EventSink, ExecutionRun, ExecutorRegistry, FileStore, NodeContext, NodeError,
    NodeExecutor, NodeOutput, NodeRequest, NodeStatus, RunStatus, RunSummary, ShellConfig,
    TokenCounter, WorkflowCommand, WorkflowEngine, WorkflowEvent, WorkflowSession,
    WorkflowStore,
};
