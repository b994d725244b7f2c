//! FlowKit core - graph model and scheduling for visual workflows.
//!
//! A workflow is a directed graph of typed nodes (shell commands, LLM
//! prompts, text templates, conditionals, bounded loops, variables). This
//! crate turns such a graph into a deterministic, finite execution plan:
//!
//! - [`graph`]: nodes, edges and inactive-node propagation
//! - [`analysis`]: Tarjan SCCs; every cycle must be an anchored loop
//! - [`schedule`]: Kahn ordering with a stable tie-break, loop expansion
//!   and memoization
//! - [`validate`]: pre-flight checks reported per node
//! - [`document`]: the persisted `{ nodes, edges, version }` format
//! - [`template`]: `${...}` substitution
//!
//! Everything here is synchronous and side-effect free; execution lives in
//! `flow_agent`.
//!
//! # Example
//!
//! ```ignore
//! use flow_core::{Graph, Node, Scheduler};
//!
//! let mut graph = Graph::new();
//! graph.add_node(Node::shell("diff", "git diff"))?;
//! graph.add_node(Node::llm("msg", "Commit message for:\n${1}"))?;
//! graph.add_edge("diff", "msg")?;
//!
//! let plan = Scheduler::default().plan(&graph)?;
//! assert_eq!(plan.steps().len(), 2);
//! ```

pub mod analysis;
pub mod cache;
pub mod document;
pub mod error;
pub mod graph;
pub mod schedule;
pub mod template;
pub mod types;
pub mod validate;

pub use cache::MemoCache;
pub use document::{WorkflowDocument, CURRENT_VERSION};
pub use error::{FlowError, Result};
pub use graph::{Activity, Graph};
pub use schedule::{
    diagnose, schedule, ContentKey, ExecutionPlan, LoopFrame, LoopRegion, Scheduler, Step,
};
pub use types::{
    Edge, EdgeId, LlmSettings, LoopSettings, Node, NodeId, NodeKind, NodeKindTag,
    VariableSettings,
};
pub use validate::{ValidationReport, WorkflowValidator};
