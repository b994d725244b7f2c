//! Core types used across FlowKit.
//!
//! A workflow is a set of typed [`Node`]s connected by directed [`Edge`]s.
//! Node kinds form a closed set ([`NodeKind`]); kind-specific settings live
//! in the variant payload and every exhaustive `match` on the kind is
//! checked at compile time.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Unique identifier for a workflow node.
///
/// Opaque and stable across the node's lifetime; any string is accepted.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a new NodeId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the underlying string identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the NodeId and returns the underlying string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for an edge.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(String);

impl EdgeId {
    /// Creates a new EdgeId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the underlying string identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EdgeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Discriminant of [`NodeKind`], as written in the `type` field of a
/// persisted node.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum NodeKindTag {
    /// Shell command
    #[serde(rename = "cli", alias = "shell")]
    Shell,
    /// LLM prompt
    #[serde(rename = "llm")]
    Llm,
    /// Preview of upstream output
    #[serde(rename = "preview")]
    Preview,
    /// Text template
    #[serde(rename = "text-format", alias = "text")]
    Text,
    /// Search context lookup
    #[serde(rename = "search-context")]
    SearchContext,
    /// Final output
    #[serde(rename = "output")]
    Output,
    /// Loop entry
    #[serde(rename = "loop-start")]
    LoopStart,
    /// Loop exit
    #[serde(rename = "loop-end")]
    LoopEnd,
    /// Accumulates text across loop iterations
    #[serde(rename = "accumulator")]
    Accumulator,
    /// Named variable
    #[serde(rename = "variable")]
    Variable,
    /// Conditional branch
    #[serde(rename = "if-else")]
    IfElse,
}

impl NodeKindTag {
    /// All kinds, in declaration order.
    pub const ALL: [NodeKindTag; 11] = [
        NodeKindTag::Shell,
        NodeKindTag::Llm,
        NodeKindTag::Preview,
        NodeKindTag::Text,
        NodeKindTag::SearchContext,
        NodeKindTag::Output,
        NodeKindTag::LoopStart,
        NodeKindTag::LoopEnd,
        NodeKindTag::Accumulator,
        NodeKindTag::Variable,
        NodeKindTag::IfElse,
    ];

    /// Returns the wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKindTag::Shell => "cli",
            NodeKindTag::Llm => "llm",
            NodeKindTag::Preview => "preview",
            NodeKindTag::Text => "text-format",
            NodeKindTag::SearchContext => "search-context",
            NodeKindTag::Output => "output",
            NodeKindTag::LoopStart => "loop-start",
            NodeKindTag::LoopEnd => "loop-end",
            NodeKindTag::Accumulator => "accumulator",
            NodeKindTag::Variable => "variable",
            NodeKindTag::IfElse => "if-else",
        }
    }

    /// Parses a wire name, accepting the legacy aliases.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "cli" | "shell" => Some(NodeKindTag::Shell),
            "text" => Some(NodeKindTag::Text),
            other => Self::ALL.into_iter().find(|tag| tag.as_str() == other),
        }
    }

    /// Control kinds are evaluated by the engine itself rather than
    /// dispatched to a node executor.
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            NodeKindTag::LoopStart
                | NodeKindTag::LoopEnd
                | NodeKindTag::Accumulator
                | NodeKindTag::Variable
                | NodeKindTag::IfElse
        )
    }
}

impl fmt::Display for NodeKindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings for an LLM node. The prompt itself is the node's `content`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmSettings {
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Completion token limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Model identifier, host specific
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl LlmSettings {
    pub(crate) const FIELDS: &'static [&'static str] = &["temperature", "maxTokens", "model"];
}

/// Settings for a LoopStart node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopSettings {
    /// Number of passes over the loop body; must be at least 1
    #[serde(default = "default_iterations")]
    pub iterations: i64,
    /// Binding name exposed to body templates as `${name}`
    #[serde(default)]
    pub loop_variable: String,
}

impl LoopSettings {
    pub(crate) const FIELDS: &'static [&'static str] = &["iterations", "loopVariable"];

    /// Creates loop settings.
    pub fn new(iterations: i64, loop_variable: impl Into<String>) -> Self {
        Self {
            iterations,
            loop_variable: loop_variable.into(),
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::new(default_iterations(), "")
    }
}

fn default_iterations() -> i64 {
    1
}

/// Settings shared by Variable and Accumulator nodes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableSettings {
    /// Binding name exposed to downstream templates
    #[serde(default)]
    pub variable_name: String,
    /// Value used before anything is assigned
    #[serde(default)]
    pub initial_value: String,
}

impl VariableSettings {
    pub(crate) const FIELDS: &'static [&'static str] = &["variableName", "initialValue"];

    /// Creates variable settings.
    pub fn new(variable_name: impl Into<String>, initial_value: impl Into<String>) -> Self {
        Self {
            variable_name: variable_name.into(),
            initial_value: initial_value.into(),
        }
    }
}

/// Node kind with its kind-specific payload.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    /// Runs `content` as a shell command
    Shell,
    /// Sends `content` as a prompt
    Llm(LlmSettings),
    /// Shows upstream output
    Preview,
    /// Renders `content` as a template
    Text,
    /// Looks up context for the query in `content`
    SearchContext,
    /// Final workflow output
    Output,
    /// Entry of a bounded loop
    LoopStart(LoopSettings),
    /// Exit of a bounded loop
    LoopEnd,
    /// Appends to a running value each time it runs
    Accumulator(VariableSettings),
    /// Binds a named value
    Variable(VariableSettings),
    /// Evaluates the condition in `content`
    IfElse,
}

impl NodeKind {
    /// Returns the discriminant.
    pub fn tag(&self) -> NodeKindTag {
        match self {
            NodeKind::Shell => NodeKindTag::Shell,
            NodeKind::Llm(_) => NodeKindTag::Llm,
            NodeKind::Preview => NodeKindTag::Preview,
            NodeKind::Text => NodeKindTag::Text,
            NodeKind::SearchContext => NodeKindTag::SearchContext,
            NodeKind::Output => NodeKindTag::Output,
            NodeKind::LoopStart(_) => NodeKindTag::LoopStart,
            NodeKind::LoopEnd => NodeKindTag::LoopEnd,
            NodeKind::Accumulator(_) => NodeKindTag::Accumulator,
            NodeKind::Variable(_) => NodeKindTag::Variable,
            NodeKind::IfElse => NodeKindTag::IfElse,
        }
    }

    /// Returns the loop settings if this is a LoopStart.
    pub fn loop_settings(&self) -> Option<&LoopSettings> {
        match self {
            NodeKind::LoopStart(settings) => Some(settings),
            _ => None,
        }
    }
}

/// A vertex in the workflow graph.
///
/// Serialized in the canvas wire shape
/// `{ id, type, data: { title, active, content, ... }, ...ui }`; see
/// [`crate::document`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "crate::document::NodeRecord", into = "crate::document::NodeRecord")]
pub struct Node {
    /// Node identifier
    pub id: NodeId,
    /// Kind and kind-specific settings
    pub kind: NodeKind,
    /// Display title
    pub title: String,
    /// Inactive nodes and everything downstream of them are not executed
    pub active: bool,
    /// Generic text payload: command, prompt, template or condition
    pub content: String,
    /// Unknown `data` fields, carried through untouched
    pub extra: Map<String, Value>,
    /// Top-level visual fields (`position`, sizes, selection), carried through untouched
    pub ui: Map<String, Value>,
}

impl Node {
    /// Creates an active node with the given id and kind.
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            title: String::new(),
            active: true,
            content: String::new(),
            extra: Map::new(),
            ui: Map::new(),
        }
    }

    /// Shell node running `command`.
    pub fn shell(id: impl Into<NodeId>, command: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Shell).with_content(command)
    }

    /// LLM node with default settings.
    pub fn llm(id: impl Into<NodeId>, prompt: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Llm(LlmSettings::default())).with_content(prompt)
    }

    /// Text template node.
    pub fn text(id: impl Into<NodeId>, template: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Text).with_content(template)
    }

    /// LoopStart node.
    pub fn loop_start(id: impl Into<NodeId>, iterations: i64, variable: impl Into<String>) -> Self {
        Self::new(id, NodeKind::LoopStart(LoopSettings::new(iterations, variable)))
    }

    /// LoopEnd node.
    pub fn loop_end(id: impl Into<NodeId>) -> Self {
        Self::new(id, NodeKind::LoopEnd)
    }

    /// Sets the content.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Sets the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the stored active flag.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Returns the kind discriminant.
    pub fn tag(&self) -> NodeKindTag {
        self.kind.tag()
    }

    /// Returns the title, falling back to the id.
    pub fn display_name(&self) -> &str {
        if self.title.is_empty() {
            self.id.as_str()
        } else {
            &self.title
        }
    }
}

/// A directed dependency `source -> target`: the target consumes the
/// source's output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Edge identifier
    #[serde(default = "EdgeId::generate")]
    pub id: EdgeId,
    /// Upstream node
    pub source: NodeId,
    /// Downstream node
    pub target: NodeId,
    /// Output handle on the source; `"true"`/`"false"` on IfElse branches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    /// Insertion index assigned by the owning graph; used for tie-breaking
    #[serde(skip)]
    pub seq: u64,
    /// Unknown fields, carried through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Edge {
    /// Creates an edge with a generated id. The sequence number is
    /// assigned when the edge is inserted into a graph.
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            id: EdgeId::generate(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            seq: 0,
            extra: Map::new(),
        }
    }

    /// Sets the edge id.
    pub fn with_id(mut self, id: impl Into<EdgeId>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the source handle.
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = Some(handle.into());
        self
    }

    /// Returns true if the edge touches the node.
    pub fn touches(&self, id: &NodeId) -> bool {
        &self.source == id || &self.target == id
    }
}
