//! Persisted workflow document format.
//!
//! A workflow file is `{ nodes, edges, version }`. Nodes use the canvas
//! wire shape:
//!
//! ```json
//! {
//!   "id": "n1",
//!   "type": "loop-start",
//!   "data": { "title": "Repeat", "active": true, "content": "", "iterations": 3, "loopVariable": "i" },
//!   "position": { "x": 10, "y": 20 }
//! }
//! ```
//!
//! Fields the core does not know about, inside `data` or at the top level,
//! are carried through verbatim so documents written by newer or older
//! editors survive a load/save cycle.

use crate::error::{FlowError, Result};
use crate::graph::Graph;
use crate::types::{
    Edge, LlmSettings, LoopSettings, Node, NodeId, NodeKind, NodeKindTag, VariableSettings,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Document version written by this crate.
pub const CURRENT_VERSION: &str = "1.0.0";

/// A versioned workflow document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDocument {
    /// Workflow nodes in insertion order
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Workflow edges in insertion order
    #[serde(default)]
    pub edges: Vec<Edge>,
    /// Document format version
    #[serde(default = "current_version")]
    pub version: String,
    /// Unknown top-level fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn current_version() -> String {
    CURRENT_VERSION.to_string()
}

impl WorkflowDocument {
    /// Creates a document at the current version.
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self {
            nodes,
            edges,
            version: current_version(),
            extra: Map::new(),
        }
    }

    /// Sets the version string.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Snapshots a graph into a document.
    pub fn from_graph(graph: &Graph) -> Self {
        Self::new(graph.nodes().cloned().collect(), graph.edges().to_vec())
    }

    /// Parses a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: Self = serde_json::from_str(json)?;
        doc.check_version();
        Ok(doc)
    }

    /// Serializes the document as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Builds a graph from the document, rejecting dangling edges.
    pub fn into_graph(self) -> Result<Graph> {
        Graph::from_parts(self.nodes, self.edges)
    }

    /// Logs when the document was written by an incompatible major version.
    ///
    /// Documents are still accepted; unknown fields pass through.
    pub fn check_version(&self) -> bool {
        let major = |v: &str| v.split('.').next().unwrap_or_default().to_string();
        let compatible = major(&self.version) == major(CURRENT_VERSION);
        if !compatible {
            tracing::warn!(
                version = %self.version,
                expected = CURRENT_VERSION,
                "workflow document version differs, loading anyway"
            );
        }
        compatible
    }
}

/// Wire representation of a [`Node`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct NodeRecord {
    id: NodeId,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Map<String, Value>,
    #[serde(flatten)]
    ui: Map<String, Value>,
}

const COMMON_FIELDS: &[&str] = &["title", "active", "content"];

/// Shared `data` fields every node kind carries.
#[derive(Deserialize)]
struct CommonData {
    #[serde(default)]
    title: String,
    #[serde(default = "default_active")]
    active: bool,
    #[serde(default)]
    content: String,
}

fn default_active() -> bool {
    true
}

/// Moves the named keys out of `data` into a fresh map.
fn take_fields(data: &mut Map<String, Value>, fields: &[&str]) -> Map<String, Value> {
    let mut known = Map::new();
    for field in fields {
        if let Some(value) = data.remove(*field) {
            known.insert((*field).to_string(), value);
        }
    }
    known
}

fn decode<T: DeserializeOwned>(node: &NodeId, fields: Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(fields)).map_err(|e| FlowError::InvalidNodeData {
        node: node.clone(),
        reason: e.to_string(),
    })
}

fn encode<T: Serialize>(node: &NodeId, settings: &T, data: &mut Map<String, Value>) -> Result<()> {
    match serde_json::to_value(settings)? {
        Value::Object(fields) => {
            data.extend(fields);
            Ok(())
        }
        other => Err(FlowError::InvalidNodeData {
            node: node.clone(),
            reason: format!("settings encoded as {other}, expected an object"),
        }),
    }
}

impl TryFrom<NodeRecord> for Node {
    type Error = FlowError;

    fn try_from(record: NodeRecord) -> Result<Self> {
        let NodeRecord {
            id,
            kind,
            mut data,
            ui,
        } = record;

        let tag = NodeKindTag::parse(&kind).ok_or_else(|| FlowError::UnknownNodeKind {
            node: id.clone(),
            kind: kind.clone(),
        })?;

        let common: CommonData = decode(&id, take_fields(&mut data, COMMON_FIELDS))?;

        let kind = match tag {
            NodeKindTag::Shell => NodeKind::Shell,
            NodeKindTag::Llm => NodeKind::Llm(decode(&id, take_fields(&mut data, LlmSettings::FIELDS))?),
            NodeKindTag::Preview => NodeKind::Preview,
            NodeKindTag::Text => NodeKind::Text,
            NodeKindTag::SearchContext => NodeKind::SearchContext,
            NodeKindTag::Output => NodeKind::Output,
            NodeKindTag::LoopStart => {
                NodeKind::LoopStart(decode(&id, take_fields(&mut data, LoopSettings::FIELDS))?)
            }
            NodeKindTag::LoopEnd => NodeKind::LoopEnd,
            NodeKindTag::Accumulator => {
                NodeKind::Accumulator(decode(&id, take_fields(&mut data, VariableSettings::FIELDS))?)
            }
            NodeKindTag::Variable => {
                NodeKind::Variable(decode(&id, take_fields(&mut data, VariableSettings::FIELDS))?)
            }
            NodeKindTag::IfElse => NodeKind::IfElse,
        };

        Ok(Node {
            id,
            kind,
            title: common.title,
            active: common.active,
            content: common.content,
            extra: data,
            ui,
        })
    }
}

impl From<Node> for NodeRecord {
    fn from(node: Node) -> Self {
        let mut data = Map::new();
        data.insert("title".to_string(), Value::String(node.title));
        data.insert("active".to_string(), Value::Bool(node.active));
        data.insert("content".to_string(), Value::String(node.content));

        // Settings structs always encode as JSON objects, so this cannot fail.
        let encoded = match &node.kind {
            NodeKind::Llm(settings) => encode(&node.id, settings, &mut data),
            NodeKind::LoopStart(settings) => encode(&node.id, settings, &mut data),
            NodeKind::Accumulator(settings) | NodeKind::Variable(settings) => {
                encode(&node.id, settings, &mut data)
            }
            NodeKind::Shell
            | NodeKind::Preview
            | NodeKind::Text
            | NodeKind::SearchContext
            | NodeKind::Output
            | NodeKind::LoopEnd
            | NodeKind::IfElse => Ok(()),
        };
        if let Err(e) = encoded {
            tracing::error!(node_id = %node.id, error = %e, "failed to encode node settings");
        }

        for (key, value) in node.extra {
            data.entry(key).or_insert(value);
        }

        NodeRecord {
            kind: node.kind.tag().as_str().to_string(),
            id: node.id,
            data,
            ui: node.ui,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_canvas_node() {
        let node: Node = serde_json::from_value(json!({
            "id": "n1",
            "type": "loop-start",
            "data": {"title": "Repeat", "content": "", "iterations": 3, "loopVariable": "i"},
            "position": {"x": 10, "y": 20}
        }))
        .unwrap();

        assert_eq!(node.id, NodeId::new("n1"));
        assert!(node.active);
        assert_eq!(node.title, "Repeat");
        assert_eq!(node.kind, NodeKind::LoopStart(LoopSettings::new(3, "i")));
        assert_eq!(node.ui.get("position"), Some(&json!({"x": 10, "y": 20})));
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let raw = json!({
            "id": "n2",
            "type": "llm",
            "data": {
                "title": "Summarize",
                "active": false,
                "content": "Summarize ${1}",
                "temperature": 0.2,
                "hasGoogleSearch": true
            },
            "selected": true
        });

        let node: Node = serde_json::from_value(raw).unwrap();
        assert!(!node.active);
        assert_eq!(node.extra.get("hasGoogleSearch"), Some(&json!(true)));

        let back = serde_json::to_value(&node).unwrap();
        assert_eq!(back["type"], json!("llm"));
        assert_eq!(back["data"]["hasGoogleSearch"], json!(true));
        assert_eq!(back["data"]["temperature"], json!(0.2));
        assert_eq!(back["selected"], json!(true));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let result: std::result::Result<Node, _> =
            serde_json::from_value(json!({"id": "x", "type": "webhook", "data": {}}));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Unknown node kind 'webhook'"));
    }

    #[test]
    fn test_bad_settings_are_rejected() {
        let result: std::result::Result<Node, _> = serde_json::from_value(json!({
            "id": "x",
            "type": "loop-start",
            "data": {"iterations": "many"}
        }));
        assert!(result.unwrap_err().to_string().contains("Invalid data for node x"));
    }

    #[test]
    fn test_document_defaults_version() {
        let doc = WorkflowDocument::from_json(r#"{"nodes": [], "edges": []}"#).unwrap();
        assert_eq!(doc.version, CURRENT_VERSION);
        assert!(doc.check_version());
    }

    #[test]
    fn test_document_accepts_version_skew() {
        let doc = WorkflowDocument::from_json(
            r#"{"nodes": [{"id": "a", "type": "cli", "data": {"content": "ls"}}], "edges": [], "version": "2.3.0"}"#,
        )
        .unwrap();
        assert!(!doc.check_version());
        assert_eq!(doc.nodes.len(), 1);
    }

    #[test]
    fn test_document_into_graph_rejects_dangling_edge() {
        let doc = WorkflowDocument::new(
            vec![Node::shell("a", "ls")],
            vec![Edge::new("a", "missing").with_id("e1")],
        );
        assert!(matches!(
            doc.into_graph(),
            Err(FlowError::DanglingEdge { .. })
        ));
    }
}
