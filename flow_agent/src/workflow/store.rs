//! Workflow persistence.
//!
//! [`FileStore`] keeps one document on disk, as JSON or YAML depending on
//! the file extension.

use async_trait::async_trait;
use flow_core::{FlowError, WorkflowDocument};
use std::path::{Path, PathBuf};

/// Error types for workflow persistence.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Reading or writing the file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML encoding or decoding failed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The document is not a valid workflow
    #[error("Invalid workflow document: {0}")]
    Document(#[from] FlowError),

    /// The file extension is neither JSON nor YAML
    #[error("Unsupported workflow file format: {0}")]
    UnsupportedFormat(PathBuf),

    /// No store was configured for the session
    #[error("No workflow store configured")]
    NotConfigured,
}

/// Persistence for a single workflow document.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Loads the stored document.
    async fn load(&self) -> Result<WorkflowDocument, StoreError>;

    /// Replaces the stored document.
    async fn save(&self, document: &WorkflowDocument) -> Result<(), StoreError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

impl Format {
    fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            _ => None,
        }
    }
}

/// File-backed store.
///
/// # Example
///
/// ```ignore
/// let store = FileStore::new("workflow.json")?;
/// store.save(&WorkflowDocument::from_graph(&graph)).await?;
/// let graph = store.load().await?.into_graph()?;
/// ```
#[derive(Clone, Debug)]
pub struct FileStore {
    path: PathBuf,
    format: Format,
}

impl FileStore {
    /// Creates a store for `path`, which must end in `.json`, `.yaml` or `.yml`.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let format = Format::of(&path).ok_or_else(|| StoreError::UnsupportedFormat(path.clone()))?;
        Ok(Self { path, format })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl WorkflowStore for FileStore {
    async fn load(&self) -> Result<WorkflowDocument, StoreError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let document: WorkflowDocument = match self.format {
            Format::Json => serde_json::from_str(&raw)?,
            Format::Yaml => serde_yaml::from_str(&raw)?,
        };
        document.check_version();
        tracing::info!(
            path = %self.path.display(),
            nodes = document.nodes.len(),
            edges = document.edges.len(),
            "loaded workflow"
        );
        Ok(document)
    }

    async fn save(&self, document: &WorkflowDocument) -> Result<(), StoreError> {
        let raw = match self.format {
            Format::Json => serde_json::to_string_pretty(document)?,
            Format::Yaml => serde_yaml::to_string(document)?,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, raw).await?;
        tracing::info!(path = %self.path.display(), "saved workflow");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_core::{Edge, Node};

    fn sample() -> WorkflowDocument {
        WorkflowDocument::new(
            vec![
                Node::loop_start("s", 2, "i"),
                Node::llm("p", "echo ${i}"),
                Node::loop_end("e"),
            ],
            vec![
                Edge::new("s", "p").with_id("e1"),
                Edge::new("p", "e").with_id("e2"),
            ],
        )
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(matches!(
            FileStore::new("workflow.toml"),
            Err(StoreError::UnsupportedFormat(_))
        ));
        assert!(FileStore::new("workflow").is_err());
        assert!(FileStore::new("WORKFLOW.JSON").is_ok());
    }

    #[tokio::test]
    async fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested/workflow.json")).unwrap();
        store.save(&sample()).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, sample());
    }

    #[tokio::test]
    async fn test_yaml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("workflow.yaml")).unwrap();
        store.save(&sample()).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.nodes, sample().nodes);
        assert_eq!(loaded.version, sample().version);
        assert!(loaded.into_graph().is_ok());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("absent.json")).unwrap();
        assert!(matches!(store.load().await, Err(StoreError::Io(_))));
    }

    #[tokio::test]
    async fn test_load_unknown_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        tokio::fs::write(
            &path,
            r#"{"nodes":[{"id":"x","type":"webhook","data":{}}],"edges":[],"version":"1.0.0"}"#,
        )
        .await
        .unwrap();

        let store = FileStore::new(path).unwrap();
        assert!(matches!(store.load().await, Err(StoreError::Json(_))));
    }
}
