//! What a plugin sees while it runs.

use crate::config::Config;
use crate::discovery::SourceFile;
use crate::error::{EngineError, Result};
use crate::locks::FileLocks;
use crate::plugin::Phase;
use crate::progress::ProgressSink;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use sylva_core::{attrs, Node, NodeId, NodeKind, Position};
use sylva_graph::{Edge, EdgeKind, GraphStore};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// The graph store, shared between the orchestrator and its tasks.
pub type SharedStore = Arc<RwLock<Box<dyn GraphStore>>>;

/// Wraps a store for sharing.
pub fn shared(store: Box<dyn GraphStore>) -> SharedStore {
    Arc::new(RwLock::new(store))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finding reported by a validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueSpec {
    pub category: String,
    pub severity: Severity,
    pub message: String,
    /// File the issue is tagged with; it is cleared along with that file.
    pub file: String,
    pub line: u32,
    pub column: Option<u32>,
    /// Node the issue is about.
    pub target: Option<NodeId>,
    /// Free-form context, stored as metadata.
    pub context: Option<String>,
}

impl IssueSpec {
    /// An issue about `node`, positioned at it.
    pub fn at_node(node: &Node, category: &str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            category: category.to_string(),
            severity,
            message: message.into(),
            file: node.file.clone(),
            line: node.position.line,
            column: Some(node.position.column),
            target: Some(node.id.clone()),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Deterministic id: reporting the same finding twice upserts.
    pub fn id(&self, plugin: &str) -> NodeId {
        NodeId::new(format!(
            "{}->issues->{}->{}:{}:{}:{}",
            self.file,
            NodeKind::Issue,
            plugin,
            self.category,
            self.line,
            self.column.unwrap_or(0)
        ))
    }

    fn to_node(&self, plugin: &str) -> Node {
        let mut node = Node::new(self.id(plugin), NodeKind::Issue, &self.category, &self.file)
            .with_position(Position::new(self.line, self.column.unwrap_or(0)))
            .with_attr(attrs::CATEGORY, self.category.as_str())
            .with_attr(attrs::SEVERITY, self.severity.as_str())
            .with_attr(attrs::MESSAGE, self.message.as_str())
            .with_attr(attrs::PLUGIN, plugin)
            .with_opt_attr(attrs::TARGET, self.target.as_ref().map(|t| t.to_string()));
        if let Some(context) = &self.context {
            node = node.with_metadata("context", context.as_str());
        }
        node
    }
}

/// Handles and inputs given to a running plugin.
#[derive(Clone)]
pub struct PluginContext {
    pub store: SharedStore,
    pub config: Arc<Config>,
    pub root: Arc<PathBuf>,
    /// Every discovered file.
    pub files: Arc<Vec<SourceFile>>,
    /// Files selected for analysis this run.
    pub changed: Arc<Vec<SourceFile>>,
    pub phase: Phase,
    pub plugin: &'static str,
    pub progress: Arc<dyn ProgressSink>,
    pub cancel: CancellationToken,
    pub locks: FileLocks,
}

impl PluginContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Records one issue. Only validation plugins may report.
    pub async fn report_issue(&self, issue: IssueSpec) -> Result<NodeId> {
        let mut ids = self.report_issues(vec![issue]).await?;
        ids.pop()
            .ok_or_else(|| EngineError::Task("issue was not recorded".to_string()))
    }

    /// Records several issues under one write lock.
    pub async fn report_issues(&self, issues: Vec<IssueSpec>) -> Result<Vec<NodeId>> {
        if self.phase != Phase::Validation {
            return Err(EngineError::IssueOutsideValidation {
                plugin: self.plugin.to_string(),
            });
        }

        let mut store = self.store.write().await;
        let mut ids = Vec::with_capacity(issues.len());
        for issue in issues {
            let node = issue.to_node(self.plugin);
            let id = node.id.clone();
            store.add_node(node)?;
            if let Some(target) = &issue.target {
                if store.get_node(target).is_some() {
                    store.add_edge(Edge::new(EdgeKind::Affects, id.clone(), target.clone()))?;
                } else {
                    debug!("Issue {} targets missing node {}", id, target);
                }
            }
            ids.push(id);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgress;
    use sylva_core::module_id;
    use sylva_graph::MemoryGraph;

    fn context(phase: Phase) -> PluginContext {
        let mut graph = MemoryGraph::new();
        graph
            .add_node(Node::new(module_id("a.js"), NodeKind::Module, "a.js", "a.js"))
            .unwrap();
        PluginContext {
            store: shared(Box::new(graph)),
            config: Arc::new(Config::default()),
            root: Arc::new(PathBuf::from(".")),
            files: Arc::new(Vec::new()),
            changed: Arc::new(Vec::new()),
            phase,
            plugin: "TestValidator",
            progress: Arc::new(NoopProgress),
            cancel: CancellationToken::new(),
            locks: FileLocks::new(),
        }
    }

    fn issue() -> IssueSpec {
        IssueSpec {
            category: "demo".to_string(),
            severity: Severity::Warning,
            message: "something".to_string(),
            file: "a.js".to_string(),
            line: 3,
            column: Some(4),
            target: Some(module_id("a.js")),
            context: Some("extra".to_string()),
        }
    }

    #[tokio::test]
    async fn test_issue_is_upserted_with_affects_edge() {
        let ctx = context(Phase::Validation);
        let id = ctx.report_issue(issue()).await.unwrap();
        assert_eq!(id.as_str(), "a.js->issues->ISSUE->TestValidator:demo:3:4");

        ctx.report_issue(issue()).await.unwrap();
        let store = ctx.store.read().await;
        assert_eq!(store.node_count(), 2);
        assert_eq!(store.edge_count(), 1);

        let node = store.get_node(&id).unwrap();
        assert_eq!(node.file, "a.js");
        assert_eq!(node.attr_str(attrs::SEVERITY), Some("warning"));
        assert_eq!(node.attr_str(attrs::PLUGIN), Some("TestValidator"));
        assert!(node.metadata.contains_key("context"));
    }

    #[tokio::test]
    async fn test_issue_outside_validation_is_rejected() {
        let ctx = context(Phase::Enrichment);
        let result = ctx.report_issue(issue()).await;
        assert!(matches!(result, Err(EngineError::IssueOutsideValidation { .. })));
        assert_eq!(ctx.store.read().await.node_count(), 1);
    }
}
