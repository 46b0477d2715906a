//! Graph store contract and the sled-backed implementation.
//!
//! Every backend implements [`GraphStore`]. Writes are idempotent: a node
//! with an existing id replaces it, and an existing (kind, src, dst) edge is
//! not added twice. `commit_file` is all-or-nothing.

use crate::edge::{Edge, EdgeKind};
use crate::graph::MemoryGraph;
use sled::Db;
use std::path::Path;
use sylva_core::{Node, NodeId, NodeKind};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sled(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("Edge endpoint does not exist: {0}")]
    DanglingEdge(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Conjunctive node filter. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeFilter {
    pub kind: Option<NodeKind>,
    pub file: Option<String>,
    pub name: Option<String>,
}

impl NodeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: NodeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn matches(&self, node: &Node) -> bool {
        self.kind.map_or(true, |kind| node.kind == kind)
            && self.file.as_ref().map_or(true, |file| &node.file == file)
            && self.name.as_ref().map_or(true, |name| &node.name == name)
    }
}

/// The storage contract the pipeline writes through.
///
/// Query results for edges are sorted, so callers see the same order
/// regardless of insertion history.
pub trait GraphStore: Send + Sync {
    /// Inserts or replaces a node.
    fn add_node(&mut self, node: Node) -> Result<(), StoreError>;

    /// Adds an edge. Returns `Ok(false)` if it already existed.
    fn add_edge(&mut self, edge: Edge) -> Result<bool, StoreError>;

    /// Adds several edges, returning how many were new.
    fn add_edges(&mut self, edges: Vec<Edge>) -> Result<usize, StoreError> {
        let mut added = 0;
        for edge in edges {
            if self.add_edge(edge)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Writes one file's nodes and edges. Nothing is written on error.
    fn commit_file(&mut self, file: &str, nodes: Vec<Node>, edges: Vec<Edge>) -> Result<(), StoreError>;

    fn query_nodes<'a>(&'a self, filter: &NodeFilter) -> Box<dyn Iterator<Item = &'a Node> + 'a>;

    fn get_node(&self, id: &NodeId) -> Option<&Node>;

    /// Outgoing edges of a node, restricted to `kinds` unless empty.
    fn get_outgoing_edges(&self, id: &NodeId, kinds: &[EdgeKind]) -> Vec<Edge>;

    /// Incoming edges of a node, restricted to `kinds` unless empty.
    fn get_incoming_edges(&self, id: &NodeId, kinds: &[EdgeKind]) -> Vec<Edge>;

    fn find_by_attr(&self, predicate: &dyn Fn(&Node) -> bool) -> Vec<&Node>;

    /// Removes every node tagged with `file` and every edge touching one.
    fn delete_nodes_by_file(&mut self, file: &str) -> Result<usize, StoreError>;

    /// Files that currently have nodes, sorted.
    fn files(&self) -> Vec<String>;

    fn node_count(&self) -> usize;

    fn edge_count(&self) -> usize;

    /// Every edge, sorted.
    fn all_edges(&self) -> Vec<Edge>;

    fn flush(&self) -> Result<(), StoreError>;
}

const NODE_PREFIX: &[u8] = b"n:";
const EDGE_PREFIX: &[u8] = b"e:";

fn node_key(id: &NodeId) -> Vec<u8> {
    let mut key = NODE_PREFIX.to_vec();
    key.extend_from_slice(id.as_str().as_bytes());
    key
}

fn edge_key(edge: &Edge) -> Result<Vec<u8>, StoreError> {
    let mut key = EDGE_PREFIX.to_vec();
    key.extend(bincode::serialize(edge)?);
    Ok(key)
}

/// Persistent store: a sled database mirrored by an in-memory graph.
///
/// Reads are served from the mirror. Every write lands in sled first, in a
/// single batch per call, so a failed write leaves both sides unchanged.
pub struct SledStore {
    db: Db,
    mirror: MemoryGraph,
}

impl SledStore {
    /// Opens or creates a store at the specified path and loads its contents.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        let mut mirror = MemoryGraph::new();

        for entry in db.scan_prefix(NODE_PREFIX) {
            let (_, bytes) = entry?;
            let node: Node = bincode::deserialize(&bytes)?;
            mirror.upsert_node(node);
        }
        let mut orphaned = 0usize;
        for entry in db.scan_prefix(EDGE_PREFIX) {
            let (key, _) = entry?;
            let edge: Edge = bincode::deserialize(&key[EDGE_PREFIX.len()..])?;
            if mirror.insert_edge(&edge).is_err() {
                orphaned += 1;
            }
        }
        if orphaned > 0 {
            debug!("Skipped {} stored edges with missing endpoints", orphaned);
        }

        Ok(Self { db, mirror })
    }

    /// Removes everything from the store.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.db.clear()?;
        self.db.flush()?;
        self.mirror = MemoryGraph::new();
        Ok(())
    }
}

impl GraphStore for SledStore {
    fn add_node(&mut self, node: Node) -> Result<(), StoreError> {
        self.db.insert(node_key(&node.id), bincode::serialize(&node)?)?;
        self.mirror.upsert_node(node);
        Ok(())
    }

    fn add_edge(&mut self, edge: Edge) -> Result<bool, StoreError> {
        if self.mirror.contains_edge(&edge) {
            return Ok(false);
        }
        if !self.mirror.contains_node(&edge.src) || !self.mirror.contains_node(&edge.dst) {
            return Err(StoreError::DanglingEdge(edge.to_string()));
        }
        self.db.insert(edge_key(&edge)?, Vec::new())?;
        self.mirror.insert_edge(&edge)
    }

    fn commit_file(&mut self, file: &str, nodes: Vec<Node>, edges: Vec<Edge>) -> Result<(), StoreError> {
        self.mirror.check_commit(file, &nodes, &edges)?;

        let mut batch = sled::Batch::default();
        for node in &nodes {
            batch.insert(node_key(&node.id), bincode::serialize(node)?);
        }
        for edge in &edges {
            batch.insert(edge_key(edge)?, Vec::new());
        }
        self.db.apply_batch(batch)?;

        self.mirror.commit_file(file, nodes, edges)
    }

    fn query_nodes<'a>(&'a self, filter: &NodeFilter) -> Box<dyn Iterator<Item = &'a Node> + 'a> {
        self.mirror.query_nodes(filter)
    }

    fn get_node(&self, id: &NodeId) -> Option<&Node> {
        self.mirror.get_node(id)
    }

    fn get_outgoing_edges(&self, id: &NodeId, kinds: &[EdgeKind]) -> Vec<Edge> {
        self.mirror.get_outgoing_edges(id, kinds)
    }

    fn get_incoming_edges(&self, id: &NodeId, kinds: &[EdgeKind]) -> Vec<Edge> {
        self.mirror.get_incoming_edges(id, kinds)
    }

    fn find_by_attr(&self, predicate: &dyn Fn(&Node) -> bool) -> Vec<&Node> {
        self.mirror.find_by_attr(predicate)
    }

    fn delete_nodes_by_file(&mut self, file: &str) -> Result<usize, StoreError> {
        let mut batch = sled::Batch::default();
        for id in self.mirror.node_ids_in_file(file) {
            batch.remove(node_key(&id));
        }
        for edge in self.mirror.edges_touching_file(file) {
            batch.remove(edge_key(&edge)?);
        }
        self.db.apply_batch(batch)?;
        Ok(self.mirror.remove_file(file))
    }

    fn files(&self) -> Vec<String> {
        self.mirror.files()
    }

    fn node_count(&self) -> usize {
        self.mirror.node_count()
    }

    fn edge_count(&self) -> usize {
        self.mirror.edge_count()
    }

    fn all_edges(&self) -> Vec<Edge> {
        self.mirror.all_edges()
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn node(id: &str, kind: NodeKind, name: &str, file: &str) -> Node {
        Node::new(NodeId::new(id), kind, name, file)
    }

    fn commit_a(store: &mut SledStore) {
        store
            .commit_file(
                "a.js",
                vec![
                    node("a.js->global->MODULE->a.js", NodeKind::Module, "a.js", "a.js"),
                    node("a.js->global->FUNCTION->f", NodeKind::Function, "f", "a.js"),
                ],
                vec![Edge::new(
                    EdgeKind::Contains,
                    "a.js->global->MODULE->a.js",
                    "a.js->global->FUNCTION->f",
                )],
            )
            .unwrap();
    }

    #[test]
    fn test_commit_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let mut store = SledStore::open(dir.path()).unwrap();
            commit_a(&mut store);
            store.flush().unwrap();
        }

        let store = SledStore::open(dir.path()).unwrap();
        assert_eq!(store.node_count(), 2);
        assert_eq!(store.edge_count(), 1);
        let f = store.get_node(&NodeId::new("a.js->global->FUNCTION->f")).unwrap();
        assert_eq!(f.name, "f");
    }

    #[test]
    fn test_failed_commit_writes_nothing() {
        let dir = tempdir().unwrap();
        let mut store = SledStore::open(dir.path()).unwrap();
        let result = store.commit_file(
            "b.js",
            vec![node("b.js->global->MODULE->b.js", NodeKind::Module, "b.js", "b.js")],
            vec![Edge::new(EdgeKind::Contains, "b.js->global->MODULE->b.js", "nowhere")],
        );
        assert!(matches!(result, Err(StoreError::DanglingEdge(_))));
        assert_eq!(store.node_count(), 0);
        drop(store);

        let reopened = SledStore::open(dir.path()).unwrap();
        assert_eq!(reopened.node_count(), 0);
    }

    #[test]
    fn test_delete_by_file_is_persisted() {
        let dir = tempdir().unwrap();
        {
            let mut store = SledStore::open(dir.path()).unwrap();
            commit_a(&mut store);
            assert_eq!(store.delete_nodes_by_file("a.js").unwrap(), 2);
            assert_eq!(store.delete_nodes_by_file("a.js").unwrap(), 0);
            store.flush().unwrap();
        }
        let store = SledStore::open(dir.path()).unwrap();
        assert_eq!(store.node_count(), 0);
        assert_eq!(store.edge_count(), 0);
    }

    #[test]
    fn test_duplicate_edge_is_not_rewritten() {
        let dir = tempdir().unwrap();
        let mut store = SledStore::open(dir.path()).unwrap();
        commit_a(&mut store);
        let edge = Edge::new(
            EdgeKind::Contains,
            "a.js->global->MODULE->a.js",
            "a.js->global->FUNCTION->f",
        );
        assert!(!store.add_edge(edge).unwrap());
        assert_eq!(store.edge_count(), 1);
    }

    #[test]
    fn test_filter_matches_all_fields() {
        let n = node("a.js->global->FUNCTION->f", NodeKind::Function, "f", "a.js");
        assert!(NodeFilter::new().matches(&n));
        assert!(NodeFilter::new().kind(NodeKind::Function).name("f").matches(&n));
        assert!(!NodeFilter::new().kind(NodeKind::Function).file("b.js").matches(&n));
    }
}
