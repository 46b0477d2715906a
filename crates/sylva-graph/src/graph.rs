//! In-memory graph.
//!
//! MemoryGraph wraps a petgraph `StableDiGraph` and adds indexes for id,
//! file, kind and name lookups. Node indices stay valid across removals, so
//! clearing one file never invalidates the indexes of another.

use crate::edge::{Edge, EdgeKind};
use crate::store::{GraphStore, NodeFilter, StoreError};
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use sylva_core::{Node, NodeId, NodeKind};

/// The code graph held in memory.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    graph: StableDiGraph<Node, EdgeKind>,

    /// Maps semantic ids to graph indexes.
    id_index: HashMap<NodeId, NodeIndex>,

    /// Maps declaring files to their nodes (for lifecycle clearing).
    file_index: BTreeMap<String, BTreeSet<NodeIndex>>,

    /// Maps kinds to nodes.
    kind_index: HashMap<NodeKind, BTreeSet<NodeIndex>>,

    /// Maps node names to nodes.
    name_index: HashMap<String, BTreeSet<NodeIndex>>,
}

impl MemoryGraph {
    /// Creates a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a node. Edges of a replaced node are kept.
    pub fn upsert_node(&mut self, node: Node) -> NodeIndex {
        if let Some(&index) = self.id_index.get(&node.id) {
            if let Some(old) = self.graph.node_weight(index).cloned() {
                self.unindex(index, &old);
            }
            self.index(index, &node);
            if let Some(weight) = self.graph.node_weight_mut(index) {
                *weight = node;
            }
            return index;
        }

        let id = node.id.clone();
        let index = self.graph.add_node(node.clone());
        self.index(index, &node);
        self.id_index.insert(id, index);
        index
    }

    /// Adds an edge between two existing nodes.
    ///
    /// Returns `Ok(false)` if the edge already exists.
    pub fn insert_edge(&mut self, edge: &Edge) -> Result<bool, StoreError> {
        let (src, dst) = self.endpoints(edge)?;
        if self.has_edge_between(src, dst, edge.kind) {
            return Ok(false);
        }
        self.graph.add_edge(src, dst, edge.kind);
        Ok(true)
    }

    /// Whether the edge exists.
    pub fn contains_edge(&self, edge: &Edge) -> bool {
        match (self.id_index.get(&edge.src), self.id_index.get(&edge.dst)) {
            (Some(&src), Some(&dst)) => self.has_edge_between(src, dst, edge.kind),
            _ => false,
        }
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.id_index.contains_key(id)
    }

    /// Edges touching any node of `file`, the ones a clear would drop.
    pub fn edges_touching_file(&self, file: &str) -> Vec<Edge> {
        let mut edges = BTreeSet::new();
        for &index in self.file_index.get(file).into_iter().flatten() {
            for direction in [Direction::Outgoing, Direction::Incoming] {
                for edge in self.graph.edges_directed(index, direction) {
                    if let Some(edge) = self.edge_at(edge.id()) {
                        edges.insert(edge);
                    }
                }
            }
        }
        edges.into_iter().collect()
    }

    /// Ids of every node tagged with `file`.
    pub fn node_ids_in_file(&self, file: &str) -> Vec<NodeId> {
        self.file_index
            .get(file)
            .into_iter()
            .flatten()
            .filter_map(|&index| self.graph.node_weight(index))
            .map(|node| node.id.clone())
            .collect()
    }

    /// Removes every node tagged with `file` and every edge touching one.
    ///
    /// Returns the number of nodes removed.
    pub fn remove_file(&mut self, file: &str) -> usize {
        let Some(indexes) = self.file_index.remove(file) else {
            return 0;
        };
        let mut removed = 0;
        for index in indexes {
            if let Some(node) = self.graph.remove_node(index) {
                self.id_index.remove(&node.id);
                if let Some(set) = self.kind_index.get_mut(&node.kind) {
                    set.remove(&index);
                }
                if let Some(set) = self.name_index.get_mut(&node.name) {
                    set.remove(&index);
                    if set.is_empty() {
                        self.name_index.remove(&node.name);
                    }
                }
                removed += 1;
            }
        }
        removed
    }

    /// Checks that every edge of a commit lands on a node that exists either
    /// in the graph or in the same commit.
    pub(crate) fn check_commit(&self, file: &str, nodes: &[Node], edges: &[Edge]) -> Result<(), StoreError> {
        let batch_ids: BTreeSet<&NodeId> = nodes.iter().map(|n| &n.id).collect();
        let known = |id: &NodeId| batch_ids.contains(id) || self.contains_node(id);
        match edges.iter().find(|e| !known(&e.src) || !known(&e.dst)) {
            Some(dangling) => Err(StoreError::DanglingEdge(format!(
                "{} (committing {})",
                dangling, file
            ))),
            None => Ok(()),
        }
    }

    fn endpoints(&self, edge: &Edge) -> Result<(NodeIndex, NodeIndex), StoreError> {
        match (self.id_index.get(&edge.src), self.id_index.get(&edge.dst)) {
            (Some(&src), Some(&dst)) => Ok((src, dst)),
            _ => Err(StoreError::DanglingEdge(edge.to_string())),
        }
    }

    fn has_edge_between(&self, src: NodeIndex, dst: NodeIndex, kind: EdgeKind) -> bool {
        self.graph
            .edges_directed(src, Direction::Outgoing)
            .any(|e| e.target() == dst && *e.weight() == kind)
    }

    fn edge_at(&self, index: EdgeIndex) -> Option<Edge> {
        let (src, dst) = self.graph.edge_endpoints(index)?;
        let kind = *self.graph.edge_weight(index)?;
        let src = self.graph.node_weight(src)?;
        let dst = self.graph.node_weight(dst)?;
        Some(Edge::new(kind, src.id.clone(), dst.id.clone()))
    }

    fn index(&mut self, index: NodeIndex, node: &Node) {
        self.file_index
            .entry(node.file.clone())
            .or_default()
            .insert(index);
        self.kind_index.entry(node.kind).or_default().insert(index);
        self.name_index
            .entry(node.name.clone())
            .or_default()
            .insert(index);
    }

    fn unindex(&mut self, index: NodeIndex, node: &Node) {
        if let Some(set) = self.file_index.get_mut(&node.file) {
            set.remove(&index);
            if set.is_empty() {
                self.file_index.remove(&node.file);
            }
        }
        if let Some(set) = self.kind_index.get_mut(&node.kind) {
            set.remove(&index);
        }
        if let Some(set) = self.name_index.get_mut(&node.name) {
            set.remove(&index);
            if set.is_empty() {
                self.name_index.remove(&node.name);
            }
        }
    }

    fn candidates(&self, filter: &NodeFilter) -> Vec<NodeIndex> {
        let from = |set: Option<&BTreeSet<NodeIndex>>| -> Vec<NodeIndex> {
            set.into_iter().flatten().copied().collect()
        };
        if let Some(file) = &filter.file {
            from(self.file_index.get(file))
        } else if let Some(name) = &filter.name {
            from(self.name_index.get(name))
        } else if let Some(kind) = &filter.kind {
            from(self.kind_index.get(kind))
        } else {
            self.graph.node_indices().collect()
        }
    }

    fn directed_edges(&self, id: &NodeId, kinds: &[EdgeKind], direction: Direction) -> Vec<Edge> {
        let Some(&index) = self.id_index.get(id) else {
            return Vec::new();
        };
        let mut edges: Vec<Edge> = self
            .graph
            .edges_directed(index, direction)
            .filter(|e| kinds.is_empty() || kinds.contains(e.weight()))
            .filter_map(|e| self.edge_at(e.id()))
            .collect();
        edges.sort();
        edges
    }
}

impl GraphStore for MemoryGraph {
    fn add_node(&mut self, node: Node) -> Result<(), StoreError> {
        self.upsert_node(node);
        Ok(())
    }

    fn add_edge(&mut self, edge: Edge) -> Result<bool, StoreError> {
        self.insert_edge(&edge)
    }

    fn commit_file(&mut self, file: &str, nodes: Vec<Node>, edges: Vec<Edge>) -> Result<(), StoreError> {
        self.check_commit(file, &nodes, &edges)?;
        for node in nodes {
            self.upsert_node(node);
        }
        for edge in &edges {
            self.insert_edge(edge)?;
        }
        Ok(())
    }

    fn query_nodes<'a>(&'a self, filter: &NodeFilter) -> Box<dyn Iterator<Item = &'a Node> + 'a> {
        let filter = filter.clone();
        let candidates = self.candidates(&filter);
        Box::new(
            candidates
                .into_iter()
                .filter_map(move |index| self.graph.node_weight(index))
                .filter(move |node| filter.matches(node)),
        )
    }

    fn get_node(&self, id: &NodeId) -> Option<&Node> {
        let index = self.id_index.get(id)?;
        self.graph.node_weight(*index)
    }

    fn get_outgoing_edges(&self, id: &NodeId, kinds: &[EdgeKind]) -> Vec<Edge> {
        self.directed_edges(id, kinds, Direction::Outgoing)
    }

    fn get_incoming_edges(&self, id: &NodeId, kinds: &[EdgeKind]) -> Vec<Edge> {
        self.directed_edges(id, kinds, Direction::Incoming)
    }

    fn find_by_attr(&self, predicate: &dyn Fn(&Node) -> bool) -> Vec<&Node> {
        self.graph.node_weights().filter(|n| predicate(n)).collect()
    }

    fn delete_nodes_by_file(&mut self, file: &str) -> Result<usize, StoreError> {
        Ok(self.remove_file(file))
    }

    fn files(&self) -> Vec<String> {
        self.file_index.keys().cloned().collect()
    }

    fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn all_edges(&self) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.edge_at(e))
            .collect();
        edges.sort();
        edges
    }

    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
