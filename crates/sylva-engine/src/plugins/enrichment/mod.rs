//! Enrichment resolvers.
//!
//! Every resolver is a pure re-derivation over the committed graph: it
//! indexes what it needs, makes one pass over its source records and emits
//! the relationships it can prove. Derivation happens under a read lock and
//! the result is applied under a write lock, so a resolver run twice over
//! the same graph adds nothing the second time.

pub(crate) mod arguments;
pub(crate) mod calls;
pub(crate) mod classes;
pub(crate) mod imports;
pub(crate) mod methods;
pub(crate) mod suppressions;

use crate::context::PluginContext;
use crate::error::Result;
use crate::plugin::PluginKind;
use crate::report::{PluginOutcome, SkipReason};
use std::collections::{BTreeSet, HashSet};
use sylva_core::{attrs, Node, NodeId, NodeKind};
use sylva_graph::{Edge, EdgeKind, GraphStore};
use tracing::debug;

/// Longest chain of bindings followed before giving up.
const MAX_HOPS: usize = 32;

/// What a resolver wants added to the graph.
#[derive(Debug, Default)]
pub(crate) struct Derived {
    pub nodes: Vec<Node>,
    pub edges: BTreeSet<Edge>,
}

impl Derived {
    /// Queues `edge` unless the graph already has it.
    pub fn edge(&mut self, store: &dyn GraphStore, edge: Edge, outcome: &mut PluginOutcome) {
        if has_edge(store, &edge) {
            outcome.skip(SkipReason::AlreadyResolved);
        } else {
            self.edges.insert(edge);
        }
    }
}

pub(crate) async fn run(kind: PluginKind, ctx: &PluginContext) -> Result<PluginOutcome> {
    let mut outcome = PluginOutcome::new();

    let derived = match kind {
        PluginKind::SuppressionIndexer => suppressions::derive(ctx, &mut outcome).await?,
        _ => {
            let store = ctx.store.read().await;
            let store: &dyn GraphStore = store.as_ref();
            match kind {
                PluginKind::ImportExportLinker => imports::derive(store, &mut outcome),
                PluginKind::FunctionCallResolver => calls::derive(store, &mut outcome),
                PluginKind::ClassHierarchyResolver => classes::derive(store, &mut outcome),
                PluginKind::MethodCallResolver => methods::derive(store, &mut outcome),
                PluginKind::ArgumentParameterLinker => arguments::derive(store, &mut outcome),
                _ => Derived::default(),
            }
        }
    };

    apply(ctx, derived, &mut outcome).await?;
    Ok(outcome)
}

async fn apply(ctx: &PluginContext, derived: Derived, outcome: &mut PluginOutcome) -> Result<()> {
    let mut store = ctx.store.write().await;
    let nodes = derived.nodes.len();
    for node in derived.nodes {
        store.add_node(node)?;
    }
    let edges = store.add_edges(derived.edges.into_iter().collect())?;
    outcome.add("nodes_created", nodes);
    outcome.add("edges_created", edges);
    debug!("{}: {} nodes, {} edges", ctx.plugin, nodes, edges);
    Ok(())
}

pub(crate) fn has_edge(store: &dyn GraphStore, edge: &Edge) -> bool {
    store
        .get_outgoing_edges(&edge.src, &[edge.kind])
        .iter()
        .any(|e| e.dst == edge.dst)
}

/// Destinations of `id`'s outgoing edges of one kind.
pub(crate) fn targets(store: &dyn GraphStore, id: &NodeId, kind: EdgeKind) -> Vec<NodeId> {
    store
        .get_outgoing_edges(id, &[kind])
        .into_iter()
        .map(|e| e.dst)
        .collect()
}

pub(crate) fn first_target(store: &dyn GraphStore, id: &NodeId, kind: EdgeKind) -> Option<NodeId> {
    store
        .get_outgoing_edges(id, &[kind])
        .into_iter()
        .next()
        .map(|e| e.dst)
}

/// Bare package specifiers resolve outside the workspace.
pub(crate) fn is_external(source: &str) -> bool {
    !source.starts_with('.') && !source.starts_with('/')
}

/// Nodes of several kinds, in id order.
pub(crate) fn nodes_of_kinds<'a>(store: &'a dyn GraphStore, kinds: &[NodeKind]) -> Vec<&'a Node> {
    let mut nodes: Vec<&Node> = kinds
        .iter()
        .flat_map(|kind| store.query_nodes(&sylva_graph::NodeFilter::new().kind(*kind)))
        .collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));
    nodes
}

/// Chases an import or export binding to the declaration it stands for.
///
/// Returns the declaration node, or the module for namespace bindings.
pub(crate) fn declaration_of(store: &dyn GraphStore, start: &NodeId) -> std::result::Result<NodeId, SkipReason> {
    let mut seen = HashSet::new();
    let mut current = start.clone();
    for _ in 0..MAX_HOPS {
        if !seen.insert(current.clone()) {
            return Err(SkipReason::Unsupported);
        }
        let node = store.get_node(&current).ok_or(SkipReason::TargetNotFound)?;
        match node.kind {
            NodeKind::Import => match first_target(store, &current, EdgeKind::ImportsFrom) {
                Some(next) => current = next,
                None => {
                    let external = node.attr_str(attrs::SOURCE).map_or(false, is_external);
                    return Err(if external {
                        SkipReason::External
                    } else {
                        SkipReason::MissingUpstreamEdge
                    });
                }
            },
            NodeKind::Export => {
                let next = first_target(store, &current, EdgeKind::Exports)
                    .or_else(|| first_target(store, &current, EdgeKind::ImportsFrom));
                match next {
                    Some(next) => current = next,
                    None => {
                        let external = node.attr_str(attrs::SOURCE).map_or(false, is_external);
                        return Err(if external {
                            SkipReason::External
                        } else {
                            SkipReason::MissingUpstreamEdge
                        });
                    }
                }
            }
            _ => return Ok(current),
        }
    }
    Err(SkipReason::Unsupported)
}

/// The single node of `kind` a binding's initializers point at.
///
/// Bindings assigned more than one distinct candidate are ambiguous.
pub(crate) fn assigned_of_kind(
    store: &dyn GraphStore,
    binding: &NodeId,
    accept: impl Fn(NodeKind) -> bool,
) -> std::result::Result<NodeId, SkipReason> {
    let values = targets(store, binding, EdgeKind::AssignedFrom);
    if values.is_empty() {
        return Err(SkipReason::MissingUpstreamEdge);
    }
    let matching: BTreeSet<NodeId> = values
        .into_iter()
        .filter(|v| store.get_node(v).map_or(false, |n| accept(n.kind)))
        .collect();
    match matching.len() {
        0 => Err(SkipReason::WrongKind),
        1 => matching.into_iter().next().ok_or(SkipReason::TargetNotFound),
        _ => Err(SkipReason::Unsupported),
    }
}

/// Reduces a declaration to the function or method a call would run.
pub(crate) fn callable_of(store: &dyn GraphStore, declaration: &NodeId) -> std::result::Result<NodeId, SkipReason> {
    let node = store.get_node(declaration).ok_or(SkipReason::TargetNotFound)?;
    match node.kind {
        NodeKind::Function | NodeKind::Method => Ok(declaration.clone()),
        NodeKind::Variable | NodeKind::Constant => {
            assigned_of_kind(store, declaration, |k| k.is_callable())
        }
        _ => Err(SkipReason::WrongKind),
    }
}

/// Reduces a declaration to a class.
pub(crate) fn class_of(store: &dyn GraphStore, declaration: &NodeId) -> std::result::Result<NodeId, SkipReason> {
    let node = store.get_node(declaration).ok_or(SkipReason::TargetNotFound)?;
    match node.kind {
        NodeKind::Class => Ok(declaration.clone()),
        NodeKind::Variable | NodeKind::Constant => {
            assigned_of_kind(store, declaration, |k| k == NodeKind::Class)
        }
        _ => Err(SkipReason::WrongKind),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use sylva_core::{LocalAnalyzer, SourceLanguage};
    use sylva_graph::{GraphAssembler, GraphStore, MemoryGraph};

    /// Analyzes and commits each `(file, source)` pair into a fresh graph.
    pub fn graph_of(files: &[(&str, &str)]) -> MemoryGraph {
        let mut graph = MemoryGraph::new();
        let mut analyzer = LocalAnalyzer::new();
        for (file, source) in files {
            let language = if file.ends_with(".ts") {
                SourceLanguage::TypeScript
            } else {
                SourceLanguage::JavaScript
            };
            let facts = analyzer.analyze_source(file, source, language).unwrap();
            let (nodes, edges) = GraphAssembler::assemble(&facts, None).buffer.into_parts();
            graph.commit_file(file, nodes, edges).unwrap();
        }
        graph
    }

    /// Applies derived edges, returning how many were new.
    pub fn apply(graph: &mut MemoryGraph, derived: super::Derived) -> usize {
        for node in derived.nodes {
            graph.add_node(node).unwrap();
        }
        graph.add_edges(derived.edges.into_iter().collect()).unwrap()
    }
}
