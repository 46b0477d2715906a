//! MethodCallResolver: `this.m()`, `super.m()` and `instance.m()`.
//!
//! The receiver is reduced to a class (through `ASSIGNED_FROM` and
//! `INSTANCE_OF`), then the method is looked up on that class and its
//! ancestors along `EXTENDS`.

use super::{assigned_of_kind, class_of, declaration_of, first_target, has_edge, nodes_of_kinds, Derived};
use crate::report::{PluginOutcome, SkipReason};
use std::collections::{HashMap, HashSet};
use sylva_core::{attrs, Node, NodeId, NodeKind};
use sylva_graph::{Edge, EdgeKind, GraphStore};

/// Methods by (class, name).
struct MethodIndex {
    methods: HashMap<(NodeId, String), NodeId>,
}

impl MethodIndex {
    fn build(store: &dyn GraphStore) -> Self {
        let mut methods = HashMap::new();
        for class in nodes_of_kinds(store, &[NodeKind::Class]) {
            for edge in store.get_outgoing_edges(&class.id, &[EdgeKind::Contains]) {
                let Some(method) = store.get_node(&edge.dst) else {
                    continue;
                };
                if method.kind != NodeKind::Method {
                    continue;
                }
                let key = (class.id.clone(), method.name.clone());
                // Plain methods win over accessors of the same name.
                let plain = method.attr_str(attrs::METHOD_KIND) == Some("method");
                if plain {
                    methods.insert(key, method.id.clone());
                } else {
                    methods.entry(key).or_insert_with(|| method.id.clone());
                }
            }
        }
        Self { methods }
    }

    /// Looks `name` up on `class`, then on its ancestors.
    fn find(&self, store: &dyn GraphStore, class: &NodeId, name: &str) -> Result<NodeId, SkipReason> {
        let mut seen = HashSet::new();
        let mut current = Some(class.clone());
        while let Some(class) = current {
            if !seen.insert(class.clone()) {
                return Err(SkipReason::Unsupported);
            }
            if let Some(method) = self.methods.get(&(class.clone(), name.to_string())) {
                return Ok(method.clone());
            }
            current = first_target(store, &class, EdgeKind::Extends);
        }
        Err(SkipReason::TargetNotFound)
    }
}

pub(crate) fn derive(store: &dyn GraphStore, outcome: &mut PluginOutcome) -> Derived {
    let index = MethodIndex::build(store);
    let mut derived = Derived::default();

    for call in nodes_of_kinds(store, &[NodeKind::MethodCall]) {
        if !store.get_outgoing_edges(&call.id, &[EdgeKind::Calls]).is_empty() {
            outcome.skip(SkipReason::AlreadyResolved);
            continue;
        }
        match receiver_class(store, call).and_then(|class| index.find(store, &class, &call.name)) {
            Ok(method) => {
                let edge = Edge::new(EdgeKind::Calls, call.id.clone(), method);
                if !has_edge(store, &edge) {
                    derived.edges.insert(edge);
                    outcome.add("resolved", 1);
                }
            }
            Err(reason) => outcome.skip(reason),
        }
    }
    derived
}

/// The class whose method a member call invokes.
fn receiver_class(store: &dyn GraphStore, call: &Node) -> Result<NodeId, SkipReason> {
    match call.attr_str(attrs::OBJECT) {
        Some("this") => {
            let class = call.attr_str(attrs::ENCLOSING_CLASS).ok_or(SkipReason::Unsupported)?;
            Ok(NodeId::new(class))
        }
        Some("super") => {
            let class = call.attr_str(attrs::ENCLOSING_CLASS).ok_or(SkipReason::Unsupported)?;
            first_target(store, &NodeId::new(class), EdgeKind::Extends).ok_or(SkipReason::MissingUpstreamEdge)
        }
        _ => {
            let receiver = call.attr_str(attrs::RECEIVER).ok_or(SkipReason::Unsupported)?;
            instance_class(store, &NodeId::new(receiver))
        }
    }
}

/// Reduces a receiver value to the class it is an instance of.
fn instance_class(store: &dyn GraphStore, receiver: &NodeId) -> Result<NodeId, SkipReason> {
    let node = store.get_node(receiver).ok_or(SkipReason::TargetNotFound)?;
    match node.kind {
        NodeKind::ConstructorCall => {
            first_target(store, receiver, EdgeKind::InstanceOf).ok_or(SkipReason::MissingUpstreamEdge)
        }
        // Static call on the class itself.
        NodeKind::Class => Ok(receiver.clone()),
        NodeKind::Variable | NodeKind::Constant | NodeKind::Parameter => {
            let construction = assigned_of_kind(store, receiver, |k| k == NodeKind::ConstructorCall)?;
            first_target(store, &construction, EdgeKind::InstanceOf).ok_or(SkipReason::MissingUpstreamEdge)
        }
        NodeKind::Import => {
            if node.attr_str(attrs::IMPORT_KIND) == Some("namespace") {
                return Err(SkipReason::WrongKind);
            }
            let declaration = declaration_of(store, receiver)?;
            match store.get_node(&declaration).map(|n| n.kind) {
                Some(NodeKind::Class) => class_of(store, &declaration),
                _ => instance_class(store, &declaration),
            }
        }
        _ => Err(SkipReason::WrongKind),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{apply, graph_of};
    use super::*;
    use sylva_graph::{MemoryGraph, NodeFilter};

    fn call_targets(graph: &MemoryGraph, name: &str) -> Vec<String> {
        let mut targets: Vec<String> = graph
            .query_nodes(&NodeFilter::new().kind(NodeKind::MethodCall).name(name))
            .flat_map(|c| graph.get_outgoing_edges(&c.id, &[EdgeKind::Calls]))
            .map(|e| e.dst.to_string())
            .collect();
        targets.sort();
        targets
    }

    #[test]
    fn test_this_super_and_instance_calls() {
        let source = "\
class Base {
  greet() { return 1; }
  helper() {}
}
class Child extends Base {
  greet() { this.helper(); return super.greet(); }
}
const c = new Child();
c.greet();
Child.create();
";
        let mut graph = graph_of(&[("a.js", source)]);
        let mut outcome = PluginOutcome::new();
        let derived = derive(&graph, &mut outcome);
        apply(&mut graph, derived);

        assert_eq!(
            call_targets(&graph, "helper"),
            vec!["a.js->global->Base->METHOD->helper".to_string()]
        );
        assert_eq!(
            call_targets(&graph, "greet"),
            vec![
                "a.js->global->Base->METHOD->greet".to_string(),
                "a.js->global->Child->METHOD->greet".to_string(),
            ]
        );
        // `Child.create` has no such method.
        assert_eq!(outcome.skipped(SkipReason::TargetNotFound), 1);
        assert_eq!(outcome.count("resolved"), 3);

        let mut again = PluginOutcome::new();
        let derived = derive(&graph, &mut again);
        assert!(derived.edges.is_empty());
        assert_eq!(again.skipped(SkipReason::AlreadyResolved), 3);
    }
}
