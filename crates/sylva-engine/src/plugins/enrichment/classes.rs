//! ClassHierarchyResolver: cross-file `EXTENDS` and `INSTANCE_OF`.

use super::{callable_of, class_of, declaration_of, nodes_of_kinds, Derived};
use crate::report::{PluginOutcome, SkipReason};
use sylva_core::{attrs, NodeId, NodeKind};
use sylva_graph::{Edge, EdgeKind, GraphStore};

pub(crate) fn derive(store: &dyn GraphStore, outcome: &mut PluginOutcome) -> Derived {
    let mut derived = Derived::default();

    for class in nodes_of_kinds(store, &[NodeKind::Class]) {
        if !store.get_outgoing_edges(&class.id, &[EdgeKind::Extends]).is_empty() {
            outcome.skip(SkipReason::AlreadyResolved);
            continue;
        }
        // No superclass, or one that is not an import.
        let Some(binding) = class.attr_str(attrs::SUPERCLASS_BINDING) else {
            outcome.skip(SkipReason::WrongKind);
            continue;
        };
        match declaration_of(store, &NodeId::new(binding)).and_then(|d| class_of(store, &d)) {
            Ok(superclass) => {
                derived.edge(store, Edge::new(EdgeKind::Extends, class.id.clone(), superclass), outcome);
            }
            Err(reason) => outcome.skip(reason),
        }
    }

    for construction in nodes_of_kinds(store, &[NodeKind::ConstructorCall]) {
        let resolved = !store
            .get_outgoing_edges(&construction.id, &[EdgeKind::InstanceOf, EdgeKind::Calls])
            .is_empty();
        if resolved {
            outcome.skip(SkipReason::AlreadyResolved);
            continue;
        }
        let Some(binding) = construction.attr_str(attrs::BINDING) else {
            outcome.skip(SkipReason::WrongKind);
            continue;
        };
        let declaration = match declaration_of(store, &NodeId::new(binding)) {
            Ok(declaration) => declaration,
            Err(reason) => {
                outcome.skip(reason);
                continue;
            }
        };
        // Constructor functions are called rather than instantiated.
        let edge = match class_of(store, &declaration) {
            Ok(class) => Edge::new(EdgeKind::InstanceOf, construction.id.clone(), class),
            Err(_) => match callable_of(store, &declaration) {
                Ok(function) => Edge::new(EdgeKind::Calls, construction.id.clone(), function),
                Err(reason) => {
                    outcome.skip(reason);
                    continue;
                }
            },
        };
        derived.edge(store, edge, outcome);
    }

    derived
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{apply, graph_of};
    use super::super::imports;
    use super::*;
    use sylva_core::NodeId;
    use sylva_graph::NodeFilter;

    #[test]
    fn test_imported_superclass_and_construction() {
        let mut graph = graph_of(&[
            ("shapes.js", "export class Shape {}\nexport function Legacy() {}\n"),
            (
                "circle.js",
                "import { Shape, Legacy } from './shapes';\nclass Circle extends Shape {}\nnew Shape();\nnew Legacy();\n",
            ),
        ]);
        let mut outcome = PluginOutcome::new();
        let derived = imports::derive(&graph, &mut outcome);
        apply(&mut graph, derived);

        let mut outcome = PluginOutcome::new();
        let derived = derive(&graph, &mut outcome);
        assert_eq!(apply(&mut graph, derived), 3);

        let extends = graph.get_outgoing_edges(&NodeId::new("circle.js->global->CLASS->Circle"), &[EdgeKind::Extends]);
        assert_eq!(extends.len(), 1);
        assert_eq!(extends[0].dst.as_str(), "shapes.js->global->CLASS->Shape");

        let constructions: Vec<_> = graph
            .query_nodes(&NodeFilter::new().kind(NodeKind::ConstructorCall))
            .map(|n| n.id.clone())
            .collect();
        let mut kinds: Vec<EdgeKind> = constructions
            .iter()
            .flat_map(|id| graph.get_outgoing_edges(id, &[EdgeKind::InstanceOf, EdgeKind::Calls]))
            .map(|e| e.kind)
            .collect();
        kinds.sort();
        assert_eq!(kinds, vec![EdgeKind::Calls, EdgeKind::InstanceOf]);

        let mut again = PluginOutcome::new();
        let derived = derive(&graph, &mut again);
        assert!(derived.edges.is_empty());
        assert_eq!(again.skipped(SkipReason::AlreadyResolved), 3);
        // `Shape` extends nothing.
        assert_eq!(again.skipped(SkipReason::WrongKind), 1);
    }

    #[test]
    fn test_local_and_unbound_records_are_classified() {
        let graph = graph_of(&[(
            "a.js",
            "class Base {}\nclass Child extends Base {}\nclass Free {}\nnew Child();\nnew Unknown();\n",
        )]);
        let examined = graph
            .query_nodes(&NodeFilter::new())
            .filter(|n| matches!(n.kind, NodeKind::Class | NodeKind::ConstructorCall))
            .count();
        assert_eq!(examined, 5);

        let mut outcome = PluginOutcome::new();
        let derived = derive(&graph, &mut outcome);
        assert!(derived.edges.is_empty());
        assert_eq!(outcome.skipped(SkipReason::AlreadyResolved), 2);
        assert_eq!(outcome.skipped(SkipReason::WrongKind), 3);
        assert_eq!(outcome.total_skipped() + derived.edges.len(), examined);
    }
}
