//! FunctionCallResolver: cross-file `CALLS` through import bindings.

use super::imports::ExportIndex;
use super::{callable_of, declaration_of, nodes_of_kinds, Derived};
use crate::report::{PluginOutcome, SkipReason};
use sylva_core::{attrs, Node, NodeId, NodeKind};
use sylva_graph::assembler::resolution;
use sylva_graph::{Edge, EdgeKind, GraphStore};

pub(crate) fn derive(store: &dyn GraphStore, outcome: &mut PluginOutcome) -> Derived {
    let exports = ExportIndex::build(store);
    let mut derived = Derived::default();

    for call in nodes_of_kinds(store, &[NodeKind::Call, NodeKind::MethodCall]) {
        // Same-file calls are linked by the assembler.
        if !store.get_outgoing_edges(&call.id, &[EdgeKind::Calls]).is_empty() {
            outcome.skip(SkipReason::AlreadyResolved);
            continue;
        }
        let Some(binding) = call.attr_str(attrs::BINDING) else {
            outcome.skip(SkipReason::WrongKind);
            continue;
        };
        let binding = NodeId::new(binding);
        let target = match call.kind {
            NodeKind::Call => resolve_call(store, &binding),
            _ => resolve_namespace_member(store, &exports, call, &binding),
        };
        match target {
            Ok(function) => {
                derived.edge(store, Edge::new(EdgeKind::Calls, call.id.clone(), function), outcome);
            }
            Err(reason) => outcome.skip(reason),
        }
    }

    outcome.add(
        "imported_calls",
        nodes_of_kinds(store, &[NodeKind::Call])
            .iter()
            .filter(|c| c.attr_str(attrs::RESOLUTION) == Some(resolution::IMPORTED))
            .count(),
    );
    derived
}

/// `foo()` where `foo` is imported.
fn resolve_call(store: &dyn GraphStore, binding: &NodeId) -> Result<NodeId, SkipReason> {
    let declaration = declaration_of(store, binding)?;
    callable_of(store, &declaration)
}

/// `ns.foo()` where `ns` is a namespace import.
fn resolve_namespace_member(
    store: &dyn GraphStore,
    exports: &ExportIndex,
    call: &Node,
    binding: &NodeId,
) -> Result<NodeId, SkipReason> {
    let import = store.get_node(binding).ok_or(SkipReason::TargetNotFound)?;
    if import.attr_str(attrs::IMPORT_KIND) != Some("namespace") {
        // Members of imported values belong to the method resolver.
        return Err(SkipReason::WrongKind);
    }
    let module = declaration_of(store, binding)?;
    let module_file = store
        .get_node(&module)
        .filter(|m| m.kind == NodeKind::Module)
        .map(|m| m.file.clone())
        .ok_or(SkipReason::WrongKind)?;
    let export = exports
        .lookup(&module_file, &call.name)
        .ok_or(SkipReason::TargetNotFound)?;
    let declaration = declaration_of(store, &export)?;
    callable_of(store, &declaration)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{apply, graph_of};
    use super::super::imports;
    use super::*;
    use sylva_graph::{MemoryGraph, NodeFilter};

    fn link(graph: &mut MemoryGraph) {
        let mut outcome = PluginOutcome::new();
        let derived = imports::derive(graph, &mut outcome);
        apply(graph, derived);
    }

    fn calls_from(graph: &MemoryGraph, file: &str, kind: NodeKind) -> Vec<String> {
        let mut targets = Vec::new();
        for call in graph.query_nodes(&NodeFilter::new().kind(kind).file(file)) {
            for edge in graph.get_outgoing_edges(&call.id, &[EdgeKind::Calls]) {
                targets.push(edge.dst.to_string());
            }
        }
        targets.sort();
        targets
    }

    #[test]
    fn test_imported_call_lands_on_the_exporting_function() {
        let mut graph = graph_of(&[
            ("a.js", "export function foo() {}\n"),
            ("c.js", "export function foo() {}\n"),
            ("b.js", "import { foo } from './a';\nfoo();\n"),
        ]);
        link(&mut graph);

        let mut outcome = PluginOutcome::new();
        let derived = derive(&graph, &mut outcome);
        assert_eq!(apply(&mut graph, derived), 1);
        assert_eq!(
            calls_from(&graph, "b.js", NodeKind::Call),
            vec!["a.js->global->FUNCTION->foo".to_string()]
        );

        let mut again = PluginOutcome::new();
        let derived = derive(&graph, &mut again);
        assert_eq!(apply(&mut graph, derived), 0);
        assert_eq!(again.skipped(SkipReason::AlreadyResolved), 1);
    }

    #[test]
    fn test_arrow_exports_and_re_exports() {
        let mut graph = graph_of(&[
            ("util.js", "export const twice = (x) => x * 2;\n"),
            ("index.js", "export { twice as double } from './util';\n"),
            ("main.js", "import { double } from './index';\ndouble(2);\n"),
        ]);
        link(&mut graph);

        let mut outcome = PluginOutcome::new();
        let derived = derive(&graph, &mut outcome);
        apply(&mut graph, derived);
        let targets = calls_from(&graph, "main.js", NodeKind::Call);
        assert_eq!(targets.len(), 1);
        assert!(targets[0].starts_with("util.js->global->FUNCTION->"));
    }

    #[test]
    fn test_namespace_member_call() {
        let mut graph = graph_of(&[
            ("math.js", "export function add(a, b) { return a + b; }\n"),
            ("main.js", "import * as math from './math';\nmath.add(1, 2);\n"),
        ]);
        link(&mut graph);

        let mut outcome = PluginOutcome::new();
        let derived = derive(&graph, &mut outcome);
        apply(&mut graph, derived);
        assert_eq!(
            calls_from(&graph, "main.js", NodeKind::MethodCall),
            vec!["math.js->global->FUNCTION->add".to_string()]
        );
    }

    #[test]
    fn test_external_and_missing_bindings_are_classified() {
        let mut graph = graph_of(&[(
            "main.js",
            "import lodash from 'lodash';\nimport { gone } from './missing';\nlodash();\ngone();\n",
        )]);
        link(&mut graph);

        let mut outcome = PluginOutcome::new();
        let derived = derive(&graph, &mut outcome);
        assert!(derived.edges.is_empty());
        assert_eq!(outcome.skipped(SkipReason::External), 1);
        assert_eq!(outcome.skipped(SkipReason::MissingUpstreamEdge), 1);
        assert_eq!(outcome.count("imported_calls"), 2);
    }

    #[test]
    fn test_every_call_is_linked_or_classified() {
        let mut graph = graph_of(&[
            ("a.js", "export function g() {}
"),
            (
                "b.js",
                "import { g } from './a';\nfunction f() {}\nf();\nf();\nmystery();\ng();\nthis.run();\n",
            ),
        ]);
        link(&mut graph);

        let examined = graph
            .query_nodes(&NodeFilter::new().file("b.js"))
            .filter(|n| matches!(n.kind, NodeKind::Call | NodeKind::MethodCall))
            .count();
        assert_eq!(examined, 5);

        let mut outcome = PluginOutcome::new();
        let derived = derive(&graph, &mut outcome);
        assert_eq!(derived.edges.len(), 1);
        assert_eq!(outcome.skipped(SkipReason::AlreadyResolved), 2);
        assert_eq!(outcome.skipped(SkipReason::WrongKind), 2);
        assert_eq!(outcome.total_skipped() + derived.edges.len(), examined);
    }
}
