//! UnresolvedCallValidator: warns about plain calls that land nowhere.

use crate::context::{IssueSpec, Severity};
use crate::plugins::enrichment::suppressions::is_suppressed;
use crate::plugins::enrichment::{is_external, nodes_of_kinds};
use crate::report::{PluginOutcome, SkipReason};
use sylva_core::{attrs, NodeId, NodeKind};
use sylva_graph::assembler::resolution;
use sylva_graph::{EdgeKind, GraphStore};

pub(crate) const CATEGORY: &str = "unresolved-call";

/// Globals provided by JavaScript engines and common hosts.
const BUILTINS: &[&str] = &[
    "Array", "BigInt", "Boolean", "Date", "Error", "Function", "Number", "Object", "Promise",
    "RegExp", "String", "Symbol", "alert", "atob", "btoa", "cancelAnimationFrame", "clearImmediate",
    "clearInterval", "clearTimeout", "decodeURI", "decodeURIComponent", "encodeURI",
    "encodeURIComponent", "eval", "fetch", "isFinite", "isNaN", "parseFloat", "parseInt",
    "queueMicrotask", "require", "requestAnimationFrame", "setImmediate", "setInterval",
    "setTimeout", "structuredClone",
];

pub(crate) fn check(store: &dyn GraphStore, outcome: &mut PluginOutcome) -> Vec<IssueSpec> {
    let mut issues = Vec::new();
    for call in nodes_of_kinds(store, &[NodeKind::Call]) {
        if !store.get_outgoing_edges(&call.id, &[EdgeKind::Calls]).is_empty() {
            continue;
        }
        let message = match call.attr_str(attrs::RESOLUTION) {
            Some(resolution::UNRESOLVED) => {
                if BUILTINS.contains(&call.name.as_str()) {
                    outcome.skip(SkipReason::External);
                    continue;
                }
                format!("call to undeclared `{}`", call.name)
            }
            Some(resolution::IMPORTED) => {
                let source = call
                    .attr_str(attrs::BINDING)
                    .and_then(|b| store.get_node(&NodeId::new(b)))
                    .and_then(|import| import.attr_str(attrs::SOURCE));
                match source {
                    Some(source) if !is_external(source) => {
                        format!("imported `{}` from '{}' does not resolve to a function", call.name, source)
                    }
                    _ => {
                        outcome.skip(SkipReason::External);
                        continue;
                    }
                }
            }
            _ => {
                outcome.skip(SkipReason::Unsupported);
                continue;
            }
        };
        if is_suppressed(store, &call.id, CATEGORY) {
            outcome.add("suppressed", 1);
            continue;
        }
        issues.push(IssueSpec::at_node(call, CATEGORY, Severity::Warning, message));
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::enrichment::test_support::graph_of;

    #[test]
    fn test_only_unknown_calls_are_reported() {
        let graph = graph_of(&[(
            "a.js",
            "import x from 'pkg';\nfunction known() {}\nknown();\nx();\nsetTimeout(known, 1);\nmystery();\n",
        )]);
        let mut outcome = PluginOutcome::new();
        let issues = check(&graph, &mut outcome);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line, 6);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert!(issues[0].message.contains("mystery"));
        assert_eq!(outcome.skipped(SkipReason::External), 2);
    }
}
