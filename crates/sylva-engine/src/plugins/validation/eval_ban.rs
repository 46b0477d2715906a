//! EvalBanValidator: flags `eval(...)` and `new Function(...)`.

use crate::context::{IssueSpec, Severity};
use crate::plugins::enrichment::nodes_of_kinds;
use crate::plugins::enrichment::suppressions::is_suppressed;
use crate::report::PluginOutcome;
use sylva_core::{attrs, Node, NodeKind};
use sylva_graph::{EdgeKind, GraphStore};

pub(crate) const CATEGORY: &str = "eval";

/// Receivers through which the global `eval` is reachable.
const GLOBAL_OBJECTS: [&str; 4] = ["window", "globalThis", "self", "global"];

pub(crate) fn check(store: &dyn GraphStore, outcome: &mut PluginOutcome) -> Vec<IssueSpec> {
    let mut issues = Vec::new();
    let sites = nodes_of_kinds(
        store,
        &[NodeKind::Call, NodeKind::MethodCall, NodeKind::ConstructorCall],
    );
    for site in sites {
        let Some(message) = dynamic_code(store, site) else {
            continue;
        };
        if is_suppressed(store, &site.id, CATEGORY) {
            outcome.add("suppressed", 1);
            continue;
        }
        issues.push(
            IssueSpec::at_node(site, CATEGORY, Severity::Error, message)
                .with_context(site.attr_str(attrs::CALLEE).unwrap_or_default()),
        );
    }
    issues
}

/// Describes the site if it runs code built from strings.
fn dynamic_code(store: &dyn GraphStore, site: &Node) -> Option<&'static str> {
    // A user-defined `eval` or `Function` is an ordinary call.
    let bound = !store
        .get_outgoing_edges(&site.id, &[EdgeKind::Calls, EdgeKind::InstanceOf])
        .is_empty()
        || site.attr_str(attrs::BINDING).is_some();
    if bound {
        return None;
    }
    match (site.kind, site.name.as_str()) {
        (NodeKind::Call, "eval") if site.attr_str(attrs::RESOLUTION) != Some("resolved") => {
            Some("eval() executes arbitrary code")
        }
        (NodeKind::MethodCall, "eval")
            if site
                .attr_str(attrs::OBJECT)
                .map_or(false, |o| GLOBAL_OBJECTS.contains(&o)) =>
        {
            Some("eval() executes arbitrary code")
        }
        (NodeKind::ConstructorCall, "Function") | (NodeKind::Call, "Function") => {
            Some("the Function constructor executes arbitrary code")
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::enrichment::test_support::graph_of;

    #[test]
    fn test_eval_and_function_constructor() {
        let graph = graph_of(&[(
            "a.js",
            "eval('1');\nwindow.eval('2');\nconst f = new Function('return 1');\nfunction local() { function eval(x) {} eval(1); }\n",
        )]);
        let mut outcome = PluginOutcome::new();
        let issues = check(&graph, &mut outcome);
        let mut lines: Vec<u32> = issues.iter().map(|i| i.line).collect();
        lines.sort();
        assert_eq!(lines, vec![1, 2, 3]);
        assert!(issues.iter().all(|i| i.severity == Severity::Error && i.category == CATEGORY));
        assert_eq!(issues[0].target.as_ref().map(|t| t.file()), Some("a.js"));
    }
}
