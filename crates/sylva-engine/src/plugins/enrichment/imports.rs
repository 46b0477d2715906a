//! ImportExportLinker: module-to-module `IMPORTS` and binding-level
//! `IMPORTS_FROM` edges.

use super::{is_external, nodes_of_kinds, Derived};
use crate::report::{PluginOutcome, SkipReason};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use sylva_core::{attrs, module_id, NodeId, NodeKind};
use sylva_graph::{Edge, EdgeKind, GraphStore, NodeFilter};

/// Extensions tried, in order, when a specifier omits one.
const RESOLVE_EXTENSIONS: [&str; 8] = [".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs", ".mts", ".cts"];

/// Exports of every committed module, plus module path resolution.
pub(crate) struct ExportIndex {
    files: BTreeSet<String>,
    by_module: HashMap<String, BTreeMap<String, NodeId>>,
    /// `export * from` sources per module.
    star_sources: HashMap<String, Vec<String>>,
}

impl ExportIndex {
    pub fn build(store: &dyn GraphStore) -> Self {
        let files = store
            .query_nodes(&NodeFilter::new().kind(NodeKind::Module))
            .map(|m| m.file.clone())
            .collect();

        let mut by_module: HashMap<String, BTreeMap<String, NodeId>> = HashMap::new();
        let mut star_sources: HashMap<String, Vec<String>> = HashMap::new();
        for export in nodes_of_kinds(store, &[NodeKind::Export]) {
            if export.attr_str(attrs::EXPORT_KIND) == Some("re_export_all") {
                if let Some(source) = export.attr_str(attrs::SOURCE) {
                    star_sources
                        .entry(export.file.clone())
                        .or_default()
                        .push(source.to_string());
                }
                continue;
            }
            let name = export.attr_str(attrs::EXPORTED).unwrap_or(&export.name);
            by_module
                .entry(export.file.clone())
                .or_default()
                .entry(name.to_string())
                .or_insert_with(|| export.id.clone());
        }
        Self {
            files,
            by_module,
            star_sources,
        }
    }

    /// Resolves a relative specifier written in `from` to a committed file.
    pub fn resolve_module(&self, from: &str, source: &str) -> Option<String> {
        if is_external(source) {
            return None;
        }
        let base = join(from, source)?;

        if self.files.contains(&base) {
            return Some(base);
        }
        for ext in RESOLVE_EXTENSIONS {
            let candidate = format!("{}{}", base, ext);
            if self.files.contains(&candidate) {
                return Some(candidate);
            }
        }
        // TypeScript sources are imported by their emitted `.js` name.
        if let Some(stem) = base.strip_suffix(".js") {
            for ext in [".ts", ".tsx"] {
                let candidate = format!("{}{}", stem, ext);
                if self.files.contains(&candidate) {
                    return Some(candidate);
                }
            }
        }
        for ext in RESOLVE_EXTENSIONS {
            let candidate = format!("{}/index{}", base, ext);
            if self.files.contains(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    /// Finds the export named `name` in `file`, following `export *`.
    pub fn lookup(&self, file: &str, name: &str) -> Option<NodeId> {
        let mut seen = HashSet::new();
        self.lookup_inner(file, name, &mut seen)
    }

    fn lookup_inner(&self, file: &str, name: &str, seen: &mut HashSet<String>) -> Option<NodeId> {
        if !seen.insert(file.to_string()) {
            return None;
        }
        if let Some(id) = self.by_module.get(file).and_then(|exports| exports.get(name)) {
            return Some(id.clone());
        }
        // `export *` never forwards the default export.
        if name == "default" {
            return None;
        }
        for source in self.star_sources.get(file).into_iter().flatten() {
            if let Some(target) = self.resolve_module(file, source) {
                if let Some(found) = self.lookup_inner(&target, name, seen) {
                    return Some(found);
                }
            }
        }
        None
    }
}

/// Joins a relative specifier onto the directory of `from`.
fn join(from: &str, source: &str) -> Option<String> {
    let mut parts: Vec<&str> = if source.starts_with('/') {
        Vec::new()
    } else {
        let mut dir: Vec<&str> = from.split('/').collect();
        dir.pop();
        dir
    };
    for segment in source.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

pub(crate) fn derive(store: &dyn GraphStore, outcome: &mut PluginOutcome) -> Derived {
    let index = ExportIndex::build(store);
    let mut derived = Derived::default();
    let mut linked: HashSet<(String, String)> = HashSet::new();
    let mut link_modules = |derived: &mut Derived, outcome: &mut PluginOutcome, from: &str, to: &str| {
        if linked.insert((from.to_string(), to.to_string())) {
            derived.edge(store, Edge::new(EdgeKind::Imports, module_id(from), module_id(to)), outcome);
        }
    };

    for import in nodes_of_kinds(store, &[NodeKind::Import]) {
        let source = import.attr_str(attrs::SOURCE).unwrap_or_default();
        let Some(target) = index.resolve_module(&import.file, source) else {
            outcome.skip(if is_external(source) {
                SkipReason::External
            } else {
                SkipReason::TargetNotFound
            });
            continue;
        };
        link_modules(&mut derived, outcome, &import.file, &target);

        match import.attr_str(attrs::IMPORT_KIND) {
            Some("side_effect") => {}
            Some("namespace") => derived.edge(
                store,
                Edge::new(EdgeKind::ImportsFrom, import.id.clone(), module_id(&target)),
                outcome,
            ),
            _ => {
                let name = import.attr_str(attrs::IMPORTED).unwrap_or("default");
                match index.lookup(&target, name) {
                    Some(export) => derived.edge(
                        store,
                        Edge::new(EdgeKind::ImportsFrom, import.id.clone(), export),
                        outcome,
                    ),
                    None => outcome.skip(SkipReason::TargetNotFound),
                }
            }
        }
    }

    for export in nodes_of_kinds(store, &[NodeKind::Export]) {
        let kind = export.attr_str(attrs::EXPORT_KIND);
        if !matches!(kind, Some("re_export") | Some("re_export_all")) {
            // Local exports are linked by the assembler.
            outcome.skip(SkipReason::WrongKind);
            continue;
        }
        let source = export.attr_str(attrs::SOURCE).unwrap_or_default();
        let Some(target) = index.resolve_module(&export.file, source) else {
            outcome.skip(if is_external(source) {
                SkipReason::External
            } else {
                SkipReason::TargetNotFound
            });
            continue;
        };
        link_modules(&mut derived, outcome, &export.file, &target);

        let imported = export.attr_str(attrs::IMPORTED).unwrap_or("*");
        if kind == Some("re_export_all") || imported == "*" {
            derived.edge(
                store,
                Edge::new(EdgeKind::ImportsFrom, export.id.clone(), module_id(&target)),
                outcome,
            );
            continue;
        }
        match index.lookup(&target, imported) {
            Some(found) if found != export.id => derived.edge(
                store,
                Edge::new(EdgeKind::ImportsFrom, export.id.clone(), found),
                outcome,
            ),
            _ => outcome.skip(SkipReason::TargetNotFound),
        }
    }

    derived
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{apply, graph_of};
    use super::*;

    #[test]
    fn test_join_specifiers() {
        assert_eq!(join("src/b.js", "./a").as_deref(), Some("src/a"));
        assert_eq!(join("src/deep/b.js", "../a").as_deref(), Some("src/a"));
        assert_eq!(join("b.js", "../../a"), None);
    }

    #[test]
    fn test_named_default_and_namespace_imports() {
        let mut graph = graph_of(&[
            ("src/a.js", "export function foo() {}\nexport default function main() {}\n"),
            (
                "src/b.js",
                "import main, { foo } from './a';\nimport * as ns from './a.js';\nimport React from 'react';\n",
            ),
        ]);
        let mut outcome = PluginOutcome::new();
        let derived = derive(&graph, &mut outcome);
        let added = apply(&mut graph, derived);
        // IMPORTS b -> a, plus three IMPORTS_FROM.
        assert_eq!(added, 4);
        assert_eq!(outcome.skipped(SkipReason::External), 1);

        let foo_import = graph
            .query_nodes(&NodeFilter::new().kind(NodeKind::Import).name("foo"))
            .next()
            .unwrap()
            .id
            .clone();
        let target = graph.get_outgoing_edges(&foo_import, &[EdgeKind::ImportsFrom]);
        assert_eq!(target.len(), 1);
        assert_eq!(target[0].dst.as_str(), "src/a.js->global->EXPORT->foo");

        let ns_import = graph
            .query_nodes(&NodeFilter::new().kind(NodeKind::Import).name("ns"))
            .next()
            .unwrap()
            .id
            .clone();
        let target = graph.get_outgoing_edges(&ns_import, &[EdgeKind::ImportsFrom]);
        assert_eq!(target[0].dst, module_id("src/a.js"));

        // Second pass over the same graph adds nothing.
        let mut again = PluginOutcome::new();
        let derived = derive(&graph, &mut again);
        assert_eq!(apply(&mut graph, derived), 0);
        assert_eq!(again.skipped(SkipReason::AlreadyResolved), 4);
    }

    #[test]
    fn test_re_export_chains_and_index_files() {
        let mut graph = graph_of(&[
            ("lib/impl.js", "export function helper() {}\n"),
            ("lib/index.js", "export * from './impl';\n"),
            ("app.js", "import { helper } from './lib';\n"),
        ]);
        let mut outcome = PluginOutcome::new();
        let derived = derive(&graph, &mut outcome);
        apply(&mut graph, derived);

        let import = graph
            .query_nodes(&NodeFilter::new().kind(NodeKind::Import).file("app.js"))
            .next()
            .unwrap()
            .id
            .clone();
        let target = graph.get_outgoing_edges(&import, &[EdgeKind::ImportsFrom]);
        assert_eq!(target[0].dst.as_str(), "lib/impl.js->global->EXPORT->helper");
        assert_eq!(outcome.skipped(SkipReason::TargetNotFound), 0);
    }

    #[test]
    fn test_local_exports_are_classified() {
        let graph = graph_of(&[
            ("other.js", "export function o() {}\n"),
            (
                "main.js",
                "export function a() {}\nexport { a as c };\nexport * from './other';\nexport { o as p } from './other';\n",
            ),
        ]);
        let examined = graph.query_nodes(&NodeFilter::new().kind(NodeKind::Export)).count();
        assert_eq!(examined, 5);

        let mut outcome = PluginOutcome::new();
        let derived = derive(&graph, &mut outcome);
        let linked = derived
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::ImportsFrom)
            .count();
        assert_eq!(linked, 2);
        assert_eq!(outcome.skipped(SkipReason::WrongKind), 3);
        assert_eq!(outcome.total_skipped() + linked, examined);
    }
}
