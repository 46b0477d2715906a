//! SuppressionIndexer: `// sylva-ignore <categories>` directives.
//!
//! Comments are not part of the analyzer's facts, so the changed files are
//! parsed again here. A directive covers the statement after it, or the
//! statement it trails on the same line. Covered graph nodes are found by
//! the byte offset of their defining token, which both parses agree on.

use super::Derived;
use crate::context::PluginContext;
use crate::error::{EngineError, Result};
use crate::report::{PluginOutcome, SkipReason};
use std::collections::BTreeMap;
use std::ops::Range;
use sylva_core::id::ROOT_SCOPE;
use sylva_core::{attrs, compute_id, Node, NodeId, NodeKind, Position, SourceLanguage};
use sylva_graph::{Edge, EdgeKind, GraphStore, NodeFilter};
use tracing::{debug, warn};
use tree_sitter::Parser;

pub(crate) const DIRECTIVE: &str = "sylva-ignore";

/// Category that matches every check; also implied by an empty list.
pub(crate) const ALL_CATEGORIES: &str = "all";

/// One parsed directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Directive {
    pub offset: usize,
    pub position: Position,
    pub categories: Vec<String>,
    /// Byte range of the covered syntax node.
    pub target: Option<Range<usize>>,
}

/// Parses the categories out of a comment, if it is a directive.
fn parse_comment(text: &str) -> Option<Vec<String>> {
    let body = text
        .strip_prefix("//")
        .or_else(|| text.strip_prefix("/*").map(|t| t.trim_end_matches("*/")))?
        .trim();
    let rest = body.strip_prefix(DIRECTIVE)?;
    if rest.chars().next().map_or(false, |c| !c.is_whitespace() && c != ':') {
        return None;
    }
    // Anything after `--` is a free-form reason.
    let rest = rest.trim_start_matches(':');
    let rest = rest.split("--").next().unwrap_or_default();
    Some(
        rest.split(|c: char| c == ',' || c.is_whitespace())
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

/// Finds every directive in a source text.
pub(crate) fn directives(source: &str, language: SourceLanguage) -> std::result::Result<Vec<Directive>, String> {
    let mut parser = Parser::new();
    parser
        .set_language(&language.grammar())
        .map_err(|e| format!("failed to set language: {}", e))?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| "tree-sitter returned no tree".to_string())?;

    let mut found = Vec::new();
    let mut stack = vec![tree.root_node()];
    while let Some(node) = stack.pop() {
        if node.kind() == "comment" {
            let text = node.utf8_text(source.as_bytes()).unwrap_or_default();
            if let Some(categories) = parse_comment(text) {
                let point = node.start_position();
                found.push(Directive {
                    offset: node.start_byte(),
                    position: Position::new(point.row as u32 + 1, point.column as u32),
                    categories,
                    target: covered(node).map(|t| t.byte_range()),
                });
            }
            continue;
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            stack.push(child);
        }
    }
    found.sort_by_key(|d| d.offset);
    Ok(found)
}

/// The syntax node a directive comment covers.
fn covered(comment: tree_sitter::Node<'_>) -> Option<tree_sitter::Node<'_>> {
    let row = comment.start_position().row;
    let mut previous = comment.prev_named_sibling();
    while let Some(node) = previous {
        if node.kind() != "comment" {
            break;
        }
        previous = node.prev_named_sibling();
    }
    if let Some(previous) = previous {
        if previous.end_position().row == row {
            return Some(previous);
        }
    }
    let mut next = comment.next_named_sibling();
    while let Some(node) = next {
        if node.kind() != "comment" {
            return Some(node);
        }
        next = node.next_named_sibling();
    }
    None
}

/// Id of the suppression node for a directive at `offset`.
pub(crate) fn suppression_id(file: &str, offset: usize) -> NodeId {
    compute_id(
        file,
        &[ROOT_SCOPE.to_string()],
        NodeKind::Suppression,
        &format!("{}@{}", DIRECTIVE, offset),
    )
}

/// Whether `node` is covered by a suppression for `category`.
pub(crate) fn is_suppressed(store: &dyn GraphStore, node: &NodeId, category: &str) -> bool {
    store
        .get_incoming_edges(node, &[EdgeKind::Suppresses])
        .iter()
        .filter_map(|e| store.get_node(&e.src))
        .any(|suppression| match suppression.attr_list(attrs::CATEGORIES) {
            Some(categories) if !categories.is_empty() => categories
                .iter()
                .any(|c| c == category || c == ALL_CATEGORIES),
            _ => true,
        })
}

pub(crate) async fn derive(ctx: &PluginContext, outcome: &mut PluginOutcome) -> Result<Derived> {
    let mut sources = Vec::new();
    for file in ctx.changed.iter() {
        match tokio::fs::read_to_string(&file.path).await {
            Ok(text) if text.contains(DIRECTIVE) => sources.push((file.relative.clone(), file.language, text)),
            Ok(_) => {}
            Err(e) => {
                warn!("Cannot read {} for suppressions: {}", file.relative, e);
                outcome.add("unreadable", 1);
            }
        }
    }

    let parsed = tokio::task::spawn_blocking(move || {
        sources
            .into_iter()
            .map(|(file, language, text)| {
                let result = directives(&text, language);
                (file, result)
            })
            .collect::<Vec<_>>()
    })
    .await
    .map_err(|e| EngineError::Task(e.to_string()))?;

    let store = ctx.store.read().await;
    let store: &dyn GraphStore = store.as_ref();
    let mut derived = Derived::default();

    for (file, result) in parsed {
        let found = match result {
            Ok(found) => found,
            Err(e) => {
                warn!("Cannot parse {} for suppressions: {}", file, e);
                outcome.skip(SkipReason::Unsupported);
                continue;
            }
        };
        if found.is_empty() {
            continue;
        }

        let mut by_offset: BTreeMap<usize, Vec<NodeId>> = BTreeMap::new();
        for node in store.query_nodes(&NodeFilter::new().file(file.as_str())) {
            if matches!(node.kind, NodeKind::Module | NodeKind::Suppression | NodeKind::Issue) {
                continue;
            }
            if let Some(offset) = node.offset() {
                by_offset.entry(offset).or_default().push(node.id.clone());
            }
        }

        for directive in found {
            let id = suppression_id(&file, directive.offset);
            derived.nodes.push(
                Node::new(id.clone(), NodeKind::Suppression, DIRECTIVE, file.as_str())
                    .with_position(directive.position)
                    .with_attr(attrs::OFFSET, directive.offset)
                    .with_attr(attrs::CATEGORIES, directive.categories.clone()),
            );
            outcome.add("directives", 1);

            let Some(range) = directive.target else {
                outcome.skip(SkipReason::TargetNotFound);
                continue;
            };
            let mut covered = 0;
            for ids in by_offset.range(range).map(|(_, ids)| ids) {
                for target in ids {
                    derived.edge(store, Edge::new(EdgeKind::Suppresses, id.clone(), target.clone()), outcome);
                    covered += 1;
                }
            }
            if covered == 0 {
                outcome.skip(SkipReason::TargetNotFound);
            }
            debug!("{} at {}:{} covers {} nodes", DIRECTIVE, file, directive.position, covered);
        }
    }
    Ok(derived)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_comment() {
        assert_eq!(parse_comment("// sylva-ignore eval"), Some(vec!["eval".to_string()]));
        assert_eq!(
            parse_comment("/* sylva-ignore eval, unresolved-call -- legacy */"),
            Some(vec!["eval".to_string(), "unresolved-call".to_string()])
        );
        assert_eq!(parse_comment("// sylva-ignore"), Some(Vec::new()));
        assert_eq!(parse_comment("// sylva-ignored eval"), None);
        assert_eq!(parse_comment("// just a comment"), None);
    }

    #[test]
    fn test_directive_targets() {
        let source = "\
// sylva-ignore eval
eval('1');
run(); // sylva-ignore unresolved-call
// sylva-ignore
";
        let found = directives(source, SourceLanguage::JavaScript).unwrap();
        assert_eq!(found.len(), 3);

        let leading = &found[0];
        assert_eq!(leading.position, Position::new(1, 0));
        let target = leading.target.clone().unwrap();
        assert_eq!(&source[target], "eval('1');");

        let trailing = &found[1];
        let target = trailing.target.clone().unwrap();
        assert_eq!(&source[target], "run();");

        assert_eq!(found[2].target, None);
    }
}
