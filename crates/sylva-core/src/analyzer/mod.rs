//! LocalAnalyzer: one syntax-tree traversal per file.
//!
//! The analyzer turns a JavaScript or TypeScript file into a [`FileFacts`]
//! bundle. It never touches the graph store and never looks outside the
//! file: everything it cannot resolve locally stays a [`ValueRef`] for the
//! assembler and the enrichment plugins.
//!
//! [`ValueRef`]: crate::facts::ValueRef

mod context;
mod declarations;
mod expressions;
mod modules;
mod statements;

pub use context::MAX_NESTING;
pub use declarations::BODY_SCOPE;

use crate::error::{AnalyzeError, Result};
use crate::facts::{FileFacts, ModuleFact};
use crate::language::SourceLanguage;
use crate::node::NodeKind;
use crate::scope::ScopeTracker;
use context::{named_children, AnalysisContext};
use std::fs;
use std::path::Path;
use tracing::debug;
use tree_sitter::{Node, Parser};

/// Syntax-tree visitor producing fact bundles.
///
/// Holds a reusable tree-sitter parser; create one per worker thread.
pub struct LocalAnalyzer {
    parser: Parser,
}

impl Default for LocalAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalAnalyzer {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
        }
    }

    /// Reads and analyzes a file. `file` is the workspace-relative tag the
    /// facts are recorded under.
    pub fn analyze_file(&mut self, path: &Path, file: &str) -> Result<FileFacts> {
        let language = SourceLanguage::from_path(path)
            .ok_or_else(|| AnalyzeError::UnsupportedLanguage(path.to_path_buf()))?;
        let source = fs::read_to_string(path).map_err(|e| AnalyzeError::io(path, e))?;
        self.analyze_source(file, &source, language)
    }

    /// Analyzes in-memory source text.
    pub fn analyze_source(
        &mut self,
        file: &str,
        source: &str,
        language: SourceLanguage,
    ) -> Result<FileFacts> {
        self.parser
            .set_language(&language.grammar())
            .map_err(|e| AnalyzeError::Parser(format!("failed to set language: {}", e)))?;
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| AnalyzeError::Parser("tree-sitter returned no tree".into()))?;

        let root = tree.root_node();
        if root.has_error() {
            let at = first_error(root).unwrap_or(root);
            let point = at.start_position();
            return Err(AnalyzeError::Syntax {
                file: file.to_string(),
                line: point.row as u32 + 1,
                column: point.column as u32,
            });
        }

        let tracker = ScopeTracker::new(file);
        let module = ModuleFact {
            id: tracker.compute_id(NodeKind::Module, file),
            name: file.to_string(),
            language,
            lines: source.lines().count() as u32,
        };
        let mut ctx = AnalysisContext::new(source, tracker, FileFacts::new(module, file));
        for statement in named_children(root) {
            ctx.visit(statement);
        }

        if ctx.exceeded_nesting() {
            return Err(AnalyzeError::TooDeep {
                file: file.to_string(),
                limit: MAX_NESTING,
            });
        }

        let facts = ctx.into_facts();
        debug!(
            "Analyzed {}: {} functions, {} calls, {} expressions",
            file,
            facts.functions.len(),
            facts.calls.len() + facts.constructions.len(),
            facts.expressions.len()
        );
        Ok(facts)
    }
}

/// Leftmost `ERROR` or missing node.
fn first_error(root: Node<'_>) -> Option<Node<'_>> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        let mut cursor = node.walk();
        let children: Vec<_> = node
            .children(&mut cursor)
            .filter(|child| child.has_error() || child.is_missing())
            .collect();
        // Reversed so the leftmost child is popped first.
        stack.extend(children.into_iter().rev());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{ExportKind, ExpressionShape, ImportKind, ScopeKind, ValueRef, YieldKind};

    fn analyze(source: &str) -> FileFacts {
        analyze_as("src/a.js", source, SourceLanguage::JavaScript)
    }

    fn analyze_as(file: &str, source: &str, language: SourceLanguage) -> FileFacts {
        LocalAnalyzer::new()
            .analyze_source(file, source, language)
            .unwrap()
    }

    #[test]
    fn test_parameters_sit_at_binding_identifiers() {
        let facts = analyze("function f(a, { b, c: renamed }, ...rest) {}\n");
        let names: Vec<_> = facts.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "renamed", "rest"]);

        let renamed = &facts.parameters[2];
        assert_eq!(renamed.position.line, 1);
        assert_eq!(renamed.position.column, 22);
        assert_eq!(renamed.index, 1);
        assert!(renamed.destructured);
        assert!(facts.parameters[3].rest);
        assert_eq!(facts.parameters[3].index, 2);
    }

    #[test]
    fn test_anonymous_functions_numbered_in_traversal_order() {
        let facts = analyze("[() => 1, () => 2].forEach(f => f());\n");
        let ids: Vec<_> = facts.functions.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "src/a.js->global->FUNCTION->anonymous[0]",
                "src/a.js->global->FUNCTION->anonymous[1]",
                "src/a.js->global->FUNCTION->anonymous[2]",
            ]
        );
        assert!(facts.functions.iter().all(|f| f.anonymous && f.is_arrow));
    }

    #[test]
    fn test_binary_return_derives_from_operands() {
        let facts = analyze("function add(a, b) { return a + b; }\n");
        assert_eq!(facts.returns.len(), 1);
        let ret = &facts.returns[0];
        assert_eq!(ret.function.as_str(), "src/a.js->global->FUNCTION->add");

        let expression = &facts.expressions[0];
        assert_eq!(expression.shape, ExpressionShape::Binary);
        assert_eq!(ret.value.node_id(), Some(&expression.id));
        let operands: Vec<_> = expression
            .operands
            .iter()
            .filter_map(ValueRef::identifier_name)
            .collect();
        assert_eq!(operands, vec!["a", "b"]);
    }

    #[test]
    fn test_literal_return_has_no_expression() {
        let facts = analyze("function answer() { return 42; }\n");
        assert!(facts.expressions.is_empty());
        assert_eq!(facts.literals.len(), 1);
        assert_eq!(facts.returns[0].value.node_id(), Some(&facts.literals[0].id));
    }

    #[test]
    fn test_literal_operands_produce_no_reference() {
        let facts = analyze("const x = y * 2;\n");
        assert_eq!(facts.expressions.len(), 1);
        assert_eq!(facts.expressions[0].operands.len(), 1);
        assert!(facts.literals.is_empty());
    }

    #[test]
    fn test_nested_compound_operands_are_materialized() {
        let facts = analyze("const x = (a + b) * c;\n");
        assert_eq!(facts.expressions.len(), 2);
        let init = facts.variables[0].init.as_ref().and_then(ValueRef::node_id).unwrap();
        let outer = facts.expressions.iter().find(|e| &e.id == init).unwrap();
        let inner = facts.expressions.iter().find(|e| &e.id != init).unwrap();
        assert_eq!(outer.id.as_str(), "src/a.js->global->EXPRESSION->BinaryExpression[0]");
        assert_eq!(outer.operands.len(), 2);
        assert_eq!(outer.operands[0].node_id(), Some(&inner.id));
        assert_eq!(inner.operands.len(), 2);
    }

    #[test]
    fn test_implicit_arrow_return_attributed_to_arrow() {
        let facts = analyze("function outer() { return items.map(x => x.id); }\n");
        let arrow = facts.functions.iter().find(|f| f.is_arrow).unwrap();
        let implicit: Vec<_> = facts.returns.iter().filter(|r| r.implicit).collect();
        assert_eq!(implicit.len(), 1);
        assert_eq!(implicit[0].function, arrow.id);

        let explicit: Vec<_> = facts.returns.iter().filter(|r| !r.implicit).collect();
        assert_eq!(explicit[0].function.as_str(), "src/a.js->global->FUNCTION->outer");
    }

    #[test]
    fn test_yield_delegate_is_distinct() {
        let facts = analyze("function* g() { yield 1; yield* other(); }\n");
        assert!(facts.functions[0].is_generator);
        let kinds: Vec<_> = facts.yields.iter().map(|y| y.kind).collect();
        assert_eq!(kinds, vec![YieldKind::Yield, YieldKind::Delegate]);
    }

    #[test]
    fn test_var_is_hoisted_and_let_is_block_scoped() {
        let facts = analyze("function f() { if (ok) { var v = 1; let l = 2; } }\n");
        let v = facts.variables.iter().find(|v| v.name == "v").unwrap();
        let l = facts.variables.iter().find(|v| v.name == "l").unwrap();
        assert_eq!(v.id.as_str(), "src/a.js->global->f->VARIABLE->v");
        assert_eq!(v.container.as_str(), "src/a.js->global->f->SCOPE->body");
        assert_eq!(l.id.as_str(), "src/a.js->global->f->if[0]->VARIABLE->l");
        assert_eq!(l.container.as_str(), "src/a.js->global->f->SCOPE->if[0]");
    }

    #[test]
    fn test_control_flow_scopes() {
        let facts = analyze(
            "function f(xs) {\n  for (const x of xs) { use(x); }\n  try { a(); } catch (e) { b(e); } finally { c(); }\n  while (go()) {}\n}\n",
        );
        let kinds: Vec<_> = facts.scopes.iter().map(|s| (s.name.as_str(), s.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("body", ScopeKind::FunctionBody),
                ("for-of[0]", ScopeKind::Loop),
                ("try[0]", ScopeKind::Try),
                ("catch[0]", ScopeKind::Catch),
                ("finally[0]", ScopeKind::Finally),
                ("while[0]", ScopeKind::Loop),
            ]
        );
        let e = facts.variables.iter().find(|v| v.name == "e").unwrap();
        assert_eq!(e.id.as_str(), "src/a.js->global->f->catch[0]->VARIABLE->e");
        let while_scope = facts.scopes.iter().find(|s| s.name == "while[0]").unwrap();
        assert!(while_scope.condition.is_some());
    }

    #[test]
    fn test_repeated_calls_get_discriminators() {
        let facts = analyze("foo(); foo(); obj.bar(1, x);\n");
        let ids: Vec<_> = facts.calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "src/a.js->global->CALL->foo",
                "src/a.js->global->CALL->foo#1",
                "src/a.js->global->METHOD_CALL->bar",
            ]
        );
        let bar = &facts.calls[2];
        assert_eq!(bar.object.as_deref(), Some("obj"));
        assert_eq!(bar.arguments.len(), 2);
    }

    #[test]
    fn test_destructured_variables_read_members() {
        let facts = analyze("const { a, b: c } = source;\n");
        let names: Vec<_> = facts.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
        let members: Vec<_> = facts
            .expressions
            .iter()
            .map(|e| (e.shape, e.property.clone()))
            .collect();
        assert_eq!(
            members,
            vec![
                (ExpressionShape::Member, Some("a".to_string())),
                (ExpressionShape::Member, Some("b".to_string())),
            ]
        );
        assert!(facts.variables.iter().all(|v| v.destructured && v.init.is_some()));
    }

    #[test]
    fn test_imports_and_exports() {
        let facts = analyze(
            "import def, { foo as bar } from './a';\nimport * as ns from './b';\nexport function f() {}\nexport { bar as baz };\nexport * from './c';\n",
        );
        let imports: Vec<_> = facts
            .imports
            .iter()
            .map(|i| (i.local.as_str(), i.imported.as_deref(), i.kind))
            .collect();
        assert_eq!(
            imports,
            vec![
                ("def", Some("default"), ImportKind::Default),
                ("bar", Some("foo"), ImportKind::Named),
                ("ns", Some("*"), ImportKind::Namespace),
            ]
        );
        let exports: Vec<_> = facts
            .exports
            .iter()
            .map(|e| (e.exported.as_str(), e.kind))
            .collect();
        assert_eq!(
            exports,
            vec![
                ("f", ExportKind::Named),
                ("baz", ExportKind::Named),
                ("*", ExportKind::ReExportAll),
            ]
        );
    }

    #[test]
    fn test_class_methods_and_superclass() {
        let facts = analyze(
            "class Dog extends Animal {\n  constructor() { super(); }\n  bark() { this.speak(); }\n}\n",
        );
        let class = &facts.classes[0];
        assert_eq!(class.superclass_name.as_deref(), Some("Animal"));
        let methods: Vec<_> = facts
            .functions
            .iter()
            .map(|f| (f.id.as_str(), f.method_kind.as_deref()))
            .collect();
        assert_eq!(
            methods,
            vec![
                ("src/a.js->global->Dog->METHOD->constructor", Some("constructor")),
                ("src/a.js->global->Dog->METHOD->bark", Some("method")),
            ]
        );
        let speak = facts.calls.iter().find(|c| c.name == "speak").unwrap();
        assert_eq!(speak.object.as_deref(), Some("this"));
        assert_eq!(speak.enclosing_class.as_ref(), Some(&class.id));
    }

    #[test]
    fn test_typescript_wrappers_are_transparent() {
        let facts = analyze_as(
            "src/a.ts",
            "function f(x: number): number { return (x as number)!; }\n",
            SourceLanguage::TypeScript,
        );
        assert!(facts.expressions.is_empty());
        assert_eq!(facts.returns[0].value.identifier_name(), Some("x"));
    }

    #[test]
    fn test_syntax_error_yields_no_bundle() {
        let err = LocalAnalyzer::new()
            .analyze_source("bad.js", "function (", SourceLanguage::JavaScript)
            .unwrap_err();
        assert!(matches!(err, AnalyzeError::Syntax { .. }));
    }

    #[test]
    fn test_syntax_error_reports_leftmost_position() {
        let source = format!("{};\nfunction ok() {{}}\nconst = 1;\nlet = 2;\n", "[".repeat(2000) + &"]".repeat(2000));
        let err = LocalAnalyzer::new()
            .analyze_source("deep.js", &source, SourceLanguage::JavaScript)
            .unwrap_err();
        match err {
            AnalyzeError::Syntax { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_string_keys_do_not_alias_nested_scopes() {
        let facts = analyze(
            "const o = { \"a->b\": function() { var x; } };\nfunction a() { function b() { var x; } }\n",
        );
        let xs: Vec<_> = facts
            .variables
            .iter()
            .filter(|v| v.name == "x")
            .map(|v| v.id.as_str())
            .collect();
        assert_eq!(
            xs,
            vec![
                "src/a.js->global->a-%3Eb->VARIABLE->x",
                "src/a.js->global->a->b->VARIABLE->x",
            ]
        );
        // The display name keeps the key as written.
        assert_eq!(facts.functions[0].name, "a->b");
    }

    #[test]
    fn test_string_and_computed_member_names() {
        let facts = analyze(
            "class C {\n  m() {}\n  m() { var y; }\n  \"m#1\"() { var y; }\n  [key]() {}\n  \"x->y\" = () => 1;\n}\n",
        );
        let ids: Vec<_> = facts.functions.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "src/a.js->global->C->METHOD->m",
                "src/a.js->global->C->METHOD->m#1",
                "src/a.js->global->C->METHOD->m%231",
                "src/a.js->global->C->METHOD->anonymous[0]",
                "src/a.js->global->C->FUNCTION->x-%3Ey",
            ]
        );
        let ys: Vec<_> = facts.variables.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(
            ys,
            vec![
                "src/a.js->global->C->m#1->VARIABLE->y",
                "src/a.js->global->C->m%231->VARIABLE->y",
            ]
        );
        assert_eq!(facts.unsupported.get("computed_member_name"), Some(&1));
    }

    #[test]
    fn test_reanalysis_is_deterministic() {
        let source = "const f = () => g(1);\nfunction g(x) { return [x, () => x]; }\n";
        let a = analyze(source);
        let b = analyze(source);
        let ids = |facts: &FileFacts| {
            let mut ids: Vec<String> = facts.functions.iter().map(|f| f.id.to_string()).collect();
            ids.extend(facts.expressions.iter().map(|e| e.id.to_string()));
            ids.extend(facts.calls.iter().map(|c| c.id.to_string()));
            ids
        };
        assert_eq!(ids(&a), ids(&b));
    }

    #[test]
    fn test_analyze_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("util.ts");
        std::fs::write(&path, "export const twice = (n: number) => n * 2;\n").unwrap();

        let facts = LocalAnalyzer::new().analyze_file(&path, "util.ts").unwrap();
        assert_eq!(facts.module.language, SourceLanguage::TypeScript);
        assert_eq!(facts.functions[0].name, "twice");
        assert_eq!(facts.exports[0].exported, "twice");

        let missing = LocalAnalyzer::new().analyze_file(&dir.path().join("gone.js"), "gone.js");
        assert!(matches!(missing, Err(AnalyzeError::Io { .. })));
    }
}
