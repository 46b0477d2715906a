//! Graph assembly.
//!
//! The assembler turns one file's facts into nodes and same-file edges in
//! two passes. The first pass materializes every declaration and fills the
//! file's [`SymbolTable`]. The second resolves every reference-bearing fact
//! against that table. Nothing outside the file is consulted; references
//! that cannot be settled locally are recorded for the enrichment phase.

use crate::edge::{Edge, EdgeKind};
use crate::symbol_table::{Symbol, SymbolKind, SymbolTable};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use sylva_core::facts::{CallFact, ScopeKind, ValueRef, YieldKind};
use sylva_core::{attrs, AttrValue, FileFacts, Node, NodeId, NodeKind, Position};
use tracing::{debug, warn};

/// `resolution` attribute values on call and construction sites.
pub mod resolution {
    pub const RESOLVED: &str = "resolved";
    pub const IMPORTED: &str = "imported";
    pub const MEMBER: &str = "member";
    pub const UNRESOLVED: &str = "unresolved";
    pub const DYNAMIC: &str = "dynamic";
}

/// Placeholder in a call's `arguments` list for a value with no node.
pub const NO_VALUE: &str = "?";

/// Why a same-file reference was left unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Unresolved {
    /// No declaration of the name is visible.
    NotFound,
    /// The name is bound by an import; enrichment finishes it.
    Imported,
    /// Member access, which needs type or cross-file information.
    Member,
    /// A construct the analyzer does not model, or a dynamic value.
    Unsupported,
}

impl Unresolved {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unresolved::NotFound => "not_found",
            Unresolved::Imported => "imported",
            Unresolved::Member => "member",
            Unresolved::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Nodes and edges of one file, waiting to be committed together.
///
/// Adding the same node id again replaces it; adding the same edge again is
/// a no-op.
#[derive(Debug, Default, Clone)]
pub struct GraphBuffer {
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeSet<Edge>,
}

impl GraphBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Node) {
        self.nodes.insert(node.id.clone(), node);
    }

    /// Returns `false` if the edge was already buffered.
    pub fn add_edge(&mut self, edge: Edge) -> bool {
        self.edges.insert(edge)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Consumes the buffer, returning nodes and edges in id order.
    pub fn into_parts(self) -> (Vec<Node>, Vec<Edge>) {
        (self.nodes.into_values().collect(), self.edges.into_iter().collect())
    }
}

/// What happened while assembling one file.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct AssemblyReport {
    pub file: String,
    pub nodes: usize,
    pub edges: usize,
    /// Unresolved references by reason.
    pub unresolved: BTreeMap<String, usize>,
    /// Edges dropped because an endpoint was not in this file's buffer.
    pub rejected_edges: usize,
    /// Nodes that had no position and were placed at 0:0.
    pub defaulted_positions: usize,
    /// Constructs the analyzer skipped, by category.
    pub unsupported: BTreeMap<String, u32>,
}

impl AssemblyReport {
    pub fn unresolved_total(&self) -> usize {
        self.unresolved.values().sum()
    }

    pub fn unresolved_count(&self, reason: Unresolved) -> usize {
        self.unresolved.get(reason.as_str()).copied().unwrap_or(0)
    }
}

/// The result of assembling one file.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub buffer: GraphBuffer,
    pub report: AssemblyReport,
}

/// How a reference resolved.
enum Target {
    /// A node in this file's buffer.
    Node(NodeId),
    /// A declaration found through the symbol table.
    Symbol(Symbol),
    Unresolved(Unresolved),
}

/// Turns one file's facts into a graph buffer.
pub struct GraphAssembler<'f> {
    facts: &'f FileFacts,
    symbols: SymbolTable,
    buffer: GraphBuffer,
    report: AssemblyReport,
}

impl<'f> GraphAssembler<'f> {
    pub fn new(facts: &'f FileFacts) -> Self {
        Self {
            facts,
            symbols: SymbolTable::from_facts(facts),
            buffer: GraphBuffer::new(),
            report: AssemblyReport {
                file: facts.file.clone(),
                unsupported: facts.unsupported.clone(),
                ..AssemblyReport::default()
            },
        }
    }

    /// Assembles a file. `content_hash` is recorded on the module node.
    pub fn assemble(facts: &'f FileFacts, content_hash: Option<&str>) -> Assembly {
        let mut assembler = Self::new(facts);
        assembler.materialize(content_hash);
        assembler.resolve();

        assembler.report.nodes = assembler.buffer.node_count();
        assembler.report.edges = assembler.buffer.edge_count();
        debug!(
            "Assembled {}: {} nodes, {} edges, {} unresolved",
            facts.file,
            assembler.report.nodes,
            assembler.report.edges,
            assembler.report.unresolved_total()
        );
        Assembly {
            buffer: assembler.buffer,
            report: assembler.report,
        }
    }

    /// First pass: one node per declaration, call site and value.
    fn materialize(&mut self, content_hash: Option<&str>) {
        let facts = self.facts;
        let file = facts.file.as_str();
        let module = &facts.module;

        self.buffer.add_node(
            Node::new(module.id.clone(), NodeKind::Module, &module.name, file)
                .with_position(Position::new(1, 0))
                .with_attr(attrs::LANGUAGE, module.language.as_str())
                .with_attr(attrs::LINES, module.lines)
                .with_opt_attr(attrs::CONTENT_HASH, content_hash),
        );

        for function in &facts.functions {
            let node = Node::new(function.id.clone(), function.kind, &function.name, file)
                .with_position(function.position)
                .with_attr(attrs::OFFSET, function.offset)
                .with_attr(attrs::ASYNC, function.is_async)
                .with_attr(attrs::GENERATOR, function.is_generator)
                .with_attr(attrs::ARROW, function.is_arrow)
                .with_attr(attrs::ANONYMOUS, function.anonymous)
                .with_opt_attr(attrs::METHOD_KIND, function.method_kind.clone())
                .with_attr(attrs::STATIC, function.is_static);
            self.buffer.add_node(node);
        }

        for class in &facts.classes {
            let node = Node::new(class.id.clone(), NodeKind::Class, &class.name, file)
                .with_position(class.position)
                .with_attr(attrs::OFFSET, class.offset)
                .with_attr(attrs::ANONYMOUS, class.anonymous)
                .with_opt_attr(attrs::SUPERCLASS, class.superclass_name.clone());
            self.buffer.add_node(node);
        }

        for variable in &facts.variables {
            let node = Node::new(variable.id.clone(), variable.kind, &variable.name, file)
                .with_position(variable.position)
                .with_attr(attrs::OFFSET, variable.offset)
                .with_attr(attrs::DECLARATION, variable.declaration.as_str())
                .with_attr(attrs::DESTRUCTURED, variable.destructured);
            self.buffer.add_node(node);
        }

        for parameter in &facts.parameters {
            let node = Node::new(parameter.id.clone(), NodeKind::Parameter, &parameter.name, file)
                .with_position(parameter.position)
                .with_attr(attrs::OFFSET, parameter.offset)
                .with_attr(attrs::INDEX, parameter.index)
                .with_attr(attrs::REST, parameter.rest)
                .with_attr(attrs::HAS_DEFAULT, parameter.default.is_some())
                .with_attr(attrs::DESTRUCTURED, parameter.destructured);
            self.buffer.add_node(node);
        }

        for scope in &facts.scopes {
            let node = Node::new(scope.id.clone(), NodeKind::Scope, &scope.name, file)
                .with_position(scope.position)
                .with_attr(attrs::OFFSET, scope.offset)
                .with_attr(attrs::SCOPE_KIND, scope.kind.as_str());
            self.buffer.add_node(node);
        }

        for call in facts.calls.iter().chain(&facts.constructions) {
            self.buffer.add_node(call_node(call, file));
        }

        for expression in &facts.expressions {
            let position = match expression.position {
                Some(position) => position,
                None => {
                    warn!("Expression {} has no position, using 0:0", expression.id);
                    self.report.defaulted_positions += 1;
                    Position::ZERO
                }
            };
            let node = Node::new(expression.id.clone(), NodeKind::Expression, expression.shape.as_str(), file)
                .with_position(position)
                .with_opt_attr(attrs::OFFSET, expression.offset)
                .with_attr(attrs::SHAPE, expression.shape.as_str())
                .with_opt_attr(attrs::OPERATOR, expression.operator.clone())
                .with_opt_attr(attrs::PROPERTY, expression.property.clone())
                .with_attr(attrs::COMPUTED, expression.computed);
            self.buffer.add_node(node);
        }

        for literal in &facts.literals {
            let node = Node::new(literal.id.clone(), NodeKind::Literal, literal.literal_type.as_str(), file)
                .with_position(literal.position)
                .with_attr(attrs::OFFSET, literal.offset)
                .with_attr(attrs::LITERAL_TYPE, literal.literal_type.as_str())
                .with_attr(attrs::VALUE, literal.value.as_str());
            self.buffer.add_node(node);
        }

        for import in &facts.imports {
            let node = Node::new(import.id.clone(), NodeKind::Import, &import.local, file)
                .with_position(import.position)
                .with_attr(attrs::OFFSET, import.offset)
                .with_attr(attrs::SOURCE, import.source.as_str())
                .with_attr(attrs::LOCAL, import.local.as_str())
                .with_opt_attr(attrs::IMPORTED, import.imported.clone())
                .with_attr(attrs::IMPORT_KIND, import.kind.as_str())
                .with_attr(attrs::TYPE_ONLY, import.type_only);
            self.buffer.add_node(node);
        }

        for export in &facts.exports {
            let node = Node::new(export.id.clone(), NodeKind::Export, &export.exported, file)
                .with_position(export.position)
                .with_attr(attrs::OFFSET, export.offset)
                .with_attr(attrs::EXPORTED, export.exported.as_str())
                .with_attr(attrs::EXPORT_KIND, export.kind.as_str())
                .with_opt_attr(attrs::SOURCE, export.source.clone())
                .with_opt_attr(attrs::IMPORTED, export.imported.clone())
                .with_attr(attrs::TYPE_ONLY, export.type_only);
            self.buffer.add_node(node);
        }

        self.structure();
    }

    /// Containment, scope, parameter and declaration edges.
    fn structure(&mut self) {
        let facts = self.facts;
        let module = facts.module.id.clone();

        for function in &facts.functions {
            self.link(EdgeKind::Contains, &function.container, &function.id);
            if let Some(body) = &function.body_scope {
                self.link(EdgeKind::HasScope, &function.id, body);
            }
        }
        for class in &facts.classes {
            self.link(EdgeKind::Contains, &class.container, &class.id);
        }
        for variable in &facts.variables {
            self.link(EdgeKind::Declares, &variable.container, &variable.id);
        }
        for parameter in &facts.parameters {
            self.link(EdgeKind::HasParameter, &parameter.function, &parameter.id);
        }
        for scope in &facts.scopes {
            // Function bodies hang off their function through HAS_SCOPE.
            if scope.kind != ScopeKind::FunctionBody {
                self.link(EdgeKind::Contains, &scope.parent, &scope.id);
            }
        }
        for call in facts.calls.iter().chain(&facts.constructions) {
            self.link(EdgeKind::Contains, &call.container, &call.id);
        }
        for import in &facts.imports {
            self.link(EdgeKind::Contains, &module, &import.id);
        }
        for export in &facts.exports {
            self.link(EdgeKind::Contains, &module, &export.id);
        }
    }

    /// Second pass: reference-bearing facts.
    fn resolve(&mut self) {
        let facts = self.facts;

        for call in &facts.calls {
            self.resolve_call(call);
        }
        for construction in &facts.constructions {
            self.resolve_construction(construction);
        }

        for variable in &facts.variables {
            if let Some(init) = &variable.init {
                if let Some(value) = self.value(init) {
                    self.link(EdgeKind::AssignedFrom, &variable.id, &value);
                }
            }
        }
        for parameter in &facts.parameters {
            if let Some(default) = &parameter.default {
                if let Some(value) = self.value(default) {
                    self.link(EdgeKind::AssignedFrom, &parameter.id, &value);
                }
            }
        }
        for assignment in &facts.assignments {
            let target = match self.symbols.resolve(&assignment.name, &assignment.container) {
                Some(symbol) if matches!(symbol.kind, SymbolKind::Variable | SymbolKind::Parameter) => {
                    symbol.id.clone()
                }
                Some(_) => {
                    self.unresolved(Unresolved::Unsupported);
                    continue;
                }
                None => {
                    self.unresolved(Unresolved::NotFound);
                    continue;
                }
            };
            if let Some(value) = self.value(&assignment.value) {
                self.link(EdgeKind::AssignedFrom, &target, &value);
            }
        }

        for ret in &facts.returns {
            if let Some(value) = self.value(&ret.value) {
                self.link(EdgeKind::Returns, &value, &ret.function);
            }
        }
        for yielded in &facts.yields {
            let Some(value) = yielded.value.as_ref().and_then(|v| self.value(v)) else {
                continue;
            };
            let kind = match yielded.kind {
                YieldKind::Yield => EdgeKind::Yields,
                YieldKind::Delegate => EdgeKind::DelegatesTo,
            };
            self.link(kind, &value, &yielded.function);
        }

        for expression in &facts.expressions {
            for operand in &expression.operands {
                if let Some(value) = self.value(operand) {
                    self.link(EdgeKind::DerivesFrom, &expression.id, &value);
                }
            }
        }

        for scope in &facts.scopes {
            if let Some(condition) = &scope.condition {
                if let Some(value) = self.value(condition) {
                    self.link(EdgeKind::HasCondition, &scope.id, &value);
                }
            }
        }

        for export in &facts.exports {
            if let Some(local) = &export.local {
                if let Some(value) = self.value(local) {
                    self.link(EdgeKind::Exports, &export.id, &value);
                }
            }
        }

        for class in &facts.classes {
            let Some(superclass) = &class.superclass else {
                continue;
            };
            match self.target(superclass) {
                Target::Node(id) => self.link(EdgeKind::Extends, &class.id, &id),
                Target::Symbol(symbol) => match symbol.kind {
                    SymbolKind::Class => self.link(EdgeKind::Extends, &class.id, &symbol.id),
                    SymbolKind::Variable if symbol.class.is_some() => {
                        if let Some(target) = &symbol.class {
                            self.link(EdgeKind::Extends, &class.id, target);
                        }
                    }
                    SymbolKind::Import => {
                        self.unresolved(Unresolved::Imported);
                        self.set_attr(&class.id, attrs::SUPERCLASS_BINDING, symbol.id.as_str());
                    }
                    _ => self.unresolved(Unresolved::Unsupported),
                },
                Target::Unresolved(reason) => self.unresolved(reason),
            }
        }
    }

    fn resolve_call(&mut self, call: &CallFact) {
        let arguments = self.arguments(call);
        self.set_attr(&call.id, attrs::ARGUMENTS, arguments);

        if call.kind == NodeKind::MethodCall {
            if let Some(object) = &call.object_ref {
                match self.target(object) {
                    Target::Node(id) => self.set_attr(&call.id, attrs::RECEIVER, id.as_str()),
                    Target::Symbol(symbol) => {
                        self.set_attr(&call.id, attrs::RECEIVER, symbol.id.as_str());
                        if symbol.kind == SymbolKind::Import {
                            self.set_attr(&call.id, attrs::BINDING, symbol.id.as_str());
                        }
                    }
                    Target::Unresolved(_) => {}
                }
            }
            self.unresolved(Unresolved::Member);
            self.set_attr(&call.id, attrs::RESOLUTION, resolution::MEMBER);
            return;
        }

        let Some(callee) = &call.callee else {
            self.unresolved(Unresolved::Unsupported);
            self.set_attr(&call.id, attrs::RESOLUTION, resolution::DYNAMIC);
            return;
        };
        let outcome = match self.target(callee) {
            // Immediately invoked function expression.
            Target::Node(id) if self.node_kind(&id).map_or(false, |k| k.is_callable()) => {
                self.link(EdgeKind::Calls, &call.id, &id);
                resolution::RESOLVED
            }
            Target::Node(_) => {
                self.unresolved(Unresolved::Unsupported);
                resolution::DYNAMIC
            }
            Target::Symbol(symbol) => match (symbol.kind, &symbol.function) {
                (SymbolKind::Function, _) => {
                    self.link(EdgeKind::Calls, &call.id, &symbol.id);
                    resolution::RESOLVED
                }
                (SymbolKind::Variable, Some(function)) => {
                    self.link(EdgeKind::Calls, &call.id, function);
                    resolution::RESOLVED
                }
                (SymbolKind::Import, _) => {
                    self.unresolved(Unresolved::Imported);
                    self.set_attr(&call.id, attrs::BINDING, symbol.id.as_str());
                    resolution::IMPORTED
                }
                _ => {
                    self.unresolved(Unresolved::Unsupported);
                    resolution::DYNAMIC
                }
            },
            Target::Unresolved(reason) => {
                self.unresolved(reason);
                resolution::UNRESOLVED
            }
        };
        self.set_attr(&call.id, attrs::RESOLUTION, outcome);
    }

    fn resolve_construction(&mut self, construction: &CallFact) {
        let arguments = self.arguments(construction);
        self.set_attr(&construction.id, attrs::ARGUMENTS, arguments);

        let Some(callee) = &construction.callee else {
            // `new ns.Foo()`
            let reason = if construction.object.is_some() {
                Unresolved::Member
            } else {
                Unresolved::Unsupported
            };
            self.unresolved(reason);
            let outcome = if reason == Unresolved::Member {
                resolution::MEMBER
            } else {
                resolution::DYNAMIC
            };
            self.set_attr(&construction.id, attrs::RESOLUTION, outcome);
            return;
        };

        let outcome = match self.target(callee) {
            Target::Node(id) => match self.node_kind(&id) {
                Some(NodeKind::Class) => {
                    self.link(EdgeKind::InstanceOf, &construction.id, &id);
                    resolution::RESOLVED
                }
                _ => {
                    self.unresolved(Unresolved::Unsupported);
                    resolution::DYNAMIC
                }
            },
            Target::Symbol(symbol) => match symbol.kind {
                SymbolKind::Class => {
                    self.link(EdgeKind::InstanceOf, &construction.id, &symbol.id);
                    resolution::RESOLVED
                }
                SymbolKind::Variable if symbol.class.is_some() || symbol.function.is_some() => {
                    if let Some(class) = &symbol.class {
                        self.link(EdgeKind::InstanceOf, &construction.id, class);
                    } else if let Some(function) = &symbol.function {
                        self.link(EdgeKind::Calls, &construction.id, function);
                    }
                    resolution::RESOLVED
                }
                // Constructor functions.
                SymbolKind::Function => {
                    self.link(EdgeKind::Calls, &construction.id, &symbol.id);
                    resolution::RESOLVED
                }
                SymbolKind::Import => {
                    self.unresolved(Unresolved::Imported);
                    self.set_attr(&construction.id, attrs::BINDING, symbol.id.as_str());
                    resolution::IMPORTED
                }
                _ => {
                    self.unresolved(Unresolved::Unsupported);
                    resolution::DYNAMIC
                }
            },
            Target::Unresolved(reason) => {
                self.unresolved(reason);
                resolution::UNRESOLVED
            }
        };
        self.set_attr(&construction.id, attrs::RESOLUTION, outcome);
    }

    /// Links every argument and returns the per-index value list.
    fn arguments(&mut self, call: &CallFact) -> Vec<String> {
        let mut values = Vec::with_capacity(call.arguments.len());
        for argument in &call.arguments {
            match self.value(argument) {
                Some(value) => {
                    self.link(EdgeKind::PassesArgument, &call.id, &value);
                    values.push(value.as_str().to_string());
                }
                None => values.push(NO_VALUE.to_string()),
            }
        }
        values
    }

    /// Resolves a reference without recording anything.
    fn target(&self, value: &ValueRef) -> Target {
        match value {
            ValueRef::Node { id, .. } => Target::Node(id.clone()),
            ValueRef::Identifier { name, container, .. } => match self.symbols.resolve(name, container) {
                Some(symbol) => Target::Symbol(symbol.clone()),
                None => Target::Unresolved(Unresolved::NotFound),
            },
            ValueRef::Unsupported { .. } => Target::Unresolved(Unresolved::Unsupported),
        }
    }

    /// Resolves a value position to the node standing for it.
    ///
    /// Import bindings stand for themselves until enrichment links them.
    fn value(&mut self, value: &ValueRef) -> Option<NodeId> {
        match self.target(value) {
            Target::Node(id) => Some(id),
            Target::Symbol(symbol) => Some(symbol.id),
            Target::Unresolved(reason) => {
                self.unresolved(reason);
                None
            }
        }
    }

    fn node_kind(&self, id: &NodeId) -> Option<NodeKind> {
        self.buffer.node(id).map(|n| n.kind)
    }

    fn unresolved(&mut self, reason: Unresolved) {
        *self
            .report
            .unresolved
            .entry(reason.as_str().to_string())
            .or_insert(0) += 1;
    }

    fn set_attr(&mut self, id: &NodeId, key: &str, value: impl Into<AttrValue>) {
        if let Some(node) = self.buffer.node_mut(id) {
            node.set_attr(key, value);
        }
    }

    /// Buffers an edge whose endpoints are both in this file.
    fn link(&mut self, kind: EdgeKind, src: &NodeId, dst: &NodeId) {
        if !self.buffer.contains(src) || !self.buffer.contains(dst) {
            let foreign = src.file() != self.facts.file || dst.file() != self.facts.file;
            debug!(
                "Rejected {} edge {} -> {} ({})",
                kind,
                src,
                dst,
                if foreign { "cross-file" } else { "missing endpoint" }
            );
            self.report.rejected_edges += 1;
            return;
        }
        self.buffer.add_edge(Edge::new(kind, src.clone(), dst.clone()));
    }
}

fn call_node(call: &CallFact, file: &str) -> Node {
    Node::new(call.id.clone(), call.kind, &call.name, file)
        .with_position(call.position)
        .with_attr(attrs::OFFSET, call.offset)
        .with_attr(attrs::CALLEE, call.callee_text.as_str())
        .with_opt_attr(attrs::OBJECT, call.object.clone())
        .with_attr(attrs::OPTIONAL, call.optional)
        .with_opt_attr(attrs::ENCLOSING_CLASS, call.enclosing_class.as_ref().map(|c| c.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sylva_core::{LocalAnalyzer, SourceLanguage};

    fn assemble(file: &str, source: &str) -> Assembly {
        let mut analyzer = LocalAnalyzer::new();
        let facts = analyzer
            .analyze_source(file, source, SourceLanguage::JavaScript)
            .unwrap();
        GraphAssembler::assemble(&facts, Some("hash"))
    }

    fn edges_of(assembly: &Assembly, kind: EdgeKind) -> Vec<(String, String)> {
        assembly
            .buffer
            .edges()
            .filter(|e| e.kind == kind)
            .map(|e| (e.src.to_string(), e.dst.to_string()))
            .collect()
    }

    fn node_by_id<'a>(assembly: &'a Assembly, id: &str) -> &'a Node {
        assembly.buffer.node(&NodeId::new(id)).unwrap()
    }

    #[test]
    fn test_same_file_call_resolves() {
        let assembly = assemble("a.js", "function foo() {}\nfunction bar() { foo(); }\n");
        let calls = edges_of(&assembly, EdgeKind::Calls);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, "a.js->global->FUNCTION->foo");
        let call = node_by_id(&assembly, &calls[0].0);
        assert_eq!(call.attr_str(attrs::RESOLUTION), Some(resolution::RESOLVED));
    }

    #[test]
    fn test_call_through_arrow_variable() {
        let assembly = assemble("a.js", "const add = (a, b) => a + b;\nadd(1, 2);\n");
        let calls = edges_of(&assembly, EdgeKind::Calls);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, "a.js->global->FUNCTION->add");
    }

    #[test]
    fn test_imported_call_records_binding() {
        let assembly = assemble("b.js", "import { foo } from './a';\nfoo();\n");
        assert!(edges_of(&assembly, EdgeKind::Calls).is_empty());
        let call = assembly
            .buffer
            .nodes()
            .find(|n| n.kind == NodeKind::Call)
            .unwrap();
        assert_eq!(call.attr_str(attrs::RESOLUTION), Some(resolution::IMPORTED));
        let binding = call.attr_str(attrs::BINDING).unwrap();
        assert_eq!(node_by_id(&assembly, binding).kind, NodeKind::Import);
        assert_eq!(assembly.report.unresolved_count(Unresolved::Imported), 1);
    }

    #[test]
    fn test_unknown_call_is_recorded_not_dropped() {
        let assembly = assemble("a.js", "missing();\n");
        let call = assembly
            .buffer
            .nodes()
            .find(|n| n.kind == NodeKind::Call)
            .unwrap();
        assert_eq!(call.attr_str(attrs::RESOLUTION), Some(resolution::UNRESOLVED));
        assert_eq!(assembly.report.unresolved_count(Unresolved::NotFound), 1);
    }

    #[test]
    fn test_return_binary_expression_derives_from_params() {
        let assembly = assemble("a.js", "function add(a, b) { return a + b; }\n");
        let returns = edges_of(&assembly, EdgeKind::Returns);
        assert_eq!(returns.len(), 1);
        let expression = node_by_id(&assembly, &returns[0].0);
        assert_eq!(expression.kind, NodeKind::Expression);
        assert_eq!(expression.attr_str(attrs::SHAPE), Some("BinaryExpression"));

        let derivations = edges_of(&assembly, EdgeKind::DerivesFrom);
        let mut operands: Vec<_> = derivations.iter().map(|(_, dst)| dst.as_str()).collect();
        operands.sort();
        assert_eq!(
            operands,
            vec![
                "a.js->global->add->PARAMETER->a",
                "a.js->global->add->PARAMETER->b",
            ]
        );
    }

    #[test]
    fn test_return_literal_has_no_derivations() {
        let assembly = assemble("a.js", "function answer() { return 42; }\n");
        let returns = edges_of(&assembly, EdgeKind::Returns);
        assert_eq!(returns.len(), 1);
        assert_eq!(node_by_id(&assembly, &returns[0].0).kind, NodeKind::Literal);
        assert!(edges_of(&assembly, EdgeKind::DerivesFrom).is_empty());
    }

    #[test]
    fn test_parameter_shadows_module_variable() {
        let source = "const x = 1;\nfunction f(x) { return x; }\n";
        let assembly = assemble("a.js", source);
        let returns = edges_of(&assembly, EdgeKind::Returns);
        assert_eq!(returns[0].0, "a.js->global->f->PARAMETER->x");
    }

    #[test]
    fn test_structure_edges() {
        let source = "class A {}\nclass B extends A { m() { if (this.ok) { return 1; } } }\nnew B();\n";
        let assembly = assemble("a.js", source);

        let extends = edges_of(&assembly, EdgeKind::Extends);
        assert_eq!(
            extends,
            vec![("a.js->global->CLASS->B".to_string(), "a.js->global->CLASS->A".to_string())]
        );
        let instances = edges_of(&assembly, EdgeKind::InstanceOf);
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].1, "a.js->global->CLASS->B");

        let contains = edges_of(&assembly, EdgeKind::Contains);
        assert!(contains.contains(&(
            "a.js->global->CLASS->B".to_string(),
            "a.js->global->B->METHOD->m".to_string()
        )));
        assert_eq!(edges_of(&assembly, EdgeKind::HasScope).len(), 1);
        assert_eq!(edges_of(&assembly, EdgeKind::HasCondition).len(), 1);
    }

    #[test]
    fn test_assignment_and_arguments() {
        let source = "let total = 0;\nfunction add(n) { total = total + n; }\nadd(total);\n";
        let assembly = assemble("a.js", source);

        let assigned: Vec<_> = edges_of(&assembly, EdgeKind::AssignedFrom)
            .into_iter()
            .filter(|(src, _)| src == "a.js->global->VARIABLE->total")
            .collect();
        // The literal initializer and the reassignment.
        assert_eq!(assigned.len(), 2);

        let call = assembly
            .buffer
            .nodes()
            .find(|n| n.kind == NodeKind::Call)
            .unwrap();
        assert_eq!(
            call.attr_list(attrs::ARGUMENTS).unwrap(),
            &["a.js->global->VARIABLE->total".to_string()]
        );
        assert_eq!(edges_of(&assembly, EdgeKind::PassesArgument).len(), 1);
    }

    #[test]
    fn test_module_node_carries_hash() {
        let assembly = assemble("a.js", "let a = 1;\n");
        let module = node_by_id(&assembly, "a.js->global->MODULE->a.js");
        assert_eq!(module.attr_str(attrs::CONTENT_HASH), Some("hash"));
        assert_eq!(assembly.report.rejected_edges, 0);
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let source = "function f(a) { const g = () => a * 2; return [g(), g()]; }\nf(1);\n";
        let first = assemble("a.js", source).buffer.into_parts();
        let second = assemble("a.js", source).buffer.into_parts();
        assert_eq!(first, second);
    }
}
