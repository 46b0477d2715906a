//! Fact records produced by the local analyzer.
//!
//! Facts are ephemeral: one [`FileFacts`] bundle per analyzed file, handed
//! whole to the assembler and dropped afterwards. Every fact that stands for
//! a node already carries its semantic id; references to other entities are
//! [`ValueRef`]s that the assembler resolves within the same file.

use crate::id::NodeId;
use crate::language::SourceLanguage;
use crate::node::{NodeKind, Position};
use std::collections::BTreeMap;

/// A value-producing reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueRef {
    /// A bare identifier, resolved later by walking the container chain.
    Identifier {
        name: String,
        container: NodeId,
        position: Position,
        offset: usize,
    },
    /// A node the analyzer materialized itself (call, literal, expression, ...).
    Node { id: NodeId, kind: NodeKind },
    /// Something the analyzer does not model.
    Unsupported { construct: String },
}

impl ValueRef {
    pub fn node(id: NodeId, kind: NodeKind) -> Self {
        ValueRef::Node { id, kind }
    }

    /// Id of a materialized node, if this is one.
    pub fn node_id(&self) -> Option<&NodeId> {
        match self {
            ValueRef::Node { id, .. } => Some(id),
            _ => None,
        }
    }

    pub fn identifier_name(&self) -> Option<&str> {
        match self {
            ValueRef::Identifier { name, .. } => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModuleFact {
    pub id: NodeId,
    pub name: String,
    pub language: SourceLanguage,
    pub lines: u32,
}

#[derive(Debug, Clone)]
pub struct FunctionFact {
    pub id: NodeId,
    pub name: String,
    /// `Function` or `Method`.
    pub kind: NodeKind,
    /// Lexical container the function is declared in.
    pub container: NodeId,
    pub position: Position,
    pub offset: usize,
    pub is_async: bool,
    pub is_generator: bool,
    pub is_arrow: bool,
    pub anonymous: bool,
    /// `true` for function declarations, which bind their name in `container`.
    pub binds_name: bool,
    /// `method`, `get`, `set` or `constructor` for class members.
    pub method_kind: Option<String>,
    pub is_static: bool,
    pub class: Option<NodeId>,
    pub body_scope: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct ClassFact {
    pub id: NodeId,
    pub name: String,
    pub container: NodeId,
    pub position: Position,
    pub offset: usize,
    pub anonymous: bool,
    pub binds_name: bool,
    pub superclass: Option<ValueRef>,
    /// Source text of the superclass expression.
    pub superclass_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Var,
    Let,
    Const,
    Catch,
}

impl DeclarationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclarationKind::Var => "var",
            DeclarationKind::Let => "let",
            DeclarationKind::Const => "const",
            DeclarationKind::Catch => "catch",
        }
    }
}

#[derive(Debug, Clone)]
pub struct VariableFact {
    pub id: NodeId,
    pub name: String,
    /// `Variable` or `Constant`.
    pub kind: NodeKind,
    pub declaration: DeclarationKind,
    /// Scope or module the binding lives in (after `var` hoisting).
    pub container: NodeId,
    pub position: Position,
    pub offset: usize,
    pub init: Option<ValueRef>,
    pub destructured: bool,
}

#[derive(Debug, Clone)]
pub struct ParameterFact {
    pub id: NodeId,
    pub name: String,
    pub function: NodeId,
    /// Zero-based index of the top-level parameter slot this binding came from.
    pub index: u32,
    pub position: Position,
    pub offset: usize,
    pub rest: bool,
    pub default: Option<ValueRef>,
    pub destructured: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    FunctionBody,
    Block,
    If,
    Else,
    Loop,
    Switch,
    Try,
    Catch,
    Finally,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::FunctionBody => "function_body",
            ScopeKind::Block => "block",
            ScopeKind::If => "if",
            ScopeKind::Else => "else",
            ScopeKind::Loop => "loop",
            ScopeKind::Switch => "switch",
            ScopeKind::Try => "try",
            ScopeKind::Catch => "catch",
            ScopeKind::Finally => "finally",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScopeFact {
    pub id: NodeId,
    /// The scope-path label, e.g. `body` or `if[0]`.
    pub name: String,
    pub kind: ScopeKind,
    /// Enclosing container. For function bodies this is the function.
    pub parent: NodeId,
    pub position: Position,
    pub offset: usize,
    pub condition: Option<ValueRef>,
}

/// A call site or construction site.
#[derive(Debug, Clone)]
pub struct CallFact {
    pub id: NodeId,
    /// `Call`, `MethodCall` or `ConstructorCall`.
    pub kind: NodeKind,
    /// Called name: the function name, the method name or the class name.
    pub name: String,
    /// Source text of the callee expression.
    pub callee_text: String,
    /// The callee for plain calls and constructions.
    pub callee: Option<ValueRef>,
    /// Source text of the receiver of a member call.
    pub object: Option<String>,
    /// The receiver, when it is a bare identifier.
    pub object_ref: Option<ValueRef>,
    pub container: NodeId,
    /// Class whose body lexically contains the call.
    pub enclosing_class: Option<NodeId>,
    pub position: Position,
    pub offset: usize,
    pub optional: bool,
    pub arguments: Vec<ValueRef>,
}

#[derive(Debug, Clone)]
pub struct AssignmentFact {
    pub name: String,
    pub container: NodeId,
    pub operator: String,
    pub value: ValueRef,
    pub position: Position,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct ReturnFact {
    pub function: NodeId,
    pub value: ValueRef,
    pub implicit: bool,
    pub position: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YieldKind {
    Yield,
    /// `yield* source`: the generator's output stream is the source's.
    Delegate,
}

#[derive(Debug, Clone)]
pub struct YieldFact {
    pub function: NodeId,
    pub kind: YieldKind,
    pub value: Option<ValueRef>,
    pub position: Position,
}

/// Shape tag of a compound expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionShape {
    Binary,
    Logical,
    Conditional,
    Member,
    Template,
    Unary,
    Update,
    Await,
    Array,
    Object,
    Sequence,
    Assignment,
    Spread,
}

impl ExpressionShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpressionShape::Binary => "BinaryExpression",
            ExpressionShape::Logical => "LogicalExpression",
            ExpressionShape::Conditional => "ConditionalExpression",
            ExpressionShape::Member => "MemberExpression",
            ExpressionShape::Template => "TemplateLiteral",
            ExpressionShape::Unary => "UnaryExpression",
            ExpressionShape::Update => "UpdateExpression",
            ExpressionShape::Await => "AwaitExpression",
            ExpressionShape::Array => "ArrayExpression",
            ExpressionShape::Object => "ObjectExpression",
            ExpressionShape::Sequence => "SequenceExpression",
            ExpressionShape::Assignment => "AssignmentExpression",
            ExpressionShape::Spread => "SpreadElement",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExpressionFact {
    pub id: NodeId,
    pub shape: ExpressionShape,
    pub operator: Option<String>,
    /// Accessed property of a member expression.
    pub property: Option<String>,
    pub computed: bool,
    /// One entry per directly-named operand, in source order.
    pub operands: Vec<ValueRef>,
    /// `None` for expressions synthesized without a syntax node.
    pub position: Option<Position>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralType {
    String,
    Number,
    Boolean,
    Null,
    Undefined,
    Regex,
    BigInt,
    Template,
}

impl LiteralType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LiteralType::String => "string",
            LiteralType::Number => "number",
            LiteralType::Boolean => "boolean",
            LiteralType::Null => "null",
            LiteralType::Undefined => "undefined",
            LiteralType::Regex => "regex",
            LiteralType::BigInt => "bigint",
            LiteralType::Template => "template",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LiteralFact {
    pub id: NodeId,
    pub literal_type: LiteralType,
    /// Raw source text, truncated for long literals.
    pub value: String,
    pub position: Position,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Default,
    Named,
    Namespace,
    SideEffect,
}

impl ImportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportKind::Default => "default",
            ImportKind::Named => "named",
            ImportKind::Namespace => "namespace",
            ImportKind::SideEffect => "side_effect",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportFact {
    pub id: NodeId,
    /// Local binding name. For side-effect imports, the source.
    pub local: String,
    /// Name in the exporting module: `default`, `*` or the exported name.
    pub imported: Option<String>,
    pub source: String,
    pub kind: ImportKind,
    pub type_only: bool,
    pub position: Position,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Named,
    Default,
    /// `export { a as b } from './m'`
    ReExport,
    /// `export * from './m'`
    ReExportAll,
}

impl ExportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::Named => "named",
            ExportKind::Default => "default",
            ExportKind::ReExport => "re_export",
            ExportKind::ReExportAll => "re_export_all",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportFact {
    pub id: NodeId,
    /// Name visible to importers.
    pub exported: String,
    pub kind: ExportKind,
    /// Local declaration or value the export stands for.
    pub local: Option<ValueRef>,
    /// Name in the source module for re-exports.
    pub imported: Option<String>,
    pub source: Option<String>,
    pub type_only: bool,
    pub position: Position,
    pub offset: usize,
}

/// Everything the analyzer learned about one file.
#[derive(Debug, Clone)]
pub struct FileFacts {
    pub file: String,
    pub module: ModuleFact,
    pub functions: Vec<FunctionFact>,
    pub classes: Vec<ClassFact>,
    pub variables: Vec<VariableFact>,
    pub parameters: Vec<ParameterFact>,
    pub scopes: Vec<ScopeFact>,
    pub calls: Vec<CallFact>,
    pub constructions: Vec<CallFact>,
    pub assignments: Vec<AssignmentFact>,
    pub returns: Vec<ReturnFact>,
    pub yields: Vec<YieldFact>,
    pub expressions: Vec<ExpressionFact>,
    pub literals: Vec<LiteralFact>,
    pub imports: Vec<ImportFact>,
    pub exports: Vec<ExportFact>,
    /// Constructs the analyzer skipped, by category.
    pub unsupported: BTreeMap<String, u32>,
}

impl FileFacts {
    pub fn new(module: ModuleFact, file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            module,
            functions: Vec::new(),
            classes: Vec::new(),
            variables: Vec::new(),
            parameters: Vec::new(),
            scopes: Vec::new(),
            calls: Vec::new(),
            constructions: Vec::new(),
            assignments: Vec::new(),
            returns: Vec::new(),
            yields: Vec::new(),
            expressions: Vec::new(),
            literals: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            unsupported: BTreeMap::new(),
        }
    }

    pub fn note_unsupported(&mut self, category: &str) {
        *self.unsupported.entry(category.to_string()).or_insert(0) += 1;
    }

    /// Total number of node-bearing facts.
    pub fn node_count(&self) -> usize {
        1 + self.functions.len()
            + self.classes.len()
            + self.variables.len()
            + self.parameters.len()
            + self.scopes.len()
            + self.calls.len()
            + self.constructions.len()
            + self.expressions.len()
            + self.literals.len()
            + self.imports.len()
            + self.exports.len()
    }

    pub fn function(&self, id: &NodeId) -> Option<&FunctionFact> {
        self.functions.iter().find(|f| &f.id == id)
    }

    pub fn functions_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FunctionFact> {
        self.functions.iter().filter(move |f| f.name == name)
    }

    pub fn parameters_of<'a>(&'a self, function: &'a NodeId) -> impl Iterator<Item = &'a ParameterFact> {
        self.parameters.iter().filter(move |p| &p.function == function)
    }
}
