//! Graph node model.
//!
//! A [`Node`] is the unit the store keeps and the resolvers join against.
//! Kind-specific data lives in a flat attribute map so that plugins can add
//! node kinds and fields without touching this module.

use crate::id::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// The kind of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    /// One source file.
    Module,
    /// Function declaration, function expression or arrow function.
    Function,
    /// Class method, getter, setter or constructor.
    Method,
    /// Class declaration or class expression.
    Class,
    /// `var` / `let` binding, catch binding, loop binding.
    Variable,
    /// `const` binding.
    Constant,
    /// Function parameter binding (including destructured and rest).
    Parameter,
    /// Lexical or control-flow scope (function body, block, if, loop, ...).
    Scope,
    /// Plain call site: `foo()`.
    Call,
    /// Member call site: `obj.foo()`.
    MethodCall,
    /// Construction site: `new Foo()`.
    ConstructorCall,
    /// Placeholder for a compound expression.
    Expression,
    /// Literal value.
    Literal,
    /// One imported binding.
    Import,
    /// One exported binding.
    Export,
    /// A `sylva-ignore` comment directive.
    Suppression,
    /// A validation finding.
    Issue,
}

impl NodeKind {
    /// All kinds, in declaration order.
    pub const ALL: [NodeKind; 17] = [
        NodeKind::Module,
        NodeKind::Function,
        NodeKind::Method,
        NodeKind::Class,
        NodeKind::Variable,
        NodeKind::Constant,
        NodeKind::Parameter,
        NodeKind::Scope,
        NodeKind::Call,
        NodeKind::MethodCall,
        NodeKind::ConstructorCall,
        NodeKind::Expression,
        NodeKind::Literal,
        NodeKind::Import,
        NodeKind::Export,
        NodeKind::Suppression,
        NodeKind::Issue,
    ];

    /// Returns the wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Module => "MODULE",
            NodeKind::Function => "FUNCTION",
            NodeKind::Method => "METHOD",
            NodeKind::Class => "CLASS",
            NodeKind::Variable => "VARIABLE",
            NodeKind::Constant => "CONSTANT",
            NodeKind::Parameter => "PARAMETER",
            NodeKind::Scope => "SCOPE",
            NodeKind::Call => "CALL",
            NodeKind::MethodCall => "METHOD_CALL",
            NodeKind::ConstructorCall => "CONSTRUCTOR_CALL",
            NodeKind::Expression => "EXPRESSION",
            NodeKind::Literal => "LITERAL",
            NodeKind::Import => "IMPORT",
            NodeKind::Export => "EXPORT",
            NodeKind::Suppression => "SUPPRESSION",
            NodeKind::Issue => "ISSUE",
        }
    }

    /// Functions and methods: things a call site can land on.
    pub fn is_callable(&self) -> bool {
        matches!(self, NodeKind::Function | NodeKind::Method)
    }

    /// Call sites of any flavor.
    pub fn is_call_site(&self) -> bool {
        matches!(
            self,
            NodeKind::Call | NodeKind::MethodCall | NodeKind::ConstructorCall
        )
    }

    /// Bindings that hold a value.
    pub fn is_binding(&self) -> bool {
        matches!(
            self,
            NodeKind::Variable | NodeKind::Constant | NodeKind::Parameter
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown node kind: {}", s))
    }
}

/// Source position of a node's identifying token.
///
/// Lines are 1-based, columns are 0-based. `Position::ZERO` is the neutral
/// position used when a synthesized node has nothing better.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const ZERO: Position = Position { line: 0, column: 0 };

    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    pub fn is_zero(&self) -> bool {
        self.line == 0 && self.column == 0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A node attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Bool(bool),
    List(Vec<String>),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            AttrValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<&String> for AttrValue {
    fn from(value: &String) -> Self {
        AttrValue::Str(value.clone())
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<u32> for AttrValue {
    fn from(value: u32) -> Self {
        AttrValue::Int(i64::from(value))
    }
}

impl From<usize> for AttrValue {
    fn from(value: usize) -> Self {
        AttrValue::Int(value as i64)
    }
}

impl From<Vec<String>> for AttrValue {
    fn from(value: Vec<String>) -> Self {
        AttrValue::List(value)
    }
}

/// Attribute keys that collide with the fixed node fields on the wire.
pub const RESERVED_ATTRS: [&str; 7] = ["id", "kind", "name", "file", "line", "column", "metadata"];

/// A node in the code graph.
///
/// Nodes are never mutated once committed; writing a node with an existing
/// id replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Semantic id.
    pub id: NodeId,
    pub kind: NodeKind,
    pub name: String,
    /// Declaring file. The lifecycle manager clears by this tag.
    pub file: String,
    pub position: Position,
    /// Kind-specific fields.
    pub attrs: BTreeMap<String, AttrValue>,
    /// Free-form metadata.
    pub metadata: BTreeMap<String, AttrValue>,
}

impl Node {
    /// Creates a node with no position and no attributes.
    pub fn new(
        id: NodeId,
        kind: NodeKind,
        name: impl Into<String>,
        file: impl Into<String>,
    ) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            file: file.into(),
            position: Position::ZERO,
            attrs: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    /// Sets an attribute. Reserved keys are dropped.
    pub fn with_attr(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Sets the attribute only when a value is present.
    pub fn with_opt_attr<V: Into<AttrValue>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with_attr(key, value),
            None => self,
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn set_attr(&mut self, key: &str, value: impl Into<AttrValue>) {
        if RESERVED_ATTRS.contains(&key) {
            warn!("Dropping reserved attribute {} on {}", key, self.id);
            return;
        }
        self.attrs.insert(key.to_string(), value.into());
    }

    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(AttrValue::as_str)
    }

    pub fn attr_int(&self, key: &str) -> Option<i64> {
        self.attrs.get(key).and_then(AttrValue::as_int)
    }

    pub fn attr_bool(&self, key: &str) -> bool {
        self.attrs
            .get(key)
            .and_then(AttrValue::as_bool)
            .unwrap_or(false)
    }

    pub fn attr_list(&self, key: &str) -> Option<&[String]> {
        self.attrs.get(key).and_then(AttrValue::as_list)
    }

    /// Byte offset of the defining token, when the node came from syntax.
    pub fn offset(&self) -> Option<usize> {
        self.attr_int(attrs::OFFSET)
            .and_then(|offset| usize::try_from(offset).ok())
    }
}

/// Well-known attribute keys.
pub mod attrs {
    pub const OFFSET: &str = "offset";
    pub const LANGUAGE: &str = "language";
    pub const CONTENT_HASH: &str = "content_hash";
    pub const LINES: &str = "lines";
    pub const ASYNC: &str = "async";
    pub const GENERATOR: &str = "generator";
    pub const ARROW: &str = "arrow";
    pub const ANONYMOUS: &str = "anonymous";
    pub const METHOD_KIND: &str = "method_kind";
    pub const STATIC: &str = "static";
    pub const DECLARATION: &str = "declaration";
    pub const INDEX: &str = "index";
    pub const REST: &str = "rest";
    pub const HAS_DEFAULT: &str = "has_default";
    pub const DESTRUCTURED: &str = "destructured";
    pub const SCOPE_KIND: &str = "scope_kind";
    pub const CALLEE: &str = "callee";
    pub const OBJECT: &str = "object";
    pub const OPTIONAL: &str = "optional";
    pub const ARGUMENTS: &str = "arguments";
    pub const RESOLUTION: &str = "resolution";
    pub const BINDING: &str = "binding";
    pub const MEMBER: &str = "member";
    pub const RECEIVER: &str = "receiver";
    pub const ENCLOSING_CLASS: &str = "enclosing_class";
    pub const CLASS_NAME: &str = "class_name";
    pub const SUPERCLASS: &str = "superclass";
    pub const SUPERCLASS_BINDING: &str = "superclass_binding";
    pub const SHAPE: &str = "shape";
    pub const OPERATOR: &str = "operator";
    pub const PROPERTY: &str = "property";
    pub const COMPUTED: &str = "computed";
    pub const LITERAL_TYPE: &str = "literal_type";
    pub const VALUE: &str = "value";
    pub const SOURCE: &str = "source";
    pub const IMPORTED: &str = "imported";
    pub const LOCAL: &str = "local";
    pub const IMPORT_KIND: &str = "import_kind";
    pub const TYPE_ONLY: &str = "type_only";
    pub const EXPORTED: &str = "exported";
    pub const EXPORT_KIND: &str = "export_kind";
    pub const CATEGORY: &str = "category";
    pub const CATEGORIES: &str = "categories";
    pub const SEVERITY: &str = "severity";
    pub const MESSAGE: &str = "message";
    pub const PLUGIN: &str = "plugin";
    pub const TARGET: &str = "target";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in NodeKind::ALL {
            assert_eq!(kind.as_str().parse::<NodeKind>().unwrap(), kind);
        }
        assert!("WIDGET".parse::<NodeKind>().is_err());
    }

    #[test]
    fn test_node_builder_sets_attrs() {
        let node = Node::new(NodeId::new("a.js->global->FUNCTION->f"), NodeKind::Function, "f", "a.js")
            .with_position(Position::new(3, 9))
            .with_attr(attrs::ASYNC, true)
            .with_attr(attrs::OFFSET, 42usize)
            .with_opt_attr::<String>(attrs::METHOD_KIND, None);

        assert!(node.attr_bool(attrs::ASYNC));
        assert!(!node.attr_bool(attrs::GENERATOR));
        assert_eq!(node.offset(), Some(42));
        assert!(node.attr(attrs::METHOD_KIND).is_none());
        assert_eq!(node.position.to_string(), "3:9");
    }

    #[test]
    fn test_reserved_attrs_are_dropped() {
        let mut node = Node::new(NodeId::new("a.js->global->VARIABLE->x"), NodeKind::Variable, "x", "a.js")
            .with_attr("metadata", "shadow")
            .with_attr("name", "y")
            .with_attr(attrs::OFFSET, 7usize);
        node.set_attr("id", "other");

        assert_eq!(node.name, "x");
        assert_eq!(node.id.as_str(), "a.js->global->VARIABLE->x");
        for key in RESERVED_ATTRS {
            assert!(node.attr(key).is_none(), "{} kept", key);
        }
        assert_eq!(node.offset(), Some(7));
    }
}
