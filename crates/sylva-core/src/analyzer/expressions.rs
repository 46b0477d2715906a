//! Value derivation.
//!
//! [`AnalysisContext::value_of`] is the one routine every value-producing
//! site goes through: initializers, reassignments, returns, yields and call
//! arguments. Compound expressions become `EXPRESSION` facts with one
//! operand reference per directly-named operand; nested compounds are
//! materialized recursively, literal operands are dropped.

use super::context::{first_named, has_token, named_children, AnalysisContext};
use crate::facts::{CallFact, ExpressionFact, ExpressionShape, LiteralFact, LiteralType, ValueRef};
use crate::node::{NodeKind, Position};
use tree_sitter::Node;

const MAX_LITERAL_LEN: usize = 80;

const LOGICAL_OPERATORS: [&str; 3] = ["&&", "||", "??"];

/// Peels parentheses and TypeScript-only wrappers.
pub(crate) fn unwrap_transparent(mut node: Node<'_>) -> Node<'_> {
    loop {
        let inner = match node.kind() {
            "parenthesized_expression" | "as_expression" | "satisfies_expression"
            | "non_null_expression" => first_named(node),
            "type_assertion" => named_children(node).into_iter().last(),
            _ => None,
        };
        match inner {
            Some(inner) => node = inner,
            None => return node,
        }
    }
}

pub(crate) fn literal_type(node: Node<'_>) -> Option<LiteralType> {
    match node.kind() {
        "string" => Some(LiteralType::String),
        "number" => Some(LiteralType::Number),
        "true" | "false" => Some(LiteralType::Boolean),
        "null" => Some(LiteralType::Null),
        "undefined" => Some(LiteralType::Undefined),
        "regex" => Some(LiteralType::Regex),
        "template_string" if !has_substitution(node) => Some(LiteralType::Template),
        _ => None,
    }
}

fn has_substitution(node: Node<'_>) -> bool {
    named_children(node)
        .iter()
        .any(|child| child.kind() == "template_substitution")
}

impl<'s> AnalysisContext<'s> {
    /// Derives the value an expression produces.
    pub(crate) fn value_of(&mut self, node: Node<'_>) -> ValueRef {
        let node = unwrap_transparent(node);
        if !self.descend() {
            return ValueRef::Unsupported {
                construct: "nesting".to_string(),
            };
        }
        let value = self.derive(node);
        self.ascend();
        value
    }

    /// Like [`value_of`](Self::value_of), but literal operands produce no
    /// reference.
    pub(crate) fn operand_of(&mut self, node: Node<'_>) -> Option<ValueRef> {
        let node = unwrap_transparent(node);
        if literal_type(node).is_some() {
            return None;
        }
        Some(self.value_of(node))
    }

    fn derive(&mut self, node: Node<'_>) -> ValueRef {
        match node.kind() {
            "identifier" | "shorthand_property_identifier" => self.identifier(node),
            "call_expression" => self.visit_call(node),
            "new_expression" => self.visit_construction(node),
            "function_expression" | "function" | "generator_function" | "arrow_function" => {
                let id = self.visit_function(node, None);
                ValueRef::node(id, NodeKind::Function)
            }
            "class" => {
                let id = self.visit_class(node, None);
                ValueRef::node(id, NodeKind::Class)
            }
            "binary_expression" => {
                let operator = node
                    .child_by_field_name("operator")
                    .map(|op| self.text(op).to_string());
                let shape = match operator.as_deref() {
                    Some(op) if LOGICAL_OPERATORS.contains(&op) => ExpressionShape::Logical,
                    _ => ExpressionShape::Binary,
                };
                let operands = ["left", "right"]
                    .iter()
                    .filter_map(|field| node.child_by_field_name(field))
                    .collect::<Vec<_>>();
                self.compound(node, shape, operator, None, false, &operands)
            }
            "ternary_expression" => {
                let operands = ["condition", "consequence", "alternative"]
                    .iter()
                    .filter_map(|field| node.child_by_field_name(field))
                    .collect::<Vec<_>>();
                self.compound(node, ExpressionShape::Conditional, None, None, false, &operands)
            }
            "member_expression" => {
                let property = node
                    .child_by_field_name("property")
                    .map(|p| self.text(p).to_string());
                let operands: Vec<_> = node.child_by_field_name("object").into_iter().collect();
                self.compound(node, ExpressionShape::Member, None, property, false, &operands)
            }
            "subscript_expression" => {
                let operands = ["object", "index"]
                    .iter()
                    .filter_map(|field| node.child_by_field_name(field))
                    .collect::<Vec<_>>();
                self.compound(node, ExpressionShape::Member, None, None, true, &operands)
            }
            "template_string" => {
                if let Some(literal) = literal_type(node) {
                    return self.literal(node, literal);
                }
                let operands = named_children(node)
                    .into_iter()
                    .filter(|child| child.kind() == "template_substitution")
                    .filter_map(first_named)
                    .collect::<Vec<_>>();
                self.compound(node, ExpressionShape::Template, None, None, false, &operands)
            }
            "unary_expression" | "update_expression" => {
                let shape = if node.kind() == "unary_expression" {
                    ExpressionShape::Unary
                } else {
                    ExpressionShape::Update
                };
                let operator = node
                    .child_by_field_name("operator")
                    .map(|op| self.text(op).to_string());
                let operands: Vec<_> = node.child_by_field_name("argument").into_iter().collect();
                self.compound(node, shape, operator, None, false, &operands)
            }
            "await_expression" => {
                let operands: Vec<_> = first_named(node).into_iter().collect();
                self.compound(node, ExpressionShape::Await, None, None, false, &operands)
            }
            "array" => {
                let operands = named_children(node);
                self.compound(node, ExpressionShape::Array, None, None, false, &operands)
            }
            "object" => self.object_expression(node),
            "sequence_expression" => {
                let operands = named_children(node);
                self.compound(node, ExpressionShape::Sequence, None, None, false, &operands)
            }
            "spread_element" => {
                let operands: Vec<_> = first_named(node).into_iter().collect();
                self.compound(node, ExpressionShape::Spread, Some("...".to_string()), None, false, &operands)
            }
            "assignment_expression" | "augmented_assignment_expression" => {
                let operator = self.assignment_operator(node);
                match self.visit_assignment(node) {
                    Some(value) => self.expression_fact(
                        node,
                        ExpressionShape::Assignment,
                        Some(operator),
                        None,
                        false,
                        vec![value],
                    ),
                    None => self.unsupported("member_assignment_value"),
                }
            }
            "yield_expression" => {
                self.visit_yield(node);
                self.unsupported("yield_value")
            }
            kind => {
                if let Some(literal) = literal_type(node) {
                    return self.literal(node, literal);
                }
                let category = match kind {
                    "this" | "super" => kind,
                    k if k.starts_with("jsx") => "jsx",
                    _ => "expression",
                };
                self.visit_effects(node);
                self.unsupported(category)
            }
        }
    }

    /// Visits an expression only for the calls, functions and classes nested
    /// in it. No value node is materialized for the expression itself.
    pub(crate) fn visit_effects(&mut self, node: Node<'_>) {
        let node = unwrap_transparent(node);
        match node.kind() {
            "call_expression" | "new_expression" | "function_expression" | "function"
            | "generator_function" | "arrow_function" | "class" => {
                self.value_of(node);
            }
            "assignment_expression" | "augmented_assignment_expression" => {
                self.visit_assignment(node);
            }
            "yield_expression" => self.visit_yield(node),
            "method_definition" => {
                self.visit_function(node, None);
            }
            _ => {
                if !self.descend() {
                    return;
                }
                for child in named_children(node) {
                    self.visit_effects(child);
                }
                self.ascend();
            }
        }
    }

    fn object_expression(&mut self, node: Node<'_>) -> ValueRef {
        let id = self.expression_id(ExpressionShape::Object);
        let mut operands = Vec::new();
        for member in named_children(node) {
            match member.kind() {
                "pair" => {
                    let key = member
                        .child_by_field_name("key")
                        .and_then(|k| self.member_name(k));
                    if let Some(value) = member.child_by_field_name("value") {
                        let value = unwrap_transparent(value);
                        if is_function_like(value) {
                            let fid = self.visit_function(value, key);
                            operands.push(ValueRef::node(fid, NodeKind::Function));
                        } else if let Some(operand) = self.operand_of(value) {
                            operands.push(operand);
                        }
                    }
                }
                "method_definition" => {
                    let fid = self.visit_function(member, None);
                    operands.push(ValueRef::node(fid, NodeKind::Function));
                }
                _ => {
                    if let Some(operand) = self.operand_of(member) {
                        operands.push(operand);
                    }
                }
            }
        }
        self.push_expression(node, id, ExpressionShape::Object, None, None, false, operands)
    }

    fn compound(
        &mut self,
        node: Node<'_>,
        shape: ExpressionShape,
        operator: Option<String>,
        property: Option<String>,
        computed: bool,
        operand_nodes: &[Node<'_>],
    ) -> ValueRef {
        let id = self.expression_id(shape);
        let operands = operand_nodes
            .iter()
            .filter_map(|operand| self.operand_of(*operand))
            .collect();
        self.push_expression(node, id, shape, operator, property, computed, operands)
    }

    fn expression_fact(
        &mut self,
        node: Node<'_>,
        shape: ExpressionShape,
        operator: Option<String>,
        property: Option<String>,
        computed: bool,
        operands: Vec<ValueRef>,
    ) -> ValueRef {
        let id = self.expression_id(shape);
        let operands = operands
            .into_iter()
            .filter(|operand| !matches!(operand, ValueRef::Node { kind: NodeKind::Literal, .. }))
            .collect();
        self.push_expression(node, id, shape, operator, property, computed, operands)
    }

    fn expression_id(&mut self, shape: ExpressionShape) -> crate::id::NodeId {
        let label = self.tracker.scoped_label(shape.as_str());
        self.tracker.compute_id(NodeKind::Expression, &label)
    }

    #[allow(clippy::too_many_arguments)]
    fn push_expression(
        &mut self,
        node: Node<'_>,
        id: crate::id::NodeId,
        shape: ExpressionShape,
        operator: Option<String>,
        property: Option<String>,
        computed: bool,
        operands: Vec<ValueRef>,
    ) -> ValueRef {
        self.facts.expressions.push(ExpressionFact {
            id: id.clone(),
            shape,
            operator,
            property,
            computed,
            operands,
            position: Some(self.position(node)),
            offset: Some(node.start_byte()),
        });
        ValueRef::node(id, NodeKind::Expression)
    }

    /// Member read synthesized for a destructured binding: `const { a } = obj`
    /// reads `obj.a`.
    pub(crate) fn destructured_member(
        &mut self,
        source: &ValueRef,
        property: Option<String>,
        position: Position,
        offset: usize,
    ) -> ValueRef {
        let id = self.expression_id(ExpressionShape::Member);
        let computed = property.is_none();
        let operands = match source {
            ValueRef::Unsupported { .. } => Vec::new(),
            other => vec![other.clone()],
        };
        self.facts.expressions.push(ExpressionFact {
            id: id.clone(),
            shape: ExpressionShape::Member,
            operator: None,
            property,
            computed,
            operands,
            position: Some(position),
            offset: Some(offset),
        });
        ValueRef::node(id, NodeKind::Expression)
    }

    fn literal(&mut self, node: Node<'_>, literal_type: LiteralType) -> ValueRef {
        let label = self.tracker.scoped_label("literal");
        let id = self.tracker.compute_id(NodeKind::Literal, &label);
        let mut value: String = self.text(node).chars().take(MAX_LITERAL_LEN).collect();
        if value.len() < self.text(node).len() {
            value.push_str("...");
        }
        self.facts.literals.push(LiteralFact {
            id: id.clone(),
            literal_type,
            value,
            position: self.position(node),
            offset: node.start_byte(),
        });
        ValueRef::node(id, NodeKind::Literal)
    }

    /// `foo(...)` or `obj.foo(...)`.
    pub(crate) fn visit_call(&mut self, node: Node<'_>) -> ValueRef {
        let Some(function) = node.child_by_field_name("function") else {
            return self.unsupported("call");
        };
        let callee_node = unwrap_transparent(function);
        let callee_text = self.text(callee_node).to_string();
        let optional = has_token(node, "?.") || has_optional_chain(node);

        let (kind, name, name_node, callee, object, object_ref) = match callee_node.kind() {
            "identifier" => (
                NodeKind::Call,
                callee_text.clone(),
                callee_node,
                Some(self.identifier(callee_node)),
                None,
                None,
            ),
            "member_expression" => {
                let property = callee_node.child_by_field_name("property");
                let object_node = callee_node.child_by_field_name("object").map(unwrap_transparent);
                let name = property
                    .map(|p| self.text(p).to_string())
                    .unwrap_or_else(|| "<member>".to_string());
                let object = object_node.map(|o| self.text(o).to_string());
                let object_ref = match object_node {
                    Some(o) if o.kind() == "this" => None,
                    Some(o) => Some(self.value_of(o)),
                    None => None,
                };
                (
                    NodeKind::MethodCall,
                    name,
                    property.unwrap_or(callee_node),
                    None,
                    object,
                    object_ref,
                )
            }
            "subscript_expression" => {
                self.facts.note_unsupported("computed_member_call");
                let object_node = callee_node.child_by_field_name("object").map(unwrap_transparent);
                let object = object_node.map(|o| self.text(o).to_string());
                self.visit_effects(callee_node);
                (NodeKind::MethodCall, "<computed>".to_string(), callee_node, None, object, None)
            }
            "super" | "import" => (
                NodeKind::Call,
                callee_text.clone(),
                callee_node,
                Some(self.unsupported(callee_node.kind())),
                None,
                None,
            ),
            _ => {
                let callee = self.value_of(callee_node);
                (NodeKind::Call, "<expression>".to_string(), callee_node, Some(callee), None, None)
            }
        };

        let id = self.tracker.unique_id(kind, &name);
        let position = self.position(name_node);
        let enclosing_class = self.current_class();
        let container = self.container_id();
        let index = self.facts.calls.len();
        self.facts.calls.push(CallFact {
            id: id.clone(),
            kind,
            name,
            callee_text,
            callee,
            object,
            object_ref,
            container,
            enclosing_class,
            position,
            offset: node.start_byte(),
            optional,
            arguments: Vec::new(),
        });

        let arguments = self.arguments(node);
        self.facts.calls[index].arguments = arguments;
        ValueRef::node(id, kind)
    }

    /// `new Foo(...)`.
    pub(crate) fn visit_construction(&mut self, node: Node<'_>) -> ValueRef {
        let constructor = node.child_by_field_name("constructor").map(unwrap_transparent);
        let (name, name_node, callee, object) = match constructor {
            Some(c) if c.kind() == "identifier" => {
                (self.text(c).to_string(), c, Some(self.identifier(c)), None)
            }
            Some(c) if c.kind() == "member_expression" => {
                let property = c.child_by_field_name("property");
                let object = c
                    .child_by_field_name("object")
                    .map(|o| self.text(unwrap_transparent(o)).to_string());
                let name = property
                    .map(|p| self.text(p).to_string())
                    .unwrap_or_else(|| "<member>".to_string());
                (name, property.unwrap_or(c), None, object)
            }
            Some(c) => {
                let callee = self.value_of(c);
                ("<expression>".to_string(), c, Some(callee), None)
            }
            None => ("<expression>".to_string(), node, None, None),
        };
        let callee_text = constructor
            .map(|c| self.text(c).to_string())
            .unwrap_or_default();

        let id = self.tracker.unique_id(NodeKind::ConstructorCall, &name);
        let position = self.position(name_node);
        let enclosing_class = self.current_class();
        let container = self.container_id();
        let index = self.facts.constructions.len();
        self.facts.constructions.push(CallFact {
            id: id.clone(),
            kind: NodeKind::ConstructorCall,
            name,
            callee_text,
            callee,
            object,
            object_ref: None,
            container,
            enclosing_class,
            position,
            offset: node.start_byte(),
            optional: false,
            arguments: Vec::new(),
        });

        let arguments = self.arguments(node);
        self.facts.constructions[index].arguments = arguments;
        ValueRef::node(id, NodeKind::ConstructorCall)
    }

    fn arguments(&mut self, node: Node<'_>) -> Vec<ValueRef> {
        match node.child_by_field_name("arguments") {
            Some(args) if args.kind() == "arguments" => named_children(args)
                .into_iter()
                .map(|arg| self.value_of(arg))
                .collect(),
            Some(template) => {
                // Tagged template: the template is not an argument list.
                self.visit_effects(template);
                Vec::new()
            }
            None => Vec::new(),
        }
    }
}

pub(crate) fn is_function_like(node: Node<'_>) -> bool {
    matches!(
        node.kind(),
        "function_expression" | "function" | "generator_function" | "arrow_function"
    )
}

fn has_optional_chain(node: Node<'_>) -> bool {
    named_children(node)
        .iter()
        .any(|child| child.kind() == "optional_chain")
        || node
            .child_by_field_name("function")
            .map(|f| {
                named_children(f)
                    .iter()
                    .any(|child| child.kind() == "optional_chain")
                    || has_token(f, "?.")
            })
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> tree_sitter::Tree {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_javascript::language())
            .unwrap();
        parser.parse(source, None).unwrap()
    }

    #[test]
    fn test_unwrap_transparent_peels_parentheses() {
        let tree = parse("((x));");
        let statement = tree.root_node().named_child(0).unwrap();
        let expression = statement.named_child(0).unwrap();
        assert_eq!(expression.kind(), "parenthesized_expression");
        assert_eq!(unwrap_transparent(expression).kind(), "identifier");
    }

    #[test]
    fn test_literal_type_ignores_templates_with_substitutions() {
        let tree = parse("`a${b}`; `plain`;");
        let root = tree.root_node();
        let with_sub = root.named_child(0).unwrap().named_child(0).unwrap();
        let plain = root.named_child(1).unwrap().named_child(0).unwrap();
        assert_eq!(literal_type(with_sub), None);
        assert_eq!(literal_type(plain), Some(LiteralType::Template));
    }
}
