//! Functions, classes, variables and parameters.

use super::context::{first_named, has_token, named_children, unquote, AnalysisContext};
use super::expressions::{is_function_like, unwrap_transparent};
use crate::facts::{ClassFact, DeclarationKind, FunctionFact, ParameterFact, ScopeFact, ScopeKind, ValueRef, VariableFact};
use crate::id::NodeId;
use crate::node::NodeKind;
use tree_sitter::Node;

/// Label of a function body scope.
pub const BODY_SCOPE: &str = "body";

/// One binding introduced by a declaration.
#[derive(Debug, Clone)]
pub(crate) struct Declared {
    pub name: String,
    pub id: NodeId,
    pub kind: NodeKind,
}

/// A binding identifier found in a declaration pattern, with its initializer.
struct Binding<'t> {
    node: Node<'t>,
    init: Option<ValueRef>,
}

impl<'s> AnalysisContext<'s> {
    /// Visits any function-like node and returns its id.
    ///
    /// `name_hint` names otherwise anonymous functions after the binding or
    /// property they are assigned to.
    pub(crate) fn visit_function(&mut self, node: Node<'_>, name_hint: Option<String>) -> NodeId {
        let is_method = node.kind() == "method_definition"
            && node.parent().map(|p| p.kind() == "class_body").unwrap_or(false);
        let kind = if is_method { NodeKind::Method } else { NodeKind::Function };

        let name_node = node.child_by_field_name("name");
        let declared_name = name_node.and_then(|n| self.member_name(n));

        let (display_name, label, anonymous) = match declared_name.or(name_hint) {
            Some(name) => {
                let label = self.tracker.unique_name(kind, &name);
                (name, label, false)
            }
            None => {
                let label = self.tracker.anonymous_name(kind);
                (label.clone(), label, true)
            }
        };
        let id = self.tracker.compute_id(kind, &label);

        let method_kind = if node.kind() == "method_definition" {
            Some(
                if display_name == "constructor" && is_method {
                    "constructor"
                } else if has_token(node, "get") {
                    "get"
                } else if has_token(node, "set") {
                    "set"
                } else {
                    "method"
                }
                .to_string(),
            )
        } else {
            None
        };

        let position = name_node
            .map(|n| self.position(n))
            .unwrap_or_else(|| self.position(node));
        let class = if is_method { self.current_class() } else { None };
        let index = self.facts.functions.len();
        self.facts.functions.push(FunctionFact {
            id: id.clone(),
            name: display_name,
            kind,
            container: self.container_id(),
            position,
            offset: name_node.unwrap_or(node).start_byte(),
            is_async: has_token(node, "async"),
            is_generator: node.kind().starts_with("generator") || has_token(node, "*"),
            is_arrow: node.kind() == "arrow_function",
            anonymous,
            binds_name: matches!(
                node.kind(),
                "function_declaration" | "generator_function_declaration"
            ),
            method_kind,
            is_static: has_token(node, "static"),
            class: class.clone(),
            body_scope: None,
        });
        self.register_function(node, id.clone());

        // Arrows keep the enclosing `this`; other functions only see a
        // class through their own method definition.
        let this_class = if node.kind() == "arrow_function" {
            self.current_class()
        } else {
            class
        };

        self.tracker.enter_scope(label);
        self.push_container(id.clone(), false, this_class.clone());

        if let Some(parameters) = node.child_by_field_name("parameters") {
            self.visit_parameters(parameters, &id);
        } else if let Some(parameter) = node.child_by_field_name("parameter") {
            self.bind_pattern(parameter, 0, None, false, false, &id);
        }

        if let Some(body) = node.child_by_field_name("body") {
            if body.kind() == "statement_block" {
                let scope_id = self.tracker.compute_id(NodeKind::Scope, BODY_SCOPE);
                self.facts.scopes.push(ScopeFact {
                    id: scope_id.clone(),
                    name: BODY_SCOPE.to_string(),
                    kind: ScopeKind::FunctionBody,
                    parent: id.clone(),
                    position: self.position(body),
                    offset: body.start_byte(),
                    condition: None,
                });
                self.facts.functions[index].body_scope = Some(scope_id.clone());
                self.push_container(scope_id, true, this_class);
                self.visit_block_contents(body);
                self.pop_container();
            } else {
                self.visit_implicit_return(body);
            }
        }

        self.pop_container();
        self.tracker.exit_scope();
        id
    }

    /// Visits a class declaration or expression and returns its id.
    pub(crate) fn visit_class(&mut self, node: Node<'_>, name_hint: Option<String>) -> NodeId {
        let name_node = node.child_by_field_name("name");
        let declared = name_node.map(|n| self.text(n).to_string());

        // The heritage clause is evaluated in the enclosing scope.
        let heritage = named_children(node)
            .into_iter()
            .find(|child| child.kind() == "class_heritage");
        let superclass_node = heritage.and_then(superclass_expression);
        let superclass_name = superclass_node.map(|s| self.text(s).to_string());
        let superclass = superclass_node.map(|s| self.value_of(s));

        let (display_name, label, anonymous) = match declared.or(name_hint) {
            Some(name) => {
                let label = self.tracker.unique_name(NodeKind::Class, &name);
                (name, label, false)
            }
            None => {
                let label = self.tracker.anonymous_name(NodeKind::Class);
                (label.clone(), label, true)
            }
        };
        let id = self.tracker.compute_id(NodeKind::Class, &label);

        self.facts.classes.push(ClassFact {
            id: id.clone(),
            name: display_name,
            container: self.container_id(),
            position: name_node
                .map(|n| self.position(n))
                .unwrap_or_else(|| self.position(node)),
            offset: name_node.unwrap_or(node).start_byte(),
            anonymous,
            binds_name: node.kind() != "class",
            superclass,
            superclass_name,
        });

        self.tracker.enter_scope(label);
        self.push_container(id.clone(), false, Some(id.clone()));
        if let Some(body) = node.child_by_field_name("body") {
            for member in named_children(body) {
                self.visit_class_member(member);
            }
        }
        self.pop_container();
        self.tracker.exit_scope();
        id
    }

    fn visit_class_member(&mut self, member: Node<'_>) {
        match member.kind() {
            "method_definition" => {
                self.visit_function(member, None);
            }
            "field_definition" | "public_field_definition" => {
                let name = member
                    .child_by_field_name("property")
                    .or_else(|| member.child_by_field_name("name"))
                    .and_then(|p| self.member_name(p));
                if let Some(value) = member.child_by_field_name("value") {
                    let value = unwrap_transparent(value);
                    if is_function_like(value) {
                        self.visit_function(value, name);
                    } else {
                        self.visit_effects(value);
                    }
                }
            }
            "class_static_block" => {
                if let Some(body) = member.child_by_field_name("body") {
                    self.visit_block_contents(body);
                }
            }
            "decorator" | "comment" | "index_signature" | "method_signature"
            | "abstract_method_signature" => {}
            _ => self.visit_effects(member),
        }
    }

    /// `var`, `let` and `const` declarations. Returns the bindings.
    pub(crate) fn visit_variable_declaration(&mut self, node: Node<'_>) -> Vec<Declared> {
        let declaration = declaration_kind(self.text(node));
        let mut declared = Vec::new();
        for declarator in named_children(node) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name) = declarator.child_by_field_name("name") else {
                continue;
            };
            let value = declarator.child_by_field_name("value");
            declared.extend(self.declare(name, value, declaration));
        }
        declared
    }

    /// Declares the bindings of `pattern`, initialized from `value`.
    pub(crate) fn declare(
        &mut self,
        pattern: Node<'_>,
        value: Option<Node<'_>>,
        declaration: DeclarationKind,
    ) -> Vec<Declared> {
        if pattern.kind() == "identifier" {
            let name = self.text(pattern).to_string();
            let id = self.declare_variable_id(&name, declaration);
            let init = value.map(|v| {
                let v = unwrap_transparent(v);
                if is_function_like(v) {
                    ValueRef::node(self.visit_function(v, Some(name.clone())), NodeKind::Function)
                } else if v.kind() == "class" {
                    ValueRef::node(self.visit_class(v, Some(name.clone())), NodeKind::Class)
                } else {
                    self.value_of(v)
                }
            });
            let declared = self.push_variable(id, name, declaration, pattern, init, false);
            return vec![declared];
        }

        let source = value.map(|v| self.value_of(v));
        let mut bindings = Vec::new();
        self.collect_bindings(pattern, source, &mut bindings);
        bindings
            .into_iter()
            .map(|binding| {
                let name = self.text(binding.node).to_string();
                let id = self.declare_variable_id(&name, declaration);
                self.push_variable(id, name, declaration, binding.node, binding.init, true)
            })
            .collect()
    }

    fn declare_variable_id(&mut self, name: &str, declaration: DeclarationKind) -> NodeId {
        let kind = variable_kind(declaration);
        if declaration == DeclarationKind::Var {
            let depth = self.var_target().depth;
            self.tracker.unique_id_at(depth, kind, name)
        } else {
            self.tracker.unique_id(kind, name)
        }
    }

    fn push_variable(
        &mut self,
        id: NodeId,
        name: String,
        declaration: DeclarationKind,
        binding: Node<'_>,
        init: Option<ValueRef>,
        destructured: bool,
    ) -> Declared {
        let kind = variable_kind(declaration);
        let container = if declaration == DeclarationKind::Var {
            self.var_target().id.clone()
        } else {
            self.container_id()
        };
        self.facts.variables.push(VariableFact {
            id: id.clone(),
            name: name.clone(),
            kind,
            declaration,
            container,
            position: self.position(binding),
            offset: binding.start_byte(),
            init,
            destructured,
        });
        Declared { name, id, kind }
    }

    fn visit_parameters(&mut self, parameters: Node<'_>, function: &NodeId) {
        let mut index = 0;
        for parameter in named_children(parameters) {
            match parameter.kind() {
                "decorator" => continue,
                // TypeScript `this` parameters are type annotations only.
                "required_parameter" | "optional_parameter"
                    if parameter
                        .child_by_field_name("pattern")
                        .map(|p| p.kind() == "this")
                        .unwrap_or(false) =>
                {
                    continue
                }
                _ => {}
            }
            match parameter.kind() {
                "required_parameter" | "optional_parameter" => {
                    let default = parameter
                        .child_by_field_name("value")
                        .map(|v| self.value_of(v));
                    if let Some(pattern) = parameter.child_by_field_name("pattern") {
                        self.bind_pattern(pattern, index, default, false, false, function);
                    }
                }
                _ => self.bind_pattern(parameter, index, None, false, false, function),
            }
            index += 1;
        }
    }

    /// Binds every identifier in a parameter pattern.
    fn bind_pattern(
        &mut self,
        pattern: Node<'_>,
        index: u32,
        default: Option<ValueRef>,
        rest: bool,
        destructured: bool,
        function: &NodeId,
    ) {
        match pattern.kind() {
            "identifier" | "shorthand_property_identifier_pattern" => {
                let name = self.text(pattern).to_string();
                let id = self.tracker.unique_id(NodeKind::Parameter, &name);
                self.facts.parameters.push(ParameterFact {
                    id,
                    name,
                    function: function.clone(),
                    index,
                    position: self.position(pattern),
                    offset: pattern.start_byte(),
                    rest,
                    default,
                    destructured,
                });
            }
            "assignment_pattern" | "object_assignment_pattern" => {
                let default = pattern
                    .child_by_field_name("right")
                    .map(|v| self.value_of(v));
                if let Some(left) = pattern.child_by_field_name("left") {
                    self.bind_pattern(left, index, default, rest, destructured, function);
                }
            }
            "rest_pattern" => {
                if let Some(inner) = first_named(pattern) {
                    self.bind_pattern(inner, index, None, true, destructured, function);
                }
            }
            "object_pattern" | "array_pattern" => {
                for element in named_children(pattern) {
                    let target = if element.kind() == "pair_pattern" {
                        element.child_by_field_name("value")
                    } else {
                        Some(element)
                    };
                    if let Some(target) = target {
                        self.bind_pattern(target, index, None, rest, true, function);
                    }
                }
            }
            _ => {
                self.facts.note_unsupported("parameter_pattern");
            }
        }
    }

    /// Collects the bindings of a destructuring declaration pattern. Each
    /// binding is initialized from a member read of `source`.
    fn collect_bindings<'t>(
        &mut self,
        pattern: Node<'t>,
        source: Option<ValueRef>,
        out: &mut Vec<Binding<'t>>,
    ) {
        match pattern.kind() {
            "identifier" | "shorthand_property_identifier_pattern" => out.push(Binding {
                node: pattern,
                init: source,
            }),
            "assignment_pattern" | "object_assignment_pattern" => {
                if let Some(right) = pattern.child_by_field_name("right") {
                    self.visit_effects(right);
                }
                if let Some(left) = pattern.child_by_field_name("left") {
                    self.collect_bindings(left, source, out);
                }
            }
            "rest_pattern" => {
                if let Some(inner) = first_named(pattern) {
                    self.collect_bindings(inner, source, out);
                }
            }
            "object_pattern" => {
                for element in named_children(pattern) {
                    let (property, target) = match element.kind() {
                        "pair_pattern" => (
                            element
                                .child_by_field_name("key")
                                .map(|k| unquote(self.text(k))),
                            element.child_by_field_name("value"),
                        ),
                        "shorthand_property_identifier_pattern" => {
                            (Some(self.text(element).to_string()), Some(element))
                        }
                        "object_assignment_pattern" => (
                            element
                                .child_by_field_name("left")
                                .map(|l| self.text(l).to_string()),
                            Some(element),
                        ),
                        // `...rest` keeps the remaining object.
                        "rest_pattern" => (None, Some(element)),
                        _ => (None, None),
                    };
                    let Some(target) = target else { continue };
                    let init = match (&source, element.kind()) {
                        (Some(src), "rest_pattern") => Some(src.clone()),
                        (Some(src), _) => Some(self.destructured_member(
                            src,
                            property,
                            self.position(element),
                            element.start_byte(),
                        )),
                        (None, _) => None,
                    };
                    self.collect_bindings(target, init, out);
                }
            }
            "array_pattern" => {
                for element in named_children(pattern) {
                    let init = source.as_ref().map(|src| {
                        self.destructured_member(src, None, self.position(element), element.start_byte())
                    });
                    self.collect_bindings(element, init, out);
                }
            }
            _ => {
                self.facts.note_unsupported("binding_pattern");
            }
        }
    }
}

fn superclass_expression(heritage: Node<'_>) -> Option<Node<'_>> {
    let children = named_children(heritage);
    match children.iter().find(|c| c.kind() == "extends_clause") {
        Some(extends) => extends
            .child_by_field_name("value")
            .or_else(|| first_named(*extends)),
        None => children
            .into_iter()
            .find(|c| c.kind() != "implements_clause"),
    }
}

fn declaration_kind(text: &str) -> DeclarationKind {
    let keyword = text.split_whitespace().next().unwrap_or_default();
    match keyword {
        "const" => DeclarationKind::Const,
        "let" => DeclarationKind::Let,
        _ => DeclarationKind::Var,
    }
}

fn variable_kind(declaration: DeclarationKind) -> NodeKind {
    match declaration {
        DeclarationKind::Const => NodeKind::Constant,
        _ => NodeKind::Variable,
    }
}
