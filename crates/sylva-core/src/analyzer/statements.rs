//! Statements, control flow, returns, yields and reassignments.

use super::context::{first_named, has_token, named_children, AnalysisContext};
use super::expressions::unwrap_transparent;
use crate::facts::{AssignmentFact, DeclarationKind, ReturnFact, ScopeFact, ScopeKind, ValueRef, YieldFact, YieldKind};
use crate::node::NodeKind;
use tree_sitter::Node;

/// TypeScript declarations that carry no runtime values.
const TYPE_DECLARATIONS: [&str; 6] = [
    "interface_declaration",
    "type_alias_declaration",
    "enum_declaration",
    "ambient_declaration",
    "module",
    "internal_module",
];

impl<'s> AnalysisContext<'s> {
    /// Visits one statement.
    pub(crate) fn visit(&mut self, node: Node<'_>) {
        if !self.descend() {
            return;
        }
        match node.kind() {
            "comment" | "empty_statement" | "break_statement" | "continue_statement"
            | "debugger_statement" | "hash_bang_line" => {}
            "function_declaration" | "generator_function_declaration" => {
                self.visit_function(node, None);
            }
            "class_declaration" | "abstract_class_declaration" => {
                self.visit_class(node, None);
            }
            "lexical_declaration" | "variable_declaration" => {
                self.visit_variable_declaration(node);
            }
            "expression_statement" => {
                for child in named_children(node) {
                    self.visit_effects(child);
                }
            }
            "return_statement" => self.visit_return(node),
            "throw_statement" => {
                for child in named_children(node) {
                    self.visit_effects(child);
                }
            }
            "import_statement" => self.visit_import(node),
            "export_statement" => self.visit_export(node),
            "if_statement" => self.visit_if(node),
            "for_statement" => self.visit_for(node),
            "for_in_statement" => self.visit_for_in(node),
            "while_statement" => self.visit_loop(node, "while"),
            "do_statement" => self.visit_loop(node, "do-while"),
            "switch_statement" => self.visit_switch(node),
            "try_statement" => self.visit_try(node),
            "statement_block" => {
                self.with_scope(node, "block", ScopeKind::Block, None, |ctx| {
                    ctx.visit_block_contents(node)
                });
            }
            "labeled_statement" => {
                self.facts.note_unsupported("label");
                if let Some(body) = node.child_by_field_name("body") {
                    self.visit(body);
                }
            }
            "with_statement" => {
                self.facts.note_unsupported("with");
                for child in named_children(node) {
                    self.visit_effects(child);
                }
            }
            kind if TYPE_DECLARATIONS.contains(&kind) => {
                self.facts.note_unsupported(kind);
            }
            _ => self.visit_effects(node),
        }
        self.ascend();
    }

    /// Visits the statements of a block without opening a scope for it.
    pub(crate) fn visit_block_contents(&mut self, block: Node<'_>) {
        for statement in named_children(block) {
            self.visit(statement);
        }
    }

    /// Opens a synthetic scope labelled `kind[n]` around `body`.
    fn with_scope<F>(
        &mut self,
        node: Node<'_>,
        label_kind: &str,
        kind: ScopeKind,
        condition: Option<ValueRef>,
        body: F,
    ) where
        F: FnOnce(&mut Self),
    {
        let label = self.tracker.scoped_label(label_kind);
        let id = self.tracker.compute_id(NodeKind::Scope, &label);
        self.facts.scopes.push(ScopeFact {
            id: id.clone(),
            name: label.clone(),
            kind,
            parent: self.container_id(),
            position: self.position(node),
            offset: node.start_byte(),
            condition,
        });
        let class = self.current_class();
        self.tracker.enter_scope(label);
        self.push_container(id, false, class);
        body(self);
        self.pop_container();
        self.tracker.exit_scope();
    }

    /// Visits a statement as the body of a scope that is already open.
    fn visit_scope_body(&mut self, body: Node<'_>) {
        if body.kind() == "statement_block" {
            self.visit_block_contents(body);
        } else {
            self.visit(body);
        }
    }

    fn condition_of(&mut self, node: Option<Node<'_>>) -> Option<ValueRef> {
        let node = node?;
        // `for (;;)` conditions are expression statements.
        let node = if node.kind() == "expression_statement" {
            first_named(node)?
        } else {
            node
        };
        if node.kind() == "empty_statement" {
            return None;
        }
        Some(self.value_of(node))
    }

    fn visit_if(&mut self, node: Node<'_>) {
        let condition = self.condition_of(node.child_by_field_name("condition"));
        if let Some(consequence) = node.child_by_field_name("consequence") {
            self.with_scope(node, "if", ScopeKind::If, condition, |ctx| {
                ctx.visit_scope_body(consequence)
            });
        }
        if let Some(alternative) = node.child_by_field_name("alternative") {
            // `else_clause` wraps the alternative statement.
            let body = if alternative.kind() == "else_clause" {
                first_named(alternative)
            } else {
                Some(alternative)
            };
            if let Some(body) = body {
                self.with_scope(alternative, "else", ScopeKind::Else, None, |ctx| {
                    ctx.visit_scope_body(body)
                });
            }
        }
    }

    fn visit_for(&mut self, node: Node<'_>) {
        self.with_scope(node, "for", ScopeKind::Loop, None, |ctx| {
            if let Some(initializer) = node.child_by_field_name("initializer") {
                ctx.visit(initializer);
            }
            let condition = ctx.condition_of(node.child_by_field_name("condition"));
            ctx.set_current_condition(condition);
            if let Some(increment) = node.child_by_field_name("increment") {
                ctx.visit_effects(increment);
            }
            if let Some(body) = node.child_by_field_name("body") {
                ctx.visit_scope_body(body);
            }
        });
    }

    fn visit_for_in(&mut self, node: Node<'_>) {
        let label = if has_token(node, "of") { "for-of" } else { "for-in" };
        let right = node.child_by_field_name("right");
        let iterated = right.map(|r| self.value_of(r));
        self.with_scope(node, label, ScopeKind::Loop, iterated, |ctx| {
            if let Some(left) = node.child_by_field_name("left") {
                let declaration = [
                    ("const", DeclarationKind::Const),
                    ("let", DeclarationKind::Let),
                    ("var", DeclarationKind::Var),
                ]
                .into_iter()
                .find(|(keyword, _)| has_token(node, keyword))
                .map(|(_, declaration)| declaration);
                match declaration {
                    Some(declaration) => {
                        ctx.declare(left, None, declaration);
                    }
                    None => ctx.facts.note_unsupported("loop_target_assignment"),
                }
            }
            if let Some(body) = node.child_by_field_name("body") {
                ctx.visit_scope_body(body);
            }
        });
    }

    fn visit_loop(&mut self, node: Node<'_>, label: &str) {
        self.with_scope(node, label, ScopeKind::Loop, None, |ctx| {
            // `do { } while (c)` evaluates the condition after the body.
            let body = node.child_by_field_name("body");
            if label == "do-while" {
                if let Some(body) = body {
                    ctx.visit_scope_body(body);
                }
            }
            let condition = ctx.condition_of(node.child_by_field_name("condition"));
            ctx.set_current_condition(condition);
            if label != "do-while" {
                if let Some(body) = body {
                    ctx.visit_scope_body(body);
                }
            }
        });
    }

    fn visit_switch(&mut self, node: Node<'_>) {
        let discriminant = self.condition_of(node.child_by_field_name("value"));
        self.with_scope(node, "switch", ScopeKind::Switch, discriminant, |ctx| {
            let Some(body) = node.child_by_field_name("body") else {
                return;
            };
            for case in named_children(body) {
                if let Some(value) = case.child_by_field_name("value") {
                    ctx.visit_effects(value);
                }
                let mut cursor = case.walk();
                let statements: Vec<_> = case
                    .children_by_field_name("body", &mut cursor)
                    .filter(|s| s.is_named())
                    .collect();
                for statement in statements {
                    ctx.visit(statement);
                }
            }
        });
    }

    fn visit_try(&mut self, node: Node<'_>) {
        if let Some(body) = node.child_by_field_name("body") {
            self.with_scope(body, "try", ScopeKind::Try, None, |ctx| {
                ctx.visit_block_contents(body)
            });
        }
        if let Some(handler) = node.child_by_field_name("handler") {
            self.with_scope(handler, "catch", ScopeKind::Catch, None, |ctx| {
                if let Some(parameter) = handler.child_by_field_name("parameter") {
                    ctx.declare(parameter, None, DeclarationKind::Catch);
                }
                if let Some(body) = handler.child_by_field_name("body") {
                    ctx.visit_block_contents(body);
                }
            });
        }
        if let Some(finalizer) = node.child_by_field_name("finalizer") {
            self.with_scope(finalizer, "finally", ScopeKind::Finally, None, |ctx| {
                if let Some(body) = finalizer.child_by_field_name("body") {
                    ctx.visit_block_contents(body);
                }
            });
        }
    }

    /// Loop conditions are evaluated inside the loop scope, after the scope
    /// fact was recorded.
    fn set_current_condition(&mut self, condition: Option<ValueRef>) {
        let Some(condition) = condition else { return };
        let current = self.container_id();
        if let Some(scope) = self.facts.scopes.iter_mut().rev().find(|s| s.id == current) {
            scope.condition = Some(condition);
        }
    }

    fn visit_return(&mut self, node: Node<'_>) {
        let Some(argument) = first_named(node) else {
            return;
        };
        let Some(function) = self.enclosing_function(node) else {
            self.facts.note_unsupported("top_level_return");
            self.visit_effects(argument);
            return;
        };
        let value = self.value_of(argument);
        self.facts.returns.push(ReturnFact {
            function,
            value,
            implicit: false,
            position: self.position(node),
        });
    }

    /// The expression body of an arrow function.
    pub(crate) fn visit_implicit_return(&mut self, body: Node<'_>) {
        let Some(function) = self.enclosing_function(body) else {
            return;
        };
        let value = self.value_of(body);
        self.facts.returns.push(ReturnFact {
            function,
            value,
            implicit: true,
            position: self.position(body),
        });
    }

    pub(crate) fn visit_yield(&mut self, node: Node<'_>) {
        let kind = if has_token(node, "*") {
            YieldKind::Delegate
        } else {
            YieldKind::Yield
        };
        let argument = first_named(node);
        let Some(function) = self.enclosing_function(node) else {
            self.facts.note_unsupported("top_level_yield");
            return;
        };
        let value = argument.map(|a| self.value_of(a));
        self.facts.yields.push(YieldFact {
            function,
            kind,
            value,
            position: self.position(node),
        });
    }

    pub(crate) fn assignment_operator(&self, node: Node<'_>) -> String {
        node.child_by_field_name("operator")
            .map(|op| self.text(op).to_string())
            .unwrap_or_else(|| "=".to_string())
    }

    /// Records a reassignment of a bare identifier and returns the assigned
    /// value. Property writes and destructuring assignments only have their
    /// nested calls visited.
    pub(crate) fn visit_assignment(&mut self, node: Node<'_>) -> Option<ValueRef> {
        let left = node.child_by_field_name("left").map(unwrap_transparent)?;
        let right = node.child_by_field_name("right")?;
        match left.kind() {
            "identifier" => {
                let value = self.value_of(right);
                let operator = self.assignment_operator(node);
                self.facts.assignments.push(AssignmentFact {
                    name: self.text(left).to_string(),
                    container: self.container_id(),
                    operator,
                    value: value.clone(),
                    position: self.position(left),
                    offset: left.start_byte(),
                });
                Some(value)
            }
            "object_pattern" | "array_pattern" => {
                self.facts.note_unsupported("destructuring_assignment");
                self.visit_effects(right);
                None
            }
            _ => {
                self.facts.note_unsupported("property_assignment");
                self.visit_effects(left);
                self.visit_effects(right);
                None
            }
        }
    }
}
