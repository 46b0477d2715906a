//! Traversal state for one file.

use crate::facts::{FileFacts, ValueRef};
use crate::id::NodeId;
use crate::node::Position;
use crate::scope::ScopeTracker;
use std::collections::HashMap;
use tree_sitter::Node;

/// Syntax kinds that open a function.
pub(crate) const FUNCTION_KINDS: [&str; 7] = [
    "function_declaration",
    "generator_function_declaration",
    "function_expression",
    "function",
    "generator_function",
    "arrow_function",
    "method_definition",
];

/// Maximum syntactic nesting the visitor follows.
pub const MAX_NESTING: usize = 384;

/// A lexical container on the traversal stack.
#[derive(Debug, Clone)]
pub(crate) struct Container {
    pub id: NodeId,
    /// Tracker depth at which this container's bindings are named.
    pub depth: usize,
    /// Function bodies and the module receive hoisted `var` bindings.
    pub var_target: bool,
    /// Class whose body lexically encloses this container.
    pub class: Option<NodeId>,
}

pub(crate) struct AnalysisContext<'s> {
    pub source: &'s str,
    pub tracker: ScopeTracker,
    pub facts: FileFacts,
    containers: Vec<Container>,
    /// Function ids keyed by the start byte of their syntax node.
    functions_by_offset: HashMap<usize, NodeId>,
    nesting: usize,
    too_deep: bool,
}

impl<'s> AnalysisContext<'s> {
    pub fn new(source: &'s str, tracker: ScopeTracker, facts: FileFacts) -> Self {
        let module = Container {
            id: facts.module.id.clone(),
            depth: tracker.depth(),
            var_target: true,
            class: None,
        };
        Self {
            source,
            tracker,
            facts,
            containers: vec![module],
            functions_by_offset: HashMap::new(),
            nesting: 0,
            too_deep: false,
        }
    }

    pub fn into_facts(self) -> FileFacts {
        self.facts
    }

    pub fn exceeded_nesting(&self) -> bool {
        self.too_deep
    }

    /// Records one level of syntactic nesting. Returns `false` once the
    /// limit is hit; the caller must then skip the subtree.
    pub fn descend(&mut self) -> bool {
        if self.nesting >= MAX_NESTING {
            self.too_deep = true;
            return false;
        }
        self.nesting += 1;
        true
    }

    pub fn ascend(&mut self) {
        self.nesting = self.nesting.saturating_sub(1);
    }

    pub fn text(&self, node: Node<'_>) -> &'s str {
        self.source
            .get(node.start_byte()..node.end_byte())
            .unwrap_or_default()
    }

    /// Name of an object or class member key. String keys are unquoted;
    /// computed keys have no static name.
    pub(crate) fn member_name(&mut self, key: Node<'_>) -> Option<String> {
        match key.kind() {
            "computed_property_name" => {
                self.facts.note_unsupported("computed_member_name");
                None
            }
            "string" => Some(unquote(self.text(key))),
            _ => Some(self.text(key).to_string()),
        }
    }

    pub fn position(&self, node: Node<'_>) -> Position {
        let point = node.start_position();
        Position::new(point.row as u32 + 1, point.column as u32)
    }

    pub fn container(&self) -> &Container {
        // The module container is pushed in `new` and never popped.
        &self.containers[self.containers.len() - 1]
    }

    pub fn container_id(&self) -> NodeId {
        self.container().id.clone()
    }

    pub fn current_class(&self) -> Option<NodeId> {
        self.container().class.clone()
    }

    /// Nearest container that receives `var` bindings.
    pub fn var_target(&self) -> &Container {
        self.containers
            .iter()
            .rev()
            .find(|c| c.var_target)
            .unwrap_or(&self.containers[0])
    }

    pub fn push_container(&mut self, id: NodeId, var_target: bool, class: Option<NodeId>) {
        self.containers.push(Container {
            id,
            depth: self.tracker.depth(),
            var_target,
            class,
        });
    }

    pub fn pop_container(&mut self) {
        if self.containers.len() > 1 {
            self.containers.pop();
        }
    }

    pub fn register_function(&mut self, node: Node<'_>, id: NodeId) {
        self.functions_by_offset.insert(node.start_byte(), id);
    }

    /// Id of the nearest function whose syntax encloses `node`.
    pub fn enclosing_function(&self, node: Node<'_>) -> Option<NodeId> {
        let mut current = node.parent();
        while let Some(candidate) = current {
            if FUNCTION_KINDS.contains(&candidate.kind()) {
                return self.functions_by_offset.get(&candidate.start_byte()).cloned();
            }
            current = candidate.parent();
        }
        None
    }

    pub fn identifier(&self, node: Node<'_>) -> ValueRef {
        ValueRef::Identifier {
            name: self.text(node).to_string(),
            container: self.container_id(),
            position: self.position(node),
            offset: node.start_byte(),
        }
    }

    pub fn unsupported(&mut self, construct: &str) -> ValueRef {
        self.facts.note_unsupported(construct);
        ValueRef::Unsupported {
            construct: construct.to_string(),
        }
    }
}

/// Named children of `node`, skipping comments.
pub(crate) fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

/// Whether `node` has an anonymous child token with the given text.
pub(crate) fn has_token(node: Node<'_>, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|child| !child.is_named() && child.kind() == token);
    found
}

/// First named child, skipping comments.
pub(crate) fn first_named(node: Node<'_>) -> Option<Node<'_>> {
    named_children(node).into_iter().next()
}

/// Strips quotes from a string literal's source text.
pub(crate) fn unquote(text: &str) -> String {
    text.trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .to_string()
}
