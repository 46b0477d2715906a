//! Scope path bookkeeping for one file traversal.
//!
//! The tracker owns the current scope path and the ordinal counters used to
//! name unnamed entities. Counters live in the frame of the scope that was
//! entered, so they start from zero every time a scope path is freshly
//! entered and depend only on traversal order.

use crate::id::{anonymous_label, compute_id, discriminated, NodeId, ROOT_SCOPE, SEGMENT_SEPARATOR};
use crate::node::NodeKind;
use std::collections::HashMap;
use std::fmt;

/// Ordered scope labels from the file root to the current position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopePath(Vec<String>);

impl ScopePath {
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for ScopePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(SEGMENT_SEPARATOR))
    }
}

#[derive(Debug)]
struct Frame {
    label: String,
    counters: HashMap<String, u32>,
}

impl Frame {
    fn new(label: String) -> Self {
        Self {
            label,
            counters: HashMap::new(),
        }
    }

    fn next(&mut self, key: String) -> u32 {
        let counter = self.counters.entry(key).or_insert(0);
        let value = *counter;
        *counter += 1;
        value
    }
}

/// Per-file scope tracker and identity assigner.
///
/// Created for one traversal and dropped with it.
#[derive(Debug)]
pub struct ScopeTracker {
    file: String,
    frames: Vec<Frame>,
    path: Vec<String>,
}

impl ScopeTracker {
    /// Creates a tracker positioned at the file root.
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            frames: vec![Frame::new(ROOT_SCOPE.to_string())],
            path: vec![ROOT_SCOPE.to_string()],
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    /// Pushes a scope-path segment with fresh counters.
    pub fn enter_scope(&mut self, label: impl Into<String>) {
        let label = label.into();
        self.path.push(label.clone());
        self.frames.push(Frame::new(label));
    }

    /// Pops the innermost segment. The root is never popped.
    pub fn exit_scope(&mut self) {
        debug_assert!(self.frames.len() > 1, "exit_scope at file root");
        if self.frames.len() > 1 {
            self.frames.pop();
            self.path.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn current_label(&self) -> &str {
        self.frames
            .last()
            .map(|frame| frame.label.as_str())
            .unwrap_or(ROOT_SCOPE)
    }

    pub fn scope_path(&self) -> ScopePath {
        ScopePath(self.path.clone())
    }

    /// Next ordinal for `kind` among siblings in the current scope path.
    pub fn sibling_ordinal(&mut self, kind: &str) -> u32 {
        self.frame_mut().next(kind.to_string())
    }

    /// Next discriminator for a repeated `(kind, name)` in the current scope.
    pub fn discriminator(&mut self, kind: NodeKind, name: &str) -> u32 {
        self.frame_mut().next(discriminator_key(kind, name))
    }

    /// `anonymous[n]`, numbered among same-kind siblings.
    pub fn anonymous_name(&mut self, kind: NodeKind) -> String {
        anonymous_label(self.sibling_ordinal(kind.as_str()))
    }

    /// Synthetic label for an unnamed scope, e.g. `if[0]`.
    pub fn scoped_label(&mut self, kind: &str) -> String {
        format!("{}[{}]", kind, self.sibling_ordinal(kind))
    }

    /// `name`, `name#1`, ... for named entities that may repeat in a scope.
    pub fn unique_name(&mut self, kind: NodeKind, name: &str) -> String {
        let discriminator = self.discriminator(kind, name);
        discriminated(name, discriminator)
    }

    /// Id of an entity at the current scope path.
    pub fn compute_id(&self, kind: NodeKind, name: &str) -> NodeId {
        compute_id(&self.file, &self.path, kind, name)
    }

    /// Id of a named entity, discriminated against earlier same-name siblings.
    pub fn unique_id(&mut self, kind: NodeKind, name: &str) -> NodeId {
        let name = self.unique_name(kind, name);
        self.compute_id(kind, &name)
    }

    /// Id of an unnamed entity.
    pub fn anonymous_id(&mut self, kind: NodeKind) -> NodeId {
        let name = self.anonymous_name(kind);
        self.compute_id(kind, &name)
    }

    /// Like [`unique_id`](Self::unique_id), but in the enclosing frame at
    /// `depth` (as returned by [`depth`](Self::depth) when that frame was
    /// current). Used for `var` bindings hoisted out of nested blocks.
    pub fn unique_id_at(&mut self, depth: usize, kind: NodeKind, name: &str) -> NodeId {
        let index = depth.clamp(1, self.frames.len()) - 1;
        let discriminator = self.frames[index].next(discriminator_key(kind, name));
        let name = discriminated(name, discriminator);
        compute_id(&self.file, &self.path[..=index], kind, &name)
    }

    fn frame_mut(&mut self) -> &mut Frame {
        // The root frame is never popped.
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }
}

fn discriminator_key(kind: NodeKind, name: &str) -> String {
    format!("{}#{}", kind.as_str(), name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinals_follow_traversal_order() {
        let mut tracker = ScopeTracker::new("a.js");
        assert_eq!(tracker.anonymous_name(NodeKind::Function), "anonymous[0]");
        assert_eq!(tracker.anonymous_name(NodeKind::Function), "anonymous[1]");
        // Different kinds count independently.
        assert_eq!(tracker.anonymous_name(NodeKind::Class), "anonymous[0]");
        assert_eq!(tracker.anonymous_name(NodeKind::Function), "anonymous[2]");
    }

    #[test]
    fn test_counters_reset_on_fresh_entry() {
        let mut tracker = ScopeTracker::new("a.js");
        tracker.enter_scope("f");
        assert_eq!(tracker.scoped_label("if"), "if[0]");
        assert_eq!(tracker.scoped_label("if"), "if[1]");
        tracker.exit_scope();

        tracker.enter_scope("f");
        assert_eq!(tracker.scoped_label("if"), "if[0]");
        tracker.exit_scope();

        // The parent frame kept its own counters.
        assert_eq!(tracker.scoped_label("if"), "if[0]");
    }

    #[test]
    fn test_ids_carry_scope_path() {
        let mut tracker = ScopeTracker::new("src/m.ts");
        tracker.enter_scope("outer");
        let id = tracker.compute_id(NodeKind::Variable, "x");
        assert_eq!(id.as_str(), "src/m.ts->global->outer->VARIABLE->x");
        assert_eq!(tracker.scope_path().to_string(), "global->outer");
        tracker.exit_scope();
        assert_eq!(tracker.current_label(), ROOT_SCOPE);
    }

    #[test]
    fn test_unique_id_discriminates_repeats() {
        let mut tracker = ScopeTracker::new("a.js");
        let first = tracker.unique_id(NodeKind::Call, "foo");
        let second = tracker.unique_id(NodeKind::Call, "foo");
        let other = tracker.unique_id(NodeKind::Call, "bar");
        assert_eq!(first.as_str(), "a.js->global->CALL->foo");
        assert_eq!(second.as_str(), "a.js->global->CALL->foo#1");
        assert_eq!(other.as_str(), "a.js->global->CALL->bar");
    }

    #[test]
    fn test_unique_names_are_escaped() {
        let mut tracker = ScopeTracker::new("a.js");
        let label = tracker.unique_name(NodeKind::Function, "a->b");
        assert_eq!(label, "a-%3Eb");
        tracker.enter_scope(label);
        let inner = tracker.unique_id(NodeKind::Variable, "x");
        tracker.exit_scope();

        tracker.enter_scope("a");
        tracker.enter_scope("b");
        let nested = tracker.unique_id(NodeKind::Variable, "x");
        assert_ne!(inner, nested);
        assert_eq!(inner.as_str(), "a.js->global->a-%3Eb->VARIABLE->x");
    }

    #[test]
    fn test_unique_id_at_targets_enclosing_frame() {
        let mut tracker = ScopeTracker::new("a.js");
        tracker.enter_scope("f");
        let function_depth = tracker.depth();
        tracker.enter_scope("if[0]");

        let hoisted = tracker.unique_id_at(function_depth, NodeKind::Variable, "x");
        assert_eq!(hoisted.as_str(), "a.js->global->f->VARIABLE->x");

        tracker.exit_scope();
        // The hoisted declaration counted against the function frame.
        let again = tracker.unique_id(NodeKind::Variable, "x");
        assert_eq!(again.as_str(), "a.js->global->f->VARIABLE->x#1");
    }
}
