//! Semantic identity.
//!
//! A node id is a pure function of (file, scope path, kind, name). The
//! rendered form is `file->scope->...->KIND->name`, which is readable in
//! query output and stable under reformatting because no line or column
//! takes part in it.

use crate::node::NodeKind;
use serde::{Deserialize, Serialize};
use std::borrow::{Borrow, Cow};
use std::fmt;

/// Separator between id segments.
pub const SEGMENT_SEPARATOR: &str = "->";

/// Label of the file-level scope.
pub const ROOT_SCOPE: &str = "global";

/// Opaque, deterministic identity token of a graph node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The file segment of the id.
    pub fn file(&self) -> &str {
        self.0
            .split(SEGMENT_SEPARATOR)
            .next()
            .unwrap_or_default()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Computes the semantic id of a node.
///
/// Segments are joined as given. User-provided names must go through
/// [`escape_name`] first (the [`crate::ScopeTracker`] naming helpers do
/// this) so that no name contains the separator or the characters of a
/// synthetic label.
pub fn compute_id(file: &str, scope_path: &[String], kind: NodeKind, name: &str) -> NodeId {
    let mut id = String::with_capacity(
        file.len() + scope_path.iter().map(|s| s.len() + 2).sum::<usize>() + name.len() + 16,
    );
    id.push_str(file);
    for segment in scope_path {
        id.push_str(SEGMENT_SEPARATOR);
        id.push_str(segment);
    }
    id.push_str(SEGMENT_SEPARATOR);
    id.push_str(kind.as_str());
    id.push_str(SEGMENT_SEPARATOR);
    id.push_str(name);
    NodeId(id)
}

/// Id of the module node of `file`.
pub fn module_id(file: &str) -> NodeId {
    compute_id(file, &[ROOT_SCOPE.to_string()], NodeKind::Module, file)
}

/// Label for an unnamed entity: `anonymous[n]`.
pub fn anonymous_label(ordinal: u32) -> String {
    format!("anonymous[{}]", ordinal)
}

/// Percent-encodes the characters of a name that carry meaning in an id.
///
/// `>` breaks up the separator, `#` and the brackets are reserved for
/// discriminators and synthetic labels. String keys such as `"a->b"` or
/// `"x#1"` therefore cannot alias a real nesting or a repeated name.
pub fn escape_name(name: &str) -> Cow<'_, str> {
    if !name.contains(|c| matches!(c, '%' | '>' | '#' | '[' | ']')) {
        return Cow::Borrowed(name);
    }
    let mut escaped = String::with_capacity(name.len() + 8);
    for c in name.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            '>' => escaped.push_str("%3E"),
            '#' => escaped.push_str("%23"),
            '[' => escaped.push_str("%5B"),
            ']' => escaped.push_str("%5D"),
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Escapes `name` and appends a discriminator when it repeats: `foo`,
/// `foo#1`, `foo#2`.
pub fn discriminated(name: &str, discriminator: u32) -> String {
    let name = escape_name(name);
    if discriminator == 0 {
        name.into_owned()
    } else {
        format!("{}#{}", name, discriminator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_compute_id_is_deterministic() {
        let a = compute_id("src/a.js", &path(&["global", "add"]), NodeKind::Parameter, "x");
        let b = compute_id("src/a.js", &path(&["global", "add"]), NodeKind::Parameter, "x");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "src/a.js->global->add->PARAMETER->x");
        assert_eq!(a.file(), "src/a.js");
    }

    #[test]
    fn test_compute_id_distinguishes_every_component() {
        let base = compute_id("a.js", &path(&["global"]), NodeKind::Variable, "x");
        let other_file = compute_id("b.js", &path(&["global"]), NodeKind::Variable, "x");
        let other_scope = compute_id("a.js", &path(&["global", "f"]), NodeKind::Variable, "x");
        let other_kind = compute_id("a.js", &path(&["global"]), NodeKind::Constant, "x");
        let other_name = compute_id("a.js", &path(&["global"]), NodeKind::Variable, "y");

        for other in [other_file, other_scope, other_kind, other_name] {
            assert_ne!(base, other);
        }
    }

    #[test]
    fn test_labels() {
        assert_eq!(anonymous_label(2), "anonymous[2]");
        assert_eq!(discriminated("foo", 0), "foo");
        assert_eq!(discriminated("foo", 3), "foo#3");
        assert_eq!(module_id("a.js").as_str(), "a.js->global->MODULE->a.js");
    }

    #[test]
    fn test_escaped_names_cannot_alias_nesting() {
        assert_eq!(escape_name("plain_name"), "plain_name");
        assert_eq!(escape_name("a->b"), "a-%3Eb");
        assert_eq!(escape_name("#count"), "%23count");
        assert_eq!(escape_name("50%"), "50%25");
        assert_eq!(discriminated("x[0]", 1), "x%5B0%5D#1");

        let label = discriminated("a->b", 0);
        let string_key = compute_id("a.js", &path(&["global", label.as_str()]), NodeKind::Variable, "x");
        let nested = compute_id("a.js", &path(&["global", "a", "b"]), NodeKind::Variable, "x");
        assert_ne!(string_key, nested);

        // A key spelled like a discriminated name stays distinct from the repeat.
        assert_ne!(discriminated("foo#1", 0), discriminated("foo", 1));
    }
}
