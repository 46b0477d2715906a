//! JSON wire shape for nodes and edges.
//!
//! Attributes are flattened next to the fixed node fields; metadata travels
//! as a nested object. Converting a wire node to a [`Node`] and back yields
//! the same wire node.

use crate::edge::{Edge, EdgeKind};
use crate::store::{GraphStore, NodeFilter};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use sylva_core::{AttrValue, Node, NodeId, NodeKind, Position};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WireError {
    #[error("Attribute {key} has a value that is not a string, integer, boolean or string list")]
    UnsupportedValue { key: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireNode {
    pub id: String,
    pub kind: NodeKind,
    pub name: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metadata: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub attrs: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEdge {
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    pub src: String,
    pub dst: String,
}

/// Everything in a store, as written by `sylva export`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphExport {
    pub nodes: Vec<WireNode>,
    pub edges: Vec<WireEdge>,
}

impl GraphExport {
    /// Collects every node and edge, sorted by id.
    pub fn from_store(store: &dyn GraphStore) -> Self {
        let mut nodes: Vec<WireNode> = store
            .query_nodes(&NodeFilter::new())
            .map(WireNode::from)
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        let edges = store.all_edges().iter().map(WireEdge::from).collect();
        Self { nodes, edges }
    }
}

fn to_json(value: &AttrValue) -> Value {
    match value {
        AttrValue::Str(s) => Value::String(s.clone()),
        AttrValue::Int(i) => Value::from(*i),
        AttrValue::Bool(b) => Value::Bool(*b),
        AttrValue::List(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
    }
}

fn from_json(key: &str, value: &Value) -> Result<AttrValue, WireError> {
    let unsupported = || WireError::UnsupportedValue { key: key.to_string() };
    match value {
        Value::String(s) => Ok(AttrValue::Str(s.clone())),
        Value::Bool(b) => Ok(AttrValue::Bool(*b)),
        Value::Number(n) => n.as_i64().map(AttrValue::Int).ok_or_else(unsupported),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(unsupported))
            .collect::<Result<Vec<_>, _>>()
            .map(AttrValue::List),
        _ => Err(unsupported()),
    }
}

impl From<&Node> for WireNode {
    fn from(node: &Node) -> Self {
        let metadata = if node.metadata.is_empty() {
            None
        } else {
            Some(
                node.metadata
                    .iter()
                    .map(|(k, v)| (k.clone(), to_json(v)))
                    .collect(),
            )
        };
        Self {
            id: node.id.to_string(),
            kind: node.kind,
            name: node.name.clone(),
            file: node.file.clone(),
            line: node.position.line,
            column: node.position.column,
            metadata,
            attrs: node.attrs.iter().map(|(k, v)| (k.clone(), to_json(v))).collect(),
        }
    }
}

impl TryFrom<&WireNode> for Node {
    type Error = WireError;

    fn try_from(wire: &WireNode) -> Result<Self, Self::Error> {
        let mut node = Node::new(NodeId::new(wire.id.as_str()), wire.kind, wire.name.as_str(), wire.file.as_str())
            .with_position(Position::new(wire.line, wire.column));
        for (key, value) in &wire.attrs {
            node.attrs.insert(key.clone(), from_json(key, value)?);
        }
        for (key, value) in wire.metadata.iter().flatten() {
            node.metadata.insert(key.clone(), from_json(key, value)?);
        }
        Ok(node)
    }
}

impl From<&Edge> for WireEdge {
    fn from(edge: &Edge) -> Self {
        Self {
            kind: edge.kind,
            src: edge.src.to_string(),
            dst: edge.dst.to_string(),
        }
    }
}

impl From<&WireEdge> for Edge {
    fn from(wire: &WireEdge) -> Self {
        Edge::new(wire.kind, wire.src.as_str(), wire.dst.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sylva_core::attrs;

    #[test]
    fn test_wire_node_round_trips() {
        let wire: WireNode = serde_json::from_value(json!({
            "id": "a.js->global->CALL->foo",
            "kind": "CALL",
            "name": "foo",
            "file": "a.js",
            "line": 3,
            "column": 4,
            "offset": 57,
            "optional": false,
            "arguments": ["a.js->global->LITERAL->literal[0]"],
            "metadata": { "owner": "core", "weight": 2 }
        }))
        .unwrap();

        assert_eq!(wire.attrs.len(), 3);
        let node = Node::try_from(&wire).unwrap();
        assert_eq!(node.offset(), Some(57));
        assert_eq!(node.metadata.get("owner"), Some(&AttrValue::from("core")));
        assert_eq!(node.attr_list(attrs::ARGUMENTS).unwrap().len(), 1);

        assert_eq!(WireNode::from(&node), wire);
    }

    #[test]
    fn test_metadata_is_omitted_when_empty() {
        let node = Node::new(NodeId::new("a.js->global->MODULE->a.js"), NodeKind::Module, "a.js", "a.js");
        let value = serde_json::to_value(WireNode::from(&node)).unwrap();
        assert!(value.get("metadata").is_none());
        assert_eq!(value["kind"], "MODULE");
    }

    #[test]
    fn test_float_attribute_is_rejected() {
        let wire: WireNode = serde_json::from_value(json!({
            "id": "x", "kind": "LITERAL", "name": "n", "file": "a.js",
            "line": 1, "column": 0, "ratio": 0.5
        }))
        .unwrap();
        assert!(Node::try_from(&wire).is_err());
    }

    #[test]
    fn test_edge_uses_type_key() {
        let edge = Edge::new(EdgeKind::DerivesFrom, "a", "b");
        let value = serde_json::to_value(WireEdge::from(&edge)).unwrap();
        assert_eq!(value, json!({ "type": "DERIVES_FROM", "src": "a", "dst": "b" }));
        let back: WireEdge = serde_json::from_value(value).unwrap();
        assert_eq!(Edge::from(&back), edge);
    }
}
