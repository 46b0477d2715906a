//! Edge types for the code graph.
//!
//! An edge is identified by its (kind, source, destination) triple; adding
//! the same triple twice is a no-op.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use sylva_core::NodeId;

/// The type of relationship between two graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    /// Container holds a declaration, call site or scope.
    Contains,

    /// Function owns its body scope.
    HasScope,

    /// Function declares a parameter.
    HasParameter,

    /// Control-flow scope is guarded by a condition value.
    HasCondition,

    /// Scope or module declares a variable.
    Declares,

    /// Call site invokes a function or method.
    Calls,

    /// Call site passes a value as an argument.
    PassesArgument,

    /// Binding takes its value from another node.
    AssignedFrom,

    /// Value is returned by a function.
    Returns,

    /// Value is yielded by a generator.
    Yields,

    /// `yield*` source whose stream the generator forwards.
    DelegatesTo,

    /// Compound expression depends on an operand.
    DerivesFrom,

    /// Construction site creates an instance of a class.
    InstanceOf,

    /// Class extends a superclass.
    Extends,

    /// Export stands for a local declaration.
    Exports,

    /// Module imports another module.
    Imports,

    /// Import or re-export binds to an export of another module.
    ImportsFrom,

    /// Parameter receives an argument value at a call site.
    ReceivesArgument,

    /// Suppression directive covers a node.
    Suppresses,

    /// Issue points at the node it is about.
    Affects,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 20] = [
        EdgeKind::Contains,
        EdgeKind::HasScope,
        EdgeKind::HasParameter,
        EdgeKind::HasCondition,
        EdgeKind::Declares,
        EdgeKind::Calls,
        EdgeKind::PassesArgument,
        EdgeKind::AssignedFrom,
        EdgeKind::Returns,
        EdgeKind::Yields,
        EdgeKind::DelegatesTo,
        EdgeKind::DerivesFrom,
        EdgeKind::InstanceOf,
        EdgeKind::Extends,
        EdgeKind::Exports,
        EdgeKind::Imports,
        EdgeKind::ImportsFrom,
        EdgeKind::ReceivesArgument,
        EdgeKind::Suppresses,
        EdgeKind::Affects,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "CONTAINS",
            Self::HasScope => "HAS_SCOPE",
            Self::HasParameter => "HAS_PARAMETER",
            Self::HasCondition => "HAS_CONDITION",
            Self::Declares => "DECLARES",
            Self::Calls => "CALLS",
            Self::PassesArgument => "PASSES_ARGUMENT",
            Self::AssignedFrom => "ASSIGNED_FROM",
            Self::Returns => "RETURNS",
            Self::Yields => "YIELDS",
            Self::DelegatesTo => "DELEGATES_TO",
            Self::DerivesFrom => "DERIVES_FROM",
            Self::InstanceOf => "INSTANCE_OF",
            Self::Extends => "EXTENDS",
            Self::Exports => "EXPORTS",
            Self::Imports => "IMPORTS",
            Self::ImportsFrom => "IMPORTS_FROM",
            Self::ReceivesArgument => "RECEIVES_ARGUMENT",
            Self::Suppresses => "SUPPRESSES",
            Self::Affects => "AFFECTS",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EdgeKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown edge kind: {}", s))
    }
}

/// A directed, typed edge between two node ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub kind: EdgeKind,
    pub src: NodeId,
    pub dst: NodeId,
}

impl Edge {
    pub fn new(kind: EdgeKind, src: impl Into<NodeId>, dst: impl Into<NodeId>) -> Self {
        Self {
            kind,
            src: src.into(),
            dst: dst.into(),
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.src, self.kind, self.dst)
    }
}
