//! Sylva Core - identity and local analysis
//!
//! This crate turns one JavaScript or TypeScript file into an immutable
//! bundle of facts: declarations, call sites, value flows and control-flow
//! scopes. It owns the node model and the semantic identity scheme that
//! every other crate keys on.
//!
//! # Identity
//!
//! Node ids are pure functions of (file, scope path, kind, name). Unnamed
//! entities are numbered by traversal order among same-kind siblings, so
//! reformatting a file never changes an id.
//!
//! # Example
//!
//! ```no_run
//! use sylva_core::{LocalAnalyzer, SourceLanguage};
//!
//! let mut analyzer = LocalAnalyzer::new();
//! let facts = analyzer
//!     .analyze_source("src/math.js", "export function add(a, b) { return a + b; }", SourceLanguage::JavaScript)
//!     .unwrap();
//!
//! assert_eq!(facts.functions[0].id.as_str(), "src/math.js->global->FUNCTION->add");
//! ```

pub mod analyzer;
pub mod error;
pub mod facts;
pub mod id;
pub mod language;
pub mod node;
pub mod scope;

pub use analyzer::LocalAnalyzer;
pub use error::{AnalyzeError, Result};
pub use facts::FileFacts;
pub use id::{compute_id, escape_name, module_id, NodeId};
pub use language::SourceLanguage;
pub use node::{attrs, AttrValue, Node, NodeKind, Position};
pub use scope::{ScopePath, ScopeTracker};
