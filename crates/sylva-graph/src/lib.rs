//! Sylva Graph - storage and per-file assembly
//!
//! This crate owns everything between one file's facts and the persistent
//! graph: the edge model, the store contract and its two implementations,
//! the per-file symbol table and assembler, and lifecycle clearing.
//!
//! # Architecture
//!
//! The in-memory graph uses petgraph's `StableDiGraph` with additional
//! indexes for:
//! - Id lookups
//! - File-based grouping (for lifecycle clearing)
//! - Kind and name filtering
//!
//! The sled store writes through to disk and serves reads from that same
//! in-memory graph.
//!
//! # Example
//!
//! ```no_run
//! use sylva_core::{LocalAnalyzer, SourceLanguage};
//! use sylva_graph::{GraphAssembler, GraphStore, LifecycleManager, MemoryGraph};
//!
//! let mut analyzer = LocalAnalyzer::new();
//! let facts = analyzer
//!     .analyze_source("a.js", "function f() {}\nf();\n", SourceLanguage::JavaScript)
//!     .unwrap();
//!
//! let assembly = GraphAssembler::assemble(&facts, None);
//! let mut store = MemoryGraph::new();
//! LifecycleManager::new().replace_file(&mut store, "a.js", assembly.buffer).unwrap();
//!
//! assert_eq!(store.files(), vec!["a.js".to_string()]);
//! ```

pub mod assembler;
mod edge;
mod graph;
mod lifecycle;
mod store;
mod symbol_table;
pub mod wire;

pub use assembler::{Assembly, AssemblyReport, GraphAssembler, GraphBuffer, Unresolved};
pub use edge::{Edge, EdgeKind};
pub use graph::MemoryGraph;
pub use lifecycle::LifecycleManager;
pub use store::{GraphStore, NodeFilter, SledStore, StoreError};
pub use symbol_table::{Symbol, SymbolKind, SymbolTable};
pub use wire::{GraphExport, WireEdge, WireError, WireNode};
