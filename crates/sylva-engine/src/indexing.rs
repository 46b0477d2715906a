//! Content hashing and change selection.

use crate::discovery::SourceFile;
use std::collections::BTreeSet;
use sylva_core::{attrs, module_id};
use sylva_graph::GraphStore;

/// blake3 hex digest of file contents.
pub fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Content hash recorded on the module node of `file`, if any.
pub fn stored_hash(store: &dyn GraphStore, file: &str) -> Option<String> {
    store
        .get_node(&module_id(file))
        .and_then(|module| module.attr_str(attrs::CONTENT_HASH))
        .map(str::to_string)
}

/// Which discovered files need analysis.
#[derive(Debug, Default)]
pub struct ChangeSet {
    pub changed: Vec<SourceFile>,
    pub unchanged: usize,
    /// Files in the store that were not discovered this run.
    pub stale: Vec<String>,
}

/// Compares hashed files against the store. With `force`, every file is
/// selected.
pub fn select_changed(store: &dyn GraphStore, files: &[SourceFile], force: bool) -> ChangeSet {
    let mut set = ChangeSet::default();
    for file in files {
        let unchanged = !force
            && file.hash.is_some()
            && stored_hash(store, &file.relative).as_deref() == file.hash.as_deref();
        if unchanged {
            set.unchanged += 1;
        } else {
            set.changed.push(file.clone());
        }
    }

    let present: BTreeSet<&str> = files.iter().map(|f| f.relative.as_str()).collect();
    set.stale = store
        .files()
        .into_iter()
        .filter(|f| !present.contains(f.as_str()))
        .collect();
    set
}
