//! Per-file lifecycle.
//!
//! Every node carries its declaring file. Re-ingesting a file starts by
//! deleting everything tagged with it, whatever the node kind, so facts of
//! removed constructs cannot survive a re-analysis. Edges from other files
//! into the cleared nodes go with them and are re-derived by enrichment.

use crate::assembler::GraphBuffer;
use crate::store::{GraphStore, StoreError};
use std::collections::BTreeSet;
use tracing::debug;

/// Clears and commits files in the store.
#[derive(Debug, Default, Clone, Copy)]
pub struct LifecycleManager;

impl LifecycleManager {
    pub fn new() -> Self {
        Self
    }

    /// Deletes every node tagged with `file` and every edge touching one.
    ///
    /// Returns the number of nodes removed.
    pub fn clear_file(&self, store: &mut dyn GraphStore, file: &str) -> Result<usize, StoreError> {
        let removed = store.delete_nodes_by_file(file)?;
        if removed > 0 {
            debug!("Cleared {} nodes of {}", removed, file);
        }
        Ok(removed)
    }

    /// Clears several files, returning the total number of nodes removed.
    pub fn clear_files<'a, I>(&self, store: &mut dyn GraphStore, files: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut removed = 0;
        for file in files {
            removed += self.clear_file(store, file)?;
        }
        Ok(removed)
    }

    /// Commits one file's buffer as a single batch.
    pub fn commit(&self, store: &mut dyn GraphStore, file: &str, buffer: GraphBuffer) -> Result<(), StoreError> {
        let (nodes, edges) = buffer.into_parts();
        store.commit_file(file, nodes, edges)
    }

    /// Clears `file` and commits its new buffer.
    pub fn replace_file(
        &self,
        store: &mut dyn GraphStore,
        file: &str,
        buffer: GraphBuffer,
    ) -> Result<usize, StoreError> {
        let removed = self.clear_file(store, file)?;
        self.commit(store, file, buffer)?;
        Ok(removed)
    }

    /// Files the store knows about that are not in `present`.
    pub fn stale_files(&self, store: &dyn GraphStore, present: &BTreeSet<String>) -> Vec<String> {
        store
            .files()
            .into_iter()
            .filter(|file| !present.contains(file))
            .collect()
    }
}
