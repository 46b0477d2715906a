//! SourceDiscovery and ContentIndexer.

use crate::context::PluginContext;
use crate::discovery::{discover, SourceFile};
use crate::error::{EngineError, Result};
use crate::indexing::{content_hash, select_changed};
use crate::report::PluginOutcome;
use sylva_graph::LifecycleManager;
use tracing::{info, warn};

pub(crate) async fn discover_sources(ctx: &PluginContext) -> Result<(Vec<SourceFile>, PluginOutcome)> {
    let root = ctx.root.to_path_buf();
    let config = ctx.config.clone();
    let discovery = tokio::task::spawn_blocking(move || discover(&root, &config))
        .await
        .map_err(|e| EngineError::Task(e.to_string()))?;

    let mut outcome = PluginOutcome::new();
    outcome.add("files", discovery.files.len());
    outcome.add("too_large", discovery.too_large);
    outcome.add("ignored", discovery.ignored);
    outcome.add("unreadable", discovery.unreadable);
    info!("Discovered {} source files", discovery.files.len());
    Ok((discovery.files, outcome))
}

/// Result of the indexing phase.
pub(crate) struct Selection {
    /// Every readable discovered file, hashed.
    pub files: Vec<SourceFile>,
    pub changed: Vec<SourceFile>,
    pub unchanged: usize,
    pub stale_cleared: usize,
}

pub(crate) async fn index_contents(
    ctx: &PluginContext,
    force: bool,
) -> Result<(Selection, PluginOutcome)> {
    let mut outcome = PluginOutcome::new();
    let mut files = Vec::with_capacity(ctx.files.len());
    for file in ctx.files.iter() {
        match tokio::fs::read(&file.path).await {
            Ok(bytes) => {
                let mut file = file.clone();
                file.hash = Some(content_hash(&bytes));
                files.push(file);
            }
            Err(e) => {
                warn!("Cannot read {}: {}", file.relative, e);
                outcome.add("unreadable", 1);
            }
        }
    }

    let change_set = {
        let store = ctx.store.read().await;
        select_changed(store.as_ref(), &files, force)
    };

    let lifecycle = LifecycleManager::new();
    let mut stale_cleared = 0;
    for stale in &change_set.stale {
        let _guard = ctx.locks.lock(stale).await;
        let mut store = ctx.store.write().await;
        let removed = lifecycle.clear_file(store.as_mut(), stale)?;
        info!("Cleared {} ({} nodes), no longer on disk", stale, removed);
        stale_cleared += 1;
    }

    outcome.add("hashed", files.len());
    outcome.add("changed", change_set.changed.len());
    outcome.add("unchanged", change_set.unchanged);
    outcome.add("stale_cleared", stale_cleared);
    info!(
        "{} files changed, {} unchanged",
        change_set.changed.len(),
        change_set.unchanged
    );

    Ok((
        Selection {
            files,
            changed: change_set.changed,
            unchanged: change_set.unchanged,
            stale_cleared,
        },
        outcome,
    ))
}
