//! JsAnalyzer: the per-file clear, analyze, assemble and commit sequence.

use crate::context::PluginContext;
use crate::discovery::SourceFile;
use crate::error::{EngineError, Result};
use crate::indexing::content_hash;
use crate::report::PluginOutcome;
use std::collections::BTreeMap;
use std::sync::Arc;
use sylva_core::{AnalyzeError, LocalAnalyzer};
use sylva_graph::{Assembly, AssemblyReport, GraphAssembler, LifecycleManager, StoreError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// What happened to one file.
enum FileOutcome {
    Committed(AssemblyReport),
    AnalyzeFailed { removed: usize, error: AnalyzeError },
    StoreFailed(StoreError),
}

/// Aggregate of the analysis phase.
#[derive(Debug, Default)]
pub(crate) struct AnalysisSummary {
    pub analyzed: usize,
    pub failed: usize,
    pub cleared_then_failed: usize,
    pub failed_commits: usize,
    pub unresolved: BTreeMap<String, usize>,
    pub cancelled: bool,
}

pub(crate) async fn analyze_changed(ctx: &PluginContext) -> Result<(AnalysisSummary, PluginOutcome)> {
    let mut summary = AnalysisSummary::default();
    let mut outcome = PluginOutcome::new();
    let semaphore = Arc::new(Semaphore::new(ctx.config.worker_count()));
    let mut tasks = JoinSet::new();

    ctx.progress.files_planned(ctx.changed.len());
    for file in ctx.changed.iter() {
        if ctx.is_cancelled() {
            info!("Analysis cancelled, {} files not started", ctx.changed.len() - tasks.len());
            summary.cancelled = true;
            break;
        }
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| EngineError::Task(e.to_string()))?;
        let task_ctx = ctx.clone();
        let file = file.clone();
        tasks.spawn(async move {
            let tag = file.relative.clone();
            let result = process_file(&task_ctx, file).await;
            task_ctx.progress.file_done(&tag);
            drop(permit);
            (tag, result)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let (file, result) = joined.map_err(|e| EngineError::Task(e.to_string()))?;
        match result {
            FileOutcome::Committed(report) => {
                summary.analyzed += 1;
                for (reason, n) in report.unresolved {
                    *summary.unresolved.entry(reason).or_insert(0) += n;
                }
                outcome.add("nodes", report.nodes);
                outcome.add("edges", report.edges);
                outcome.add("rejected_edges", report.rejected_edges);
                outcome.add("defaulted_positions", report.defaulted_positions);
            }
            FileOutcome::AnalyzeFailed { removed, error } => {
                warn!("Skipping {}: {}", file, error);
                summary.failed += 1;
                outcome.add(&format!("failed_{}", error.category()), 1);
                if removed > 0 {
                    summary.cleared_then_failed += 1;
                }
            }
            FileOutcome::StoreFailed(e) => {
                error!("Failed to commit {}: {}", file, e);
                summary.failed_commits += 1;
            }
        }
    }

    outcome.add("analyzed", summary.analyzed);
    outcome.add("failed", summary.failed);
    outcome.add("failed_commits", summary.failed_commits);
    Ok((summary, outcome))
}

async fn process_file(ctx: &PluginContext, file: SourceFile) -> FileOutcome {
    let _guard = ctx.locks.lock(&file.relative).await;
    let lifecycle = LifecycleManager::new();

    // Old facts go before the analyzer sees the file.
    let removed = {
        let mut store = ctx.store.write().await;
        match lifecycle.clear_file(store.as_mut(), &file.relative) {
            Ok(removed) => removed,
            Err(e) => return FileOutcome::StoreFailed(e),
        }
    };

    let text = match tokio::fs::read_to_string(&file.path).await {
        Ok(text) => text,
        Err(e) => {
            return FileOutcome::AnalyzeFailed {
                removed,
                error: AnalyzeError::io(&file.path, e),
            }
        }
    };

    let tag = file.relative.clone();
    let language = file.language;
    let hash = file.hash.clone().unwrap_or_else(|| content_hash(text.as_bytes()));
    let assembled = tokio::task::spawn_blocking(move || -> std::result::Result<Assembly, AnalyzeError> {
        let mut analyzer = LocalAnalyzer::new();
        let facts = analyzer.analyze_source(&tag, &text, language)?;
        Ok(GraphAssembler::assemble(&facts, Some(&hash)))
    })
    .await;

    let assembly = match assembled {
        Ok(Ok(assembly)) => assembly,
        Ok(Err(error)) => return FileOutcome::AnalyzeFailed { removed, error },
        Err(e) => {
            return FileOutcome::AnalyzeFailed {
                removed,
                error: AnalyzeError::Parser(format!("analysis task failed: {}", e)),
            }
        }
    };

    let report = assembly.report;
    let mut store = ctx.store.write().await;
    match lifecycle.commit(store.as_mut(), &file.relative, assembly.buffer) {
        Ok(()) => {
            debug!(
                "Committed {}: {} nodes, {} edges",
                file.relative, report.nodes, report.edges
            );
            FileOutcome::Committed(report)
        }
        Err(e) => FileOutcome::StoreFailed(e),
    }
}
