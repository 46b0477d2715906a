//! Phase orchestration.
//!
//! The orchestrator plans the enabled plugins, then runs the phases in
//! order: discovery, indexing, analysis, enrichment, validation. A
//! configuration error stops the run before any work. Per-file failures
//! are counted and never stop sibling files.

use crate::config::Config;
use crate::context::{PluginContext, SharedStore};
use crate::discovery::SourceFile;
use crate::error::{ConfigError, Result};
use crate::locks::FileLocks;
use crate::plugin::{plan, Phase, PhasePlan, PluginKind};
use crate::plugins::{analysis, enrichment, sources, validation};
use crate::progress::{NoopProgress, ProgressSink};
use crate::report::{PluginOutcome, PluginReport, RunReport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use sylva_core::NodeKind;
use sylva_graph::NodeFilter;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Per-run switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Re-analyze files whose content hash is unchanged.
    pub force: bool,
}

/// Drives one workspace through the pipeline.
pub struct Orchestrator {
    root: PathBuf,
    config: Arc<Config>,
    store: SharedStore,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
    locks: FileLocks,
}

/// Files flowing between phases.
#[derive(Default)]
struct RunState {
    files: Arc<Vec<SourceFile>>,
    changed: Arc<Vec<SourceFile>>,
}

impl Orchestrator {
    pub fn new(root: impl Into<PathBuf>, config: Config, store: SharedStore) -> Self {
        Self {
            root: root.into(),
            config: Arc::new(config),
            store,
            progress: Arc::new(NoopProgress),
            cancel: CancellationToken::new(),
            locks: FileLocks::new(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    /// Token that stops the run at the next file or phase boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Plans the enabled plugins.
    pub fn plan(&self) -> std::result::Result<Vec<PhasePlan>, ConfigError> {
        for name in &self.config.plugins.disabled {
            if PluginKind::from_name(name).is_none() {
                return Err(ConfigError::UnknownPlugin(name.clone()));
            }
        }
        let enabled: Vec<_> = PluginKind::ALL
            .iter()
            .filter(|kind| !self.config.is_disabled(kind.name()))
            .map(|kind| kind.metadata())
            .collect();
        plan(&enabled)
    }

    pub async fn run(&self, options: RunOptions) -> Result<RunReport> {
        let started = Instant::now();
        let phases = self.plan()?;
        let mut report = RunReport::default();
        let mut state = RunState::default();
        let budget = Duration::from_millis(self.config.enrichment.time_budget_ms);

        for phase_plan in phases {
            if self.cancel.is_cancelled() {
                warn!("Run cancelled before the {} phase", phase_plan.phase);
                report.cancelled = true;
                break;
            }
            let phase = phase_plan.phase;
            self.progress.phase_started(phase);
            info!("Phase {}: {} plugins", phase, phase_plan.plugins.len());

            for metadata in &phase_plan.plugins {
                let Some(kind) = PluginKind::from_name(&metadata.name) else {
                    warn!("No implementation for plugin {}", metadata.name);
                    continue;
                };
                let ctx = self.context(phase, kind, &state);
                let plugin_started = Instant::now();
                let outcome = self.run_plugin(kind, &ctx, &mut state, &mut report, options).await?;
                let elapsed = plugin_started.elapsed();

                let mut plugin_report =
                    PluginReport::new(kind.name(), phase, outcome, elapsed.as_millis() as u64);
                if phase == Phase::Enrichment && elapsed > budget {
                    warn!(
                        "{} took {}ms, over the {}ms budget",
                        kind.name(),
                        elapsed.as_millis(),
                        budget.as_millis()
                    );
                    plugin_report.over_budget = true;
                }
                report.plugins.push(plugin_report);
            }
            self.progress.phase_finished(phase);
        }

        let store = self.store.read().await;
        store.flush()?;
        report.nodes = store.node_count();
        report.edges = store.edge_count();
        report.issues = store.query_nodes(&NodeFilter::new().kind(NodeKind::Issue)).count();
        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "Run finished in {}ms: {} analyzed, {} failed, {} nodes, {} edges, {} issues",
            report.duration_ms,
            report.files_analyzed,
            report.files_failed + report.failed_commits,
            report.nodes,
            report.edges,
            report.issues
        );
        Ok(report)
    }

    async fn run_plugin(
        &self,
        kind: PluginKind,
        ctx: &PluginContext,
        state: &mut RunState,
        report: &mut RunReport,
        options: RunOptions,
    ) -> Result<PluginOutcome> {
        let outcome = match kind {
            PluginKind::SourceDiscovery => {
                let (files, outcome) = sources::discover_sources(ctx).await?;
                report.files_discovered = files.len();
                report.files_skipped_too_large = outcome.count("too_large");
                state.files = Arc::new(files);
                state.changed = state.files.clone();
                report.files_selected = state.changed.len();
                outcome
            }
            PluginKind::ContentIndexer => {
                let (selection, outcome) = sources::index_contents(ctx, options.force).await?;
                report.files_unchanged = selection.unchanged;
                report.files_selected = selection.changed.len();
                report.stale_cleared = selection.stale_cleared;
                state.files = Arc::new(selection.files);
                state.changed = Arc::new(selection.changed);
                outcome
            }
            PluginKind::JsAnalyzer => {
                let (summary, outcome) = analysis::analyze_changed(ctx).await?;
                report.files_analyzed = summary.analyzed;
                report.files_failed = summary.failed;
                report.cleared_then_failed = summary.cleared_then_failed;
                report.failed_commits = summary.failed_commits;
                report.unresolved = summary.unresolved;
                report.cancelled |= summary.cancelled;
                outcome
            }
            PluginKind::EvalBanValidator | PluginKind::UnresolvedCallValidator => {
                validation::run(kind, ctx).await?
            }
            _ => enrichment::run(kind, ctx).await?,
        };
        Ok(outcome)
    }

    fn context(&self, phase: Phase, kind: PluginKind, state: &RunState) -> PluginContext {
        PluginContext {
            store: self.store.clone(),
            config: self.config.clone(),
            root: Arc::new(self.root.clone()),
            files: state.files.clone(),
            changed: state.changed.clone(),
            phase,
            plugin: kind.name(),
            progress: self.progress.clone(),
            cancel: self.cancel.clone(),
            locks: self.locks.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::shared;
    use sylva_graph::MemoryGraph;

    fn orchestrator(config: Config) -> Orchestrator {
        Orchestrator::new(".", config, shared(Box::new(MemoryGraph::new())))
    }

    #[test]
    fn test_unknown_disabled_plugin_is_a_config_error() {
        let mut config = Config::default();
        config.plugins.disabled.push("NoSuchPlugin".to_string());
        assert!(matches!(
            orchestrator(config).plan(),
            Err(ConfigError::UnknownPlugin(_))
        ));
    }

    #[test]
    fn test_disabling_a_dependency_is_a_config_error() {
        let mut config = Config::default();
        config.plugins.disabled.push("FunctionCallResolver".to_string());
        assert!(matches!(
            orchestrator(config).plan(),
            Err(ConfigError::UnknownDependency { .. })
        ));
    }

    #[test]
    fn test_disabled_plugins_are_left_out() {
        let mut config = Config::default();
        config.plugins.disabled.push("EvalBanValidator".to_string());
        let phases = orchestrator(config).plan().unwrap();
        let names: Vec<_> = phases
            .iter()
            .flat_map(|p| p.plugins.iter().map(|m| m.name.clone()))
            .collect();
        assert_eq!(names.len(), PluginKind::ALL.len() - 1);
        assert!(!names.contains(&"EvalBanValidator".to_string()));
    }

    #[tokio::test]
    async fn test_cancelled_run_stops_before_work() {
        let orchestrator = orchestrator(Config::default());
        orchestrator.cancellation_token().cancel();
        let report = orchestrator.run(RunOptions::default()).await.unwrap();
        assert!(report.cancelled);
        assert!(report.plugins.is_empty());
    }
}
