//! Run reporting.

use crate::plugin::Phase;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Why a resolver passed over a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SkipReason {
    /// The relationship already exists.
    AlreadyResolved,
    /// The record or its target is not the kind the resolver handles.
    WrongKind,
    /// The target lives outside the workspace.
    External,
    /// An edge the resolver builds on is absent.
    MissingUpstreamEdge,
    /// No node matches.
    TargetNotFound,
    /// A construct the resolver does not model.
    Unsupported,
}

impl SkipReason {
    pub const ALL: [SkipReason; 6] = [
        SkipReason::AlreadyResolved,
        SkipReason::WrongKind,
        SkipReason::External,
        SkipReason::MissingUpstreamEdge,
        SkipReason::TargetNotFound,
        SkipReason::Unsupported,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::AlreadyResolved => "already_resolved",
            SkipReason::WrongKind => "wrong_kind",
            SkipReason::External => "external",
            SkipReason::MissingUpstreamEdge => "missing_upstream_edge",
            SkipReason::TargetNotFound => "target_not_found",
            SkipReason::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters a plugin accumulates while it runs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PluginOutcome {
    pub counts: BTreeMap<String, usize>,
    pub skips: BTreeMap<SkipReason, usize>,
}

impl PluginOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &str, n: usize) {
        *self.counts.entry(key.to_string()).or_insert(0) += n;
    }

    pub fn count(&self, key: &str) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn skip(&mut self, reason: SkipReason) {
        *self.skips.entry(reason).or_insert(0) += 1;
    }

    pub fn skipped(&self, reason: SkipReason) -> usize {
        self.skips.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_skipped(&self) -> usize {
        self.skips.values().sum()
    }
}

/// One plugin's line in the run report.
#[derive(Debug, Clone, Serialize)]
pub struct PluginReport {
    pub name: String,
    pub phase: Phase,
    pub counts: BTreeMap<String, usize>,
    pub skips: BTreeMap<String, usize>,
    pub duration_ms: u64,
    /// Ran longer than the configured enrichment budget.
    pub over_budget: bool,
}

impl PluginReport {
    pub fn new(name: &str, phase: Phase, outcome: PluginOutcome, duration_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            phase,
            counts: outcome.counts,
            skips: outcome
                .skips
                .into_iter()
                .map(|(reason, n)| (reason.as_str().to_string(), n))
                .collect(),
            duration_ms,
            over_budget: false,
        }
    }

    pub fn count(&self, key: &str) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn skipped(&self, reason: SkipReason) -> usize {
        self.skips.get(reason.as_str()).copied().unwrap_or(0)
    }
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub plugins: Vec<PluginReport>,
    pub files_discovered: usize,
    pub files_skipped_too_large: usize,
    pub files_unchanged: usize,
    pub files_selected: usize,
    pub files_analyzed: usize,
    /// Files whose analysis failed; they hold no facts afterwards.
    pub files_failed: usize,
    /// Failed files that had facts before this run.
    pub cleared_then_failed: usize,
    /// Files whose commit batch failed in the store.
    pub failed_commits: usize,
    /// Files removed from the graph because they vanished from disk.
    pub stale_cleared: usize,
    /// Same-file references left for enrichment, by reason.
    pub unresolved: BTreeMap<String, usize>,
    pub issues: usize,
    pub nodes: usize,
    pub edges: usize,
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn plugin(&self, name: &str) -> Option<&PluginReport> {
        self.plugins.iter().find(|p| p.name == name)
    }

    pub fn phase_plugins(&self, phase: Phase) -> impl Iterator<Item = &PluginReport> {
        self.plugins.iter().filter(move |p| p.phase == phase)
    }

    /// Total skips by reason across every plugin.
    pub fn skip_totals(&self) -> BTreeMap<String, usize> {
        let mut totals = BTreeMap::new();
        for plugin in &self.plugins {
            for (reason, n) in &plugin.skips {
                *totals.entry(reason.clone()).or_insert(0) += n;
            }
        }
        totals
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
