//! CLI command implementations.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use sylva_core::{attrs, Node, NodeKind};
use sylva_engine::{shared, Config, Orchestrator, Phase, ProgressSink, RunOptions, RunReport};
use sylva_graph::{GraphExport, GraphStore, LifecycleManager, NodeFilter, SledStore};
use tracing::warn;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Drives an indicatif bar from pipeline progress.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Result<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
        bar.enable_steady_tick(Duration::from_millis(80));
        Ok(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for BarProgress {
    fn phase_started(&self, phase: Phase) {
        self.bar.set_message(format!("{}...", phase));
    }

    fn files_planned(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.cyan} {msg} [{bar:30.cyan/blue}] {pos}/{len}")
        {
            self.bar.set_style(style.progress_chars("=> "));
        }
    }

    fn file_done(&self, file: &str) {
        self.bar.inc(1);
        self.bar.set_message(file.to_string());
    }

    fn phase_finished(&self, phase: Phase) {
        if phase == Phase::Analysis {
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
                self.bar.set_style(style);
            }
        }
    }
}

fn open_store(path: &Path, config: &Config) -> Result<SledStore> {
    Ok(SledStore::open(config.store_path(path))?)
}

/// Loads config and the existing store, or explains how to create them.
fn existing_store(path: &Path) -> Result<Option<(Config, SledStore)>> {
    let config = Config::load(path)?;
    if !config.store_path(path).exists() {
        println!("{} No graph found in {}", "✗".red(), path.display());
        println!("  Run {} first", "sylva analyze".cyan());
        return Ok(None);
    }
    let store = open_store(path, &config)?;
    Ok(Some((config, store)))
}

/// Initialize Sylva in a directory.
pub fn init(path: &Path) -> Result<()> {
    if Config::path(path).exists() {
        println!("{} Already initialized", "✓".green());
        return Ok(());
    }

    Config::default().save(path)?;

    println!("{} Initialized Sylva in {}", "✓".green(), path.display());
    println!("  Run {} to analyze your codebase", "sylva analyze".cyan());

    Ok(())
}

/// Analyze a workspace and update its graph.
pub async fn analyze(path: &Path, force: bool, json: bool) -> Result<()> {
    let config = Config::load(path)?;
    let store = shared(Box::new(open_store(path, &config)?));

    if !json {
        println!("{}", "Analyzing codebase...".cyan());
    }
    let progress = Arc::new(BarProgress::new()?);
    let orchestrator = Orchestrator::new(path, config, store.clone()).with_progress(progress.clone());

    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current files");
            cancel.cancel();
        }
    });

    let report = orchestrator.run(RunOptions { force }).await;
    progress.finish();
    let report = report?;

    if json {
        println!("{}", report.to_json()?);
        return Ok(());
    }

    print_report(&report);
    let store = store.read().await;
    print_issues(store.as_ref());
    Ok(())
}

fn print_report(report: &RunReport) {
    println!(
        "{} Analyzed {} files ({} unchanged) in {}ms",
        "✓".green(),
        report.files_analyzed.to_string().cyan(),
        report.files_unchanged,
        report.duration_ms
    );
    println!(
        "  {} nodes, {} edges, {} issues",
        report.nodes.to_string().cyan(),
        report.edges.to_string().cyan(),
        report.issues
    );

    if report.files_failed > 0 || report.failed_commits > 0 {
        println!(
            "{} {} files failed to parse, {} commits failed",
            "⚠".yellow(),
            report.files_failed,
            report.failed_commits
        );
        if report.cleared_then_failed > 0 {
            println!(
                "  {} previously analyzed files now have no facts",
                report.cleared_then_failed
            );
        }
    }
    if report.stale_cleared > 0 {
        println!("  Cleared {} deleted files", report.stale_cleared);
    }
    if report.cancelled {
        println!("{} Run was cancelled; the graph is partial", "⚠".yellow());
    }

    println!();
    for plugin in &report.plugins {
        let skipped: usize = plugin.skips.values().sum();
        let budget = if plugin.over_budget { " over budget".yellow().to_string() } else { String::new() };
        println!(
            "  {:<26} {:>6}ms  {}{}",
            plugin.name,
            plugin.duration_ms,
            format!("{} skipped", skipped).dimmed(),
            budget
        );
    }

    let skips = report.skip_totals();
    if !skips.is_empty() {
        let breakdown: Vec<String> = skips.iter().map(|(reason, n)| format!("{}={}", reason, n)).collect();
        println!("\n  {} {}", "Skips:".dimmed(), breakdown.join(", "));
    }
    if !report.unresolved.is_empty() {
        let breakdown: Vec<String> = report
            .unresolved
            .iter()
            .map(|(reason, n)| format!("{}={}", reason, n))
            .collect();
        println!("  {} {}", "Unresolved:".dimmed(), breakdown.join(", "));
    }
}

fn print_issues(store: &dyn GraphStore) {
    let mut issues: Vec<&Node> = store
        .query_nodes(&NodeFilter::new().kind(NodeKind::Issue))
        .collect();
    if issues.is_empty() {
        return;
    }
    issues.sort_by(|a, b| (&a.file, a.position).cmp(&(&b.file, b.position)));

    println!("\n{} issues:", issues.len());
    for issue in issues.iter().take(20) {
        let severity = issue.attr_str(attrs::SEVERITY).unwrap_or("info");
        let label = match severity {
            "error" => severity.red().bold(),
            "warning" => severity.yellow(),
            _ => severity.normal(),
        };
        println!(
            "  {} {} {} {}",
            label,
            format!("{}:{}", issue.file, issue.position).dimmed(),
            issue.attr_str(attrs::MESSAGE).unwrap_or(""),
            format!("[{}]", issue.name).dimmed()
        );
    }
    if issues.len() > 20 {
        println!("  ... and {} more", issues.len() - 20);
    }
}

/// Query the stored graph.
pub fn query(path: &Path, query: &str, kind: Option<&str>, file: Option<&str>, limit: usize) -> Result<()> {
    let Some((_, store)) = existing_store(path)? else {
        return Ok(());
    };

    let mut filter = NodeFilter::new();
    if let Some(kind) = kind {
        filter = filter.kind(kind.parse::<NodeKind>()?);
    }
    if let Some(file) = file {
        filter = filter.file(file);
    }

    let needle = query.to_lowercase();
    let mut matches: Vec<&Node> = store
        .query_nodes(&filter)
        .filter(|n| n.name.to_lowercase().contains(&needle))
        .collect();
    matches.sort_by(|a, b| a.id.cmp(&b.id));
    let total = matches.len();

    if matches.is_empty() {
        println!("No matches found for \"{}\"", query);
        return Ok(());
    }

    println!("Found {} matches:\n", total);

    for node in matches.into_iter().take(limit) {
        println!(
            "  {} {} {}",
            node.kind.to_string().yellow(),
            node.id.to_string().cyan(),
            format!("({}:{})", node.file, node.position).dimmed()
        );
        let outgoing = store.get_outgoing_edges(&node.id, &[]);
        for edge in outgoing.iter().take(5) {
            println!("    {} {}", edge.kind.to_string().dimmed(), edge.dst);
        }
        if outgoing.len() > 5 {
            println!("    ... and {} more edges", outgoing.len() - 5);
        }
    }
    if total > limit {
        println!("\n  ... and {} more", total - limit);
    }

    Ok(())
}

/// Show graph status.
pub fn status(path: &Path) -> Result<()> {
    if !Config::path(path).exists() {
        println!("{} Sylva not initialized in this directory", "✗".red());
        println!("  Run {} to initialize", "sylva init".cyan());
        return Ok(());
    }
    let Some((config, store)) = existing_store(path)? else {
        return Ok(());
    };

    let mut kinds: BTreeMap<String, usize> = BTreeMap::new();
    let mut severities: BTreeMap<String, usize> = BTreeMap::new();
    for node in store.query_nodes(&NodeFilter::new()) {
        *kinds.entry(node.kind.to_string()).or_insert(0) += 1;
        if node.kind == NodeKind::Issue {
            let severity = node.attr_str(attrs::SEVERITY).unwrap_or("info").to_string();
            *severities.entry(severity).or_insert(0) += 1;
        }
    }

    println!("{}", "Sylva Status".cyan().bold());
    println!();
    println!("  {} {}", "Store:".dimmed(), config.store_path(path).display());
    println!("  {} {}", "Files:".dimmed(), store.files().len());
    println!("  {} {}", "Nodes:".dimmed(), store.node_count());
    println!("  {} {}", "Edges:".dimmed(), store.edge_count());
    if !config.plugins.disabled.is_empty() {
        println!("  {} {}", "Disabled:".dimmed(), config.plugins.disabled.join(", "));
    }
    println!();
    for (kind, count) in &kinds {
        println!("  {:<18} {}", kind, count);
    }
    if !severities.is_empty() {
        let breakdown: Vec<String> = severities.iter().map(|(s, n)| format!("{} {}", n, s)).collect();
        println!("\n  {} {}", "Issues:".dimmed(), breakdown.join(", "));
    }

    Ok(())
}

/// Remove stored facts.
pub fn clear(path: &Path, file: Option<&str>) -> Result<()> {
    let Some((_, mut store)) = existing_store(path)? else {
        return Ok(());
    };

    match file {
        Some(file) => {
            let removed = LifecycleManager::new().clear_file(&mut store, file)?;
            store.flush()?;
            println!("{} Cleared {} nodes of {}", "✓".green(), removed, file);
        }
        None => {
            let nodes = store.node_count();
            store.clear()?;
            println!("{} Cleared the graph ({} nodes)", "✓".green(), nodes);
        }
    }
    Ok(())
}

/// Export the graph to JSON.
pub fn export(path: &Path, output: &Path) -> Result<()> {
    let Some((_, store)) = existing_store(path)? else {
        return Ok(());
    };

    let export = GraphExport::from_store(&store);
    fs::write(output, serde_json::to_string_pretty(&export)?)?;
    println!(
        "{} Exported {} nodes and {} edges to {}",
        "✓".green(),
        export.nodes.len(),
        export.edges.len(),
        output.display()
    );

    Ok(())
}
