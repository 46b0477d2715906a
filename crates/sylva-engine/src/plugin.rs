//! Plugin metadata and execution planning.
//!
//! Plugins are a closed set. Each one declares its phase, its priority, what
//! it creates and consumes, and explicit dependencies. Inside a phase the
//! planner orders plugins topologically: explicit dependencies first, then
//! producer-before-consumer edges derived from the declared edge kinds, with
//! ties broken by priority (higher first) and then name.

use crate::error::ConfigError;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use sylva_core::NodeKind;
use sylva_graph::EdgeKind;

/// Pipeline phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Discovery,
    Indexing,
    Analysis,
    Enrichment,
    Validation,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Discovery,
        Phase::Indexing,
        Phase::Analysis,
        Phase::Enrichment,
        Phase::Validation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Discovery => "discovery",
            Phase::Indexing => "indexing",
            Phase::Analysis => "analysis",
            Phase::Enrichment => "enrichment",
            Phase::Validation => "validation",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The built-in plugins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PluginKind {
    SourceDiscovery,
    ContentIndexer,
    JsAnalyzer,
    ImportExportLinker,
    ClassHierarchyResolver,
    FunctionCallResolver,
    MethodCallResolver,
    ArgumentParameterLinker,
    SuppressionIndexer,
    EvalBanValidator,
    UnresolvedCallValidator,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Creates {
    pub nodes: Vec<NodeKind>,
    pub edges: Vec<EdgeKind>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Consumes {
    pub edges: Vec<EdgeKind>,
}

/// Declarative description of a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginMetadata {
    pub name: String,
    pub phase: Phase,
    pub priority: i32,
    pub creates: Creates,
    pub consumes: Consumes,
    pub dependencies: Vec<String>,
}

impl PluginMetadata {
    pub fn new(name: impl Into<String>, phase: Phase, priority: i32) -> Self {
        Self {
            name: name.into(),
            phase,
            priority,
            creates: Creates::default(),
            consumes: Consumes::default(),
            dependencies: Vec::new(),
        }
    }

    pub fn creates_nodes(mut self, kinds: &[NodeKind]) -> Self {
        self.creates.nodes.extend_from_slice(kinds);
        self
    }

    pub fn creates_edges(mut self, kinds: &[EdgeKind]) -> Self {
        self.creates.edges.extend_from_slice(kinds);
        self
    }

    pub fn consumes_edges(mut self, kinds: &[EdgeKind]) -> Self {
        self.consumes.edges.extend_from_slice(kinds);
        self
    }

    pub fn depends_on(mut self, names: &[&str]) -> Self {
        self.dependencies.extend(names.iter().map(|n| n.to_string()));
        self
    }
}

impl PluginKind {
    pub const ALL: [PluginKind; 11] = [
        PluginKind::SourceDiscovery,
        PluginKind::ContentIndexer,
        PluginKind::JsAnalyzer,
        PluginKind::ImportExportLinker,
        PluginKind::ClassHierarchyResolver,
        PluginKind::FunctionCallResolver,
        PluginKind::MethodCallResolver,
        PluginKind::ArgumentParameterLinker,
        PluginKind::SuppressionIndexer,
        PluginKind::EvalBanValidator,
        PluginKind::UnresolvedCallValidator,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PluginKind::SourceDiscovery => "SourceDiscovery",
            PluginKind::ContentIndexer => "ContentIndexer",
            PluginKind::JsAnalyzer => "JsAnalyzer",
            PluginKind::ImportExportLinker => "ImportExportLinker",
            PluginKind::ClassHierarchyResolver => "ClassHierarchyResolver",
            PluginKind::FunctionCallResolver => "FunctionCallResolver",
            PluginKind::MethodCallResolver => "MethodCallResolver",
            PluginKind::ArgumentParameterLinker => "ArgumentParameterLinker",
            PluginKind::SuppressionIndexer => "SuppressionIndexer",
            PluginKind::EvalBanValidator => "EvalBanValidator",
            PluginKind::UnresolvedCallValidator => "UnresolvedCallValidator",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }

    pub fn metadata(&self) -> PluginMetadata {
        use EdgeKind as E;
        let meta = |phase, priority| PluginMetadata::new(self.name(), phase, priority);
        match self {
            PluginKind::SourceDiscovery => meta(Phase::Discovery, 100),
            PluginKind::ContentIndexer => meta(Phase::Indexing, 100),
            PluginKind::JsAnalyzer => meta(Phase::Analysis, 100)
                .creates_nodes(&NodeKind::ALL[..NodeKind::ALL.len() - 2])
                .creates_edges(&[
                    E::Contains,
                    E::HasScope,
                    E::HasParameter,
                    E::HasCondition,
                    E::Declares,
                    E::Calls,
                    E::PassesArgument,
                    E::AssignedFrom,
                    E::Returns,
                    E::Yields,
                    E::DelegatesTo,
                    E::DerivesFrom,
                    E::InstanceOf,
                    E::Extends,
                    E::Exports,
                ]),
            PluginKind::ImportExportLinker => meta(Phase::Enrichment, 100)
                .creates_edges(&[E::Imports, E::ImportsFrom]),
            PluginKind::ClassHierarchyResolver => meta(Phase::Enrichment, 80)
                .creates_edges(&[E::Extends, E::InstanceOf, E::Calls])
                .consumes_edges(&[E::ImportsFrom, E::Exports]),
            PluginKind::FunctionCallResolver => meta(Phase::Enrichment, 80)
                .creates_edges(&[E::Calls])
                .consumes_edges(&[E::ImportsFrom, E::Exports, E::AssignedFrom]),
            PluginKind::MethodCallResolver => meta(Phase::Enrichment, 70)
                .creates_edges(&[E::Calls])
                .consumes_edges(&[E::Extends, E::InstanceOf, E::AssignedFrom]),
            PluginKind::ArgumentParameterLinker => meta(Phase::Enrichment, 50)
                .creates_edges(&[E::ReceivesArgument])
                .consumes_edges(&[E::Calls, E::InstanceOf, E::HasParameter]),
            PluginKind::SuppressionIndexer => meta(Phase::Enrichment, 40)
                .creates_nodes(&[NodeKind::Suppression])
                .creates_edges(&[E::Suppresses]),
            PluginKind::EvalBanValidator => meta(Phase::Validation, 100)
                .creates_nodes(&[NodeKind::Issue])
                .creates_edges(&[E::Affects])
                .consumes_edges(&[E::Calls, E::Suppresses]),
            PluginKind::UnresolvedCallValidator => meta(Phase::Validation, 50)
                .creates_nodes(&[NodeKind::Issue])
                .creates_edges(&[E::Affects])
                .consumes_edges(&[E::Calls, E::Suppresses, E::ImportsFrom])
                .depends_on(&["FunctionCallResolver", "MethodCallResolver"]),
        }
    }
}

/// Plugins of one phase, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhasePlan {
    pub phase: Phase,
    pub plugins: Vec<PluginMetadata>,
}

/// Orders plugins into phases.
///
/// Fails on a dependency that is not in `plugins`, a dependency on a plugin
/// of a later phase, or a cycle.
pub fn plan(plugins: &[PluginMetadata]) -> Result<Vec<PhasePlan>, ConfigError> {
    let by_name: BTreeMap<&str, &PluginMetadata> =
        plugins.iter().map(|p| (p.name.as_str(), p)).collect();

    for plugin in plugins {
        for dependency in &plugin.dependencies {
            let Some(target) = by_name.get(dependency.as_str()) else {
                return Err(ConfigError::UnknownDependency {
                    plugin: plugin.name.clone(),
                    dependency: dependency.clone(),
                });
            };
            if target.phase > plugin.phase {
                return Err(ConfigError::LaterPhaseDependency {
                    plugin: plugin.name.clone(),
                    phase: plugin.phase.to_string(),
                    dependency: dependency.clone(),
                    dependency_phase: target.phase.to_string(),
                });
            }
        }
    }

    let mut phases = Vec::new();
    for phase in Phase::ALL {
        let members: Vec<&PluginMetadata> = plugins.iter().filter(|p| p.phase == phase).collect();
        if members.is_empty() {
            continue;
        }
        phases.push(PhasePlan {
            phase,
            plugins: order_phase(&members)?,
        });
    }
    Ok(phases)
}

/// Kahn's algorithm over one phase.
fn order_phase(members: &[&PluginMetadata]) -> Result<Vec<PluginMetadata>, ConfigError> {
    let names: BTreeSet<&str> = members.iter().map(|p| p.name.as_str()).collect();
    // before[a] = plugins that must run before a
    let mut before: BTreeMap<&str, BTreeSet<&str>> =
        members.iter().map(|p| (p.name.as_str(), BTreeSet::new())).collect();

    for plugin in members {
        let entry = before.entry(plugin.name.as_str()).or_default();
        for dependency in &plugin.dependencies {
            if names.contains(dependency.as_str()) {
                entry.insert(dependency.as_str());
            }
        }
    }
    for consumer in members {
        for producer in members {
            if producer.name == consumer.name {
                continue;
            }
            let feeds = producer
                .creates
                .edges
                .iter()
                .any(|kind| consumer.consumes.edges.contains(kind));
            if feeds {
                before
                    .entry(consumer.name.as_str())
                    .or_default()
                    .insert(producer.name.as_str());
            }
        }
    }

    let mut remaining: Vec<&PluginMetadata> = members.to_vec();
    let mut done: BTreeSet<&str> = BTreeSet::new();
    let mut ordered = Vec::with_capacity(members.len());

    while !remaining.is_empty() {
        let next = remaining
            .iter()
            .enumerate()
            .filter(|(_, p)| {
                before
                    .get(p.name.as_str())
                    .map_or(true, |deps| deps.iter().all(|d| done.contains(d)))
            })
            .min_by(|(_, a), (_, b)| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)))
            .map(|(index, _)| index);

        let Some(index) = next else {
            let mut cycle: Vec<String> = remaining.iter().map(|p| p.name.clone()).collect();
            cycle.sort();
            return Err(ConfigError::Cycle(cycle));
        };
        let plugin = remaining.remove(index);
        done.insert(plugin.name.as_str());
        ordered.push(plugin.clone());
    }
    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(plan: &PhasePlan) -> Vec<&str> {
        plan.plugins.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_builtin_plan() {
        let metadata: Vec<_> = PluginKind::ALL.iter().map(|k| k.metadata()).collect();
        let plan = plan(&metadata).unwrap();
        assert_eq!(plan.len(), 5);

        let enrichment = plan.iter().find(|p| p.phase == Phase::Enrichment).unwrap();
        assert_eq!(
            names(enrichment),
            vec![
                "ImportExportLinker",
                "ClassHierarchyResolver",
                "FunctionCallResolver",
                "MethodCallResolver",
                "ArgumentParameterLinker",
                "SuppressionIndexer",
            ]
        );
        let validation = plan.iter().find(|p| p.phase == Phase::Validation).unwrap();
        assert_eq!(names(validation), vec!["EvalBanValidator", "UnresolvedCallValidator"]);
    }

    #[test]
    fn test_consumer_runs_after_producer_despite_priority() {
        let producer = PluginMetadata::new("Low", Phase::Enrichment, 1).creates_edges(&[EdgeKind::Calls]);
        let consumer = PluginMetadata::new("High", Phase::Enrichment, 99).consumes_edges(&[EdgeKind::Calls]);
        let plan = plan(&[consumer, producer]).unwrap();
        assert_eq!(names(&plan[0]), vec!["Low", "High"]);
    }

    #[test]
    fn test_ties_break_by_name() {
        let b = PluginMetadata::new("Beta", Phase::Validation, 10);
        let a = PluginMetadata::new("Alpha", Phase::Validation, 10);
        let plan = plan(&[b, a]).unwrap();
        assert_eq!(names(&plan[0]), vec!["Alpha", "Beta"]);
    }

    #[test]
    fn test_unknown_dependency_is_rejected() {
        let p = PluginMetadata::new("P", Phase::Enrichment, 1).depends_on(&["Missing"]);
        assert!(matches!(plan(&[p]), Err(ConfigError::UnknownDependency { .. })));
    }

    #[test]
    fn test_later_phase_dependency_is_rejected() {
        let early = PluginMetadata::new("Early", Phase::Analysis, 1).depends_on(&["Late"]);
        let late = PluginMetadata::new("Late", Phase::Validation, 1);
        assert!(matches!(
            plan(&[early, late]),
            Err(ConfigError::LaterPhaseDependency { .. })
        ));
    }

    #[test]
    fn test_cycle_is_rejected() {
        let a = PluginMetadata::new("A", Phase::Enrichment, 1).depends_on(&["B"]);
        let b = PluginMetadata::new("B", Phase::Enrichment, 1).depends_on(&["A"]);
        match plan(&[a, b]) {
            Err(ConfigError::Cycle(names)) => assert_eq!(names, vec!["A", "B"]),
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_earlier_phase_dependency_is_allowed() {
        let analysis = PluginMetadata::new("Analyzer", Phase::Analysis, 1);
        let resolver = PluginMetadata::new("Resolver", Phase::Enrichment, 1).depends_on(&["Analyzer"]);
        let plan = plan(&[resolver, analysis]).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].phase, Phase::Analysis);
    }

    #[test]
    fn test_names_round_trip() {
        for kind in PluginKind::ALL {
            assert_eq!(PluginKind::from_name(kind.name()), Some(kind));
        }
    }
}
