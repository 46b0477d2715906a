//! ArgumentParameterLinker: `RECEIVES_ARGUMENT` from each parameter to the
//! value passed in its position.

use super::{first_target, nodes_of_kinds, Derived};
use crate::report::{PluginOutcome, SkipReason};
use std::collections::HashSet;
use sylva_core::{attrs, Node, NodeId, NodeKind};
use sylva_graph::assembler::NO_VALUE;
use sylva_graph::{Edge, EdgeKind, GraphStore};

const SPREAD: &str = "SpreadElement";

pub(crate) fn derive(store: &dyn GraphStore, outcome: &mut PluginOutcome) -> Derived {
    let mut derived = Derived::default();

    let sites = nodes_of_kinds(
        store,
        &[NodeKind::Call, NodeKind::MethodCall, NodeKind::ConstructorCall],
    );
    for site in sites {
        let arguments = match site.attr_list(attrs::ARGUMENTS) {
            Some(arguments) if !arguments.is_empty() => arguments,
            _ => {
                // Nothing to pass.
                outcome.skip(SkipReason::WrongKind);
                continue;
            }
        };
        let callee = match callee_of(store, site) {
            Ok(callee) => callee,
            Err(reason) => {
                outcome.skip(reason);
                continue;
            }
        };
        let parameters = parameters_of(store, &callee);

        for (index, value) in arguments.iter().enumerate() {
            if value == NO_VALUE {
                outcome.skip(SkipReason::Unsupported);
                continue;
            }
            let value = NodeId::new(value.as_str());
            let Some(value_node) = store.get_node(&value) else {
                outcome.skip(SkipReason::TargetNotFound);
                continue;
            };
            // Positions after a spread are unknowable.
            if value_node.kind == NodeKind::Expression && value_node.attr_str(attrs::SHAPE) == Some(SPREAD) {
                for _ in index..arguments.len() {
                    outcome.skip(SkipReason::Unsupported);
                }
                break;
            }
            let Some(parameter) = parameter_at(&parameters, index) else {
                outcome.skip(SkipReason::TargetNotFound);
                continue;
            };
            if parameter.attr_bool(attrs::DESTRUCTURED) {
                outcome.skip(SkipReason::Unsupported);
                continue;
            }
            derived.edge(
                store,
                Edge::new(EdgeKind::ReceivesArgument, parameter.id.clone(), value),
                outcome,
            );
        }
    }
    derived
}

/// The function or method a call site runs.
fn callee_of(store: &dyn GraphStore, site: &Node) -> Result<NodeId, SkipReason> {
    if let Some(function) = first_target(store, &site.id, EdgeKind::Calls) {
        return Ok(function);
    }
    if site.kind != NodeKind::ConstructorCall {
        return Err(SkipReason::MissingUpstreamEdge);
    }
    let class = first_target(store, &site.id, EdgeKind::InstanceOf).ok_or(SkipReason::MissingUpstreamEdge)?;
    constructor_of(store, &class)
}

/// The constructor a class runs, inherited along `EXTENDS`.
fn constructor_of(store: &dyn GraphStore, class: &NodeId) -> Result<NodeId, SkipReason> {
    let mut seen = HashSet::new();
    let mut current = Some(class.clone());
    while let Some(class) = current {
        if !seen.insert(class.clone()) {
            return Err(SkipReason::Unsupported);
        }
        let constructor = store
            .get_outgoing_edges(&class, &[EdgeKind::Contains])
            .into_iter()
            .filter_map(|e| store.get_node(&e.dst))
            .find(|n| n.kind == NodeKind::Method && n.attr_str(attrs::METHOD_KIND) == Some("constructor"));
        if let Some(constructor) = constructor {
            return Ok(constructor.id.clone());
        }
        current = first_target(store, &class, EdgeKind::Extends);
    }
    Err(SkipReason::TargetNotFound)
}

/// Parameters of a callable, in declaration order.
fn parameters_of<'s>(store: &'s dyn GraphStore, callable: &NodeId) -> Vec<&'s Node> {
    let mut parameters: Vec<&Node> = store
        .get_outgoing_edges(callable, &[EdgeKind::HasParameter])
        .into_iter()
        .filter_map(|e| store.get_node(&e.dst))
        .collect();
    parameters.sort_by_key(|p| (p.attr_int(attrs::INDEX).unwrap_or(i64::MAX), p.offset()));
    parameters
}

/// The parameter receiving argument `index`. A rest parameter takes every
/// argument from its own position on.
fn parameter_at<'a>(parameters: &[&'a Node], index: usize) -> Option<&'a Node> {
    let index = index as i64;
    let mut rest = None;
    for parameter in parameters {
        let position = parameter.attr_int(attrs::INDEX)?;
        if parameter.attr_bool(attrs::REST) {
            if position <= index {
                rest = Some(*parameter);
            }
        } else if position == index {
            return Some(*parameter);
        }
    }
    rest
}
