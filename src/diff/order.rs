//! Statement ordering.
//!
//! Steps run in three bands:
//! 1. drops of dependent objects (triggers, views, indexes, constraints) and of
//!    anything that is recreated under the same identity;
//! 2. creates and alters in phase order;
//! 3. remaining drops (functions, columns, tables, sequences, types,
//!    extensions, schemas), after nothing new can still reference them.
//!
//! Views additionally follow their view-on-view dependencies.

use anyhow::{Result, anyhow};
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::id::ObjectId;
use crate::diff::operations::{MigrationStep, Phase, ViewOperation};

pub fn order_steps(steps: Vec<MigrationStep>) -> Result<Vec<MigrationStep>> {
    let recreated: BTreeSet<ObjectId> = steps
        .iter()
        .filter(|s| !s.is_drop())
        .map(MigrationStep::id)
        .collect();

    let mut early_drops = Vec::new();
    let mut changes = Vec::new();
    let mut late_drops = Vec::new();

    for step in steps {
        if !step.is_drop() {
            changes.push(step);
        } else if step.phase() >= Phase::Constraint || recreated.contains(&step.id()) {
            early_drops.push(step);
        } else {
            late_drops.push(step);
        }
    }

    // Stable sorts keep the id order produced by the differ within a phase
    early_drops.sort_by_key(|s| std::cmp::Reverse(s.phase()));
    changes.sort_by_key(MigrationStep::phase);
    late_drops.sort_by_key(|s| std::cmp::Reverse(s.phase()));

    let mut ordered = order_views(early_drops, true)?;
    ordered.extend(order_views(changes, false)?);
    ordered.extend(late_drops);
    Ok(ordered)
}

/// Reorder the view steps inside `steps` by dependency, leaving every other
/// step where it is. Drops put dependents first, creates put them last.
fn order_views(steps: Vec<MigrationStep>, dropping: bool) -> Result<Vec<MigrationStep>> {
    let positions: Vec<usize> = steps
        .iter()
        .enumerate()
        .filter(|(_, s)| matches!(s, MigrationStep::View(_)))
        .map(|(i, _)| i)
        .collect();
    if positions.len() < 2 {
        return Ok(steps);
    }

    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let nodes: Vec<_> = positions.iter().map(|&i| graph.add_node(i)).collect();
    let node_by_id: BTreeMap<ObjectId, _> = positions
        .iter()
        .zip(&nodes)
        .map(|(&i, &node)| (steps[i].id(), node))
        .collect();

    for (&i, &node) in positions.iter().zip(&nodes) {
        let MigrationStep::View(ViewOperation::Create(view) | ViewOperation::Drop(view)) = &steps[i]
        else {
            continue;
        };
        for dep in &view.depends_on {
            if let Some(&dep_node) = node_by_id.get(dep) {
                if dropping {
                    graph.add_edge(node, dep_node, ());
                } else {
                    graph.add_edge(dep_node, node, ());
                }
            }
        }
    }

    let sorted = toposort(&graph, None).map_err(|cycle| {
        let step = graph
            .node_weight(cycle.node_id())
            .map(|&i| steps[i].id().to_string())
            .unwrap_or_default();
        anyhow!("Dependency cycle detected between views involving {}", step)
    })?;

    let mut slots: Vec<Option<MigrationStep>> = steps.into_iter().map(Some).collect();
    let view_order: Vec<usize> = sorted
        .into_iter()
        .filter_map(|node| graph.node_weight(node).copied())
        .collect();
    let reordered: Vec<MigrationStep> = view_order
        .iter()
        .filter_map(|&i| slots[i].take())
        .collect();

    // Put the sorted views back into the slots the views occupied
    for (&position, step) in positions.iter().zip(reordered) {
        slots[position] = Some(step);
    }
    Ok(slots.into_iter().flatten().collect())
}
