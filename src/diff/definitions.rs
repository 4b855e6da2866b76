//! Objects compared by their server-rendered definition text.
//!
//! Apart from functions, none of these can be altered in place, so any
//! change becomes a drop followed by a create.

use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::constraint::Constraint;
use crate::catalog::function::Function;
use crate::catalog::id::ObjectId;
use crate::catalog::index::Index;
use crate::catalog::trigger::Trigger;
use crate::catalog::view::View;
use crate::diff::diff_list;
use crate::diff::operations::{
    ConstraintOperation, FunctionOperation, IndexOperation, MigrationStep, TriggerOperation,
    ViewOperation,
};

pub fn diff_function(old: Option<&Function>, new: Option<&Function>) -> Vec<MigrationStep> {
    match (old, new) {
        (None, Some(n)) => vec![MigrationStep::Function(FunctionOperation::Replace(n.clone()))],
        (Some(o), None) => vec![MigrationStep::Function(FunctionOperation::Drop(o.clone()))],
        // CREATE OR REPLACE cannot change the return type or the routine kind
        (Some(o), Some(n)) if o.result != n.result || o.is_procedure != n.is_procedure => vec![
            MigrationStep::Function(FunctionOperation::Drop(o.clone())),
            MigrationStep::Function(FunctionOperation::Replace(n.clone())),
        ],
        (Some(o), Some(n)) if o.definition != n.definition => {
            vec![MigrationStep::Function(FunctionOperation::Replace(n.clone()))]
        }
        _ => vec![],
    }
}

pub fn diff_constraint(old: Option<&Constraint>, new: Option<&Constraint>) -> Vec<MigrationStep> {
    match (old, new) {
        (None, Some(n)) => vec![MigrationStep::Constraint(ConstraintOperation::Add(n.clone()))],
        (Some(o), None) => vec![MigrationStep::Constraint(ConstraintOperation::Drop(o.clone()))],
        (Some(o), Some(n)) if o.definition != n.definition => vec![
            MigrationStep::Constraint(ConstraintOperation::Drop(o.clone())),
            MigrationStep::Constraint(ConstraintOperation::Add(n.clone())),
        ],
        _ => vec![],
    }
}

pub fn diff_index(old: Option<&Index>, new: Option<&Index>) -> Vec<MigrationStep> {
    match (old, new) {
        (None, Some(n)) => vec![MigrationStep::Index(IndexOperation::Create(n.clone()))],
        (Some(o), None) => vec![MigrationStep::Index(IndexOperation::Drop(o.clone()))],
        (Some(o), Some(n)) if o.definition != n.definition => vec![
            MigrationStep::Index(IndexOperation::Drop(o.clone())),
            MigrationStep::Index(IndexOperation::Create(n.clone())),
        ],
        _ => vec![],
    }
}

pub fn diff_trigger(old: Option<&Trigger>, new: Option<&Trigger>) -> Vec<MigrationStep> {
    match (old, new) {
        (None, Some(n)) => vec![MigrationStep::Trigger(TriggerOperation::Create(n.clone()))],
        (Some(o), None) => vec![MigrationStep::Trigger(TriggerOperation::Drop(o.clone()))],
        (Some(o), Some(n)) if o.definition != n.definition => vec![
            MigrationStep::Trigger(TriggerOperation::Drop(o.clone())),
            MigrationStep::Trigger(TriggerOperation::Create(n.clone())),
        ],
        _ => vec![],
    }
}

fn view_changed(old: &View, new: &View) -> bool {
    old.definition != new.definition || old.materialized != new.materialized
}

/// Diff views, also rebuilding unchanged views that select from a view being
/// dropped or from a column in `reshaped_columns` (PostgreSQL refuses to drop
/// or retype anything a view depends on).
pub fn diff_views(
    old: &[View],
    new: &[View],
    reshaped_columns: &BTreeSet<ObjectId>,
) -> Vec<MigrationStep> {
    let new_by_id: BTreeMap<ObjectId, &View> = new.iter().map(|v| (v.id(), v)).collect();

    let mut dropped: BTreeSet<ObjectId> = old
        .iter()
        .filter(|o| new_by_id.get(&o.id()).is_none_or(|n| view_changed(o, n)))
        .map(View::id)
        .collect();

    let mut cascaded: BTreeSet<ObjectId> = old
        .iter()
        .filter(|o| !dropped.contains(&o.id()))
        .filter(|o| o.depends_on.iter().any(|dep| reshaped_columns.contains(dep)))
        .map(View::id)
        .collect();
    dropped.extend(cascaded.iter().cloned());

    // Grow the dropped set until no surviving view depends on a dropped one
    loop {
        let more: Vec<ObjectId> = old
            .iter()
            .filter(|o| !dropped.contains(&o.id()))
            .filter(|o| o.depends_on.iter().any(|dep| dropped.contains(dep)))
            .map(View::id)
            .collect();
        if more.is_empty() {
            break;
        }
        for id in more {
            dropped.insert(id.clone());
            cascaded.insert(id);
        }
    }

    diff_list(old, new, View::id, |o, n| match (o, n) {
        (None, Some(n)) => vec![MigrationStep::View(ViewOperation::Create(n.clone()))],
        (Some(o), None) => vec![MigrationStep::View(ViewOperation::Drop(o.clone()))],
        (Some(o), Some(n)) if view_changed(o, n) || cascaded.contains(&o.id()) => vec![
            MigrationStep::View(ViewOperation::Drop(o.clone())),
            MigrationStep::View(ViewOperation::Create(n.clone())),
        ],
        _ => vec![],
    })
}
