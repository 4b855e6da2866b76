pub mod definitions;
pub mod operations;
pub mod order;
pub mod tables;
pub mod types;

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::catalog::id::ObjectId;
use crate::catalog::schema::{Extension, Schema};
use operations::{ColumnAction, ExtensionOperation, MigrationStep, SchemaOperation};

pub use order::order_steps;

/// Every step needed to turn `old` into `new`, unordered
pub fn diff_all(old: &Catalog, new: &Catalog) -> Vec<MigrationStep> {
    let mut out = Vec::new();

    out.extend(diff_list(&old.schemas, &new.schemas, Schema::id, diff_schema));
    out.extend(diff_list(
        &old.extensions,
        &new.extensions,
        Extension::id,
        diff_extension,
    ));
    out.extend(diff_list(
        &old.types,
        &new.types,
        |t| t.id(),
        types::diff_enum,
    ));
    out.extend(diff_list(
        &old.sequences,
        &new.sequences,
        |s| s.id(),
        types::diff_sequence,
    ));
    let table_steps = diff_list(&old.tables, &new.tables, |t| t.id(), tables::diff);
    let reshaped_columns = reshaped_columns(&table_steps);
    out.extend(table_steps);
    out.extend(diff_list(
        &old.functions,
        &new.functions,
        |f| f.id(),
        definitions::diff_function,
    ));
    out.extend(diff_list(
        &old.constraints,
        &new.constraints,
        |c| c.id(),
        definitions::diff_constraint,
    ));
    out.extend(diff_list(
        &old.indexes,
        &new.indexes,
        |i| i.id(),
        definitions::diff_index,
    ));
    out.extend(definitions::diff_views(
        &old.views,
        &new.views,
        &reshaped_columns,
    ));
    out.extend(diff_list(
        &old.triggers,
        &new.triggers,
        |t| t.id(),
        definitions::diff_trigger,
    ));

    debug!("Diff produced {} steps", out.len());
    out
}

/// Pair up objects by id and let `diff_fn` decide what each pair needs.
/// Ids are visited in sorted order so output is deterministic.
pub fn diff_list<T, I: Ord + Clone, R>(
    old: &[T],
    new: &[T],
    id_of: impl Fn(&T) -> I,
    diff_fn: impl Fn(Option<&T>, Option<&T>) -> Vec<R>,
) -> Vec<R> {
    let old_map: BTreeMap<I, &T> = old.iter().map(|o| (id_of(o), o)).collect();
    let new_map: BTreeMap<I, &T> = new.iter().map(|n| (id_of(n), n)).collect();
    let all_ids: BTreeSet<&I> = old_map.keys().chain(new_map.keys()).collect();

    all_ids
        .into_iter()
        .flat_map(|id| diff_fn(old_map.get(id).copied(), new_map.get(id).copied()))
        .collect()
}

/// Columns being dropped or retyped; views reading them must be rebuilt
fn reshaped_columns(table_steps: &[MigrationStep]) -> BTreeSet<ObjectId> {
    table_steps
        .iter()
        .filter(|step| {
            matches!(
                step,
                MigrationStep::Column(op)
                    if matches!(op.action, ColumnAction::Drop | ColumnAction::SetType(_))
            )
        })
        .map(MigrationStep::id)
        .collect()
}

fn diff_schema(old: Option<&Schema>, new: Option<&Schema>) -> Vec<MigrationStep> {
    match (old, new) {
        (None, Some(n)) => vec![MigrationStep::Schema(SchemaOperation::Create(n.clone()))],
        (Some(o), None) => vec![MigrationStep::Schema(SchemaOperation::Drop(o.clone()))],
        _ => vec![],
    }
}

fn diff_extension(old: Option<&Extension>, new: Option<&Extension>) -> Vec<MigrationStep> {
    match (old, new) {
        (None, Some(n)) => vec![MigrationStep::Extension(ExtensionOperation::Create(
            n.clone(),
        ))],
        (Some(o), None) => vec![MigrationStep::Extension(ExtensionOperation::Drop(o.clone()))],
        // Relocating an extension means dropping everything built on it
        (Some(o), Some(n)) if o.schema != n.schema => {
            warn!(
                "Extension {} moved from schema {} to {}; not migrated",
                n.name,
                o.schema,
                n.schema
            );
            vec![]
        }
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::table::{Column, Table};
    use crate::catalog::view::View;
    use crate::diff::operations::{ColumnOperation, ViewOperation};

    #[test]
    fn test_diff_list_pairs_by_id() {
        let old = vec![("a", 1), ("b", 2), ("c", 3)];
        let new = vec![("b", 2), ("c", 4), ("d", 5)];

        let out = diff_list(
            &old,
            &new,
            |(name, _)| *name,
            |o, n| match (o, n) {
                (None, Some(n)) => vec![format!("create {}", n.0)],
                (Some(o), None) => vec![format!("drop {}", o.0)],
                (Some(o), Some(n)) if o.1 != n.1 => vec![format!("change {}", n.0)],
                _ => vec![],
            },
        );

        assert_eq!(out, vec!["drop a", "change c", "create d"]);
    }

    #[test]
    fn test_schema_and_extension_steps() {
        let old = Catalog {
            schemas: vec![Schema { name: "legacy".into() }, Schema { name: "public".into() }],
            ..Default::default()
        };
        let new = Catalog {
            schemas: vec![Schema { name: "app".into() }, Schema { name: "public".into() }],
            extensions: vec![Extension {
                name: "pgcrypto".into(),
                schema: "public".into(),
            }],
            ..Default::default()
        };

        let steps = diff_all(&old, &new);
        assert_eq!(steps.len(), 3);
        assert!(steps.contains(&MigrationStep::Schema(SchemaOperation::Create(Schema {
            name: "app".into()
        }))));
        assert!(steps.contains(&MigrationStep::Schema(SchemaOperation::Drop(Schema {
            name: "legacy".into()
        }))));
        assert!(matches!(
            steps.last(),
            Some(MigrationStep::Extension(ExtensionOperation::Create(_)))
        ));
    }

    #[test]
    fn test_retyped_column_rebuilds_dependent_view_around_it() {
        let table = |data_type: &str| Table {
            schema: "public".into(),
            name: "orders".into(),
            columns: vec![Column {
                name: "amount".into(),
                data_type: data_type.into(),
                default: None,
                not_null: false,
                identity: None,
                generated: None,
            }],
        };
        let totals = View {
            schema: "public".into(),
            name: "totals".into(),
            materialized: false,
            definition: "SELECT amount FROM orders".into(),
            depends_on: vec![ObjectId::Column {
                schema: "public".into(),
                table: "orders".into(),
                name: "amount".into(),
            }],
        };
        let old = Catalog {
            tables: vec![table("integer")],
            views: vec![totals.clone()],
            ..Default::default()
        };
        let new = Catalog {
            tables: vec![table("bigint")],
            views: vec![totals.clone()],
            ..Default::default()
        };

        let steps = order_steps(diff_all(&old, &new)).unwrap();
        assert_eq!(
            steps,
            vec![
                MigrationStep::View(ViewOperation::Drop(totals.clone())),
                MigrationStep::Column(ColumnOperation {
                    schema: "public".into(),
                    table: "orders".into(),
                    column: "amount".into(),
                    action: ColumnAction::SetType("bigint".into()),
                }),
                MigrationStep::View(ViewOperation::Create(totals)),
            ]
        );
    }
}
