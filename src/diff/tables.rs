use crate::catalog::table::{Column, Table};
use crate::diff::diff_list;
use crate::diff::operations::{ColumnAction, ColumnOperation, MigrationStep, TableOperation};

pub fn diff(old: Option<&Table>, new: Option<&Table>) -> Vec<MigrationStep> {
    match (old, new) {
        (None, Some(n)) => vec![MigrationStep::Table(TableOperation::Create(n.clone()))],
        (Some(o), None) => vec![MigrationStep::Table(TableOperation::Drop(o.clone()))],
        (Some(o), Some(n)) => diff_list(
            &o.columns,
            &n.columns,
            |c| c.name.clone(),
            |old_col, new_col| diff_column(n, old_col, new_col),
        ),
        (None, None) => vec![],
    }
}

fn diff_column(table: &Table, old: Option<&Column>, new: Option<&Column>) -> Vec<MigrationStep> {
    let step = |column: &str, action: ColumnAction| {
        MigrationStep::Column(ColumnOperation {
            schema: table.schema.clone(),
            table: table.name.clone(),
            column: column.to_string(),
            action,
        })
    };

    match (old, new) {
        (None, Some(n)) => vec![step(&n.name, ColumnAction::Add(n.clone()))],
        (Some(o), None) => vec![step(&o.name, ColumnAction::Drop)],
        // A generated expression cannot be changed in place
        (Some(o), Some(n)) if o.generated != n.generated => vec![
            step(&o.name, ColumnAction::Drop),
            step(&n.name, ColumnAction::Add(n.clone())),
        ],
        (Some(o), Some(n)) => {
            let mut steps = Vec::new();
            let name = n.name.as_str();

            // Old default may not cast to the new type, so it goes first
            if o.default != n.default && o.default.is_some() {
                steps.push(step(name, ColumnAction::DropDefault));
            }
            if o.data_type != n.data_type {
                steps.push(step(name, ColumnAction::SetType(n.data_type.clone())));
            }
            if o.default != n.default
                && let Some(default) = &n.default
            {
                steps.push(step(name, ColumnAction::SetDefault(default.clone())));
            }
            // Identity needs NOT NULL first; dropping NOT NULL needs identity gone
            if n.not_null && !o.not_null {
                steps.push(step(name, ColumnAction::SetNotNull));
            }
            match (o.identity, n.identity) {
                (None, Some(identity)) => steps.push(step(name, ColumnAction::AddIdentity(identity))),
                (Some(_), None) => steps.push(step(name, ColumnAction::DropIdentity)),
                (Some(before), Some(after)) if before != after => {
                    steps.push(step(name, ColumnAction::SetIdentity(after)))
                }
                _ => {}
            }
            if o.not_null && !n.not_null {
                steps.push(step(name, ColumnAction::DropNotNull));
            }
            steps
        }
        (None, None) => vec![],
    }
}
