//! DDL for each migration step.

use crate::catalog::table::{Column, Identity};
use crate::diff::operations::*;
use crate::render::{RenderedSql, escape_string, qualified, quote_ident, terminate};

pub trait SqlRenderer {
    fn to_sql(&self) -> Vec<RenderedSql>;
}

impl SqlRenderer for MigrationStep {
    fn to_sql(&self) -> Vec<RenderedSql> {
        match self {
            MigrationStep::Schema(op) => op.to_sql(),
            MigrationStep::Extension(op) => op.to_sql(),
            MigrationStep::Type(op) => op.to_sql(),
            MigrationStep::Sequence(op) => op.to_sql(),
            MigrationStep::Table(op) => op.to_sql(),
            MigrationStep::Column(op) => op.to_sql(),
            MigrationStep::Function(op) => op.to_sql(),
            MigrationStep::Constraint(op) => op.to_sql(),
            MigrationStep::Index(op) => op.to_sql(),
            MigrationStep::View(op) => op.to_sql(),
            MigrationStep::Trigger(op) => op.to_sql(),
        }
    }
}

impl SqlRenderer for SchemaOperation {
    fn to_sql(&self) -> Vec<RenderedSql> {
        match self {
            SchemaOperation::Create(s) => vec![RenderedSql::new(format!(
                "CREATE SCHEMA {};",
                quote_ident(&s.name)
            ))],
            SchemaOperation::Drop(s) => vec![RenderedSql::destructive(format!(
                "DROP SCHEMA {};",
                quote_ident(&s.name)
            ))],
        }
    }
}

impl SqlRenderer for ExtensionOperation {
    fn to_sql(&self) -> Vec<RenderedSql> {
        match self {
            ExtensionOperation::Create(e) => vec![RenderedSql::new(format!(
                "CREATE EXTENSION IF NOT EXISTS {} WITH SCHEMA {};",
                quote_ident(&e.name),
                quote_ident(&e.schema)
            ))],
            ExtensionOperation::Drop(e) => vec![RenderedSql::destructive(format!(
                "DROP EXTENSION {};",
                quote_ident(&e.name)
            ))],
        }
    }
}

impl SqlRenderer for TypeOperation {
    fn to_sql(&self) -> Vec<RenderedSql> {
        match self {
            TypeOperation::Create(t) => {
                let labels = t
                    .labels
                    .iter()
                    .map(|l| escape_string(l))
                    .collect::<Vec<_>>()
                    .join(", ");
                vec![RenderedSql::new(format!(
                    "CREATE TYPE {} AS ENUM ({});",
                    qualified(&t.schema, &t.name),
                    labels
                ))]
            }
            TypeOperation::AddValue {
                schema,
                name,
                label,
                after,
                before,
            } => {
                let position = match (after, before) {
                    (Some(after), _) => format!(" AFTER {}", escape_string(after)),
                    (None, Some(before)) => format!(" BEFORE {}", escape_string(before)),
                    (None, None) => String::new(),
                };
                vec![RenderedSql::new(format!(
                    "ALTER TYPE {} ADD VALUE {}{};",
                    qualified(schema, name),
                    escape_string(label),
                    position
                ))]
            }
            TypeOperation::Drop(t) => vec![RenderedSql::destructive(format!(
                "DROP TYPE {};",
                qualified(&t.schema, &t.name)
            ))],
        }
    }
}

impl SqlRenderer for SequenceOperation {
    fn to_sql(&self) -> Vec<RenderedSql> {
        match self {
            SequenceOperation::Create(s) | SequenceOperation::Alter(s) => {
                let verb = if matches!(self, SequenceOperation::Create(_)) {
                    "CREATE"
                } else {
                    "ALTER"
                };
                vec![RenderedSql::new(format!(
                    "{} SEQUENCE {} AS {} INCREMENT BY {} MINVALUE {} MAXVALUE {} START WITH {} CACHE {} {};",
                    verb,
                    qualified(&s.schema, &s.name),
                    s.data_type,
                    s.increment,
                    s.min_value,
                    s.max_value,
                    s.start_value,
                    s.cache_size,
                    if s.cycle { "CYCLE" } else { "NO CYCLE" }
                ))]
            }
            // Serial sequences disappear with their table
            SequenceOperation::Drop(s) => vec![RenderedSql::destructive(format!(
                "DROP SEQUENCE IF EXISTS {};",
                qualified(&s.schema, &s.name)
            ))],
        }
    }
}

impl SqlRenderer for TableOperation {
    fn to_sql(&self) -> Vec<RenderedSql> {
        match self {
            TableOperation::Create(t) => {
                let sql = if t.columns.is_empty() {
                    format!("CREATE TABLE {} ();", qualified(&t.schema, &t.name))
                } else {
                    let columns = t
                        .columns
                        .iter()
                        .map(|c| format!("    {}", column_definition(c)))
                        .collect::<Vec<_>>()
                        .join(",\n");
                    format!(
                        "CREATE TABLE {} (\n{}\n);",
                        qualified(&t.schema, &t.name),
                        columns
                    )
                };
                vec![RenderedSql::new(sql)]
            }
            TableOperation::Drop(t) => vec![RenderedSql::destructive(format!(
                "DROP TABLE {};",
                qualified(&t.schema, &t.name)
            ))],
        }
    }
}

fn identity_clause(identity: Identity) -> &'static str {
    match identity {
        Identity::Always => "GENERATED ALWAYS",
        Identity::ByDefault => "GENERATED BY DEFAULT",
    }
}

pub fn column_definition(column: &Column) -> String {
    let mut sql = format!("{} {}", quote_ident(&column.name), column.data_type);
    if let Some(expression) = &column.generated {
        sql.push_str(&format!(" GENERATED ALWAYS AS ({}) STORED", expression));
    }
    if let Some(identity) = column.identity {
        sql.push_str(&format!(" {} AS IDENTITY", identity_clause(identity)));
    }
    if let Some(default) = &column.default {
        sql.push_str(&format!(" DEFAULT {}", default));
    }
    if column.not_null {
        sql.push_str(" NOT NULL");
    }
    sql
}

impl SqlRenderer for ColumnOperation {
    fn to_sql(&self) -> Vec<RenderedSql> {
        let table = qualified(&self.schema, &self.table);
        let column = quote_ident(&self.column);
        let alter = |clause: String| {
            RenderedSql::new(format!("ALTER TABLE {} ALTER COLUMN {} {};", table, column, clause))
        };

        let rendered = match &self.action {
            ColumnAction::Add(c) => RenderedSql::new(format!(
                "ALTER TABLE {} ADD COLUMN {};",
                table,
                column_definition(c)
            )),
            ColumnAction::Drop => {
                RenderedSql::destructive(format!("ALTER TABLE {} DROP COLUMN {};", table, column))
            }
            ColumnAction::SetType(data_type) => RenderedSql::destructive(format!(
                "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{};",
                table, column, data_type, column, data_type
            )),
            ColumnAction::SetDefault(default) => alter(format!("SET DEFAULT {}", default)),
            ColumnAction::DropDefault => alter("DROP DEFAULT".to_string()),
            ColumnAction::SetNotNull => alter("SET NOT NULL".to_string()),
            ColumnAction::DropNotNull => alter("DROP NOT NULL".to_string()),
            ColumnAction::AddIdentity(identity) => {
                alter(format!("ADD {} AS IDENTITY", identity_clause(*identity)))
            }
            ColumnAction::SetIdentity(identity) => alter(format!(
                "SET {}",
                identity_clause(*identity)
            )),
            ColumnAction::DropIdentity => alter("DROP IDENTITY".to_string()),
        };
        vec![rendered]
    }
}

impl SqlRenderer for FunctionOperation {
    fn to_sql(&self) -> Vec<RenderedSql> {
        match self {
            FunctionOperation::Replace(f) => vec![RenderedSql::new(terminate(&f.definition))],
            FunctionOperation::Drop(f) => vec![RenderedSql::destructive(format!(
                "DROP {} {}({});",
                if f.is_procedure { "PROCEDURE" } else { "FUNCTION" },
                qualified(&f.schema, &f.name),
                f.arguments
            ))],
        }
    }
}

impl SqlRenderer for ConstraintOperation {
    fn to_sql(&self) -> Vec<RenderedSql> {
        match self {
            ConstraintOperation::Add(c) => vec![RenderedSql::new(format!(
                "ALTER TABLE {} ADD CONSTRAINT {} {};",
                qualified(&c.schema, &c.table),
                quote_ident(&c.name),
                c.definition
            ))],
            ConstraintOperation::Drop(c) => vec![RenderedSql::destructive(format!(
                "ALTER TABLE {} DROP CONSTRAINT {};",
                qualified(&c.schema, &c.table),
                quote_ident(&c.name)
            ))],
        }
    }
}

impl SqlRenderer for IndexOperation {
    fn to_sql(&self) -> Vec<RenderedSql> {
        match self {
            IndexOperation::Create(i) => vec![RenderedSql::new(terminate(&i.definition))],
            IndexOperation::Drop(i) => vec![RenderedSql::new(format!(
                "DROP INDEX {};",
                qualified(&i.schema, &i.name)
            ))],
        }
    }
}

impl SqlRenderer for ViewOperation {
    fn to_sql(&self) -> Vec<RenderedSql> {
        match self {
            ViewOperation::Create(v) => vec![RenderedSql::new(format!(
                "CREATE {}VIEW {} AS\n{};",
                if v.materialized { "MATERIALIZED " } else { "" },
                qualified(&v.schema, &v.name),
                v.definition
            ))],
            ViewOperation::Drop(v) => vec![RenderedSql::new(format!(
                "DROP {}VIEW {};",
                if v.materialized { "MATERIALIZED " } else { "" },
                qualified(&v.schema, &v.name)
            ))],
        }
    }
}

impl SqlRenderer for TriggerOperation {
    fn to_sql(&self) -> Vec<RenderedSql> {
        match self {
            TriggerOperation::Create(t) => vec![RenderedSql::new(terminate(&t.definition))],
            TriggerOperation::Drop(t) => vec![RenderedSql::new(format!(
                "DROP TRIGGER {} ON {};",
                quote_ident(&t.name),
                qualified(&t.schema, &t.table)
            ))],
        }
    }
}
