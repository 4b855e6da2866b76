//! Migration steps produced by the differ, one variant per object kind.

use crate::catalog::constraint::Constraint;
use crate::catalog::enum_type::EnumType;
use crate::catalog::function::Function;
use crate::catalog::id::ObjectId;
use crate::catalog::index::Index;
use crate::catalog::schema::{Extension, Schema};
use crate::catalog::sequence::Sequence;
use crate::catalog::table::{Column, Identity, Table};
use crate::catalog::trigger::Trigger;
use crate::catalog::view::View;

#[derive(Debug, Clone, PartialEq)]
pub enum MigrationStep {
    Schema(SchemaOperation),
    Extension(ExtensionOperation),
    Type(TypeOperation),
    Sequence(SequenceOperation),
    Table(TableOperation),
    Column(ColumnOperation),
    Function(FunctionOperation),
    Constraint(ConstraintOperation),
    Index(IndexOperation),
    View(ViewOperation),
    Trigger(TriggerOperation),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaOperation {
    Create(Schema),
    Drop(Schema),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionOperation {
    Create(Extension),
    Drop(Extension),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeOperation {
    Create(EnumType),
    AddValue {
        schema: String,
        name: String,
        label: String,
        /// Existing neighbours; `after` wins when both are known
        after: Option<String>,
        before: Option<String>,
    },
    Drop(EnumType),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SequenceOperation {
    Create(Sequence),
    Alter(Sequence),
    Drop(Sequence),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableOperation {
    Create(Table),
    Drop(Table),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnOperation {
    pub schema: String,
    pub table: String,
    pub column: String,
    pub action: ColumnAction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnAction {
    Add(Column),
    Drop,
    SetType(String),
    SetDefault(String),
    DropDefault,
    SetNotNull,
    DropNotNull,
    AddIdentity(Identity),
    SetIdentity(Identity),
    DropIdentity,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionOperation {
    /// `CREATE OR REPLACE`, used for both new and changed functions
    Replace(Function),
    Drop(Function),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintOperation {
    Add(Constraint),
    Drop(Constraint),
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndexOperation {
    Create(Index),
    Drop(Index),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewOperation {
    Create(View),
    Drop(View),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOperation {
    Create(Trigger),
    Drop(Trigger),
}

/// Coarse ordering bucket. Creates run in ascending phase order, drops in
/// descending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Schema,
    Extension,
    Type,
    Sequence,
    Table,
    Column,
    Function,
    Constraint,
    ForeignKey,
    Index,
    View,
    Trigger,
}

impl MigrationStep {
    pub fn phase(&self) -> Phase {
        match self {
            MigrationStep::Schema(_) => Phase::Schema,
            MigrationStep::Extension(_) => Phase::Extension,
            MigrationStep::Type(_) => Phase::Type,
            MigrationStep::Sequence(_) => Phase::Sequence,
            MigrationStep::Table(_) => Phase::Table,
            MigrationStep::Column(_) => Phase::Column,
            MigrationStep::Function(_) => Phase::Function,
            MigrationStep::Constraint(
                ConstraintOperation::Add(c) | ConstraintOperation::Drop(c),
            ) => {
                if c.is_foreign_key() {
                    Phase::ForeignKey
                } else {
                    Phase::Constraint
                }
            }
            MigrationStep::Index(_) => Phase::Index,
            MigrationStep::View(_) => Phase::View,
            MigrationStep::Trigger(_) => Phase::Trigger,
        }
    }

    pub fn is_drop(&self) -> bool {
        matches!(
            self,
            MigrationStep::Schema(SchemaOperation::Drop(_))
                | MigrationStep::Extension(ExtensionOperation::Drop(_))
                | MigrationStep::Type(TypeOperation::Drop(_))
                | MigrationStep::Sequence(SequenceOperation::Drop(_))
                | MigrationStep::Table(TableOperation::Drop(_))
                | MigrationStep::Column(ColumnOperation {
                    action: ColumnAction::Drop,
                    ..
                })
                | MigrationStep::Function(FunctionOperation::Drop(_))
                | MigrationStep::Constraint(ConstraintOperation::Drop(_))
                | MigrationStep::Index(IndexOperation::Drop(_))
                | MigrationStep::View(ViewOperation::Drop(_))
                | MigrationStep::Trigger(TriggerOperation::Drop(_))
        )
    }

    pub fn id(&self) -> ObjectId {
        match self {
            MigrationStep::Schema(SchemaOperation::Create(s) | SchemaOperation::Drop(s)) => s.id(),
            MigrationStep::Extension(
                ExtensionOperation::Create(e) | ExtensionOperation::Drop(e),
            ) => e.id(),
            MigrationStep::Type(TypeOperation::Create(t) | TypeOperation::Drop(t)) => t.id(),
            MigrationStep::Type(TypeOperation::AddValue { schema, name, .. }) => ObjectId::Type {
                schema: schema.clone(),
                name: name.clone(),
            },
            MigrationStep::Sequence(
                SequenceOperation::Create(s) | SequenceOperation::Alter(s) | SequenceOperation::Drop(s),
            ) => s.id(),
            MigrationStep::Table(TableOperation::Create(t) | TableOperation::Drop(t)) => t.id(),
            MigrationStep::Column(op) => ObjectId::Column {
                schema: op.schema.clone(),
                table: op.table.clone(),
                name: op.column.clone(),
            },
            MigrationStep::Function(FunctionOperation::Replace(f) | FunctionOperation::Drop(f)) => {
                f.id()
            }
            MigrationStep::Constraint(
                ConstraintOperation::Add(c) | ConstraintOperation::Drop(c),
            ) => c.id(),
            MigrationStep::Index(IndexOperation::Create(i) | IndexOperation::Drop(i)) => i.id(),
            MigrationStep::View(ViewOperation::Create(v) | ViewOperation::Drop(v)) => v.id(),
            MigrationStep::Trigger(TriggerOperation::Create(t) | TriggerOperation::Drop(t)) => {
                t.id()
            }
        }
    }
}
