use std::fmt;

/// Identity of a schema object, stable across two databases
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectId {
    Schema { name: String },
    Extension { name: String },
    Type { schema: String, name: String },
    Sequence { schema: String, name: String },
    Table { schema: String, name: String },
    Column { schema: String, table: String, name: String },
    Function { schema: String, name: String, arguments: String },
    Constraint { schema: String, table: String, name: String },
    Index { schema: String, name: String },
    View { schema: String, name: String },
    Trigger { schema: String, table: String, name: String },
}

impl ObjectId {
    pub fn schema(&self) -> Option<&str> {
        match self {
            ObjectId::Schema { name } => Some(name),
            ObjectId::Extension { .. } => None,
            ObjectId::Type { schema, .. }
            | ObjectId::Sequence { schema, .. }
            | ObjectId::Table { schema, .. }
            | ObjectId::Column { schema, .. }
            | ObjectId::Function { schema, .. }
            | ObjectId::Constraint { schema, .. }
            | ObjectId::Index { schema, .. }
            | ObjectId::View { schema, .. }
            | ObjectId::Trigger { schema, .. } => Some(schema),
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectId::Schema { name } => write!(f, "schema {}", name),
            ObjectId::Extension { name } => write!(f, "extension {}", name),
            ObjectId::Type { schema, name } => write!(f, "type {}.{}", schema, name),
            ObjectId::Sequence { schema, name } => write!(f, "sequence {}.{}", schema, name),
            ObjectId::Table { schema, name } => write!(f, "table {}.{}", schema, name),
            ObjectId::Column {
                schema,
                table,
                name,
            } => write!(f, "column {}.{}.{}", schema, table, name),
            ObjectId::Function {
                schema,
                name,
                arguments,
            } => write!(f, "function {}.{}({})", schema, name, arguments),
            ObjectId::Constraint {
                schema,
                table,
                name,
            } => write!(f, "constraint {} on {}.{}", name, schema, table),
            ObjectId::Index { schema, name } => write!(f, "index {}.{}", schema, name),
            ObjectId::View { schema, name } => write!(f, "view {}.{}", schema, name),
            ObjectId::Trigger {
                schema,
                table,
                name,
            } => write!(f, "trigger {} on {}.{}", name, schema, table),
        }
    }
}
