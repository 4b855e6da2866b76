//! Enum types and sequences
use tracing::warn;

use crate::catalog::enum_type::EnumType;
use crate::catalog::sequence::Sequence;
use crate::diff::operations::{MigrationStep, SequenceOperation, TypeOperation};

pub fn diff_enum(old: Option<&EnumType>, new: Option<&EnumType>) -> Vec<MigrationStep> {
    match (old, new) {
        (None, Some(n)) => vec![MigrationStep::Type(TypeOperation::Create(n.clone()))],
        (Some(o), None) => vec![MigrationStep::Type(TypeOperation::Drop(o.clone()))],
        (Some(o), Some(n)) => {
            // PostgreSQL can add enum values but never remove them
            for removed in o.labels.iter().filter(|l| !n.labels.contains(*l)) {
                warn!(
                    "Enum {}.{} no longer has value '{}'; values cannot be removed automatically",
                    n.schema, n.name, removed
                );
            }

            n.labels
                .iter()
                .enumerate()
                .filter(|(_, label)| !o.labels.contains(*label))
                .map(|(i, label)| {
                    let after = i.checked_sub(1).map(|prev| n.labels[prev].clone());
                    let before = n.labels[i + 1..]
                        .iter()
                        .find(|l| o.labels.contains(*l))
                        .cloned();
                    MigrationStep::Type(TypeOperation::AddValue {
                        schema: n.schema.clone(),
                        name: n.name.clone(),
                        label: label.clone(),
                        after,
                        before,
                    })
                })
                .collect()
        }
        (None, None) => vec![],
    }
}

pub fn diff_sequence(old: Option<&Sequence>, new: Option<&Sequence>) -> Vec<MigrationStep> {
    match (old, new) {
        (None, Some(n)) => vec![MigrationStep::Sequence(SequenceOperation::Create(n.clone()))],
        (Some(o), None) => vec![MigrationStep::Sequence(SequenceOperation::Drop(o.clone()))],
        (Some(o), Some(n)) if o != n => {
            vec![MigrationStep::Sequence(SequenceOperation::Alter(n.clone()))]
        }
        _ => vec![],
    }
}
