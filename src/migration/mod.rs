//! Migration files on disk: discovery, naming and the path of the next file.

pub mod applier;
pub mod tracking;

pub use applier::{ApplyError, MigrationApplier};

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::constants::{MIGRATION_FILENAME_SUFFIX, MIGRATION_SEQUENCE_WIDTH};
use crate::error::{PipelineError, PipelineResult};

/// Lower kebab case, starting with a letter, never ending in a dash or digit
static MIGRATION_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]+(-[a-z0-9]+)*$").expect("valid migration name pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub sequence: u32,
    pub name: String,
    pub path: PathBuf,
    pub content: String,
}

impl MigrationFile {
    pub fn filename(&self) -> String {
        migration_filename(self.sequence, &self.name)
    }
}

/// Where the next generated migration goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMigration {
    pub sequence: u32,
    pub path: PathBuf,
    /// The latest migration is being regenerated in place
    pub replaces_latest: bool,
}

impl NewMigration {
    /// The first migration is generated from the desired schema as-is
    pub fn is_initial(&self) -> bool {
        self.sequence == 1
    }
}

pub fn validate_migration_name(name: &str) -> PipelineResult<()> {
    let ends_badly = name.ends_with(|c: char| c.is_ascii_digit() || c == '-');
    if MIGRATION_NAME.is_match(name) && !ends_badly {
        Ok(())
    } else {
        Err(PipelineError::Naming(format!(
            "invalid migration name '{}': use lower-kebab-case that does not start or end with a number or dash",
            name
        )))
    }
}

pub fn migration_filename(sequence: u32, name: &str) -> String {
    format!(
        "{:0width$}_{}{}",
        sequence,
        name,
        MIGRATION_FILENAME_SUFFIX,
        width = MIGRATION_SEQUENCE_WIDTH
    )
}

/// Split `003_add-status.up.sql` into `(3, "add-status")`
pub fn parse_migration_filename(filename: &str) -> Option<(u32, String)> {
    let stem = filename.strip_suffix(MIGRATION_FILENAME_SUFFIX)?;
    let (sequence, name) = stem.split_once('_')?;
    if sequence.is_empty() || !sequence.chars().all(|c| c.is_ascii_digit()) || name.is_empty() {
        return None;
    }
    Some((sequence.parse().ok()?, name.to_string()))
}

/// All `.up.sql` files in sequence order. A missing directory has no
/// migrations; gaps, duplicates and unparsable names are naming errors.
pub fn discover_migrations(migrations_dir: &Path) -> PipelineResult<Vec<MigrationFile>> {
    if !migrations_dir.exists() {
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(migrations_dir)
        .map_err(|e| PipelineError::io_at("read", migrations_dir, e))?;

    let mut migrations = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| PipelineError::io_at("read", migrations_dir, e))?
            .path();
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !filename.ends_with(MIGRATION_FILENAME_SUFFIX) {
            continue;
        }

        let (sequence, name) = parse_migration_filename(filename).ok_or_else(|| {
            PipelineError::Naming(format!(
                "cannot parse migration file name '{}', expected NNN_name{}",
                filename, MIGRATION_FILENAME_SUFFIX
            ))
        })?;
        let content =
            std::fs::read_to_string(&path).map_err(|e| PipelineError::io_at("read", &path, e))?;

        migrations.push(MigrationFile {
            sequence,
            name,
            path,
            content,
        });
    }

    migrations.sort_by_key(|m| m.sequence);
    check_contiguous(&migrations)?;
    Ok(migrations)
}

fn check_contiguous(migrations: &[MigrationFile]) -> PipelineResult<()> {
    for (expected, migration) in (1u32..).zip(migrations) {
        if migration.sequence == expected {
            continue;
        }
        let problem = if migration.sequence < expected {
            "duplicate migration number"
        } else {
            "gap in migration numbers"
        };
        return Err(PipelineError::Naming(format!(
            "{} at {}: expected {:0width$}",
            problem,
            migration.path.display(),
            expected,
            width = MIGRATION_SEQUENCE_WIDTH
        )));
    }
    Ok(())
}

/// Decide the file a run writes. Reusing the latest migration's name
/// regenerates that file, which requires `overwrite`.
pub fn resolve_new_migration(
    migrations_dir: &Path,
    existing: &[MigrationFile],
    name: &str,
    overwrite: bool,
) -> PipelineResult<NewMigration> {
    validate_migration_name(name)?;

    match existing.last() {
        Some(latest) if latest.name == name => {
            if !overwrite {
                return Err(PipelineError::Naming(format!(
                    "{} already exists, pass --overwrite to regenerate it",
                    latest.path.display()
                )));
            }
            Ok(NewMigration {
                sequence: latest.sequence,
                path: latest.path.clone(),
                replaces_latest: true,
            })
        }
        latest => {
            let sequence = latest.map_or(1, |m| m.sequence + 1);
            Ok(NewMigration {
                sequence,
                path: migrations_dir.join(migration_filename(sequence, name)),
                replaces_latest: false,
            })
        }
    }
}
