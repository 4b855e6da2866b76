use anyhow::Result;
use modelmig::PipelineError;
use modelmig::migration::{discover_migrations, resolve_new_migration};
use std::fs;
use tempfile::TempDir;

/// Migration directory discovery against layouts found in real projects

#[test]
fn test_numbered_migrations_in_sequence_order() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let migrations_dir = temp_dir.path().join("db/migrations");
    fs::create_dir_all(&migrations_dir)?;

    // Written out of order on purpose
    fs::write(
        migrations_dir.join("010_add-indexes.up.sql"),
        "CREATE INDEX orders_status_idx ON orders (status);",
    )?;
    fs::write(migrations_dir.join("001_init.up.sql"), "CREATE TABLE orders (id int);")?;
    for n in 2..10 {
        fs::write(
            migrations_dir.join(format!("{:03}_step.up.sql", n)),
            format!("-- step {}", n),
        )?;
    }

    let migrations = discover_migrations(&migrations_dir)?;

    let sequences: Vec<u32> = migrations.iter().map(|m| m.sequence).collect();
    assert_eq!(sequences, (1..=10).collect::<Vec<_>>());
    assert_eq!(migrations[0].name, "init");
    assert_eq!(migrations[0].content, "CREATE TABLE orders (id int);");
    assert_eq!(migrations[9].filename(), "010_add-indexes.up.sql");

    Ok(())
}

#[test]
fn test_down_migrations_and_other_files_are_ignored() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let migrations_dir = temp_dir.path();

    fs::write(migrations_dir.join("001_init.up.sql"), "CREATE SCHEMA app;")?;
    fs::write(migrations_dir.join("001_init.down.sql"), "DROP SCHEMA app;")?;
    fs::write(migrations_dir.join("README.md"), "# migrations")?;
    fs::write(migrations_dir.join(".gitkeep"), "")?;
    fs::create_dir_all(migrations_dir.join("archive"))?;

    let migrations = discover_migrations(migrations_dir)?;

    assert_eq!(migrations.len(), 1);
    assert_eq!(migrations[0].name, "init");

    Ok(())
}

#[test]
fn test_missing_directory_has_no_migrations() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let migrations = discover_migrations(&temp_dir.path().join("missing"))?;

    assert!(migrations.is_empty());
    let next = resolve_new_migration(&temp_dir.path().join("missing"), &migrations, "init", false)?;
    assert_eq!(next.sequence, 1);
    assert!(next.is_initial());

    Ok(())
}

#[test]
fn test_gap_in_history_is_rejected() -> Result<()> {
    let temp_dir = TempDir::new()?;
    fs::write(temp_dir.path().join("001_init.up.sql"), "")?;
    fs::write(temp_dir.path().join("003_add-status.up.sql"), "")?;

    let err = discover_migrations(temp_dir.path()).unwrap_err();

    assert!(matches!(err, PipelineError::Naming(_)));
    assert!(err.to_string().contains("gap"), "{}", err);

    Ok(())
}

#[test]
fn test_unparsable_migration_name_is_rejected() -> Result<()> {
    let temp_dir = TempDir::new()?;
    fs::write(temp_dir.path().join("init.up.sql"), "")?;

    let err = discover_migrations(temp_dir.path()).unwrap_err();

    assert!(err.to_string().contains("init.up.sql"), "{}", err);

    Ok(())
}

#[test]
fn test_overwrite_targets_latest_migration() -> Result<()> {
    let temp_dir = TempDir::new()?;
    fs::write(temp_dir.path().join("001_init.up.sql"), "CREATE SCHEMA app;")?;
    fs::write(temp_dir.path().join("002_add-status.up.sql"), "-- draft")?;
    let existing = discover_migrations(temp_dir.path())?;

    let refused = resolve_new_migration(temp_dir.path(), &existing, "add-status", false);
    assert!(refused.is_err());

    let again = resolve_new_migration(temp_dir.path(), &existing, "add-status", true)?;
    assert_eq!(again.sequence, 2);
    assert!(again.replaces_latest);
    assert_eq!(again.path, temp_dir.path().join("002_add-status.up.sql"));

    // Only the latest name can be reused
    let next = resolve_new_migration(temp_dir.path(), &existing, "init", false)?;
    assert_eq!(next.sequence, 3);
    assert!(!next.replaces_latest);

    Ok(())
}
