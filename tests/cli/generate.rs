//! `modelmig generate` argument and preflight errors.

use crate::helpers::project::TestProject;
use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;

fn modelmig(project: &TestProject) -> Command {
    let mut cmd = Command::cargo_bin("modelmig").expect("binary is built");
    cmd.current_dir(&project.root).env_remove("RUST_LOG");
    cmd
}

fn project_with_config() -> TestProject {
    let project = TestProject::new();
    project.write_config("model_name: app\ndatabase_users: [app]\n");
    project.write_model("CREATE TABLE orders (id integer);");
    project
}

#[test]
fn test_help_lists_generate() {
    let project = TestProject::new();
    modelmig(&project)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("generate"));
}

#[test]
fn test_missing_model_name_is_a_config_error() {
    let project = TestProject::new();
    project.write_config("database_users: [app]\n");

    modelmig(&project)
        .args(["generate", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("model_name is required"));
}

#[test]
fn test_invalid_config_yaml() {
    let project = TestProject::new();
    project.write_config("model_name: [unbalanced");

    modelmig(&project)
        .args(["generate", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("modelmig.yaml is not valid"));
}

#[test]
fn test_invalid_migration_name() {
    let project = project_with_config();

    modelmig(&project)
        .args(["generate", "Add_Status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("lower-kebab-case"));
}

#[test]
fn test_name_is_required_without_stdout() {
    let project = project_with_config();

    modelmig(&project)
        .arg("generate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("migration name"));
}

#[test]
fn test_existing_latest_needs_overwrite() -> Result<()> {
    let project = project_with_config();
    project.write_migration("001_init.up.sql", "CREATE TABLE orders (id integer);");

    modelmig(&project)
        .args(["generate", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--overwrite"));

    assert_eq!(
        std::fs::read_to_string(project.migrations_dir().join("001_init.up.sql"))?,
        "CREATE TABLE orders (id integer);"
    );
    Ok(())
}

#[test]
fn test_gap_in_history_is_reported() {
    let project = project_with_config();
    project.write_migration("001_init.up.sql", "");
    project.write_migration("003_add-status.up.sql", "");

    modelmig(&project)
        .args(["generate", "add-index"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("gap in migration numbers"));
}

#[test]
fn test_cleanup_requires_dev() {
    let project = project_with_config();

    modelmig(&project)
        .args(["generate", "add-status", "--cleanup"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--dev"));
}

#[test]
fn test_stdout_conflicts_with_name() {
    let project = project_with_config();

    modelmig(&project)
        .args(["generate", "add-status", "--stdout"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_check_flag_is_not_accepted() {
    let project = project_with_config();

    modelmig(&project)
        .args(["generate", "add-status", "--check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unexpected argument '--check'"));
}
