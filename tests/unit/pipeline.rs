//! Orchestrator and watch-loop behavior with the external processes faked out.

use crate::helpers::fakes::{CopyExporter, FakeProvisioner};
use crate::helpers::project::{TestProject, fail_fast};
use anyhow::Result;
use modelmig::PipelineError;
use modelmig::change;
use modelmig::pipeline::{Orchestrator, OutputMode, RunOutcome, Tick, WatchLoop};

const ORDERS: &str = "CREATE TABLE orders (id integer PRIMARY KEY);";

struct Harness {
    project: TestProject,
    provisioner: FakeProvisioner,
    exporter: CopyExporter,
    orchestrator: Orchestrator<FakeProvisioner, CopyExporter>,
}

fn harness(users: &[&str]) -> Result<Harness> {
    let project = TestProject::new();
    let provisioner = FakeProvisioner::default();
    let exporter = CopyExporter::default();
    let orchestrator = Orchestrator::new(
        project.config(users, fail_fast()),
        &project.root,
        provisioner.clone(),
        exporter.clone(),
    )?;
    Ok(Harness {
        project,
        provisioner,
        exporter,
        orchestrator,
    })
}

#[tokio::test]
async fn test_empty_model_provisions_nothing() -> Result<()> {
    let h = harness(&[])?;
    h.project.write_model("");

    let outcome = h.orchestrator.run(&h.project.file_mode("init"), "").await?;

    assert_eq!(outcome, RunOutcome::Unchanged);
    assert_eq!(h.exporter.exports(), 0);
    assert_eq!(h.provisioner.provisioned(), 0);
    assert!(!h.project.migrations_dir().join("001_init.up.sql").exists());
    Ok(())
}

#[tokio::test]
async fn test_unchanged_model_provisions_nothing() -> Result<()> {
    let h = harness(&[])?;
    h.project.write_model(&format!("{}\n", ORDERS));
    let (_, previous) = change::has_changed(&h.orchestrator.model_path(), "")?;

    let outcome = h.orchestrator.run(&OutputMode::Stream, &previous).await?;

    assert_eq!(outcome, RunOutcome::Unchanged);
    assert_eq!(h.provisioner.provisioned(), 0);
    Ok(())
}

#[tokio::test]
async fn test_replay_failure_releases_both_databases() -> Result<()> {
    let h = harness(&[])?;
    h.project.write_migration("001_init.up.sql", ORDERS);
    h.project
        .write_model("CREATE TABLE orders (id integer PRIMARY KEY, status text);");
    let mode = h.project.file_mode("add-status");

    let err = h.orchestrator.run(&mode, "").await.unwrap_err();

    assert!(matches!(err, PipelineError::Apply { .. }), "got {err:?}");
    assert_eq!(h.provisioner.provisioned(), 2);
    assert_eq!(h.provisioner.stopped(), 2);

    let OutputMode::File(new) = &mode else {
        unreachable!()
    };
    assert!(!new.path.exists(), "no migration file on failure");
    Ok(())
}

#[tokio::test]
async fn test_failure_removes_work_dir() -> Result<()> {
    let h = harness(&["app"])?;
    h.project.write_model(ORDERS);

    let err = h
        .orchestrator
        .run(&OutputMode::Stream, "")
        .await
        .unwrap_err();

    // Creating the configured user is the first thing that connects
    assert!(
        matches!(err, PipelineError::Provisioning { .. }),
        "got {err:?}"
    );
    assert_eq!(h.exporter.exports(), 1);
    assert_eq!(h.provisioner.stopped(), 2);

    let dirs = h.provisioner.instance_dirs();
    assert_eq!(dirs.len(), 2);
    assert!(dirs[0].ends_with("replay"));
    assert!(dirs[1].ends_with("desired"));
    let work_dir = dirs[0].parent().unwrap();
    assert_eq!(Some(work_dir), dirs[1].parent());
    assert!(!work_dir.exists(), "{} was left behind", work_dir.display());
    Ok(())
}

#[tokio::test]
async fn test_export_failure_is_reported_before_provisioning() -> Result<()> {
    let h = harness(&[])?;
    // No model on disk, so the exporter has nothing to copy

    let result = h.orchestrator.generate(&OutputMode::Stream, "abc".into()).await;

    assert!(matches!(result, Err(PipelineError::Export(_))));
    assert_eq!(h.provisioner.provisioned(), 0);
    Ok(())
}

#[tokio::test]
async fn test_watch_loop_does_not_retry_known_failure() -> Result<()> {
    let h = harness(&[])?;
    h.project.write_migration("001_init.up.sql", ORDERS);
    h.project.write_model("CREATE TABLE orders (id bigint PRIMARY KEY);");
    let mut watch = WatchLoop::new(&h.orchestrator, OutputMode::Stream);

    assert!(matches!(watch.tick().await, Tick::Failed(_)));
    assert_eq!(h.provisioner.provisioned(), 2);

    assert_eq!(watch.tick().await, Tick::KnownFailure);
    assert_eq!(h.provisioner.provisioned(), 2, "same content is not retried");
    assert_eq!(watch.baseline(), "", "baseline only advances on success");

    h.project
        .write_model("CREATE TABLE orders (id bigint PRIMARY KEY, note text);");
    assert!(matches!(watch.tick().await, Tick::Failed(_)));
    assert_eq!(h.provisioner.provisioned(), 4, "edited content is retried");
    Ok(())
}

#[tokio::test]
async fn test_watch_loop_skips_empty_model() -> Result<()> {
    let h = harness(&[])?;
    h.project.write_model("\n");
    let mut watch = WatchLoop::new(&h.orchestrator, OutputMode::Stream);

    assert_eq!(watch.tick().await, Tick::Unchanged);
    assert_eq!(h.provisioner.provisioned(), 0);
    Ok(())
}
