use crate::helpers::fakes::{CopyExporter, RecordingProvisioner};
use crate::helpers::project::{TestProject, local_ephemeral, pg_bin_dir, read};
use anyhow::Result;
use modelmig::PipelineError;
use modelmig::constants::{EPHEMERAL_DATABASE, REVIEW_MARKER};
use modelmig::ephemeral::LocalProvisioner;
use modelmig::pipeline::{Orchestrator, OutputMode, RunOutcome};

const INIT_MODEL: &str = "CREATE TABLE orders (id integer PRIMARY KEY);\n";

const STATUS_MODEL: &str = "CREATE TABLE orders (id integer PRIMARY KEY, status text);
ALTER TABLE orders OWNER TO app;
";

#[tokio::test]
async fn test_bootstrap_then_incremental_migration() -> Result<()> {
    let Some(bin_dir) = pg_bin_dir() else {
        eprintln!("Skipping: PostgreSQL binaries (initdb, pg_ctl, pg_dump) not available");
        return Ok(());
    };

    let project = TestProject::new();
    let config = project.config(&["app"], local_ephemeral(bin_dir));
    let orchestrator = Orchestrator::new(
        config.clone(),
        &project.root,
        LocalProvisioner::new(&config.ephemeral),
        CopyExporter::default(),
    )?;

    // First migration is the exported model, verbatim
    project.write_model(INIT_MODEL);
    let outcome = orchestrator.run(&project.file_mode("init"), "").await?;
    let RunOutcome::Generated {
        fingerprint, path, ..
    } = outcome
    else {
        panic!("expected a generated migration, got {outcome:?}");
    };
    let init_path = project.migrations_dir().join("001_init.up.sql");
    assert_eq!(path.as_deref(), Some(init_path.as_path()));
    assert_eq!(read(&init_path), INIT_MODEL);

    // Same content again is a no-op
    let outcome = orchestrator.run(&project.file_mode("noop"), &fingerprint).await?;
    assert_eq!(outcome, RunOutcome::Unchanged);
    assert!(!project.migrations_dir().join("002_noop.up.sql").exists());

    // A new column is structural; the ownership change only shows up in the dumps
    project.write_model(STATUS_MODEL);
    let outcome = orchestrator
        .run(&project.file_mode("add-status"), &fingerprint)
        .await?;
    let RunOutcome::Generated { sql, .. } = outcome else {
        panic!("expected a generated migration, got {outcome:?}");
    };
    assert_eq!(
        sql,
        format!(
            "ALTER TABLE \"public\".\"orders\" ADD COLUMN \"status\" text;\n\n{}\nALTER TABLE public.orders OWNER TO app;",
            REVIEW_MARKER
        )
    );
    assert_eq!(
        read(&project.migrations_dir().join("002_add-status.up.sql")),
        sql
    );

    Ok(())
}

#[tokio::test]
async fn test_stream_mode_leaves_migrations_untouched() -> Result<()> {
    let Some(bin_dir) = pg_bin_dir() else {
        eprintln!("Skipping: PostgreSQL binaries (initdb, pg_ctl, pg_dump) not available");
        return Ok(());
    };

    let project = TestProject::new();
    project.write_migration("001_init.up.sql", INIT_MODEL);
    project.write_model("CREATE TABLE orders (id integer PRIMARY KEY);\nCREATE INDEX orders_id_idx ON orders (id);\n");
    let config = project.config(&[], local_ephemeral(bin_dir));
    let orchestrator = Orchestrator::new(
        config.clone(),
        &project.root,
        LocalProvisioner::new(&config.ephemeral),
        CopyExporter::default(),
    )?;

    let outcome = orchestrator.run(&OutputMode::Stream, "").await?;

    let RunOutcome::Generated { sql, path, .. } = outcome else {
        panic!("expected generated statements, got {outcome:?}");
    };
    assert_eq!(path, None);
    assert!(sql.contains("CREATE INDEX orders_id_idx"), "{}", sql);
    let files: Vec<_> = std::fs::read_dir(project.migrations_dir())?.collect();
    assert_eq!(files.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_structural_diff_failure_after_replay_releases_servers() -> Result<()> {
    let Some(bin_dir) = pg_bin_dir() else {
        eprintln!("Skipping: PostgreSQL binaries (initdb, pg_ctl, pg_dump) not available");
        return Ok(());
    };

    let project = TestProject::new();
    project.write_migration("001_init.up.sql", INIT_MODEL);
    // Loads into the desired database but not into the diff's scratch database
    project.write_model(&format!(
        "{}DO $$ BEGIN IF current_database() <> '{}' THEN RAISE EXCEPTION 'wrong database'; END IF; END $$;\n",
        STATUS_MODEL, EPHEMERAL_DATABASE
    ));
    let config = project.config(&["app"], local_ephemeral(bin_dir));
    let provisioner = RecordingProvisioner::new(LocalProvisioner::new(&config.ephemeral));
    let orchestrator = Orchestrator::new(
        config.clone(),
        &project.root,
        provisioner.clone(),
        CopyExporter::default(),
    )?;

    let err = orchestrator
        .run(&project.file_mode("add-status"), "")
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Diff(_)), "{err:?}");
    assert!(err.to_string().contains("wrong database"), "{err}");
    assert!(!project.migrations_dir().join("002_add-status.up.sql").exists());

    let started = provisioner.started();
    assert_eq!(started.len(), 2);
    for (instance_dir, port) in &started {
        assert!(
            std::net::TcpStream::connect(("127.0.0.1", *port)).is_err(),
            "server on port {port} still accepts connections"
        );
        assert!(!instance_dir.exists(), "{} left behind", instance_dir.display());
    }

    Ok(())
}
