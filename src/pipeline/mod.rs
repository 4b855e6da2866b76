//! One generation run, from change check to written migration.
//!
//! A run walks `ChangeCheck -> {Skip | Provisioning -> HistoryReplay ->
//! DesiredApply -> StructuralDiff -> PermissionDiff -> Assemble -> Done}`,
//! with `Failed` reachable from every step. Both ephemeral databases and the
//! temporary directory are cleaned up on every path out of a run.

pub mod shutdown;
pub mod watch;

pub use shutdown::ShutdownSignal;
pub use watch::{Tick, WatchLoop};

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::change::{self, Fingerprint};
use crate::config::Config;
use crate::constants::REVIEW_MARKER;
use crate::db::{self, ConnectionConfig};
use crate::ephemeral::{self, EphemeralDatabase, Provisioner};
use crate::error::{PipelineError, PipelineResult};
use crate::export::ModelExporter;
use crate::migration::{MigrationApplier, NewMigration, discover_migrations};
use crate::permissions::PermissionDiff;
use crate::schema_diff::SchemaDiff;
use crate::{hooks, templates};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    ChangeCheck,
    Skip,
    Provisioning,
    HistoryReplay,
    DesiredApply,
    StructuralDiff,
    PermissionDiff,
    Assemble,
    Done,
    Failed,
}

fn enter(state: RunState) {
    debug!("Run state: {:?}", state);
}

/// Where a run's statements go
#[derive(Debug, Clone)]
pub enum OutputMode {
    /// Write the numbered migration file
    File(NewMigration),
    /// Print the statements between `--` delimiters
    Stream,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Unchanged,
    Generated {
        fingerprint: Fingerprint,
        /// Final text, after the post-generation hook
        sql: String,
        path: Option<PathBuf>,
    },
}

/// Structural statements, then the dump-diff statements under a review marker
pub fn assemble(structural: &str, extra: &str) -> String {
    match (structural.is_empty(), extra.is_empty()) {
        (_, true) => structural.to_string(),
        (true, false) => format!("{}\n{}", REVIEW_MARKER, extra),
        (false, false) => format!(
            "{}\n\n{}\n{}",
            structural.trim_end_matches('\n'),
            REVIEW_MARKER,
            extra
        ),
    }
}

pub struct Orchestrator<P, E> {
    config: Config,
    root_dir: PathBuf,
    provisioner: P,
    exporter: E,
    connection: ConnectionConfig,
    applier: MigrationApplier,
    schema_diff: SchemaDiff,
    permissions: PermissionDiff,
}

impl<P: Provisioner, E: ModelExporter> Orchestrator<P, E> {
    pub fn new(
        config: Config,
        root_dir: impl Into<PathBuf>,
        provisioner: P,
        exporter: E,
    ) -> PipelineResult<Self> {
        let connection = ConnectionConfig::from(&config.ephemeral);
        Ok(Self {
            applier: MigrationApplier::new(&config.tracking_table, connection.clone()),
            schema_diff: SchemaDiff::new(&config.tracking_table, connection.clone())?,
            permissions: PermissionDiff::new(&config),
            root_dir: root_dir.into(),
            config,
            provisioner,
            exporter,
            connection,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn model_path(&self) -> PathBuf {
        self.config.model_path(&self.root_dir)
    }

    pub fn migrations_dir(&self) -> PathBuf {
        self.config.migrations_path(&self.root_dir)
    }

    pub fn check(&self, previous: &str) -> PipelineResult<(bool, Fingerprint)> {
        enter(RunState::ChangeCheck);
        change::has_changed(&self.model_path(), previous)
    }

    /// Check the model against `previous` and generate when it changed.
    /// The caller adopts the returned fingerprint only on success.
    pub async fn run(&self, mode: &OutputMode, previous: &str) -> PipelineResult<RunOutcome> {
        let (changed, fingerprint) = self.check(previous)?;
        if !changed {
            enter(RunState::Skip);
            return Ok(RunOutcome::Unchanged);
        }
        self.generate(mode, fingerprint).await
    }

    /// Generate for a model already known to have changed
    pub async fn generate(
        &self,
        mode: &OutputMode,
        fingerprint: Fingerprint,
    ) -> PipelineResult<RunOutcome> {
        match self.generate_output(mode).await {
            Ok((sql, path)) => {
                enter(RunState::Done);
                Ok(RunOutcome::Generated {
                    fingerprint,
                    sql,
                    path,
                })
            }
            Err(e) => {
                enter(RunState::Failed);
                Err(e)
            }
        }
    }

    async fn generate_output(&self, mode: &OutputMode) -> PipelineResult<(String, Option<PathBuf>)> {
        println!("Generating migration statements");
        let desired_sql = self.export_model().await?;

        let (initial, replay_before) = match mode {
            OutputMode::File(new) => (new.is_initial(), Some(new.sequence)),
            OutputMode::Stream => (discover_migrations(&self.migrations_dir())?.is_empty(), None),
        };

        let work_dir = tempfile::Builder::new()
            .prefix("modelmig-")
            .tempdir()
            .map_err(|e| PipelineError::io("failed to create temporary directory", e))?;

        let mut databases = Vec::new();
        let statements = self
            .generate_statements(
                &mut databases,
                work_dir.path(),
                &desired_sql,
                initial,
                replay_before,
            )
            .await;

        for database in &mut databases {
            if let Err(e) = database.release().await {
                warn!("{:#}", e);
            }
        }
        let work_path = work_dir.path().to_path_buf();
        if let Err(e) = work_dir.close() {
            warn!("Failed to remove {}: {}", work_path.display(), e);
        }

        self.write_output(mode, statements?).await
    }

    async fn export_model(&self) -> PipelineResult<String> {
        let model = self.model_path();
        let sql_path = self
            .exporter
            .export_sql(&model)
            .await
            .map_err(|e| PipelineError::Export(format!("{e:#}")))?;

        let exporter = self.exporter.clone();
        tokio::spawn(async move {
            match exporter.export_image(&model).await {
                Ok(path) => debug!("Exported model image to {}", path.display()),
                Err(e) => warn!("Failed to export model image: {:#}", e),
            }
        });

        std::fs::read_to_string(&sql_path).map_err(|e| PipelineError::io_at("read", &sql_path, e))
    }

    async fn generate_statements(
        &self,
        databases: &mut Vec<EphemeralDatabase>,
        work_dir: &Path,
        desired_sql: &str,
        initial: bool,
        replay_before: Option<u32>,
    ) -> PipelineResult<String> {
        enter(RunState::Provisioning);
        let ports = &self.config.ephemeral;
        databases.push(
            self.provisioner
                .provision("replay", &work_dir.join("replay"), ports.replay_port)
                .await?,
        );
        databases.push(
            self.provisioner
                .provision("desired", &work_dir.join("desired"), ports.desired_port)
                .await?,
        );
        for database in databases.iter() {
            ephemeral::create_users(database, &self.config.database_users, &self.connection)
                .await?;
        }
        let (replay, desired) = (&databases[0], &databases[1]);
        if !initial {
            self.permissions.check_dump_version(desired.dsn()).await?;
        }

        enter(RunState::HistoryReplay);
        self.applier
            .apply_until(&self.migrations_dir(), replay.dsn(), replay_before)
            .await?;

        enter(RunState::DesiredApply);
        self.apply_desired(desired, desired_sql).await?;

        enter(RunState::StructuralDiff);
        let structural = self
            .schema_diff
            .diff(replay.dsn(), desired_sql, initial)
            .await?;

        enter(RunState::PermissionDiff);
        let extra = if initial {
            String::new()
        } else {
            self.permissions
                .detect_missing(replay.dsn(), desired.dsn(), &structural, work_dir)
                .await?
        };

        enter(RunState::Assemble);
        Ok(assemble(&structural.join("\n"), &extra))
    }

    async fn apply_desired(&self, desired: &EphemeralDatabase, sql: &str) -> PipelineResult<()> {
        let source = self.config.model_sql_path(&self.root_dir).display().to_string();
        let pool = db::connect_with_retry(desired.dsn(), &self.connection)
            .await
            .map_err(|e| PipelineError::apply(&source, format!("{e:#}")))?;
        let result = db::execute_script(&pool, sql).await;
        pool.close().await;
        result.map_err(|message| PipelineError::apply(source, message))
    }

    async fn write_output(
        &self,
        mode: &OutputMode,
        sql: String,
    ) -> PipelineResult<(String, Option<PathBuf>)> {
        if sql.trim().is_empty() {
            warn!("No schema differences found");
        }

        match mode {
            OutputMode::File(new) => {
                if let Some(parent) = new.path.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| PipelineError::io_at("create", parent, e))?;
                }
                std::fs::write(&new.path, &sql)
                    .map_err(|e| PipelineError::io_at("write", &new.path, e))?;
                info!("Wrote migration file {}", new.path.display());

                hooks::run_generate_migration_post(&self.root_dir, &new.path).await?;
                let sql = std::fs::read_to_string(&new.path)
                    .map_err(|e| PipelineError::io_at("read", &new.path, e))?;
                templates::write_templates(&self.root_dir, &self.config.templates, new.sequence)?;

                println!("Wrote {}", new.path.display());
                Ok((sql, Some(new.path.clone())))
            }
            OutputMode::Stream => {
                let temp = tempfile::Builder::new()
                    .prefix("migration-")
                    .suffix(".sql")
                    .tempfile()
                    .map_err(|e| PipelineError::io("failed to create temporary file", e))?
                    .into_temp_path();
                std::fs::write(&temp, &sql).map_err(|e| PipelineError::io_at("write", &temp, e))?;

                hooks::run_generate_migration_post(&self.root_dir, &temp).await?;
                let sql = std::fs::read_to_string(&temp)
                    .map_err(|e| PipelineError::io_at("read", &temp, e))?;
                temp.close()
                    .map_err(|e| PipelineError::io("failed to remove temporary file", e))?;

                println!("\n--\n{}\n--", sql);
                Ok((sql, None))
            }
        }
    }
}
