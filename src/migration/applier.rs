use sqlx::PgPool;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::db::{self, ConnectionConfig, sql_error};
use crate::error::{PipelineError, PipelineResult};
use crate::migration::{MigrationFile, discover_migrations, tracking};

/// A migration file that could not be applied; its transaction was rolled back
#[derive(Debug, Error)]
#[error("{source_name}: {message}")]
pub struct ApplyError {
    pub source_name: String,
    pub message: String,
}

impl ApplyError {
    fn new(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

impl From<ApplyError> for PipelineError {
    fn from(err: ApplyError) -> Self {
        PipelineError::apply(err.source_name, err.message)
    }
}

/// Replays migration history onto a database, one transaction per file
pub struct MigrationApplier {
    tracking_table: String,
    connection: ConnectionConfig,
}

impl MigrationApplier {
    pub fn new(tracking_table: impl Into<String>, connection: ConnectionConfig) -> Self {
        Self {
            tracking_table: tracking_table.into(),
            connection,
        }
    }

    /// Apply every pending migration, returning the versions applied
    pub async fn apply_all(&self, migrations_dir: &Path, dsn: &str) -> PipelineResult<Vec<u32>> {
        self.apply_until(migrations_dir, dsn, None).await
    }

    /// Apply pending migrations numbered below `before` (all when `None`)
    pub async fn apply_until(
        &self,
        migrations_dir: &Path,
        dsn: &str,
        before: Option<u32>,
    ) -> PipelineResult<Vec<u32>> {
        let migrations: Vec<MigrationFile> = discover_migrations(migrations_dir)?
            .into_iter()
            .filter(|m| before.is_none_or(|limit| m.sequence < limit))
            .collect();

        let pool = db::connect_with_retry(dsn, &self.connection)
            .await
            .map_err(|e| ApplyError::new("migration history", format!("{e:#}")))?;
        let result = self.apply_files(&pool, &migrations).await;
        pool.close().await;
        Ok(result?)
    }

    async fn apply_files(
        &self,
        pool: &PgPool,
        migrations: &[MigrationFile],
    ) -> Result<Vec<u32>, ApplyError> {
        let tracking_error =
            |e: anyhow::Error| ApplyError::new(self.tracking_table.as_str(), format!("{e:#}"));
        tracking::ensure_tracking_table(pool, &self.tracking_table)
            .await
            .map_err(tracking_error)?;
        let current = tracking::current_version(pool, &self.tracking_table)
            .await
            .map_err(tracking_error)?;

        let mut applied = Vec::new();
        for migration in migrations {
            if current.is_some_and(|version| migration.sequence <= version) {
                debug!("Skipping already applied {}", migration.filename());
                continue;
            }
            self.apply_one(pool, migration).await?;
            applied.push(migration.sequence);
        }

        info!("Applied {} migration(s)", applied.len());
        Ok(applied)
    }

    async fn apply_one(&self, pool: &PgPool, migration: &MigrationFile) -> Result<(), ApplyError> {
        let filename = migration.filename();
        debug!("Applying {}", filename);

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| ApplyError::new(&filename, e.to_string()))?;

        if !migration.content.trim().is_empty()
            && let Err(e) = sqlx::raw_sql(&migration.content).execute(&mut *tx).await
        {
            // Dropping the transaction rolls it back
            return Err(ApplyError::new(
                &filename,
                sql_error::describe(&e, &migration.content),
            ));
        }

        tracking::record_version(&mut *tx, &self.tracking_table, migration.sequence)
            .await
            .map_err(|e| ApplyError::new(&filename, format!("{e:#}")))?;
        tx.commit()
            .await
            .map_err(|e| ApplyError::new(&filename, e.to_string()))
    }
}
