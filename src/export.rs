//! Model export through `pgmodeler-cli`.

use anyhow::{Context, Result, bail};
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::config::Config;
use crate::constants::{MODEL_IMAGE_EXTENSION, MODEL_SQL_EXTENSION};

pub trait ModelExporter: Clone + Send + Sync + 'static {
    /// Export the model to SQL next to it, returning the SQL file
    fn export_sql(&self, model: &Path) -> impl Future<Output = Result<PathBuf>> + Send;

    /// Export the model diagram next to it, returning the image file
    fn export_image(&self, model: &Path) -> impl Future<Output = Result<PathBuf>> + Send;
}

#[derive(Debug, Clone)]
pub struct PgModelerCli {
    program: PathBuf,
    pgsql_version: String,
}

impl PgModelerCli {
    pub fn new(config: &Config) -> Self {
        Self {
            program: PathBuf::from(&config.pgmodeler_cli),
            pgsql_version: config.pgsql_version.clone(),
        }
    }

    async fn run(&self, model: &Path, mode: &str, output: &Path) -> Result<()> {
        debug!("Exporting {} with {}", model.display(), mode);
        let result = Command::new(&self.program)
            .arg("--input")
            .arg(model)
            .arg(mode)
            .arg("--output")
            .arg(output)
            .arg("--pgsql-ver")
            .arg(&self.pgsql_version)
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.program.display()))?;

        if !result.status.success() {
            bail!(
                "{} {} exited with {}: {} {}",
                self.program.display(),
                mode,
                result.status,
                String::from_utf8_lossy(&result.stdout).trim(),
                String::from_utf8_lossy(&result.stderr).trim()
            );
        }
        Ok(())
    }
}

impl ModelExporter for PgModelerCli {
    async fn export_sql(&self, model: &Path) -> Result<PathBuf> {
        let output = model.with_extension(MODEL_SQL_EXTENSION);
        self.run(model, "--export-to-file", &output).await?;
        Ok(output)
    }

    async fn export_image(&self, model: &Path) -> Result<PathBuf> {
        let output = model.with_extension(MODEL_IMAGE_EXTENSION);
        self.run(model, "--export-to-png", &output).await?;
        Ok(output)
    }
}
