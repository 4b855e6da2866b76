use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration input - all fields Optional for merging
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigInput {
    pub model_name: Option<String>,
    pub database_users: Option<Vec<String>>,
    pub migrations_dir: Option<String>,
    pub pgsql_version: Option<String>,
    pub pgmodeler_cli: Option<String>,
    pub tracking_table: Option<String>,
    pub templates: Option<Vec<TemplateInput>>,
    pub ephemeral: Option<EphemeralInput>,
}

/// Resolved configuration with all defaults applied
#[derive(Debug, Clone)]
pub struct Config {
    pub model_name: String,
    pub database_users: Vec<String>,
    pub migrations_dir: String,
    pub pgsql_version: String,
    pub pgmodeler_cli: String,
    pub tracking_table: String,
    pub templates: Vec<TemplateSpec>,
    pub ephemeral: Ephemeral,
}

impl Config {
    pub fn model_path(&self, root_dir: &std::path::Path) -> PathBuf {
        root_dir.join(format!(
            "{}.{}",
            self.model_name,
            crate::constants::MODEL_EXTENSION
        ))
    }

    pub fn model_sql_path(&self, root_dir: &std::path::Path) -> PathBuf {
        root_dir.join(format!(
            "{}.{}",
            self.model_name,
            crate::constants::MODEL_SQL_EXTENSION
        ))
    }

    pub fn model_image_path(&self, root_dir: &std::path::Path) -> PathBuf {
        root_dir.join(format!(
            "{}.{}",
            self.model_name,
            crate::constants::MODEL_IMAGE_EXTENSION
        ))
    }

    pub fn migrations_path(&self, root_dir: &std::path::Path) -> PathBuf {
        root_dir.join(&self.migrations_dir)
    }
}

// Template configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TemplateInput {
    pub path: Option<String>,
    pub content: Option<String>,
}

/// A file rewritten after every generated migration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSpec {
    pub path: String,
    pub content: String,
}

// Ephemeral database configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EphemeralInput {
    pub backend: Option<Backend>,
    pub bin_dir: Option<String>,
    pub replay_port: Option<u16>,
    pub desired_port: Option<u16>,
    pub docker_version: Option<String>,
    pub docker_image: Option<String>,
    pub connect_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// initdb + pg_ctl from the local PostgreSQL installation
    #[default]
    Local,
    /// A disposable postgres container
    Docker,
}

#[derive(Debug, Clone)]
pub struct Ephemeral {
    pub backend: Backend,
    pub bin_dir: Option<PathBuf>,
    pub replay_port: Option<u16>,
    pub desired_port: Option<u16>,
    pub docker_version: String,
    pub docker_image: Option<String>,
    pub connect_retries: u32,
    pub retry_delay_ms: u64,
}

impl Ephemeral {
    /// Path of a PostgreSQL client/server binary, honoring `bin_dir`
    pub fn binary(&self, name: &str) -> PathBuf {
        match &self.bin_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }

    /// Docker image, explicit image winning over version
    pub fn resolved_image(&self) -> String {
        match &self.docker_image {
            Some(image) if !image.is_empty() => image.clone(),
            _ => format!("postgres:{}-alpine", self.docker_version),
        }
    }
}

// CLI argument groups
#[derive(Debug, Clone, Default, Args)]
pub struct EphemeralArgs {
    #[arg(long, value_enum, help = "Ephemeral database backend")]
    pub backend: Option<Backend>,

    #[arg(long, help = "Directory containing initdb, pg_ctl and pg_dump")]
    pub bin_dir: Option<String>,

    #[arg(long, help = "Port for the history replay database")]
    pub replay_port: Option<u16>,

    #[arg(long, help = "Port for the desired schema database")]
    pub desired_port: Option<u16>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct DirectoryArgs {
    #[arg(long, help = "Migrations directory path")]
    pub migrations_dir: Option<String>,
}

impl From<EphemeralArgs> for EphemeralInput {
    fn from(args: EphemeralArgs) -> Self {
        Self {
            backend: args.backend,
            bin_dir: args.bin_dir,
            replay_port: args.replay_port,
            desired_port: args.desired_port,
            ..Default::default()
        }
    }
}

impl ConfigInput {
    /// Input carrying only what the generate command's flags can override
    pub fn from_cli(ephemeral: EphemeralArgs, directories: DirectoryArgs) -> Self {
        Self {
            migrations_dir: directories.migrations_dir,
            ephemeral: Some(ephemeral.into()),
            ..Default::default()
        }
    }
}
