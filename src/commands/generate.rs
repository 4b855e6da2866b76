use anyhow::Result;
use clap::Args;
use std::path::Path;
use tracing::{info, warn};

use crate::config::{Config, ConfigInput, DirectoryArgs, EphemeralArgs};
use crate::ephemeral::ConfiguredProvisioner;
use crate::error::{PipelineError, PipelineResult};
use crate::export::PgModelerCli;
use crate::migration::{discover_migrations, resolve_new_migration};
use crate::pipeline::{Orchestrator, OutputMode, RunOutcome, ShutdownSignal, WatchLoop};

#[derive(Debug, Clone, Args)]
pub struct GenerateArgs {
    /// Migration name in lower-kebab-case, e.g. add-order-status
    pub name: Option<String>,

    /// Watch the model and regenerate on every change
    #[arg(long)]
    pub dev: bool,

    /// Remove the generated migration file when watch mode stops
    #[arg(long, requires = "dev")]
    pub cleanup: bool,

    /// Regenerate the latest migration when it already has this name
    #[arg(long)]
    pub overwrite: bool,

    /// Print the statements instead of writing a migration file
    #[arg(long, conflicts_with_all = ["name", "overwrite", "cleanup"])]
    pub stdout: bool,

    #[command(flatten)]
    pub ephemeral_args: EphemeralArgs,

    #[command(flatten)]
    pub directory_args: DirectoryArgs,
}

impl GenerateArgs {
    pub fn config_input(&self) -> ConfigInput {
        ConfigInput::from_cli(self.ephemeral_args.clone(), self.directory_args.clone())
    }
}

/// Decide file or stream output before anything is provisioned
pub fn resolve_output_mode(
    config: &Config,
    root_dir: &Path,
    args: &GenerateArgs,
) -> PipelineResult<OutputMode> {
    if args.stdout {
        return Ok(OutputMode::Stream);
    }
    let name = args.name.as_deref().ok_or_else(|| {
        PipelineError::Naming(
            "expecting one migration name, use lower-kebab-case for the migration name".to_string(),
        )
    })?;

    let migrations_dir = config.migrations_path(root_dir);
    let existing = discover_migrations(&migrations_dir)?;
    let new = resolve_new_migration(&migrations_dir, &existing, name, args.overwrite)?;
    info!(
        "Generating migration {} at {}",
        new.sequence,
        new.path.display()
    );
    Ok(OutputMode::File(new))
}

pub async fn cmd_generate(
    config: &Config,
    root_dir: &Path,
    args: &GenerateArgs,
    shutdown: &ShutdownSignal,
) -> Result<()> {
    let mode = resolve_output_mode(config, root_dir, args)?;
    let orchestrator = Orchestrator::new(
        config.clone(),
        root_dir,
        ConfiguredProvisioner::from_config(config),
        PgModelerCli::new(config),
    )?;

    if !args.dev {
        match orchestrator.run(&mode, "").await? {
            RunOutcome::Unchanged => println!("Model is empty, nothing to generate"),
            RunOutcome::Generated { .. } => {}
        }
        return Ok(());
    }

    WatchLoop::new(&orchestrator, mode.clone()).run(shutdown).await;

    if args.cleanup
        && let OutputMode::File(new) = &mode
        && !new.replaces_latest
        && new.path.exists()
    {
        match std::fs::remove_file(&new.path) {
            Ok(()) => println!("Removed {}", new.path.display()),
            Err(e) => warn!("Failed to delete {}: {}", new.path.display(), e),
        }
    }
    Ok(())
}
