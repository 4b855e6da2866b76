use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::constants::{GENERATE_MIGRATION_POST_HOOK, HOOKS_DIR};
use crate::error::{HookFailure, PipelineError, PipelineResult};

pub fn hook_path(root_dir: &Path, hook: &str) -> PathBuf {
    root_dir.join(HOOKS_DIR).join(hook)
}

/// Run `hooks/generate-migration-post <sql_file>` when the hook exists.
/// The hook may rewrite the file in place.
pub async fn run_generate_migration_post(root_dir: &Path, sql_file: &Path) -> PipelineResult<()> {
    run_hook(root_dir, GENERATE_MIGRATION_POST_HOOK, sql_file).await
}

async fn run_hook(root_dir: &Path, hook: &str, argument: &Path) -> PipelineResult<()> {
    let path = hook_path(root_dir, hook);
    if !path.is_file() {
        debug!("No {} hook at {}", hook, path.display());
        return Ok(());
    }

    info!("Running {} hook", hook);
    let status = Command::new(&path)
        .arg(argument)
        .current_dir(root_dir)
        .status()
        .await
        .map_err(|e| PipelineError::Hook {
            hook: hook.to_string(),
            message: format!("failed to run {}: {}", path.display(), e),
        })?;

    if status.success() {
        return Ok(());
    }
    Err(PipelineError::Hook {
        hook: hook.to_string(),
        message: HookFailure {
            path,
            status: status.code(),
        }
        .to_string(),
    })
}
