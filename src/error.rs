//! Error taxonomy for a generation run.
//!
//! Collaborators use `anyhow` internally; failures are classified into a
//! [`PipelineError`] at the component boundary so the orchestrator and the
//! watch loop can tell which phase of a run failed.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// An ephemeral database failed to start or never accepted connections
    #[error("failed to provision {name} database: {message}")]
    Provisioning { name: String, message: String },

    /// SQL application failed, during history replay or structural apply
    #[error("failed to apply {source_name}: {message}")]
    Apply {
        source_name: String,
        message: String,
    },

    /// Structural diff failed (catalog introspection or scratch database)
    #[error("structural diff failed: {0}")]
    Diff(String),

    /// Schema dump tool exited unsuccessfully
    #[error("schema dump failed: {0}")]
    Dump(String),

    /// Line diff between dumps could not be computed
    #[error("dump comparison failed: {0}")]
    DiffTool(String),

    /// Post-generation hook exited with a non-zero status
    #[error("hook '{hook}' failed: {message}")]
    Hook { hook: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid migration name or a migration file that would be clobbered
    #[error("{0}")]
    Naming(String),

    /// Model export to SQL failed
    #[error("failed to export model: {0}")]
    Export(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    pub fn provisioning(name: &str, err: impl std::fmt::Display) -> Self {
        Self::Provisioning {
            name: name.to_string(),
            message: format!("{err:#}"),
        }
    }

    pub fn apply(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Apply {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn io_at(action: &str, path: &std::path::Path, source: std::io::Error) -> Self {
        Self::io(format!("failed to {} {}", action, path.display()), source)
    }

    /// Config and naming errors are raised before any database is provisioned
    pub fn is_preflight(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Naming(_))
    }
}

/// Hook failure details, kept separate so the runner can report the path it tried
#[derive(Debug, Clone)]
pub struct HookFailure {
    pub path: PathBuf,
    pub status: Option<i32>,
}

impl std::fmt::Display for HookFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(code) => write!(f, "{} exited with status {}", self.path.display(), code),
            None => write!(f, "{} was terminated by a signal", self.path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preflight_classification() {
        assert!(PipelineError::Config("missing model_name".into()).is_preflight());
        assert!(PipelineError::Naming("bad name".into()).is_preflight());
        assert!(!PipelineError::Diff("boom".into()).is_preflight());
        assert!(!PipelineError::provisioning("replay", "port in use").is_preflight());
    }

    #[test]
    fn test_apply_error_names_source() {
        let err = PipelineError::apply("002_add-status.up.sql", "syntax error at or near \"TABL\"");
        let msg = err.to_string();
        assert!(msg.contains("002_add-status.up.sql"));
        assert!(msg.contains("syntax error"));
    }

    #[test]
    fn test_hook_failure_display() {
        let failure = HookFailure {
            path: PathBuf::from("hooks/generate-migration-post"),
            status: Some(3),
        };
        assert_eq!(
            failure.to_string(),
            "hooks/generate-migration-post exited with status 3"
        );
    }
}
