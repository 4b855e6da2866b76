use crate::config::defaults::*;
use crate::config::{merge::Merge, types::*};
use crate::error::{PipelineError, PipelineResult};
use std::path::PathBuf;

pub struct ConfigBuilder {
    config_input: ConfigInput,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config_input: ConfigInput::default(),
        }
    }

    pub fn with_file(mut self, file_input: ConfigInput) -> Self {
        self.config_input = self.config_input.merge(file_input);
        self
    }

    pub fn with_cli_args(mut self, cli_input: ConfigInput) -> Self {
        self.config_input = self.config_input.merge(cli_input);
        self
    }

    pub fn resolve(self) -> PipelineResult<Config> {
        let input = self.config_input;

        let model_name = input
            .model_name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| PipelineError::Config("model_name is required".to_string()))?;

        let database_users = input.database_users.unwrap_or_default();
        if let Some(blank) = database_users.iter().find(|u| u.trim().is_empty()) {
            return Err(PipelineError::Config(format!(
                "database_users contains an empty name: {:?}",
                blank
            )));
        }

        let tracking_table = input.tracking_table.unwrap_or_else(default_tracking_table);
        if !is_valid_sql_identifier(&tracking_table) {
            return Err(PipelineError::Config(format!(
                "Invalid tracking table name '{}': must contain only letters, numbers, underscores, and dollar signs, starting with letter or underscore",
                tracking_table
            )));
        }

        let templates = input
            .templates
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, t)| match (t.path, t.content) {
                (Some(path), Some(content)) => Ok(TemplateSpec { path, content }),
                _ => Err(PipelineError::Config(format!(
                    "templates[{}] needs both 'path' and 'content'",
                    i
                ))),
            })
            .collect::<PipelineResult<Vec<_>>>()?;

        Ok(Config {
            model_name,
            database_users,
            migrations_dir: input.migrations_dir.unwrap_or_else(default_migrations_dir),
            pgsql_version: input.pgsql_version.unwrap_or_else(default_pgsql_version),
            pgmodeler_cli: input.pgmodeler_cli.unwrap_or_else(default_pgmodeler_cli),
            tracking_table,
            templates,
            ephemeral: Self::resolve_ephemeral(input.ephemeral)?,
        })
    }

    fn resolve_ephemeral(input: Option<EphemeralInput>) -> PipelineResult<Ephemeral> {
        let defaults = Ephemeral::default();
        let Some(input) = input else {
            return Ok(defaults);
        };

        if let (Some(replay), Some(desired)) = (input.replay_port, input.desired_port)
            && replay == desired
        {
            return Err(PipelineError::Config(format!(
                "replay_port and desired_port must differ (both are {})",
                replay
            )));
        }

        Ok(Ephemeral {
            backend: input.backend.unwrap_or(defaults.backend),
            bin_dir: input.bin_dir.map(PathBuf::from).or(defaults.bin_dir),
            replay_port: input.replay_port,
            desired_port: input.desired_port,
            docker_version: input.docker_version.unwrap_or(defaults.docker_version),
            docker_image: input.docker_image.or(defaults.docker_image),
            connect_retries: input.connect_retries.unwrap_or(defaults.connect_retries),
            retry_delay_ms: input.retry_delay_ms.unwrap_or(defaults.retry_delay_ms),
        })
    }
}

/// PostgreSQL identifier rules, unquoted form
pub fn is_valid_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}
