use crate::config::types::*;

/// Trait for merging optional configuration values
pub trait Merge<T> {
    fn merge(self, other: T) -> T;
}

impl<T> Merge<Option<T>> for Option<T> {
    fn merge(self, other: Option<T>) -> Option<T> {
        other.or(self)
    }
}

impl Merge<ConfigInput> for ConfigInput {
    fn merge(self, other: ConfigInput) -> ConfigInput {
        ConfigInput {
            model_name: self.model_name.merge(other.model_name),
            database_users: self.database_users.merge(other.database_users),
            migrations_dir: self.migrations_dir.merge(other.migrations_dir),
            pgsql_version: self.pgsql_version.merge(other.pgsql_version),
            pgmodeler_cli: self.pgmodeler_cli.merge(other.pgmodeler_cli),
            tracking_table: self.tracking_table.merge(other.tracking_table),
            templates: self.templates.merge(other.templates),
            ephemeral: match (self.ephemeral, other.ephemeral) {
                (None, None) => None,
                (Some(a), None) => Some(a),
                (None, Some(b)) => Some(b),
                (Some(a), Some(b)) => Some(a.merge_with(b)),
            },
        }
    }
}

impl EphemeralInput {
    pub fn merge_with(self, other: EphemeralInput) -> EphemeralInput {
        EphemeralInput {
            backend: other.backend.or(self.backend),
            bin_dir: other.bin_dir.or(self.bin_dir),
            replay_port: other.replay_port.or(self.replay_port),
            desired_port: other.desired_port.or(self.desired_port),
            docker_version: other.docker_version.or(self.docker_version),
            docker_image: other.docker_image.or(self.docker_image),
            connect_retries: other.connect_retries.or(self.connect_retries),
            retry_delay_ms: other.retry_delay_ms.or(self.retry_delay_ms),
        }
    }
}
