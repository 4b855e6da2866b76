use crate::config::types::*;
use crate::constants::DEFAULT_TRACKING_TABLE;

impl Default for Ephemeral {
    fn default() -> Self {
        Self {
            backend: Backend::Local,
            bin_dir: None,
            replay_port: None,
            desired_port: None,
            docker_version: "16".to_string(),
            docker_image: None,
            connect_retries: 10,
            retry_delay_ms: 200,
        }
    }
}

pub fn default_migrations_dir() -> String {
    "migrations".to_string()
}

pub fn default_pgsql_version() -> String {
    "16.0".to_string()
}

pub fn default_pgmodeler_cli() -> String {
    "pgmodeler-cli".to_string()
}

pub fn default_tracking_table() -> String {
    DEFAULT_TRACKING_TABLE.to_string()
}
