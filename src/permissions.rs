//! Finds statements the structural diff does not emit, chiefly ownership and
//! privileges, by comparing schema-only dumps of the two databases after the
//! structural statements have been applied to the replay side.

use once_cell::sync::Lazy;
use regex::Regex;
use similar::{ChangeTag, TextDiff};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::config::Config;
use crate::constants::DUMP_STATEMENT_PREFIX;
use crate::db::{self, ConnectionConfig};
use crate::error::{PipelineError, PipelineResult};

const DESIRED_DUMP: &str = "desired.schema.sql";
const REPLAY_DUMP: &str = "replay.schema.sql";

static TOOL_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(PostgreSQL\)\s+(\d+)").expect("valid version regex"));

pub struct PermissionDiff {
    pg_dump: PathBuf,
    tracking_table: String,
    connection: ConnectionConfig,
}

impl PermissionDiff {
    pub fn new(config: &Config) -> Self {
        Self {
            pg_dump: config.ephemeral.binary("pg_dump"),
            tracking_table: config.tracking_table.clone(),
            connection: ConnectionConfig::from(&config.ephemeral),
        }
    }

    /// Statements present in the desired dump but missing from replay once
    /// `structural` has run there, joined by newlines
    pub async fn detect_missing(
        &self,
        replay_dsn: &str,
        desired_dsn: &str,
        structural: &[String],
        work_dir: &Path,
    ) -> PipelineResult<String> {
        if !structural.is_empty() {
            self.apply_structural(replay_dsn, structural).await?;
        }

        let desired_path = work_dir.join(DESIRED_DUMP);
        let replay_path = work_dir.join(REPLAY_DUMP);
        self.dump(desired_dsn, &desired_path).await?;
        self.dump(replay_dsn, &replay_path).await?;

        let read = |path: &Path| {
            std::fs::read_to_string(path).map_err(|e| {
                PipelineError::DiffTool(format!("failed to read {}: {}", path.display(), e))
            })
        };
        let desired = read(&desired_path)?;
        let replay = read(&replay_path)?;

        let missing = extract_missing_statements(&desired, &replay);
        debug!(
            "Dump comparison found {} missing statement(s)",
            missing.lines().count()
        );
        Ok(missing)
    }

    /// Fail early when `pg_dump` is older than the server at `dsn`, which it
    /// would refuse to dump. Versions that cannot be read are left for the
    /// dump itself to report.
    pub async fn check_dump_version(&self, dsn: &str) -> PipelineResult<()> {
        let Some(tool_major) = self.tool_major().await else {
            return Ok(());
        };
        let Some(server_major) = server_major(dsn, &self.connection).await else {
            return Ok(());
        };
        debug!(
            "pg_dump major version {}, server major version {}",
            tool_major, server_major
        );
        ensure_dump_supports(&self.pg_dump, tool_major, server_major)
    }

    async fn tool_major(&self) -> Option<u32> {
        let output = Command::new(&self.pg_dump).arg("--version").output().await;
        match output {
            Ok(output) if output.status.success() => {
                parse_tool_major(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                debug!("{} --version exited with {}", self.pg_dump.display(), output.status);
                None
            }
            Err(e) => {
                debug!("Failed to run {}: {}", self.pg_dump.display(), e);
                None
            }
        }
    }

    async fn apply_structural(&self, replay_dsn: &str, structural: &[String]) -> PipelineResult<()> {
        let pool = db::connect_with_retry(replay_dsn, &self.connection)
            .await
            .map_err(|e| PipelineError::apply("structural diff", format!("{e:#}")))?;
        let result = db::execute_script(&pool, &structural.join("\n")).await;
        pool.close().await;
        result.map_err(|message| PipelineError::apply("structural diff", message))
    }

    async fn dump(&self, dsn: &str, output: &Path) -> PipelineResult<()> {
        debug!("Dumping schema to {}", output.display());
        let result = Command::new(&self.pg_dump)
            .arg("--schema-only")
            .arg(format!("--exclude-table={}", self.tracking_table))
            .arg("--file")
            .arg(output)
            .arg("--dbname")
            .arg(dsn)
            .output()
            .await
            .map_err(|e| {
                PipelineError::Dump(format!("failed to run {}: {}", self.pg_dump.display(), e))
            })?;

        if !result.status.success() {
            return Err(PipelineError::Dump(format!(
                "{} exited with {}: {}",
                self.pg_dump.display(),
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        Ok(())
    }
}

async fn server_major(dsn: &str, connection: &ConnectionConfig) -> Option<u32> {
    let pool = match db::connect_with_retry(dsn, connection).await {
        Ok(pool) => pool,
        Err(e) => {
            debug!("Skipping dump version check: {:#}", e);
            return None;
        }
    };
    let version = sqlx::query_scalar::<_, String>("SHOW server_version_num")
        .fetch_one(&pool)
        .await;
    pool.close().await;
    match version {
        Ok(version) => version.trim().parse::<u32>().ok().map(|num| num / 10000),
        Err(e) => {
            debug!("Skipping dump version check: {}", e);
            None
        }
    }
}

/// Major version from `pg_dump --version` output such as
/// `pg_dump (PostgreSQL) 16.2 (Debian 16.2-1)`
pub fn parse_tool_major(output: &str) -> Option<u32> {
    TOOL_VERSION
        .captures(output)
        .and_then(|captures| captures[1].parse().ok())
}

/// `pg_dump` dumps servers up to its own major version
pub fn ensure_dump_supports(pg_dump: &Path, tool_major: u32, server_major: u32) -> PipelineResult<()> {
    if tool_major >= server_major {
        return Ok(());
    }
    Err(PipelineError::Dump(format!(
        "{} is PostgreSQL {} but the ephemeral server runs PostgreSQL {}; \
         point ephemeral.bin_dir at a PostgreSQL {} installation or lower ephemeral.docker_version",
        pg_dump.display(),
        tool_major,
        server_major,
        server_major
    )))
}

/// Lines added on the desired side whose trimmed text starts with `ALTER `,
/// in dump order. Lines only in the replay dump never surface.
pub fn extract_missing_statements(desired_dump: &str, replay_dump: &str) -> String {
    if desired_dump == replay_dump {
        return String::new();
    }

    TextDiff::from_lines(replay_dump, desired_dump)
        .iter_all_changes()
        .filter(|change| change.tag() == ChangeTag::Insert)
        .map(|change| change.value().trim())
        .filter(|line| line.starts_with(DUMP_STATEMENT_PREFIX))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const REPLAY: &str = "\
CREATE TABLE public.orders (
    id integer
);

ALTER TABLE public.orders OWNER TO postgres;
GRANT SELECT ON TABLE public.orders TO readonly;
";

    #[rstest]
    #[case("pg_dump (PostgreSQL) 16.2 (Debian 16.2-1.pgdg120+2)\n", Some(16))]
    #[case("pg_dump (PostgreSQL) 9.6.24\n", Some(9))]
    #[case("pg_dump (PostgreSQL) 17beta1\n", Some(17))]
    #[case("command not found", None)]
    fn test_parse_tool_major(#[case] output: &str, #[case] expected: Option<u32>) {
        assert_eq!(parse_tool_major(output), expected);
    }

    #[test]
    fn test_older_pg_dump_is_rejected_before_dumping() {
        let pg_dump = Path::new("/usr/bin/pg_dump");
        assert!(ensure_dump_supports(pg_dump, 16, 16).is_ok());
        assert!(ensure_dump_supports(pg_dump, 17, 15).is_ok());

        let err = ensure_dump_supports(pg_dump, 15, 16).unwrap_err();
        assert!(matches!(err, PipelineError::Dump(_)));
        let msg = err.to_string();
        assert!(msg.contains("PostgreSQL 15"));
        assert!(msg.contains("PostgreSQL 16"));
        assert!(msg.contains("ephemeral.bin_dir"));
    }

    #[test]
    fn test_identical_dumps_have_nothing_missing() {
        assert_eq!(extract_missing_statements(REPLAY, REPLAY), "");
    }

    #[test]
    fn test_added_alter_lines_surface_in_order() {
        let desired = REPLAY.replace(
            "ALTER TABLE public.orders OWNER TO postgres;\n",
            "ALTER TABLE public.orders OWNER TO app;\nALTER DEFAULT PRIVILEGES GRANT SELECT ON TABLES TO readonly;\n",
        );
        assert_eq!(
            extract_missing_statements(&desired, REPLAY),
            "ALTER TABLE public.orders OWNER TO app;\nALTER DEFAULT PRIVILEGES GRANT SELECT ON TABLES TO readonly;"
        );
    }

    #[test]
    fn test_replay_only_lines_never_surface() {
        let replay = format!("{}ALTER TABLE public.orders OWNER TO legacy;\n", REPLAY);
        assert_eq!(extract_missing_statements(REPLAY, &replay), "");
    }

    #[test]
    fn test_non_alter_additions_are_ignored() {
        let desired = format!(
            "{}GRANT INSERT ON TABLE public.orders TO app;\nalter table public.orders owner to app;\n",
            REPLAY
        );
        assert_eq!(extract_missing_statements(&desired, REPLAY), "");
    }

    #[test]
    fn test_indented_alter_lines_are_trimmed() {
        let desired = format!("{}    ALTER SCHEMA app OWNER TO app;\n", REPLAY);
        assert_eq!(
            extract_missing_statements(&desired, REPLAY),
            "ALTER SCHEMA app OWNER TO app;"
        );
    }
}
