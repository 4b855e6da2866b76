//! Structural diff between the replayed history and the desired schema.
//!
//! The desired SQL is loaded into a scratch database on the replay server so
//! both catalogs come from the same server version and the same roles.

use anyhow::{Context, Result};
use regex::Regex;
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::catalog::{Catalog, ObjectFilter};
use crate::constants::LEGACY_TRACKING_TABLE_DROP;
use crate::db::{self, ConnectionConfig};
use crate::diff::{diff_all, order_steps};
use crate::error::{PipelineError, PipelineResult};
use crate::render::{Safety, SqlRenderer, quote_ident};

pub struct SchemaDiff {
    tracking_table: String,
    tracking_reference: Regex,
    connection: ConnectionConfig,
}

impl SchemaDiff {
    pub fn new(tracking_table: &str, connection: ConnectionConfig) -> PipelineResult<Self> {
        // Bare, quoted or schema-qualified mention of the table
        let pattern = format!(
            r#"(?i)(^|[\s.(,])"?{}"?($|[\s.;,()])"#,
            regex::escape(tracking_table)
        );
        let tracking_reference = Regex::new(&pattern).map_err(|e| {
            PipelineError::Config(format!("invalid tracking table '{}': {}", tracking_table, e))
        })?;
        Ok(Self {
            tracking_table: tracking_table.to_string(),
            tracking_reference,
            connection,
        })
    }

    /// Statements turning the schema at `before_dsn` into `desired_sql`.
    ///
    /// With `initial` there is no history to compare against and the desired
    /// SQL comes back untouched as a single statement.
    pub async fn diff(
        &self,
        before_dsn: &str,
        desired_sql: &str,
        initial: bool,
    ) -> PipelineResult<Vec<String>> {
        if initial {
            return Ok(vec![desired_sql.to_string()]);
        }

        let statements = self
            .diff_against_scratch(before_dsn, desired_sql)
            .await
            .map_err(|e| PipelineError::Diff(format!("{e:#}")))?;

        Ok(statements
            .into_iter()
            .filter(|s| !self.is_tracking_statement(s))
            .collect())
    }

    async fn diff_against_scratch(&self, before_dsn: &str, desired_sql: &str) -> Result<Vec<String>> {
        let before = db::connect_with_retry(before_dsn, &self.connection).await?;
        let scratch_name = format!("scratch_{}", uuid::Uuid::new_v4().simple());

        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&scratch_name)))
            .execute(&before)
            .await
            .with_context(|| format!("failed to create scratch database {}", scratch_name))?;
        debug!("Created scratch database {}", scratch_name);

        let result = self
            .diff_in_scratch(&before, before_dsn, &scratch_name, desired_sql)
            .await;

        if let Err(e) = sqlx::query(&format!(
            "DROP DATABASE IF EXISTS {} WITH (FORCE)",
            quote_ident(&scratch_name)
        ))
        .execute(&before)
        .await
        {
            warn!("Failed to drop scratch database {}: {}", scratch_name, e);
        }
        before.close().await;
        result
    }

    async fn diff_in_scratch(
        &self,
        before: &PgPool,
        before_dsn: &str,
        scratch_name: &str,
        desired_sql: &str,
    ) -> Result<Vec<String>> {
        let scratch = db::connect_to_sibling(before_dsn, scratch_name, &self.connection).await?;
        let loaded = async {
            db::execute_script(&scratch, desired_sql)
                .await
                .map_err(|message| anyhow::anyhow!("desired schema: {}", message))?;
            let filter = ObjectFilter::new(&self.tracking_table);
            let old = Catalog::load(before, &filter)
                .await
                .context("failed to introspect replayed history")?;
            let new = Catalog::load(&scratch, &filter)
                .await
                .context("failed to introspect desired schema")?;
            anyhow::Ok((old, new))
        }
        .await;
        scratch.close().await;
        let (old, new) = loaded?;

        let steps = order_steps(diff_all(&old, &new))?;
        let mut statements = Vec::new();
        for rendered in steps.iter().flat_map(|step| step.to_sql()) {
            if rendered.safety == Safety::Destructive {
                warn!("Destructive statement generated: {}", rendered.sql);
            }
            statements.push(rendered.sql);
        }
        debug!("Structural diff produced {} statements", statements.len());
        Ok(statements)
    }

    /// Statements that would touch the tracking table written by replay
    pub fn is_tracking_statement(&self, statement: &str) -> bool {
        let trimmed = statement.trim();
        if trimmed == LEGACY_TRACKING_TABLE_DROP {
            return true;
        }
        let keyword = trimmed
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        matches!(keyword.as_str(), "DROP" | "ALTER") && self.tracking_reference.is_match(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn adapter() -> SchemaDiff {
        SchemaDiff::new("schema_migrations", ConnectionConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_initial_returns_desired_sql_verbatim() {
        let desired = "CREATE TABLE orders (id int);\n\nCREATE INDEX ON orders (id);\n";
        // The before server is never contacted on the bootstrap path
        let statements = adapter()
            .diff("postgres://postgres@127.0.0.1:1/postgres", desired, true)
            .await
            .unwrap();
        assert_eq!(statements, vec![desired.to_string()]);
    }

    #[rstest]
    #[case("DROP TABLE \"schema_migrations\";", true)]
    #[case("DROP TABLE schema_migrations;", true)]
    #[case("DROP TABLE \"public\".\"schema_migrations\";", true)]
    #[case("ALTER TABLE public.schema_migrations OWNER TO app;", true)]
    #[case("alter table schema_migrations add column x int;", true)]
    #[case("DROP TABLE \"public\".\"orders\";", false)]
    #[case("DROP TABLE \"schema_migrations_archive\";", false)]
    #[case("CREATE TABLE \"schema_migrations\" (version bigint);", false)]
    #[case("ALTER TABLE orders ADD COLUMN schema_migrations_seen boolean;", false)]
    fn test_tracking_statements(#[case] statement: &str, #[case] filtered: bool) {
        assert_eq!(adapter().is_tracking_statement(statement), filtered);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_diff_error() {
        let adapter = SchemaDiff::new(
            "schema_migrations",
            ConnectionConfig {
                max_retries: 0,
                retry_delay: std::time::Duration::from_millis(1),
            },
        )
        .unwrap();
        let err = adapter
            .diff("postgres://postgres@127.0.0.1:1/postgres", "SELECT 1;", false)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Diff(_)));
    }
}
