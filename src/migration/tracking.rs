//! The migration tracking table, in the golang-migrate layout: a single row
//! holding the current version and a dirty flag.

use anyhow::{Context, Result, bail};
use sqlx::{PgConnection, PgPool};

use crate::config::builder::is_valid_sql_identifier;
use crate::render::quote_ident;

/// Quoted tracking table name, rejecting anything that is not a plain identifier
pub fn tracking_table_name(table: &str) -> Result<String> {
    if !is_valid_sql_identifier(table) {
        bail!(
            "Invalid tracking table name '{}': must contain only letters, numbers, underscores, and dollar signs, starting with letter or underscore",
            table
        );
    }
    Ok(quote_ident(table))
}

pub async fn ensure_tracking_table(pool: &PgPool, table: &str) -> Result<()> {
    let name = tracking_table_name(table)?;
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {} (version bigint NOT NULL PRIMARY KEY, dirty boolean NOT NULL)",
        name
    ))
    .execute(pool)
    .await
    .with_context(|| format!("Failed to create tracking table {}", name))?;
    Ok(())
}

/// Current version, `None` when nothing has been applied
pub async fn current_version(pool: &PgPool, table: &str) -> Result<Option<u32>> {
    let name = tracking_table_name(table)?;
    let row: Option<(i64, bool)> =
        sqlx::query_as(&format!("SELECT version, dirty FROM {} LIMIT 1", name))
            .fetch_optional(pool)
            .await
            .with_context(|| format!("Failed to read {}", name))?;

    match row {
        None => Ok(None),
        Some((version, true)) => bail!("{} is dirty at version {}", name, version),
        Some((version, false)) => {
            let version = u32::try_from(version)
                .with_context(|| format!("{} holds an invalid version {}", name, version))?;
            Ok(Some(version))
        }
    }
}

/// Replace the recorded version; runs on the migration's own transaction
pub async fn record_version(conn: &mut PgConnection, table: &str, version: u32) -> Result<()> {
    let name = tracking_table_name(table)?;
    sqlx::query(&format!("DELETE FROM {}", name))
        .execute(&mut *conn)
        .await?;
    sqlx::query(&format!(
        "INSERT INTO {} (version, dirty) VALUES ($1, false)",
        name
    ))
    .bind(i64::from(version))
    .execute(&mut *conn)
    .await
    .with_context(|| format!("Failed to record version {} in {}", version, name))?;
    Ok(())
}
