pub mod connection;
pub mod sql_error;

use anyhow::Result;
use sqlx::PgPool;

pub use connection::{ConnectionConfig, connect_to_sibling, connect_with_retry, mask_url_password};

/// Run a multi-statement script on one connection inside a transaction.
///
/// `raw_sql` sends the text through the simple query protocol, which is what
/// exported schema files and hand-written migrations expect.
pub async fn execute_script(pool: &PgPool, sql: &str) -> std::result::Result<(), String> {
    let run = async {
        let mut tx = pool.begin().await?;
        sqlx::raw_sql(sql).execute(&mut *tx).await?;
        tx.commit().await
    };
    run.await.map_err(|e| sql_error::describe(&e, sql))
}

/// `SELECT 1` liveness probe
pub async fn ping(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
