use anyhow::{Context, Result, bail};
use sqlx::ConnectOptions;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use tracing::log::LevelFilter;

use crate::config::Ephemeral;

/// Mask password in database URL for display
pub fn mask_url_password(url: &str) -> String {
    let Some((protocol, rest)) = url.split_once("://") else {
        return url.to_string();
    };

    if let Some((user_info, host_and_path)) = rest.split_once('@')
        && let Some((username, _password)) = user_info.split_once(':')
    {
        return format!("{}://{}:***@{}", protocol, username, host_and_path);
    }

    url.to_string()
}

/// Retry policy for reaching a freshly started server
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay: Duration::from_millis(200),
        }
    }
}

impl From<&Ephemeral> for ConnectionConfig {
    fn from(ephemeral: &Ephemeral) -> Self {
        Self {
            max_retries: ephemeral.connect_retries,
            retry_delay: Duration::from_millis(ephemeral.retry_delay_ms),
        }
    }
}

/// Parse a DSN with slow statement logging disabled.
///
/// Schema files and migrations routinely exceed sqlx's one-second slow query
/// threshold, and logging them would dump entire files into the log.
pub fn quiet_options(url: &str) -> Result<PgConnectOptions> {
    // sqlx parses any URL scheme as PostgreSQL
    if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
        bail!("Not a PostgreSQL URL: {}", mask_url_password(url));
    }
    let options = PgConnectOptions::from_str(url)
        .with_context(|| format!("Invalid database URL: {}", mask_url_password(url)))?;
    Ok(options.log_slow_statements(LevelFilter::Off, Duration::from_secs(0)))
}

/// Connect with retry, returning a small pool with quiet statement logging
pub async fn connect_with_retry(url: &str, config: &ConnectionConfig) -> Result<PgPool> {
    connect_options_with_retry(quiet_options(url)?, url, config).await
}

/// Connect to another database on the same server as `url`
pub async fn connect_to_sibling(url: &str, database: &str, config: &ConnectionConfig) -> Result<PgPool> {
    let options = quiet_options(url)?.database(database);
    connect_options_with_retry(options, url, config).await
}

async fn connect_options_with_retry(
    options: PgConnectOptions,
    url: &str,
    config: &ConnectionConfig,
) -> Result<PgPool> {
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        let result = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options.clone())
            .await;

        match result {
            Ok(pool) => {
                if attempt > 0 {
                    info!(
                        "Connected to database (after {} retr{})",
                        attempt,
                        if attempt == 1 { "y" } else { "ies" }
                    );
                } else {
                    debug!("Connected to database");
                }
                return Ok(pool);
            }
            Err(e) => {
                last_error = Some(e);
                if attempt < config.max_retries {
                    if attempt == 0 {
                        debug!("Database not ready, retrying...");
                    }
                    tokio::time::sleep(config.retry_delay).await;
                }
            }
        }
    }

    let last_error = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no attempts made".to_string());

    Err(anyhow::anyhow!(
        "Failed to connect to database at {} after {} attempts: {}",
        mask_url_password(url),
        config.max_retries + 1,
        last_error
    ))
}
