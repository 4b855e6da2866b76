//! Generate incremental PostgreSQL migrations from a schema model by
//! diffing it against a replay of the existing migration history.

pub mod catalog;
pub mod change;
pub mod commands;
pub mod config;
pub mod constants;
pub mod db;
pub mod diff;
pub mod ephemeral;
pub mod error;
pub mod export;
pub mod hooks;
pub mod migration;
pub mod permissions;
pub mod pipeline;
pub mod render;
pub mod schema_diff;
pub mod templates;

pub use error::{PipelineError, PipelineResult};
