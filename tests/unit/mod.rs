pub mod migration_discovery;
pub mod pipeline;
