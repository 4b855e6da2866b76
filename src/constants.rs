use std::time::Duration;

// Watch mode polling
pub const WATCH_POLL_INTERVAL: Duration = Duration::from_millis(100);

// Migration file naming conventions
pub const MIGRATION_FILENAME_SUFFIX: &str = ".up.sql";
pub const MIGRATION_SEQUENCE_WIDTH: usize = 3;

// Configuration file name
pub const CONFIG_FILENAME: &str = "modelmig.yaml";

// Model file extensions
pub const MODEL_EXTENSION: &str = "dbm";
pub const MODEL_SQL_EXTENSION: &str = "sql";
pub const MODEL_IMAGE_EXTENSION: &str = "png";

// Hooks
pub const HOOKS_DIR: &str = "hooks";
pub const GENERATE_MIGRATION_POST_HOOK: &str = "generate-migration-post";

// Migration tracking table written by history replay
pub const DEFAULT_TRACKING_TABLE: &str = "schema_migrations";
pub const LEGACY_TRACKING_TABLE_DROP: &str = "DROP TABLE \"schema_migrations\";";

// Permission detection
pub const REVIEW_MARKER: &str = "-- The following statements were detected by comparing schema dumps and were not produced by the structural diff. Review them manually.";
pub const DUMP_STATEMENT_PREFIX: &str = "ALTER ";

// Ephemeral database credentials
pub const EPHEMERAL_SUPERUSER: &str = "postgres";
pub const EPHEMERAL_PASSWORD: &str = "postgres";
pub const EPHEMERAL_DATABASE: &str = "postgres";
