/// Tests that drive real ephemeral PostgreSQL servers.
/// Skipped when `initdb`, `pg_ctl` and `pg_dump` are not available.
pub mod end_to_end;
