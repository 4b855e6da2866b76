/// CLI tests that exercise the built binary with assert_cmd.
///
/// Everything here fails before a database is provisioned, so no PostgreSQL
/// installation is needed.
pub mod generate;
