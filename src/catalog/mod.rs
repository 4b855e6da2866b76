//! Snapshot of the user-defined schema objects in one database.

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::debug;

pub mod constraint;
pub mod enum_type;
pub mod filter;
pub mod function;
pub mod id;
pub mod index;
pub mod schema;
pub mod sequence;
pub mod table;
pub mod trigger;
pub mod view;

pub use filter::ObjectFilter;
pub use id::ObjectId;

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub schemas: Vec<schema::Schema>,
    pub extensions: Vec<schema::Extension>,
    pub types: Vec<enum_type::EnumType>,
    pub sequences: Vec<sequence::Sequence>,
    pub tables: Vec<table::Table>,
    pub functions: Vec<function::Function>,
    pub constraints: Vec<constraint::Constraint>,
    pub indexes: Vec<index::Index>,
    pub views: Vec<view::View>,
    pub triggers: Vec<trigger::Trigger>,
}

impl Catalog {
    /// Introspect `pool` and drop everything `filter` excludes.
    ///
    /// All queries share one connection so that `search_path`, which shapes
    /// how `format_type` and friends qualify names, is identical for both sides
    /// of a diff.
    pub async fn load(pool: &PgPool, filter: &ObjectFilter) -> Result<Self> {
        let mut conn = pool.acquire().await?;
        sqlx::query("SET search_path = public, pg_catalog")
            .execute(&mut *conn)
            .await?;

        let catalog = Catalog {
            schemas: schema::fetch_schemas(&mut *conn)
                .await
                .context("failed to load schemas")?,
            extensions: schema::fetch_extensions(&mut *conn)
                .await
                .context("failed to load extensions")?,
            types: enum_type::fetch(&mut *conn)
                .await
                .context("failed to load enum types")?,
            sequences: sequence::fetch(&mut *conn)
                .await
                .context("failed to load sequences")?,
            tables: table::fetch(&mut *conn)
                .await
                .context("failed to load tables")?,
            functions: function::fetch(&mut *conn)
                .await
                .context("failed to load functions")?,
            constraints: constraint::fetch(&mut *conn)
                .await
                .context("failed to load constraints")?,
            indexes: index::fetch(&mut *conn)
                .await
                .context("failed to load indexes")?,
            views: view::fetch(&mut *conn)
                .await
                .context("failed to load views")?,
            triggers: trigger::fetch(&mut *conn)
                .await
                .context("failed to load triggers")?,
        };

        let catalog = filter.apply(catalog);
        debug!(
            "Loaded catalog: {} tables, {} views, {} functions",
            catalog.tables.len(),
            catalog.views.len(),
            catalog.functions.len()
        );
        Ok(catalog)
    }
}
