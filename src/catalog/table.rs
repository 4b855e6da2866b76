//! Ordinary tables and their columns. Constraints and indexes are fetched
//! separately so they can be diffed on their own.
use anyhow::Result;
use itertools::Itertools;
use sqlx::postgres::PgConnection;

use super::id::ObjectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Always,
    ByDefault,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    pub default: Option<String>,
    pub not_null: bool,
    pub identity: Option<Identity>,
    /// Expression of a stored generated column
    pub generated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub schema: String,
    pub name: String,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn id(&self) -> ObjectId {
        ObjectId::Table {
            schema: self.schema.clone(),
            name: self.name.clone(),
        }
    }

    pub fn column_id(&self, column: &Column) -> ObjectId {
        ObjectId::Column {
            schema: self.schema.clone(),
            table: self.name.clone(),
            name: column.name.clone(),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ColumnRow {
    table_schema: String,
    table_name: String,
    column_name: Option<String>,
    data_type: Option<String>,
    column_expr: Option<String>,
    not_null: Option<bool>,
    identity: Option<String>,
    generated: Option<String>,
}

pub async fn fetch(conn: &mut PgConnection) -> Result<Vec<Table>> {
    // LEFT JOIN keeps tables without columns
    let rows = sqlx::query_as::<_, ColumnRow>(
        r#"
        SELECT
            n.nspname::text AS table_schema,
            c.relname::text AS table_name,
            a.attname::text AS column_name,
            format_type(a.atttypid, a.atttypmod) AS data_type,
            pg_get_expr(ad.adbin, ad.adrelid) AS column_expr,
            a.attnotnull AS not_null,
            NULLIF(a.attidentity::text, '') AS identity,
            NULLIF(a.attgenerated::text, '') AS generated
        FROM pg_class c
        JOIN pg_namespace n ON n.oid = c.relnamespace
        LEFT JOIN pg_attribute a
            ON a.attrelid = c.oid AND a.attnum > 0 AND NOT a.attisdropped
        LEFT JOIN pg_attrdef ad
            ON ad.adrelid = a.attrelid AND ad.adnum = a.attnum
        WHERE c.relkind = 'r'
          AND NOT c.relispartition
          AND NOT EXISTS (
              SELECT 1 FROM pg_depend d
              WHERE d.objid = c.oid AND d.deptype = 'e'
          )
        ORDER BY n.nspname, c.relname, a.attnum
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    let tables = rows
        .into_iter()
        .chunk_by(|r| (r.table_schema.clone(), r.table_name.clone()))
        .into_iter()
        .map(|((schema, name), rows)| Table {
            schema,
            name,
            columns: rows.filter_map(column_from_row).collect(),
        })
        .collect();

    Ok(tables)
}

fn column_from_row(row: ColumnRow) -> Option<Column> {
    let name = row.column_name?;
    let identity = match row.identity.as_deref() {
        Some("a") => Some(Identity::Always),
        Some("d") => Some(Identity::ByDefault),
        _ => None,
    };
    let (default, generated) = match row.generated {
        Some(_) => (None, row.column_expr),
        None => (row.column_expr, None),
    };

    Some(Column {
        name,
        data_type: row.data_type.unwrap_or_default(),
        default,
        not_null: row.not_null.unwrap_or(false),
        identity,
        generated,
    })
}
