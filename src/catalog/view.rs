use anyhow::Result;
use sqlx::postgres::PgConnection;
use std::collections::BTreeMap;

use super::id::ObjectId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub schema: String,
    pub name: String,
    pub materialized: bool,
    /// Query text from `pg_get_viewdef`, without the trailing semicolon
    pub definition: String,
    /// Views and table columns this one selects from
    pub depends_on: Vec<ObjectId>,
}

impl View {
    pub fn id(&self) -> ObjectId {
        ObjectId::View {
            schema: self.schema.clone(),
            name: self.name.clone(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct ViewRow {
    schema: String,
    name: String,
    materialized: bool,
    definition: String,
}

#[derive(sqlx::FromRow)]
struct ViewDependencyRow {
    schema: String,
    name: String,
    dep_schema: String,
    dep_name: String,
}

#[derive(sqlx::FromRow)]
struct ColumnDependencyRow {
    schema: String,
    name: String,
    table_schema: String,
    table_name: String,
    column_name: String,
}

pub async fn fetch(conn: &mut PgConnection) -> Result<Vec<View>> {
    let rows = sqlx::query_as::<_, ViewRow>(
        r#"
        SELECT
            n.nspname::text AS schema,
            c.relname::text AS name,
            c.relkind = 'm' AS materialized,
            pg_get_viewdef(c.oid, true) AS definition
        FROM pg_class c
        JOIN pg_namespace n ON n.oid = c.relnamespace
        WHERE c.relkind IN ('v', 'm')
          AND n.nspname NOT IN ('pg_catalog', 'information_schema')
          AND NOT EXISTS (
              SELECT 1 FROM pg_depend d
              WHERE d.objid = c.oid AND d.deptype = 'e'
          )
        ORDER BY n.nspname, c.relname
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    let dependency_rows = sqlx::query_as::<_, ViewDependencyRow>(
        r#"
        SELECT DISTINCT
            vn.nspname::text AS schema,
            v.relname::text AS name,
            dn.nspname::text AS dep_schema,
            dep_class.relname::text AS dep_name
        FROM pg_depend dep
        JOIN pg_rewrite r ON r.oid = dep.objid
        JOIN pg_class v ON v.oid = r.ev_class
        JOIN pg_namespace vn ON vn.oid = v.relnamespace
        JOIN pg_class dep_class ON dep_class.oid = dep.refobjid
        JOIN pg_namespace dn ON dn.oid = dep_class.relnamespace
        WHERE dep.classid = 'pg_rewrite'::regclass
          AND dep.refclassid = 'pg_class'::regclass
          AND v.relkind IN ('v', 'm')
          AND dep_class.relkind IN ('v', 'm')
          AND dep_class.oid <> v.oid
        ORDER BY 1, 2, 3, 4
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    // Rewrite rules record one dependency per referenced column
    let column_rows = sqlx::query_as::<_, ColumnDependencyRow>(
        r#"
        SELECT DISTINCT
            vn.nspname::text AS schema,
            v.relname::text AS name,
            tn.nspname::text AS table_schema,
            t.relname::text AS table_name,
            a.attname::text AS column_name
        FROM pg_depend dep
        JOIN pg_rewrite r ON r.oid = dep.objid
        JOIN pg_class v ON v.oid = r.ev_class
        JOIN pg_namespace vn ON vn.oid = v.relnamespace
        JOIN pg_class t ON t.oid = dep.refobjid
        JOIN pg_namespace tn ON tn.oid = t.relnamespace
        JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = dep.refobjsubid
        WHERE dep.classid = 'pg_rewrite'::regclass
          AND dep.refclassid = 'pg_class'::regclass
          AND dep.refobjsubid > 0
          AND v.relkind IN ('v', 'm')
          AND t.relkind IN ('r', 'p')
        ORDER BY 1, 2, 3, 4, 5
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut dependencies: BTreeMap<(String, String), Vec<ObjectId>> = BTreeMap::new();
    for row in dependency_rows {
        dependencies
            .entry((row.schema, row.name))
            .or_default()
            .push(ObjectId::View {
                schema: row.dep_schema,
                name: row.dep_name,
            });
    }
    for row in column_rows {
        dependencies
            .entry((row.schema, row.name))
            .or_default()
            .push(ObjectId::Column {
                schema: row.table_schema,
                table: row.table_name,
                name: row.column_name,
            });
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let depends_on = dependencies
                .remove(&(row.schema.clone(), row.name.clone()))
                .unwrap_or_default();
            View {
                definition: normalize_definition(&row.definition),
                schema: row.schema,
                name: row.name,
                materialized: row.materialized,
                depends_on,
            }
        })
        .collect())
}

fn normalize_definition(definition: &str) -> String {
    definition.trim().trim_end_matches(';').trim_end().to_string()
}
