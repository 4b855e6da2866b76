use anyhow::Result;
use sqlx::postgres::PgConnection;

use super::id::ObjectId;

/// An index not backing a primary key, unique or exclusion constraint
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Index {
    pub schema: String,
    pub name: String,
    pub table: String,
    /// Full `CREATE INDEX` statement from `pg_get_indexdef`
    pub definition: String,
}

impl Index {
    pub fn id(&self) -> ObjectId {
        ObjectId::Index {
            schema: self.schema.clone(),
            name: self.name.clone(),
        }
    }
}

pub async fn fetch(conn: &mut PgConnection) -> Result<Vec<Index>> {
    let indexes = sqlx::query_as::<_, Index>(
        r#"
        SELECT
            n.nspname::text AS schema,
            i.relname::text AS name,
            t.relname::text AS table,
            pg_get_indexdef(i.oid) AS definition
        FROM pg_index x
        JOIN pg_class i ON i.oid = x.indexrelid
        JOIN pg_class t ON t.oid = x.indrelid
        JOIN pg_namespace n ON n.oid = i.relnamespace
        WHERE t.relkind = 'r'
          AND NOT t.relispartition
          AND NOT EXISTS (
              SELECT 1 FROM pg_constraint con
              WHERE con.conindid = x.indexrelid AND con.contype IN ('p', 'u', 'x')
          )
          AND NOT EXISTS (
              SELECT 1 FROM pg_depend d
              WHERE d.objid = t.oid AND d.deptype = 'e'
          )
        ORDER BY n.nspname, i.relname
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(indexes)
}
