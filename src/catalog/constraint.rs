use anyhow::Result;
use sqlx::postgres::PgConnection;

use super::id::ObjectId;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Constraint {
    pub schema: String,
    pub table: String,
    pub name: String,
    /// `pg_constraint.contype`: p, u, c, f or x
    pub kind: String,
    /// Output of `pg_get_constraintdef`, e.g. `PRIMARY KEY (id)`
    pub definition: String,
}

impl Constraint {
    pub fn id(&self) -> ObjectId {
        ObjectId::Constraint {
            schema: self.schema.clone(),
            table: self.table.clone(),
            name: self.name.clone(),
        }
    }

    pub fn is_foreign_key(&self) -> bool {
        self.kind == "f"
    }
}

pub async fn fetch(conn: &mut PgConnection) -> Result<Vec<Constraint>> {
    let constraints = sqlx::query_as::<_, Constraint>(
        r#"
        SELECT
            n.nspname::text AS schema,
            c.relname::text AS table,
            con.conname::text AS name,
            con.contype::text AS kind,
            pg_get_constraintdef(con.oid, true) AS definition
        FROM pg_constraint con
        JOIN pg_class c ON c.oid = con.conrelid
        JOIN pg_namespace n ON n.oid = c.relnamespace
        WHERE con.contype IN ('p', 'u', 'c', 'f', 'x')
          AND c.relkind = 'r'
          AND NOT c.relispartition
          AND NOT EXISTS (
              SELECT 1 FROM pg_depend d
              WHERE d.objid = c.oid AND d.deptype = 'e'
          )
        ORDER BY n.nspname, c.relname, con.conname
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(constraints)
}
