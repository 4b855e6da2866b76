use anyhow::Result;
use sqlx::postgres::PgConnection;

use super::id::ObjectId;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Trigger {
    pub schema: String,
    pub table: String,
    pub name: String,
    /// Full `CREATE TRIGGER` statement from `pg_get_triggerdef`
    pub definition: String,
}

impl Trigger {
    pub fn id(&self) -> ObjectId {
        ObjectId::Trigger {
            schema: self.schema.clone(),
            table: self.table.clone(),
            name: self.name.clone(),
        }
    }
}

pub async fn fetch(conn: &mut PgConnection) -> Result<Vec<Trigger>> {
    let triggers = sqlx::query_as::<_, Trigger>(
        r#"
        SELECT
            n.nspname::text AS schema,
            c.relname::text AS table,
            t.tgname::text AS name,
            pg_get_triggerdef(t.oid) AS definition
        FROM pg_trigger t
        JOIN pg_class c ON c.oid = t.tgrelid
        JOIN pg_namespace n ON n.oid = c.relnamespace
        WHERE NOT t.tgisinternal
          AND NOT EXISTS (
              SELECT 1 FROM pg_depend d
              WHERE d.objid = c.oid AND d.deptype = 'e'
          )
        ORDER BY n.nspname, c.relname, t.tgname
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(triggers)
}
