use anyhow::Result;
use sqlx::postgres::PgConnection;

use super::id::ObjectId;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct EnumType {
    pub schema: String,
    pub name: String,
    /// Labels in sort order
    pub labels: Vec<String>,
}

impl EnumType {
    pub fn id(&self) -> ObjectId {
        ObjectId::Type {
            schema: self.schema.clone(),
            name: self.name.clone(),
        }
    }
}

pub async fn fetch(conn: &mut PgConnection) -> Result<Vec<EnumType>> {
    let types = sqlx::query_as::<_, EnumType>(
        r#"
        SELECT
            n.nspname::text AS schema,
            t.typname::text AS name,
            array_agg(e.enumlabel::text ORDER BY e.enumsortorder) AS labels
        FROM pg_type t
        JOIN pg_namespace n ON n.oid = t.typnamespace
        JOIN pg_enum e ON e.enumtypid = t.oid
        WHERE NOT EXISTS (
            SELECT 1 FROM pg_depend d
            WHERE d.objid = t.oid AND d.deptype = 'e'
        )
        GROUP BY n.nspname, t.typname
        ORDER BY n.nspname, t.typname
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(types)
}
