//! Schemas and installed extensions
use anyhow::Result;
use sqlx::postgres::PgConnection;

use super::id::ObjectId;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Schema {
    pub name: String,
}

impl Schema {
    pub fn id(&self) -> ObjectId {
        ObjectId::Schema {
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Extension {
    pub name: String,
    pub schema: String,
}

impl Extension {
    pub fn id(&self) -> ObjectId {
        ObjectId::Extension {
            name: self.name.clone(),
        }
    }
}

pub async fn fetch_schemas(conn: &mut PgConnection) -> Result<Vec<Schema>> {
    let schemas = sqlx::query_as::<_, Schema>(
        r#"
        SELECT n.nspname::text AS name
        FROM pg_namespace n
        WHERE NOT EXISTS (
            SELECT 1 FROM pg_depend d
            WHERE d.objid = n.oid AND d.deptype = 'e'
        )
        ORDER BY n.nspname
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(schemas)
}

pub async fn fetch_extensions(conn: &mut PgConnection) -> Result<Vec<Extension>> {
    // plpgsql ships installed in every database
    let extensions = sqlx::query_as::<_, Extension>(
        r#"
        SELECT e.extname::text AS name, n.nspname::text AS schema
        FROM pg_extension e
        JOIN pg_namespace n ON n.oid = e.extnamespace
        WHERE e.extname <> 'plpgsql'
        ORDER BY e.extname
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(extensions)
}
