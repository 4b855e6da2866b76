use anyhow::Result;
use sqlx::postgres::PgConnection;

use super::id::ObjectId;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Function {
    pub schema: String,
    pub name: String,
    /// `pg_get_function_identity_arguments`, the part of the signature that
    /// distinguishes overloads
    pub arguments: String,
    /// Empty for procedures
    pub result: String,
    pub is_procedure: bool,
    /// Complete `CREATE OR REPLACE` statement from `pg_get_functiondef`
    pub definition: String,
}

impl Function {
    pub fn id(&self) -> ObjectId {
        ObjectId::Function {
            schema: self.schema.clone(),
            name: self.name.clone(),
            arguments: self.arguments.clone(),
        }
    }
}

pub async fn fetch(conn: &mut PgConnection) -> Result<Vec<Function>> {
    // Aggregates and window functions have no pg_get_functiondef output
    let functions = sqlx::query_as::<_, Function>(
        r#"
        SELECT
            n.nspname::text AS schema,
            p.proname::text AS name,
            pg_get_function_identity_arguments(p.oid) AS arguments,
            COALESCE(pg_get_function_result(p.oid), '') AS result,
            p.prokind = 'p' AS is_procedure,
            pg_get_functiondef(p.oid) AS definition
        FROM pg_proc p
        JOIN pg_namespace n ON n.oid = p.pronamespace
        WHERE p.prokind IN ('f', 'p')
          AND n.nspname NOT IN ('pg_catalog', 'information_schema')
          AND NOT EXISTS (
              SELECT 1 FROM pg_depend d
              WHERE d.objid = p.oid AND d.deptype = 'e'
          )
        ORDER BY n.nspname, p.proname, 3
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(functions)
}
