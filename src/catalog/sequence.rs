//! Free-standing and serial-owned sequences. Identity sequences are part of
//! their column and are not listed here.
use anyhow::Result;
use sqlx::postgres::PgConnection;

use super::id::ObjectId;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Sequence {
    pub schema: String,
    pub name: String,
    pub data_type: String,
    pub start_value: i64,
    pub increment: i64,
    pub min_value: i64,
    pub max_value: i64,
    pub cache_size: i64,
    pub cycle: bool,
}

impl Sequence {
    pub fn id(&self) -> ObjectId {
        ObjectId::Sequence {
            schema: self.schema.clone(),
            name: self.name.clone(),
        }
    }
}

pub async fn fetch(conn: &mut PgConnection) -> Result<Vec<Sequence>> {
    let sequences = sqlx::query_as::<_, Sequence>(
        r#"
        SELECT
            n.nspname::text AS schema,
            c.relname::text AS name,
            format_type(s.seqtypid, NULL) AS data_type,
            s.seqstart AS start_value,
            s.seqincrement AS increment,
            s.seqmin AS min_value,
            s.seqmax AS max_value,
            s.seqcache AS cache_size,
            s.seqcycle AS cycle
        FROM pg_sequence s
        JOIN pg_class c ON c.oid = s.seqrelid
        JOIN pg_namespace n ON n.oid = c.relnamespace
        WHERE NOT EXISTS (
            SELECT 1 FROM pg_depend d
            WHERE d.objid = c.oid AND d.deptype IN ('e', 'i')
        )
        ORDER BY n.nspname, c.relname
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(sequences)
}
