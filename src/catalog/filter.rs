use glob::Pattern;

use super::Catalog;

const SYSTEM_SCHEMA_PATTERNS: &[&str] = &["pg_*", "information_schema"];

/// Decides which introspected objects take part in a diff
#[derive(Debug, Clone)]
pub struct ObjectFilter {
    excluded_schemas: Vec<Pattern>,
    excluded_tables: Vec<String>,
}

impl ObjectFilter {
    /// System schemas are always excluded, as is the migration tracking table
    pub fn new(tracking_table: &str) -> Self {
        Self {
            excluded_schemas: SYSTEM_SCHEMA_PATTERNS
                .iter()
                .filter_map(|p| Pattern::new(p).ok())
                .collect(),
            excluded_tables: vec![tracking_table.to_string()],
        }
    }

    pub fn includes_schema(&self, schema: &str) -> bool {
        !self.excluded_schemas.iter().any(|p| p.matches(schema))
    }

    pub fn includes_table(&self, schema: &str, table: &str) -> bool {
        self.includes_schema(schema) && !self.excluded_tables.iter().any(|t| t == table)
    }

    pub fn apply(&self, mut catalog: Catalog) -> Catalog {
        catalog.schemas.retain(|s| self.includes_schema(&s.name));
        catalog.types.retain(|t| self.includes_schema(&t.schema));
        catalog.sequences.retain(|s| self.includes_schema(&s.schema));
        catalog.functions.retain(|f| self.includes_schema(&f.schema));
        catalog
            .tables
            .retain(|t| self.includes_table(&t.schema, &t.name));
        catalog
            .constraints
            .retain(|c| self.includes_table(&c.schema, &c.table));
        catalog
            .indexes
            .retain(|i| self.includes_table(&i.schema, &i.table));
        catalog
            .views
            .retain(|v| self.includes_table(&v.schema, &v.name));
        catalog
            .triggers
            .retain(|t| self.includes_table(&t.schema, &t.table));
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("public", true)]
    #[case("app", true)]
    #[case("pg_catalog", false)]
    #[case("pg_toast", false)]
    #[case("pg_temp_3", false)]
    #[case("information_schema", false)]
    fn test_schema_filtering(#[case] schema: &str, #[case] included: bool) {
        let filter = ObjectFilter::new("schema_migrations");
        assert_eq!(filter.includes_schema(schema), included);
    }

    #[test]
    fn test_tracking_table_is_excluded() {
        let filter = ObjectFilter::new("schema_migrations");
        assert!(!filter.includes_table("public", "schema_migrations"));
        assert!(filter.includes_table("public", "orders"));
        assert!(!filter.includes_table("pg_catalog", "pg_class"));

        let custom = ObjectFilter::new("versions");
        assert!(custom.includes_table("public", "schema_migrations"));
        assert!(!custom.includes_table("public", "versions"));
    }
}
