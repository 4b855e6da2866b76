pub mod ddl;

pub use ddl::SqlRenderer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Safety {
    Safe,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSql {
    pub safety: Safety,
    pub sql: String,
}

impl RenderedSql {
    pub fn new(sql: String) -> Self {
        Self {
            sql,
            safety: Safety::Safe,
        }
    }

    pub fn destructive(sql: String) -> Self {
        Self {
            sql,
            safety: Safety::Destructive,
        }
    }
}

pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

pub fn escape_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// `"schema"."name"`
pub fn qualified(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(name))
}

/// Terminate a server-rendered statement with exactly one semicolon
pub fn terminate(statement: &str) -> String {
    format!("{};", statement.trim_end().trim_end_matches(';').trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("orders"), "\"orders\"");
        assert_eq!(quote_ident("Order \"Items\""), "\"Order \"\"Items\"\"\"");
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("it's"), "'it''s'");
    }

    #[test]
    fn test_terminate() {
        assert_eq!(terminate("CREATE INDEX i ON t (a)"), "CREATE INDEX i ON t (a);");
        assert_eq!(terminate("SELECT 1;\n"), "SELECT 1;");
        assert_eq!(
            terminate("CREATE FUNCTION f()\n AS $$ SELECT 1; $$\n"),
            "CREATE FUNCTION f()\n AS $$ SELECT 1; $$;"
        );
    }
}
