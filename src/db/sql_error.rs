//! Readable reports for SQL that PostgreSQL rejected.
//!
//! Migration files, the desired schema and generated statements all fail the
//! same way, so they share one formatter: the server message, any detail and
//! hint it attached, and an excerpt of the offending SQL around the reported
//! position.

use sqlx::postgres::{PgDatabaseError, PgErrorPosition};

const EXCERPT_RADIUS: usize = 2;

#[derive(Debug, Clone, Default)]
pub struct SqlFailure {
    pub message: String,
    pub code: Option<String>,
    pub detail: Option<String>,
    pub hint: Option<String>,
    pub line: Option<usize>,
}

impl SqlFailure {
    pub fn from_sqlx(error: &sqlx::Error, sql: &str) -> Self {
        let Some(pg) = error
            .as_database_error()
            .and_then(|e| e.try_downcast_ref::<PgDatabaseError>())
        else {
            return Self {
                message: error.to_string(),
                ..Default::default()
            };
        };

        let line = pg.position().and_then(|pos| match pos {
            PgErrorPosition::Original(p) => Some(line_of_offset(sql, p)),
            // Positions inside function bodies do not map onto the file
            PgErrorPosition::Internal { .. } => None,
        });

        Self {
            message: pg.message().to_string(),
            code: Some(pg.code().to_string()),
            detail: pg.detail().map(str::to_string),
            hint: pg.hint().map(str::to_string),
            line,
        }
    }

    /// Multi-line report; the excerpt is included only when a line is known
    pub fn render(&self, sql: &str) -> String {
        let mut out = match (&self.code, self.line) {
            (Some(code), Some(line)) => format!("{} [{}] (line {})", self.message, code, line),
            (Some(code), None) => format!("{} [{}]", self.message, code),
            (None, Some(line)) => format!("{} (line {})", self.message, line),
            (None, None) => self.message.clone(),
        };

        if let Some(detail) = &self.detail {
            out.push_str("\n  detail: ");
            out.push_str(detail);
        }
        if let Some(hint) = &self.hint {
            out.push_str("\n  hint: ");
            out.push_str(hint);
        }
        if let Some(line) = self.line {
            out.push('\n');
            out.push_str(&excerpt(sql, line));
        }
        out
    }
}

/// Render a sqlx error against the SQL that produced it
pub fn describe(error: &sqlx::Error, sql: &str) -> String {
    SqlFailure::from_sqlx(error, sql).render(sql)
}

/// Line number (1-based) of a 1-based character offset reported by the server
pub fn line_of_offset(sql: &str, offset: usize) -> usize {
    sql.chars()
        .take(offset.saturating_sub(1))
        .filter(|c| *c == '\n')
        .count()
        + 1
}

/// Lines around `line`, the failing one marked with `>`
pub fn excerpt(sql: &str, line: usize) -> String {
    let lines: Vec<&str> = sql.lines().collect();
    if lines.is_empty() {
        return String::new();
    }

    let target = line.clamp(1, lines.len());
    let first = target.saturating_sub(EXCERPT_RADIUS).max(1);
    let last = (target + EXCERPT_RADIUS).min(lines.len());

    (first..=last)
        .map(|n| {
            let marker = if n == target { '>' } else { ' ' };
            format!("  {} {:>4} | {}", marker, n, lines[n - 1])
        })
        .collect::<Vec<_>>()
        .join("\n")
}
