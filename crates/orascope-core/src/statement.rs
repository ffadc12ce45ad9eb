//! Statement-kind gate
//!
//! The four SQL tool families (read, DDL, DML, PL/SQL) are distinguished by
//! the first keyword of the statement, after comments and whitespace. The
//! gate runs before a statement ever reaches the driver.

use crate::{OrascopeError, Result};
use serde::{Deserialize, Serialize};

/// The statement family a SQL tool is allowed to execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementKind {
    Select,
    Ddl,
    Dml,
    Plsql,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Select => "SELECT",
            StatementKind::Ddl => "DDL",
            StatementKind::Dml => "DML",
            StatementKind::Plsql => "PL/SQL",
        }
    }

    /// Whether `keyword` (already upper-cased) opens a statement of this kind.
    fn admits(&self, keyword: &str) -> bool {
        match self {
            StatementKind::Select => matches!(keyword, "SELECT" | "WITH"),
            StatementKind::Ddl => matches!(
                keyword,
                "CREATE"
                    | "ALTER"
                    | "DROP"
                    | "TRUNCATE"
                    | "RENAME"
                    | "GRANT"
                    | "REVOKE"
                    | "COMMENT"
                    | "PURGE"
                    | "FLASHBACK"
                    | "ANALYZE"
            ),
            StatementKind::Dml => matches!(keyword, "INSERT" | "UPDATE" | "DELETE" | "MERGE"),
            StatementKind::Plsql => matches!(keyword, "BEGIN" | "DECLARE" | "CALL"),
        }
    }
}

impl std::fmt::Display for StatementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extract the first keyword of `sql`, skipping whitespace, `--` line
/// comments and `/* */` block comments. Returns `None` for an empty or
/// comment-only statement.
pub fn leading_keyword(sql: &str) -> Option<String> {
    let mut rest = sql;
    loop {
        rest = rest.trim_start();
        if let Some(stripped) = rest.strip_prefix("--") {
            rest = match stripped.find('\n') {
                Some(pos) => &stripped[pos + 1..],
                None => "",
            };
            continue;
        }
        if let Some(stripped) = rest.strip_prefix("/*") {
            rest = match stripped.find("*/") {
                Some(pos) => &stripped[pos + 2..],
                // Unterminated block comment: nothing executable follows.
                None => "",
            };
            continue;
        }
        break;
    }

    let word: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if word.is_empty() {
        None
    } else {
        Some(word.to_ascii_uppercase())
    }
}

/// Verify that `sql` opens with a keyword of the given kind.
///
/// This is the only safety net that distinguishes the four SQL tool
/// families; a mismatch must never reach the driver.
pub fn enforce_kind(kind: StatementKind, sql: &str) -> Result<()> {
    let keyword = leading_keyword(sql).ok_or_else(|| {
        OrascopeError::InvalidArgument("empty statement".to_string())
    })?;
    if kind.admits(&keyword) {
        Ok(())
    } else {
        Err(OrascopeError::DisallowedStatement {
            expected: kind,
            found: keyword,
        })
    }
}
