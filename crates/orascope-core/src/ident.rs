//! Oracle identifier handling
//!
//! Names are stored verbatim (Oracle's quoted-identifier case). Lookups
//! normalize through `UPPER` unless the caller passes a quoted identifier,
//! matching how the database itself resolves names.

use crate::{OrascopeError, Result};

/// Normalize a single identifier the way Oracle resolves it: unquoted names
/// fold to upper case, quoted names are taken verbatim with quotes stripped.
pub fn normalize_ident(raw: &str) -> String {
    let raw = raw.trim();
    if let Some(inner) = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
    {
        inner.replace("\"\"", "\"")
    } else {
        raw.to_ascii_uppercase()
    }
}

/// An optionally schema-qualified object name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    /// Normalized schema, when the caller wrote `schema.name`
    pub schema: Option<String>,
    /// Normalized object name
    pub name: String,
}

impl QualifiedName {
    /// Parse `name` or `schema.name`, honoring double-quoted parts.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(OrascopeError::InvalidArgument(
                "object name must not be empty".to_string(),
            ));
        }

        let parts = split_qualified(raw);
        match parts.len() {
            1 => Ok(Self {
                schema: None,
                name: normalize_ident(&parts[0]),
            }),
            2 => {
                if parts[0].is_empty() || parts[1].is_empty() {
                    return Err(OrascopeError::InvalidArgument(format!(
                        "malformed qualified name: {raw:?}"
                    )));
                }
                Ok(Self {
                    schema: Some(normalize_ident(&parts[0])),
                    name: normalize_ident(&parts[1]),
                })
            }
            _ => Err(OrascopeError::InvalidArgument(format!(
                "malformed qualified name: {raw:?}"
            ))),
        }
    }

    /// The schema to resolve against, falling back to `default_schema`.
    pub fn schema_or<'a>(&'a self, default_schema: &'a str) -> &'a str {
        self.schema.as_deref().unwrap_or(default_schema)
    }
}

/// Split on `.` outside of double quotes.
fn split_qualified(raw: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in raw.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '.' if !in_quotes => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

/// Cache key for a table: `SCHEMA.NAME`, both sides normalized.
pub fn table_key(schema: &str, name: &str) -> String {
    format!(
        "{}.{}",
        schema.to_ascii_uppercase(),
        name.to_ascii_uppercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unquoted_names_fold_upper() {
        assert_eq!(normalize_ident("employees"), "EMPLOYEES");
        assert_eq!(normalize_ident("  Employees "), "EMPLOYEES");
    }

    #[test]
    fn quoted_names_are_verbatim() {
        assert_eq!(normalize_ident("\"Employees\""), "Employees");
        assert_eq!(normalize_ident("\"odd\"\"name\""), "odd\"name");
    }

    #[test]
    fn qualified_parse() {
        let q = QualifiedName::parse("hr.employees").unwrap();
        assert_eq!(q.schema.as_deref(), Some("HR"));
        assert_eq!(q.name, "EMPLOYEES");

        let q = QualifiedName::parse("employees").unwrap();
        assert_eq!(q.schema, None);
        assert_eq!(q.schema_or("HR"), "HR");

        let q = QualifiedName::parse("\"Hr\".\"Mixed.Name\"").unwrap();
        assert_eq!(q.schema.as_deref(), Some("Hr"));
        assert_eq!(q.name, "Mixed.Name");
    }

    #[test]
    fn rejects_empty_and_malformed() {
        assert!(QualifiedName::parse("").is_err());
        assert!(QualifiedName::parse("a.b.c").is_err());
        assert!(QualifiedName::parse(".name").is_err());
    }
}
