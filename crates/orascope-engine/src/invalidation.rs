//! DDL invalidation targets
//!
//! After a successful DDL statement the engine derives the touched object
//! from the statement's leading keywords only; anything it cannot name
//! unambiguously falls back to whole-schema invalidation.

use orascope_core::{ObjectKind, ObjectRef, QualifiedName};

/// Derive the object a DDL statement touches. `None` means the statement
/// is recognized DDL but the target is ambiguous; invalidate the schema.
pub fn ddl_target(sql: &str, default_schema: &str) -> Option<ObjectRef> {
    let tokens = head_tokens(sql, 6);
    let mut words = tokens.iter().map(String::as_str);

    let verb = words.next()?.to_ascii_uppercase();
    match verb.as_str() {
        "CREATE" | "ALTER" | "DROP" | "TRUNCATE" => {}
        // COMMENT ON TABLE <name> IS ...
        "COMMENT" => {
            let mut rest: Vec<&str> = words.collect();
            rest.retain(|w| !w.eq_ignore_ascii_case("ON"));
            let kind = parse_object_kind(&mut rest)?;
            let name = rest.first()?;
            return make_ref(name, kind, default_schema);
        }
        // RENAME old TO new: the object type is unknown from the head.
        _ => return None,
    }

    let mut rest: Vec<&str> = words.collect();
    // Modifiers that may sit between the verb and the object type.
    rest.retain(|w| {
        !matches!(
            w.to_ascii_uppercase().as_str(),
            "OR" | "REPLACE"
                | "FORCE"
                | "EDITIONABLE"
                | "NONEDITIONABLE"
                | "GLOBAL"
                | "PRIVATE"
                | "TEMPORARY"
                | "UNIQUE"
                | "BITMAP"
                | "PUBLIC"
                | "SHARDED"
                | "DUPLICATED"
                | "IF"
                | "EXISTS"
                | "NOT"
        )
    });

    let kind = parse_object_kind(&mut rest)?;
    let name = rest.first()?;
    make_ref(name, kind, default_schema)
}

/// Consume the object-type keyword(s) from the front of `rest`.
fn parse_object_kind(rest: &mut Vec<&str>) -> Option<ObjectKind> {
    let first = rest.first()?.to_ascii_uppercase();
    let (kind, consumed) = match first.as_str() {
        "TABLE" => (ObjectKind::Table, 1),
        "VIEW" => (ObjectKind::View, 1),
        "INDEX" => (ObjectKind::Index, 1),
        "SEQUENCE" => (ObjectKind::Sequence, 1),
        "TRIGGER" => (ObjectKind::Trigger, 1),
        "PROCEDURE" => (ObjectKind::Procedure, 1),
        "FUNCTION" => (ObjectKind::Function, 1),
        "SYNONYM" => (ObjectKind::Synonym, 1),
        "MATERIALIZED" => {
            if rest.get(1)?.eq_ignore_ascii_case("VIEW") {
                (ObjectKind::MaterializedView, 2)
            } else {
                return None;
            }
        }
        "PACKAGE" => {
            if rest.get(1).is_some_and(|w| w.eq_ignore_ascii_case("BODY")) {
                (ObjectKind::PackageBody, 2)
            } else {
                (ObjectKind::Package, 1)
            }
        }
        "TYPE" => {
            if rest.get(1).is_some_and(|w| w.eq_ignore_ascii_case("BODY")) {
                (ObjectKind::TypeBody, 2)
            } else {
                (ObjectKind::Type, 1)
            }
        }
        _ => return None,
    };
    rest.drain(..consumed);
    Some(kind)
}

fn make_ref(raw_name: &str, kind: ObjectKind, default_schema: &str) -> Option<ObjectRef> {
    // Strip trailers that can hug the name: `(`, `;`, `@dblink`.
    let raw_name = raw_name
        .split(['(', ';', '@'])
        .next()
        .filter(|s| !s.is_empty())?;
    let qualified = QualifiedName::parse(raw_name).ok()?;
    Some(ObjectRef::new(
        qualified
            .schema
            .unwrap_or_else(|| default_schema.to_ascii_uppercase()),
        qualified.name,
        kind,
    ))
}

/// First `n` whitespace-separated words, with leading comments stripped.
fn head_tokens(sql: &str, n: usize) -> Vec<String> {
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
                None => "",
            };
            continue;
        }
        break;
    }
    rest.split_whitespace().take(n).map(String::from).collect()
}
