//! Tool handlers
//!
//! Each handler is an async function over `(context, arguments)` returning
//! the tool's JSON payload. Lookup failures surface as structured results
//! through the registry envelope; only the transport decides what an MCP
//! error is.

use serde::Deserialize;
use serde_json::{Value, json};

use orascope_connector::{BindValue, ColumnDesc, ExecOutcome};
use orascope_core::{
    ObjectKind, OrascopeError, QualifiedName, Result, StatementKind, enforce_kind,
};

use crate::context::AppContext;
use crate::invalidation::ddl_target;
use crate::shape::{
    ColumnHitJson, ConstraintsJson, IndexJson, ObjectRefJson, PlsqlObjectJson,
    RelatedTablesJson, TableJson, UdtJson,
};

/// `get_object_source` responses are capped at 1 MiB.
const SOURCE_CAP_BYTES: usize = 1024 * 1024;
/// Row caps for `read_query`.
const DEFAULT_QUERY_ROWS: usize = 1_000;
const MAX_QUERY_ROWS: usize = 10_000;
const STREAM_CHUNK: usize = 256;

fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T> {
    let args = if args.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        args
    };
    serde_json::from_value(args)
        .map_err(|err| OrascopeError::InvalidArgument(format!("invalid arguments: {err}")))
}

/// Tool arguments write `PACKAGE_BODY`; the catalog says `PACKAGE BODY`.
fn parse_kind(raw: &str) -> ObjectKind {
    ObjectKind::parse(&raw.replace('_', " "))
}

// ---------------------------------------------------------------------------
// Schema lookup tools
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct NameArgs {
    name: String,
}

pub(crate) async fn get_table_schema(ctx: &AppContext, args: Value) -> Result<Value> {
    let args: NameArgs = parse_args(args)?;
    let record = ctx.cache.get_table(&args.name).await?;
    Ok(serde_json::to_value(TableJson::from(record))?)
}

pub(crate) async fn get_tables_schema(ctx: &AppContext, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    struct Args {
        names: Vec<String>,
    }
    let args: Args = parse_args(args)?;
    if args.names.is_empty() {
        return Err(OrascopeError::InvalidArgument(
            "names must not be empty".to_string(),
        ));
    }

    let mut out = serde_json::Map::new();
    for (name, result) in ctx.cache.get_tables(&args.names).await {
        let value = match result {
            Ok(record) => serde_json::to_value(TableJson::from(record))?,
            Err(err @ OrascopeError::NotFound(_)) => json!({"error": err.code()}),
            Err(err @ OrascopeError::InvalidArgument(_)) => {
                json!({"error": err.code(), "message": err.to_string()})
            }
            Err(err) => return Err(err),
        };
        out.insert(name, value);
    }
    Ok(Value::Object(out))
}

#[derive(Deserialize)]
struct PatternArgs {
    pattern: String,
    limit: Option<usize>,
}

pub(crate) async fn search_tables_schema(ctx: &AppContext, args: Value) -> Result<Value> {
    let args: PatternArgs = parse_args(args)?;
    let tables = ctx.cache.search_tables(&args.pattern, args.limit).await?;
    let shaped: Vec<TableJson> = tables.into_iter().map(Into::into).collect();
    Ok(serde_json::to_value(shaped)?)
}

pub(crate) async fn search_columns(ctx: &AppContext, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    struct Args {
        fragment: String,
        limit: Option<usize>,
    }
    let args: Args = parse_args(args)?;
    let hits = ctx.cache.search_columns(&args.fragment, args.limit).await?;
    let shaped: Vec<ColumnHitJson> = hits.into_iter().map(Into::into).collect();
    Ok(serde_json::to_value(shaped)?)
}

pub(crate) async fn get_table_constraints(ctx: &AppContext, args: Value) -> Result<Value> {
    let args: NameArgs = parse_args(args)?;
    let constraints = ctx.cache.get_constraints(&args.name).await?;
    Ok(serde_json::to_value(ConstraintsJson::from(constraints))?)
}

pub(crate) async fn get_table_indexes(ctx: &AppContext, args: Value) -> Result<Value> {
    let args: NameArgs = parse_args(args)?;
    let indexes = ctx.cache.get_indexes(&args.name).await?;
    let shaped: Vec<IndexJson> = indexes.into_iter().map(Into::into).collect();
    Ok(serde_json::to_value(shaped)?)
}

pub(crate) async fn get_related_tables(ctx: &AppContext, args: Value) -> Result<Value> {
    let args: NameArgs = parse_args(args)?;
    let related = ctx.cache.get_related_tables(&args.name).await?;
    Ok(serde_json::to_value(RelatedTablesJson::from(related))?)
}

// ---------------------------------------------------------------------------
// PL/SQL and object tools
// ---------------------------------------------------------------------------

pub(crate) async fn get_pl_sql_objects(ctx: &AppContext, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    struct Args {
        name_pattern: String,
        kinds: Option<Vec<String>>,
    }
    let args: Args = parse_args(args)?;
    let kinds: Vec<ObjectKind> = args
        .kinds
        .unwrap_or_default()
        .iter()
        .map(|k| parse_kind(k))
        .collect();
    let objects = ctx
        .cache
        .get_plsql_objects(&args.name_pattern, &kinds)
        .await?;
    let shaped: Vec<PlsqlObjectJson> = objects.into_iter().map(Into::into).collect();
    Ok(serde_json::to_value(shaped)?)
}

pub(crate) async fn get_object_source(ctx: &AppContext, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    struct Args {
        name: String,
        kind: Option<String>,
    }
    let args: Args = parse_args(args)?;
    let qualified = QualifiedName::parse(&args.name)?;
    let kind = args.kind.as_deref().map(parse_kind);
    let mut source = ctx
        .cache
        .get_object_source(qualified.schema.as_deref(), &qualified.name, kind)
        .await?;

    let truncated = source.len() > SOURCE_CAP_BYTES;
    if truncated {
        let mut cut = SOURCE_CAP_BYTES;
        while !source.is_char_boundary(cut) {
            cut -= 1;
        }
        source.truncate(cut);
    }
    Ok(json!({"source": source, "truncated": truncated}))
}

pub(crate) async fn get_dependent_objects(ctx: &AppContext, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    struct Args {
        name: String,
        kind: Option<String>,
    }
    let args: Args = parse_args(args)?;
    let qualified = QualifiedName::parse(&args.name)?;
    let dependents = ctx
        .cache
        .get_dependents(
            qualified.schema.as_deref(),
            &qualified.name,
            args.kind.as_deref().map(parse_kind),
        )
        .await?;
    let shaped: Vec<ObjectRefJson> = dependents.into_iter().map(Into::into).collect();
    Ok(serde_json::to_value(shaped)?)
}

pub(crate) async fn get_user_defined_types(ctx: &AppContext, args: Value) -> Result<Value> {
    #[derive(Deserialize, Default)]
    struct Args {
        pattern: Option<String>,
    }
    let args: Args = parse_args(args)?;
    let types = ctx
        .cache
        .get_user_defined_types(args.pattern.as_deref())
        .await?;
    let shaped: Vec<UdtJson> = types.into_iter().map(Into::into).collect();
    Ok(serde_json::to_value(shaped)?)
}

// ---------------------------------------------------------------------------
// Cache and session tools
// ---------------------------------------------------------------------------

pub(crate) async fn rebuild_schema_cache(ctx: &AppContext, _args: Value) -> Result<Value> {
    let stats = ctx.cache.rebuild().await?;
    Ok(json!({
        "built": true,
        "duration_ms": stats.duration_ms,
        "tables": stats.tables,
        "fingerprint": stats.fingerprint,
    }))
}

pub(crate) async fn get_database_vendor_info(ctx: &AppContext, _args: Value) -> Result<Value> {
    let info = ctx.connector.session_info().await?;
    Ok(json!({
        "product": info.banner,
        "version": version_from_banner(&info.banner),
        "schema": ctx.config.target_schema,
        "connection_mode": if ctx.connector.thick_mode() { "thick" } else { "thin" },
    }))
}

/// First dotted number in the banner, e.g. `19.0.0.0.0`.
fn version_from_banner(banner: &str) -> String {
    banner
        .split_whitespace()
        .find(|word| {
            word.contains('.')
                && word
                    .chars()
                    .all(|c| c.is_ascii_digit() || c == '.')
        })
        .unwrap_or("unknown")
        .to_string()
}

// ---------------------------------------------------------------------------
// SQL execution tools
// ---------------------------------------------------------------------------

fn json_params(params: Vec<Value>) -> Result<Vec<BindValue>> {
    params
        .into_iter()
        .map(|value| match value {
            Value::Null => Ok(BindValue::Null),
            Value::Bool(b) => Ok(BindValue::Int(b as i64)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(BindValue::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(BindValue::Float(f))
                } else {
                    Err(OrascopeError::InvalidArgument(format!(
                        "unsupported numeric parameter: {n}"
                    )))
                }
            }
            Value::String(s) => Ok(BindValue::Str(s)),
            other => Err(OrascopeError::InvalidArgument(format!(
                "unsupported parameter type: {other}"
            ))),
        })
        .collect()
}

fn cell_to_json(column: &ColumnDesc, cell: Option<String>) -> Value {
    let Some(text) = cell else {
        return Value::Null;
    };
    let numeric = column.type_name.starts_with("NUMBER")
        || column.type_name.starts_with("FLOAT")
        || column.type_name.starts_with("BINARY_");
    if numeric {
        if let Ok(i) = text.parse::<i64>() {
            return json!(i);
        }
        if let Ok(f) = text.parse::<f64>() {
            return json!(f);
        }
    }
    Value::String(text)
}

pub(crate) async fn read_query(ctx: &AppContext, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    struct Args {
        sql: String,
        params: Option<Vec<Value>>,
        max_rows: Option<usize>,
    }
    let args: Args = parse_args(args)?;
    enforce_kind(StatementKind::Select, &args.sql)?;
    let binds = json_params(args.params.unwrap_or_default())?;
    let max_rows = args
        .max_rows
        .map(|n| n.clamp(1, MAX_QUERY_ROWS))
        .unwrap_or(DEFAULT_QUERY_ROWS);

    let mut stream = ctx
        .connector
        .fetch_stream(&args.sql, &binds, STREAM_CHUNK)
        .await?;
    let mut rows: Vec<Value> = Vec::new();
    let mut truncated = false;
    'scan: while let Some(chunk) = stream.next_chunk().await {
        for row in chunk? {
            if rows.len() >= max_rows {
                // Dropping the stream cancels the scan server-side.
                truncated = true;
                break 'scan;
            }
            let shaped: Vec<Value> = row
                .into_iter()
                .zip(&stream.columns)
                .map(|(cell, column)| cell_to_json(column, cell))
                .collect();
            rows.push(Value::Array(shaped));
        }
    }

    let columns: Vec<&str> = stream.columns.iter().map(|c| c.name.as_str()).collect();
    Ok(json!({
        "columns": columns,
        "rows": rows,
        "row_count": rows.len(),
        "truncated": truncated,
    }))
}

#[derive(Deserialize)]
struct SqlArgs {
    sql: String,
}

pub(crate) async fn exec_ddl_sql(ctx: &AppContext, args: Value) -> Result<Value> {
    let args: SqlArgs = parse_args(args)?;
    ctx.connector
        .execute(&args.sql, &[], StatementKind::Ddl)
        .await?;

    match ddl_target(&args.sql, &ctx.config.target_schema) {
        Some(target) => ctx.cache.invalidate(&target),
        None => ctx.cache.invalidate_schema(),
    }
    Ok(json!({"ok": true}))
}

pub(crate) async fn exec_dml_sql(ctx: &AppContext, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    struct Args {
        sql: String,
        params: Option<Vec<Value>>,
    }
    let args: Args = parse_args(args)?;
    let binds = json_params(args.params.unwrap_or_default())?;
    let outcome = ctx
        .connector
        .execute(&args.sql, &binds, StatementKind::Dml)
        .await?;
    let affected = match outcome {
        ExecOutcome::Affected(n) => n,
        _ => 0,
    };
    Ok(json!({"affected": affected}))
}

pub(crate) async fn exec_pro_sql(ctx: &AppContext, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    struct Args {
        block: String,
    }
    let args: Args = parse_args(args)?;
    ctx.connector
        .execute(&args.block, &[], StatementKind::Plsql)
        .await?;
    // The block body is opaque and may contain DDL; invalidate broadly.
    ctx.cache.invalidate_schema();
    Ok(json!({"ok": true}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_extraction() {
        assert_eq!(
            version_from_banner(
                "Oracle Database 19c Enterprise Edition Release 19.0.0.0.0 - Production"
            ),
            "19.0.0.0.0"
        );
        assert_eq!(version_from_banner("Oracle Database"), "unknown");
    }

    #[test]
    fn json_param_mapping() {
        let binds = json_params(vec![
            json!("x"),
            json!(42),
            json!(2.5),
            json!(true),
            Value::Null,
        ])
        .unwrap();
        assert_eq!(binds[0], BindValue::Str("x".into()));
        assert_eq!(binds[1], BindValue::Int(42));
        assert_eq!(binds[2], BindValue::Float(2.5));
        assert_eq!(binds[3], BindValue::Int(1));
        assert_eq!(binds[4], BindValue::Null);
        assert!(json_params(vec![json!([1, 2])]).is_err());
    }

    #[test]
    fn numeric_cells_become_numbers() {
        let number = ColumnDesc {
            name: "N".into(),
            type_name: "NUMBER".into(),
        };
        let text = ColumnDesc {
            name: "S".into(),
            type_name: "VARCHAR2(10)".into(),
        };
        assert_eq!(cell_to_json(&number, Some("42".into())), json!(42));
        assert_eq!(cell_to_json(&number, Some("2.5".into())), json!(2.5));
        assert_eq!(cell_to_json(&text, Some("42".into())), json!("42"));
        assert_eq!(cell_to_json(&number, None), Value::Null);
    }
}
