//! The tool table
//!
//! An explicit mapping of tool name to handler. The MCP layer iterates
//! this table to advertise tools; dispatch wraps every call in the
//! configured deadline and the error envelope.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use serde_json::{Value, json};

use orascope_core::{OrascopeError, Result};

use crate::context::AppContext;
use crate::handlers;

type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>>;
type Handler = for<'a> fn(&'a AppContext, Value) -> HandlerFuture<'a>;

/// One advertised tool
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    handler: Handler,
}

macro_rules! tool {
    ($name:literal, $desc:literal, $handler:path) => {{
        let handler: Handler = |ctx, args| Box::pin($handler(ctx, args));
        ToolSpec {
            name: $name,
            description: $desc,
            handler,
        }
    }};
}

/// The explicit tool-name -> handler table
pub struct ToolRegistry {
    tools: Vec<ToolSpec>,
    by_name: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    /// The standard orascope tool surface.
    pub fn standard() -> Self {
        Self::from_specs(vec![
            tool!(
                "get_table_schema",
                "Full schema of one table or view: columns, keys, indexes",
                handlers::get_table_schema
            ),
            tool!(
                "get_tables_schema",
                "Batched schema lookup for several tables at once",
                handlers::get_tables_schema
            ),
            tool!(
                "search_tables_schema",
                "Find tables by name pattern (% wildcards or substring)",
                handlers::search_tables_schema
            ),
            tool!(
                "search_columns",
                "Find tables containing a column matching a fragment",
                handlers::search_columns
            ),
            tool!(
                "get_database_vendor_info",
                "Oracle product, version, schema and connection mode",
                handlers::get_database_vendor_info
            ),
            tool!(
                "get_pl_sql_objects",
                "List PL/SQL and schema objects by name pattern and kind",
                handlers::get_pl_sql_objects
            ),
            tool!(
                "get_object_source",
                "Stored source of a PL/SQL object or view (capped at 1 MiB)",
                handlers::get_object_source
            ),
            tool!(
                "get_table_constraints",
                "Primary, unique, foreign-key and check constraints of a table",
                handlers::get_table_constraints
            ),
            tool!(
                "get_table_indexes",
                "Indexes of a table with column order and uniqueness",
                handlers::get_table_indexes
            ),
            tool!(
                "get_dependent_objects",
                "Objects that reference the given object",
                handlers::get_dependent_objects
            ),
            tool!(
                "get_user_defined_types",
                "User-defined types with their attributes",
                handlers::get_user_defined_types
            ),
            tool!(
                "get_related_tables",
                "Foreign-key neighbors of a table, one hop each direction",
                handlers::get_related_tables
            ),
            tool!(
                "rebuild_schema_cache",
                "Force a full rebuild of the schema cache",
                handlers::rebuild_schema_cache
            ),
            tool!(
                "read_query",
                "Run a SELECT statement and return the rows",
                handlers::read_query
            ),
            tool!(
                "exec_ddl_sql",
                "Run a DDL statement; affected cache entries are invalidated",
                handlers::exec_ddl_sql
            ),
            tool!(
                "exec_dml_sql",
                "Run an INSERT/UPDATE/DELETE/MERGE statement",
                handlers::exec_dml_sql
            ),
            tool!(
                "exec_pro_sql",
                "Run an anonymous PL/SQL block",
                handlers::exec_pro_sql
            ),
        ])
    }

    fn from_specs(tools: Vec<ToolSpec>) -> Self {
        let by_name = tools
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name, i))
            .collect();
        Self { tools, by_name }
    }

    pub fn specs(&self) -> &[ToolSpec] {
        &self.tools
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Dispatch one tool call under the configured deadline. Non-fatal
    /// failures come back as the error envelope, not as an `Err`; `None`
    /// means the tool does not exist.
    pub async fn call(&self, ctx: &AppContext, name: &str, args: Value) -> Option<Value> {
        let spec = self.by_name.get(name).map(|&i| &self.tools[i])?;
        let started = Instant::now();

        let outcome =
            tokio::time::timeout(ctx.config.tool_deadline, (spec.handler)(ctx, args)).await;
        let value = match outcome {
            Ok(Ok(value)) => {
                tracing::debug!(
                    tool = %name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "tool call succeeded"
                );
                value
            }
            Ok(Err(err)) => {
                tracing::debug!(
                    tool = %name,
                    code = err.code(),
                    error = %err,
                    "tool call failed"
                );
                error_envelope(&err)
            }
            Err(_) => {
                // The handler future is dropped here; any pool session it
                // held is released on drop.
                let err = OrascopeError::Timeout(format!(
                    "tool {name} exceeded its {}ms deadline",
                    ctx.config.tool_deadline.as_millis()
                ));
                tracing::warn!(tool = %name, "tool call hit deadline");
                error_envelope(&err)
            }
        };
        Some(value)
    }
}

fn error_envelope(err: &OrascopeError) -> Value {
    json!({"error": {"code": err.code(), "message": err.to_string()}})
}
