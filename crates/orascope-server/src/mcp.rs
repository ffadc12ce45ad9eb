//! Stdio MCP transport
//!
//! Newline-delimited JSON-RPC 2.0 over stdin/stdout. The transport is a
//! thin collaborator: it iterates the engine's tool table to advertise
//! tools and forwards `tools/call` to the registry. Tool-level failures
//! come back as in-band envelopes; only protocol faults become JSON-RPC
//! errors.

use std::sync::Arc;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use orascope_engine::{AppContext, ToolRegistry};

const PROTOCOL_VERSION: &str = "2024-11-05";

/// Serve MCP over stdio until stdin closes.
pub async fn serve(ctx: Arc<AppContext>, registry: Arc<ToolRegistry>) -> std::io::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    // Responses from concurrent in-flight calls are serialized through one
    // writer task.
    let (out_tx, mut out_rx) = mpsc::channel::<String>(64);
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = out_rx.recv().await {
            if stdout.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if stdout.write_all(b"\n").await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        let request: Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, "discarding unparseable frame");
                send(&out_tx, parse_error()).await;
                continue;
            }
        };

        let id = request.get("id").cloned();
        let method = request
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        tracing::debug!(method = %method, "request received");

        match method.as_str() {
            "initialize" => {
                send(&out_tx, result(id, initialize_result())).await;
            }
            "ping" => {
                send(&out_tx, result(id, json!({}))).await;
            }
            "tools/list" => {
                send(&out_tx, result(id, tools_list(&registry))).await;
            }
            "tools/call" => {
                // Each call runs as its own task so one slow lookup does
                // not serialize the whole session.
                let ctx = Arc::clone(&ctx);
                let registry = Arc::clone(&registry);
                let out_tx = out_tx.clone();
                tokio::spawn(async move {
                    let response = handle_call(&ctx, &registry, id, &request).await;
                    send(&out_tx, response).await;
                });
            }
            // Notifications carry no id and expect no response.
            _ if id.is_none() => {}
            other => {
                send(
                    &out_tx,
                    error(id, -32601, &format!("method not found: {other}")),
                )
                .await;
            }
        }
    }

    drop(out_tx);
    let _ = writer.await;
    Ok(())
}

async fn handle_call(
    ctx: &AppContext,
    registry: &ToolRegistry,
    id: Option<Value>,
    request: &Value,
) -> Value {
    let params = request.get("params").cloned().unwrap_or(Value::Null);
    let Some(name) = params.get("name").and_then(Value::as_str) else {
        return error(id, -32602, "params.name is required");
    };
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

    match registry.call(ctx, name, arguments).await {
        Some(payload) => {
            let is_error = payload.get("error").is_some();
            let text = payload.to_string();
            result(
                id,
                json!({
                    "content": [{"type": "text", "text": text}],
                    "isError": is_error,
                }),
            )
        }
        None => error(id, -32602, &format!("unknown tool: {name}")),
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {"tools": {}},
        "serverInfo": {
            "name": "orascope",
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

fn tools_list(registry: &ToolRegistry) -> Value {
    let tools: Vec<Value> = registry
        .specs()
        .iter()
        .map(|spec| {
            json!({
                "name": spec.name,
                "description": spec.description,
                "inputSchema": {"type": "object"},
            })
        })
        .collect();
    json!({"tools": tools})
}

fn result(id: Option<Value>, payload: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id.unwrap_or(Value::Null), "result": payload})
}

fn error(id: Option<Value>, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id.unwrap_or(Value::Null),
        "error": {"code": code, "message": message},
    })
}

fn parse_error() -> Value {
    error(None, -32700, "parse error")
}

async fn send(out_tx: &mpsc::Sender<String>, response: Value) {
    let _ = out_tx.send(response.to_string()).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tools_list_shape() {
        let registry = ToolRegistry::standard();
        let listed = tools_list(&registry);
        let tools = listed["tools"].as_array().unwrap();
        assert_eq!(tools.len(), registry.specs().len());
        assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));
    }

    #[test]
    fn jsonrpc_frames() {
        let ok = result(Some(json!(7)), json!({"x": 1}));
        assert_eq!(ok["jsonrpc"], "2.0");
        assert_eq!(ok["id"], 7);
        let err = error(Some(json!("abc")), -32601, "nope");
        assert_eq!(err["error"]["code"], -32601);
    }
}
