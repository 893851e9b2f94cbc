//! Line-delimited JSON-RPC 2.0 over stdio. Every log line goes to
//! stderr; stdout carries nothing but protocol frames.

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::dispatch::{Dispatcher, DispatcherDeps, ProgressNotifier};
use crate::protocol::{
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR, METHOD_NOT_FOUND, PARSE_ERROR,
};
use crate::tools;

const PROTOCOL_VERSION: &str = "2024-11-05";

/// Runs the stdio server to completion; returns once stdin is closed.
pub async fn serve_stdio(deps: DispatcherDeps) -> std::io::Result<()> {
    let dispatcher = Dispatcher::new(deps);
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(stdin).lines();

    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel::<JsonRpcNotification>();

    loop {
        tokio::select! {
            biased;

            notification = notify_rx.recv() => {
                let Some(notification) = notification else { continue };
                write_line(&mut stdout, &notification).await?;
            }

            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                handle_line(&dispatcher, &notify_tx, &line, &mut stdout).await?;
            }
        }
    }

    debug!("stdin closed, shutting down rpc server");
    Ok(())
}

async fn handle_line(
    dispatcher: &Dispatcher,
    notify_tx: &mpsc::UnboundedSender<JsonRpcNotification>,
    line: &str,
    stdout: &mut (impl AsyncWriteExt + Unpin),
) -> std::io::Result<()> {
    let request: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "failed to parse json-rpc request");
            let response = JsonRpcResponse::err(None, PARSE_ERROR, format!("parse error: {e}"));
            return write_line(stdout, &response).await;
        }
    };

    let id = request.id.clone();
    let response = match request.method.as_str() {
        "initialize" => JsonRpcResponse::ok(id, initialize_result()),
        "tools/list" => JsonRpcResponse::ok(id, json!({ "tools": tools::catalog() })),
        "tools/call" => handle_tools_call(dispatcher, notify_tx, id.clone(), request.params).await,
        other => JsonRpcResponse::err(id, METHOD_NOT_FOUND, format!("unknown method '{other}'")),
    };

    // Notifications (no `id`) get no response at all, by spec.
    if request.id.is_some() {
        write_line(stdout, &response).await?;
    }
    Ok(())
}

async fn handle_tools_call(
    dispatcher: &Dispatcher,
    notify_tx: &mpsc::UnboundedSender<JsonRpcNotification>,
    id: Option<Value>,
    params: Value,
) -> JsonRpcResponse {
    let name = match params.get("name").and_then(Value::as_str) {
        Some(name) => name.to_string(),
        None => return JsonRpcResponse::err(id, INTERNAL_ERROR, "tools/call missing 'name'"),
    };
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
    let progress_token = params.get("progressToken").or_else(|| params.get("_meta").and_then(|m| m.get("progressToken")));

    let notifier = progress_token.map(|token| ProgressNotifier { token: token.clone(), sender: notify_tx.clone() });

    let result = dispatcher.call_tool(&name, arguments, notifier).await;
    match serde_json::to_value(&result) {
        Ok(value) => JsonRpcResponse::ok(id, value),
        Err(e) => {
            error!(error = %e, "failed to serialize tool result");
            JsonRpcResponse::err(id, INTERNAL_ERROR, format!("failed to serialize tool result: {e}"))
        }
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "serverInfo": { "name": "prompt-alchemy", "version": env!("CARGO_PKG_VERSION") },
        "capabilities": { "tools": { "listChanged": false } },
    })
}

async fn write_line<T: serde::Serialize>(stdout: &mut (impl AsyncWriteExt + Unpin), value: &T) -> std::io::Result<()> {
    let mut line = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());
    line.push('\n');
    stdout.write_all(line.as_bytes()).await?;
    stdout.flush().await
}
