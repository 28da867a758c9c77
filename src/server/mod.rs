//! Stdio JSON-RPC server
//!
//! Reads newline-delimited requests, dispatches each one on its own task
//! and funnels responses through a single writer task, so a slow
//! `search_files` never holds up a `read_file` behind it.

pub mod protocol;

use crate::errors::{Result, ServerError};
use crate::tools::types::ToolResult;
use crate::tools::ToolRuntime;
use protocol::{
    Request, Response, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
    PARSE_ERROR, PROTOCOL_VERSION,
};
use serde_json::{json, Value};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info, warn};

/// Append-only record of raw protocol traffic
#[derive(Debug, Clone)]
pub struct ProtocolLog {
    file: Arc<Mutex<File>>,
}

impl ProtocolLog {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }

    /// Append one line tagged with its direction ("read" or "write")
    pub fn record(&self, direction: &str, line: &str) {
        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(file, "{}: {}", direction, line) {
            warn!(error = %e, "failed to write protocol log");
        }
    }
}

/// MCP server over a tool runtime
#[derive(Debug, Clone)]
pub struct McpServer {
    runtime: ToolRuntime,
    name: String,
    version: String,
    protocol_log: Option<ProtocolLog>,
}

impl McpServer {
    pub fn new(runtime: ToolRuntime, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            runtime,
            name: name.into(),
            version: version.into(),
            protocol_log: None,
        }
    }

    pub fn with_protocol_log(mut self, log: ProtocolLog) -> Self {
        self.protocol_log = Some(log);
        self
    }

    /// Serve on the process's stdin and stdout
    pub async fn serve_stdio(&self) -> Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve until `reader` reaches end of input and every in-flight
    /// request has been answered.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let write_log = self.protocol_log.clone();
        let writer_task = tokio::spawn(async move {
            let mut writer = BufWriter::new(writer);
            while let Some(line) = rx.recv().await {
                if let Some(log) = &write_log {
                    log.record("write", &line);
                }
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Ok::<(), std::io::Error>(())
        });

        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }

            // Undecodable lines get a parse error; the stream stays open
            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line.trim_end_matches(['\n', '\r']).to_string(),
                Err(e) => {
                    if let Some(log) = &self.protocol_log {
                        log.record("read", String::from_utf8_lossy(&buf).trim_end());
                    }
                    warn!(error = %e, "request line is not valid UTF-8");
                    send(&tx, Response::err(Value::Null, PARSE_ERROR, e.to_string()));
                    continue;
                }
            };

            if line.trim().is_empty() {
                continue;
            }
            if let Some(log) = &self.protocol_log {
                log.record("read", &line);
            }

            let server = self.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Some(response) = server.handle_line(&line).await {
                    send(&tx, response);
                }
            });
        }

        // The writer finishes once every request task has dropped its sender
        drop(tx);
        writer_task.await??;
        debug!("input closed");
        Ok(())
    }

    /// Handle one raw line; `None` means nothing should be written back
    pub async fn handle_line(&self, line: &str) -> Option<Response> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => return Some(Response::err(Value::Null, PARSE_ERROR, e.to_string())),
        };

        let request: Request = match serde_json::from_value(value.clone()) {
            Ok(request) => request,
            Err(e) => {
                let id = value.get("id").cloned().unwrap_or(Value::Null);
                return Some(Response::err(id, INVALID_REQUEST, e.to_string()));
            }
        };

        if !request.has_valid_version() {
            let id = request.id.unwrap_or(Value::Null);
            return Some(Response::err(
                id,
                INVALID_REQUEST,
                format!("Unsupported jsonrpc version: {:?}", request.jsonrpc),
            ));
        }

        self.handle_request(request).await
    }

    pub async fn handle_request(&self, request: Request) -> Option<Response> {
        if request.is_notification() {
            debug!(method = %request.method, "notification");
            return None;
        }

        let id = request.id.clone().unwrap_or(Value::Null);
        debug!(method = %request.method, id = %id, "request");

        let response = match self.route(&request).await {
            Ok(result) => Response::ok(id, result),
            Err(ServerError::Protocol { code, message }) => Response::err(id, code, message),
            Err(e) => Response::err(id, INTERNAL_ERROR, e.to_string()),
        };
        Some(response)
    }

    async fn route(&self, request: &Request) -> Result<Value> {
        match request.method.as_str() {
            "initialize" => {
                let client = request
                    .params
                    .get("clientInfo")
                    .and_then(|info| info.get("name"))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                info!(client, "initialize");

                Ok(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "serverInfo": {
                        "name": self.name,
                        "version": self.version,
                    },
                    "capabilities": {
                        "tools": {}
                    }
                }))
            }
            "ping" => Ok(json!({})),
            "tools/list" => {
                let tools = serde_json::to_value(self.runtime.schemas())?;
                Ok(json!({ "tools": tools }))
            }
            "tools/call" => {
                let name = request
                    .params
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ServerError::Protocol {
                        code: INVALID_PARAMS,
                        message: "tools/call requires a tool name".to_string(),
                    })?;
                let arguments = request.params.get("arguments").cloned().unwrap_or(Value::Null);

                let result = self.runtime.execute(name, &arguments).await?;
                debug!(
                    tool = %result.tool,
                    duration_ms = result.duration_ms,
                    success = result.success,
                    "tool call finished"
                );
                call_result(&result)
            }
            other => Err(ServerError::Protocol {
                code: METHOD_NOT_FOUND,
                message: format!("Method not found: {}", other),
            }),
        }
    }
}

/// Queue an encoded response for the writer task
fn send(tx: &UnboundedSender<String>, response: Response) {
    match serde_json::to_string(&response) {
        Ok(encoded) => {
            // Receiver only closes if the writer failed
            let _ = tx.send(encoded);
        }
        Err(e) => warn!(error = %e, "failed to encode response"),
    }
}

/// Shape a tool result as an MCP `tools/call` result
fn call_result(result: &ToolResult) -> Result<Value> {
    match &result.error {
        None => {
            let text = serde_json::to_string(&result.output)?;
            Ok(json!({
                "content": [{ "type": "text", "text": text }],
                "structuredContent": result.output,
                "isError": false
            }))
        }
        Some(error) => Ok(json!({
            "content": [{ "type": "text", "text": error.message }],
            "structuredContent": { "error": error },
            "isError": true
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn setup_server() -> (McpServer, TempDir) {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("hello.txt"), "hello world").unwrap();
        std::fs::create_dir(temp.path().join("docs")).unwrap();
        std::fs::write(temp.path().join("docs/guide.md"), "# guide").unwrap();

        let runtime = ToolRuntime::new(temp.path()).unwrap();
        (McpServer::new(runtime, "filemcp", "0.1.0"), temp)
    }

    async fn call(server: &McpServer, line: Value) -> Response {
        server.handle_line(&line.to_string()).await.unwrap()
    }

    #[tokio::test]
    async fn test_initialize() {
        let (server, _temp) = setup_server();
        let resp = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize",
                   "params": {"clientInfo": {"name": "test", "version": "1"}}}),
        )
        .await;

        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "filemcp");
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_null_id_gets_reply() {
        let (server, _temp) = setup_server();
        let resp = call(&server, json!({"jsonrpc": "2.0", "id": null, "method": "ping"})).await;

        assert_eq!(resp.id, Value::Null);
        assert_eq!(resp.result, Some(json!({})));
    }

    #[tokio::test]
    async fn test_notification_has_no_reply() {
        let (server, _temp) = setup_server();
        let line = json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string();
        assert!(server.handle_line(&line).await.is_none());
    }

    #[tokio::test]
    async fn test_tools_list() {
        let (server, _temp) = setup_server();
        let resp = call(&server, json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})).await;

        let tools = resp.result.unwrap()["tools"].as_array().unwrap().clone();
        assert_eq!(tools.len(), 4);
        assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));
    }

    #[tokio::test]
    async fn test_tools_call_success() {
        let (server, _temp) = setup_server();
        let resp = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call",
                   "params": {"name": "read_file", "arguments": {"path": "hello.txt"}}}),
        )
        .await;

        let result = resp.result.unwrap();
        assert_eq!(result["isError"], false);
        assert_eq!(result["structuredContent"]["content"], "hello world");
        assert_eq!(result["structuredContent"]["size"], 11);

        let text = result["content"][0]["text"].as_str().unwrap();
        let decoded: Value = serde_json::from_str(text).unwrap();
        assert_eq!(decoded, result["structuredContent"]);
    }

    #[tokio::test]
    async fn test_tools_call_operation_failure() {
        let (server, _temp) = setup_server();
        let resp = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call",
                   "params": {"name": "read_file", "arguments": {"path": "../outside.txt"}}}),
        )
        .await;

        assert!(resp.error.is_none());
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], true);
        assert_eq!(result["structuredContent"]["error"]["kind"], "path_rejected");
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let (server, _temp) = setup_server();

        let resp = server.handle_line("{not json").await.unwrap();
        assert_eq!(resp.error.unwrap().code, PARSE_ERROR);
        assert_eq!(resp.id, Value::Null);

        let resp = call(&server, json!({"jsonrpc": "2.0", "id": 5, "method": "resources/list"})).await;
        assert_eq!(resp.error.unwrap().code, METHOD_NOT_FOUND);

        let resp = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 6, "method": "tools/call",
                   "params": {"name": "write_file", "arguments": {}}}),
        )
        .await;
        assert_eq!(resp.error.unwrap().code, INVALID_PARAMS);

        let resp = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 7, "method": "tools/call",
                   "params": {"name": "search_files", "arguments": {}}}),
        )
        .await;
        assert_eq!(resp.error.unwrap().code, INVALID_PARAMS);

        let resp = call(&server, json!({"jsonrpc": "2.0", "id": 8})).await;
        assert_eq!(resp.error.unwrap().code, INVALID_REQUEST);
        assert_eq!(resp.id, json!(8));

        let resp = call(&server, json!({"jsonrpc": "1.0", "id": 9, "method": "ping"})).await;
        assert_eq!(resp.error.unwrap().code, INVALID_REQUEST);
        assert_eq!(resp.id, json!(9));

        let resp = call(&server, json!({"id": 10, "method": "ping"})).await;
        assert_eq!(resp.error.unwrap().code, INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_serve_answers_every_request() {
        let (server, _temp) = setup_server();
        let log_dir = TempDir::new().unwrap();
        let log_path = log_dir.path().join("proto.log");
        let server = server.with_protocol_log(ProtocolLog::open(&log_path).unwrap());

        let input = [
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call",
                   "params": {"name": "search_files", "arguments": {"pattern": "*.md"}}}),
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call",
                   "params": {"name": "list_directory", "arguments": {}}}),
            json!({"jsonrpc": "2.0", "id": 4, "method": "ping"}),
        ]
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>();

        // A line that is not UTF-8 sits between valid requests
        let mut bytes = Vec::new();
        bytes.extend_from_slice(input[0].as_bytes());
        bytes.extend_from_slice(b"\n{\"id\": \xff}\r\n");
        for line in &input[1..] {
            bytes.extend_from_slice(line.as_bytes());
            bytes.extend_from_slice(b"\n");
        }
        bytes.extend_from_slice(b"\n");

        let (out_write, mut out_read) = tokio::io::duplex(1 << 20);
        server.serve(Cursor::new(bytes), out_write).await.unwrap();

        let mut output = String::new();
        out_read.read_to_string(&mut output).await.unwrap();

        let (parse_errors, mut responses): (Vec<Value>, Vec<Value>) = output
            .lines()
            .map(|line| serde_json::from_str::<Value>(line).unwrap())
            .partition(|r| r["id"].is_null());
        responses.sort_by_key(|r| r["id"].as_i64().unwrap());

        assert_eq!(parse_errors.len(), 1);
        assert_eq!(parse_errors[0]["error"]["code"], PARSE_ERROR);

        assert_eq!(responses.len(), 4);
        assert_eq!(
            responses[1]["result"]["structuredContent"]["matches"],
            json!(["docs/guide.md"])
        );
        assert_eq!(responses[2]["result"]["structuredContent"]["count"], 2);
        assert_eq!(responses[3]["result"], json!({}));

        let log = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(log.lines().filter(|l| l.starts_with("read: ")).count(), 6);
        assert_eq!(log.lines().filter(|l| l.starts_with("write: ")).count(), 5);
    }
}
