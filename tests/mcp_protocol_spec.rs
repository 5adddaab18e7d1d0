//! MCP protocol integration tests.
//!
//! These tests spawn the actual `scrb mcp` process and communicate via
//! JSON-RPC over stdio, testing the complete MCP protocol flow against a
//! real git repository in a temp directory.
//!
//! The rmcp library uses line-delimited JSON (each message is one line):
//! ```
//! {"jsonrpc":"2.0","id":1,"method":"initialize",...}\n
//! {"jsonrpc":"2.0","id":1,"result":{...}}\n
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

/// JSON-RPC 2.0 request
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

/// JSON-RPC 2.0 response
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: Option<u64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct JsonRpcError {
    code: i64,
    message: String,
    data: Option<Value>,
}

/// MCP test client that spawns and communicates with the server
struct McpTestClient {
    child: Child,
    request_id: u64,
    reader: BufReader<std::process::ChildStdout>,
}

impl McpTestClient {
    /// Spawn a new MCP server process
    fn spawn() -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_scrb"))
            .arg("mcp")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("Failed to spawn scrb mcp");

        let stdout = child.stdout.take().expect("Failed to get stdout");
        let reader = BufReader::new(stdout);

        Self {
            child,
            request_id: 0,
            reader,
        }
    }

    /// Send a message as line-delimited JSON
    fn send_message(&mut self, content: &str) {
        let stdin = self.child.stdin.as_mut().expect("Failed to get stdin");
        writeln!(stdin, "{}", content).expect("Failed to write message");
        stdin.flush().expect("Failed to flush stdin");
    }

    /// Read a message as line-delimited JSON
    fn read_message(&mut self) -> String {
        let mut line = String::new();
        self.reader
            .read_line(&mut line)
            .expect("Failed to read line");
        line.trim().to_string()
    }

    /// Send a JSON-RPC request and get the response
    fn request(&mut self, method: &str, params: Option<Value>) -> JsonRpcResponse {
        self.request_id += 1;
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.request_id,
            method: method.to_string(),
            params,
        };

        let request_json = serde_json::to_string(&request).expect("Failed to serialize request");
        self.send_message(&request_json);

        let response_json = self.read_message();
        serde_json::from_str(&response_json).expect("Failed to parse response")
    }

    /// Send initialize request and initialized notification (required first messages)
    fn initialize(&mut self) -> JsonRpcResponse {
        let response = self.request(
            "initialize",
            Some(json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {
                    "name": "test-client",
                    "version": "1.0.0"
                }
            })),
        );

        // Send initialized notification (required by MCP protocol)
        let notification = json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        });
        self.send_message(&notification.to_string());

        response
    }

    /// List available tools
    fn list_tools(&mut self) -> JsonRpcResponse {
        self.request("tools/list", None)
    }

    /// Call a tool with parameters
    fn call_tool(&mut self, name: &str, arguments: Value) -> JsonRpcResponse {
        self.request(
            "tools/call",
            Some(json!({
                "name": name,
                "arguments": arguments
            })),
        )
    }
}

impl Drop for McpTestClient {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Create a real git repository with one commit on `main`.
fn init_test_repo() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let root = dir.path().canonicalize().expect("Failed to canonicalize");

    let git = |args: &[&str]| {
        let status = Command::new("git")
            .args(args)
            .current_dir(&root)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .expect("Failed to run git");
        assert!(status.success(), "git {:?} failed", args);
    };

    git(&["init"]);
    git(&["checkout", "-b", "main"]);
    git(&["config", "user.email", "test@example.com"]);
    git(&["config", "user.name", "Test"]);
    std::fs::write(root.join("README.md"), "# Test repo\n").unwrap();
    git(&["add", "README.md"]);
    git(&["commit", "-m", "initial"]);

    (dir, root)
}

/// Helper to extract text content from MCP tool response
fn extract_text_content(response: &JsonRpcResponse) -> String {
    response
        .result
        .as_ref()
        .and_then(|r| r.get("content"))
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|c| c.get("text"))
        .and_then(|t| t.as_str())
        .expect("Expected text content in response")
        .to_string()
}

fn read_repo_file(root: &Path, rel: &str) -> String {
    std::fs::read_to_string(root.join(rel)).expect("document missing")
}

// ============================================================
// Protocol Tests
// ============================================================

mod protocol {
    use super::*;

    #[test]
    fn initialize_returns_server_info() {
        let mut client = McpTestClient::spawn();
        let response = client.initialize();

        assert!(response.error.is_none(), "Expected success, got error");
        let result = response.result.expect("Expected result");

        assert!(result.get("serverInfo").is_some());
        assert!(result.get("capabilities").is_some());
    }

    #[test]
    fn tools_list_returns_all_tools() {
        let mut client = McpTestClient::spawn();
        client.initialize();

        let response = client.list_tools();
        assert!(response.error.is_none(), "Expected success, got error");

        let result = response.result.expect("Expected result");
        let tools = result.get("tools").expect("Expected tools array");
        let tools_array = tools.as_array().expect("Tools should be array");

        assert_eq!(
            tools_array.len(),
            8,
            "Expected 8 tools, got {}",
            tools_array.len()
        );

        let tool_names: Vec<&str> = tools_array
            .iter()
            .filter_map(|t| t.get("name").and_then(|n| n.as_str()))
            .collect();

        assert!(tool_names.contains(&"start_session"));
        assert!(tool_names.contains(&"select_branch"));
        assert!(tool_names.contains(&"write_document"));
        assert!(tool_names.contains(&"read_document"));
        assert!(tool_names.contains(&"analyze_impact"));
        assert!(tool_names.contains(&"update_sections"));
        assert!(tool_names.contains(&"open_review"));
        assert!(tool_names.contains(&"end_session"));
    }

    #[test]
    fn tools_have_descriptions_and_schemas() {
        let mut client = McpTestClient::spawn();
        client.initialize();

        let response = client.list_tools();
        let result = response.result.expect("Expected result");
        let tools = result
            .get("tools")
            .expect("Expected tools")
            .as_array()
            .expect("Tools should be array");

        for tool in tools {
            let name = tool.get("name").and_then(|n| n.as_str()).unwrap_or("?");
            assert!(
                tool.get("description").is_some(),
                "Tool {} missing description",
                name
            );
            assert!(
                tool.get("inputSchema").is_some(),
                "Tool {} missing inputSchema",
                name
            );
        }
    }
}

// ============================================================
// Tool Call Tests (against a real git repository)
// ============================================================

mod tool_calls {
    use super::*;

    #[test]
    fn full_documentation_workflow() {
        let (_dir, root) = init_test_repo();
        let mut client = McpTestClient::spawn();
        client.initialize();

        // 1. Start a session
        let session_text = extract_text_content(&client.call_tool(
            "start_session",
            json!({
                "repo_path": root.to_str().unwrap(),
                "caller_id": "protocol-test"
            }),
        ));
        let session: Value = serde_json::from_str(&session_text).unwrap();
        let session_id = session["session_id"].as_str().unwrap();
        assert_eq!(session["trunk_branch"].as_str(), Some("main"));

        // 2. Select a feature branch
        let branch_text = extract_text_content(&client.call_tool(
            "select_branch",
            json!({
                "session_id": session_id,
                "name": "docs/enrollment"
            }),
        ));
        let branch: Value = serde_json::from_str(&branch_text).unwrap();
        assert_eq!(branch["active_branch"].as_str(), Some("docs/enrollment"));
        assert_eq!(branch["created"].as_bool(), Some(true));

        // 3. Write a fresh document
        let write_text = extract_text_content(&client.call_tool(
            "write_document",
            json!({
                "session_id": session_id,
                "file_path": "docs/enrollment.md",
                "title": "Enrollment",
                "sections": [
                    { "heading": "Purpose", "content": "Tracks enrollment." },
                    { "heading": "API", "content": "`POST /enroll`" }
                ]
            }),
        ));
        let write: Value = serde_json::from_str(&write_text).unwrap();
        assert_eq!(write["committed"].as_bool(), Some(true));
        assert!(read_repo_file(&root, "docs/enrollment.md")
            .contains("<!-- scribe:begin api -->"));

        // 4. Impact of a modified endpoint
        let impact_text = extract_text_content(&client.call_tool(
            "analyze_impact",
            json!({
                "session_id": session_id,
                "file_path": "docs/enrollment.md",
                "changes": [
                    { "kind": "modified", "target_name": "/enroll" }
                ]
            }),
        ));
        let impact: Value = serde_json::from_str(&impact_text).unwrap();
        let affected = impact["affected"].as_array().unwrap();
        assert_eq!(affected.len(), 1);
        assert_eq!(affected[0]["section_id"].as_str(), Some("api"));

        // 5. Surgical update of the stale section
        let update_text = extract_text_content(&client.call_tool(
            "update_sections",
            json!({
                "session_id": session_id,
                "file_path": "docs/enrollment.md",
                "updates": { "api": "`POST /v2/enroll`" }
            }),
        ));
        let update: Value = serde_json::from_str(&update_text).unwrap();
        assert_eq!(update["committed"].as_bool(), Some(true));
        let written = read_repo_file(&root, "docs/enrollment.md");
        assert!(written.contains("`POST /v2/enroll`"));
        assert!(written.contains("Tracks enrollment."));

        // 6. End the session
        let end_response =
            client.call_tool("end_session", json!({ "session_id": session_id }));
        assert!(end_response.error.is_none());
    }

    #[test]
    fn write_without_leaving_the_trunk_is_rejected() {
        let (_dir, root) = init_test_repo();
        let mut client = McpTestClient::spawn();
        client.initialize();

        let session_text = extract_text_content(&client.call_tool(
            "start_session",
            json!({
                "repo_path": root.to_str().unwrap(),
                "caller_id": "protocol-test"
            }),
        ));
        let session: Value = serde_json::from_str(&session_text).unwrap();
        let session_id = session["session_id"].as_str().unwrap();

        let response = client.call_tool(
            "write_document",
            json!({
                "session_id": session_id,
                "file_path": "docs/enrollment.md",
                "sections": [ { "heading": "Purpose", "content": "x" } ]
            }),
        );

        let failed = response.error.is_some()
            || response
                .result
                .as_ref()
                .and_then(|r| r.get("isError"))
                .and_then(|e| e.as_bool())
                .unwrap_or(false);
        assert!(failed, "Expected trunk write to be rejected");
        assert!(!root.join("docs/enrollment.md").exists());
    }
}

// ============================================================
// Error Handling Tests
// ============================================================

mod errors {
    use super::*;

    #[test]
    fn invalid_tool_name_returns_error() {
        let mut client = McpTestClient::spawn();
        client.initialize();

        let response = client.call_tool("nonexistent_tool", json!({}));

        assert!(response.error.is_some(), "Expected error for invalid tool");
    }

    #[test]
    fn invalid_uuid_returns_error() {
        let mut client = McpTestClient::spawn();
        client.initialize();

        let response = client.call_tool(
            "select_branch",
            json!({ "session_id": "not-a-uuid", "name": "docs/x" }),
        );

        assert!(
            response.error.is_some() || {
                // Some implementations return error in result
                response
                    .result
                    .as_ref()
                    .and_then(|r| r.get("isError"))
                    .and_then(|e| e.as_bool())
                    .unwrap_or(false)
            }
        );
    }

    #[test]
    fn missing_required_param_returns_error() {
        let mut client = McpTestClient::spawn();
        client.initialize();

        // start_session requires 'repo_path'
        let response = client.call_tool("start_session", json!({ "caller_id": "x" }));

        assert!(
            response.error.is_some() || {
                response
                    .result
                    .as_ref()
                    .and_then(|r| r.get("isError"))
                    .and_then(|e| e.as_bool())
                    .unwrap_or(false)
            }
        );
    }
}
