//! MCP (Model Context Protocol) server: exposes the gate as an MCP tool
//! server.
//!
//! AI agents connect via stdio and screen commands before executing them.
//! `approve_command` resolves non-interactively by default (agents cannot
//! solve a challenge page); `interactive=true` opens the challenge flow
//! for callers with a human nearby. Implements JSON-RPC 2.0 with the MCP
//! tool protocol surface: `initialize`, `tools/list`, `tools/call`,
//! `notifications/initialized`.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use serde_derive::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use cmdgate_core::{validate, Catalog, ChallengeKind, RealPathProbe, Severity, ValidationOptions};

use crate::{
    agent::{assess, AgentPolicy},
    approve::{approve, ApproveOptions},
    error::{Error, Result},
};

const PROTOCOL_VERSION: &str = "2024-11-05";

// ---------------------------------------------------------------------------
// JSON-RPC types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl JsonRpcResponse {
    fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Option<Value>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tool parameter shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ValidateParams {
    command: String,
    #[serde(default)]
    allowed_severities: Vec<String>,
    #[serde(default)]
    deny_pattern_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ApproveParams {
    command: String,
    /// Open the challenge page and wait for a human verdict. Off by
    /// default: an unattended agent would only ever hit the deadline.
    #[serde(default)]
    interactive: bool,
    #[serde(default)]
    challenge_type: Option<String>,
    #[serde(default)]
    timeout_ms: Option<u64>,
    #[serde(default)]
    allowed_severities: Vec<String>,
    #[serde(default)]
    deny_pattern_ids: Vec<String>,
}

fn parse_severities(names: &[String]) -> Result<Vec<Severity>> {
    names
        .iter()
        .map(|name| name.parse::<Severity>().map_err(Error::Engine))
        .collect()
}

// ---------------------------------------------------------------------------
// McpServer
// ---------------------------------------------------------------------------

/// The MCP server holds the catalog, the unattended-decision policy and a
/// runtime for interactive challenge sessions.
pub struct McpServer<'a> {
    catalog: &'a Catalog,
    options: ApproveOptions,
    agent_policy: AgentPolicy,
    runtime: tokio::runtime::Runtime,
}

impl<'a> McpServer<'a> {
    /// Create a server with the given default approval options and agent
    /// policy.
    ///
    /// # Errors
    /// When the internal runtime cannot be built.
    pub fn new(
        catalog: &'a Catalog,
        options: ApproveOptions,
        agent_policy: AgentPolicy,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            catalog,
            options,
            agent_policy,
            runtime,
        })
    }

    /// Run the stdio JSON-RPC loop: requests in on stdin, responses out on
    /// stdout, one JSON document per line.
    ///
    /// # Errors
    /// Returns an error when stdin/stdout operations fail.
    pub fn run_stdio(&self) -> Result<()> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();

        for line in stdin.lock().lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(&line) {
                let serialized = serde_json::to_string(&response)?;
                writeln!(stdout, "{serialized}")?;
                stdout.flush()?;
            }
        }

        Ok(())
    }

    /// Handle one JSON-RPC line. Notifications produce no response.
    fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(err) => {
                return Some(JsonRpcResponse::failure(
                    None,
                    -32700,
                    format!("parse error: {err}"),
                ));
            }
        };

        debug!(method = request.method, "mcp request");
        match request.method.as_str() {
            "initialize" => Some(self.handle_initialize(request.id)),
            "tools/list" => Some(Self::handle_tools_list(request.id)),
            "tools/call" => Some(self.handle_tools_call(request.id, request.params)),
            method if method.starts_with("notifications/") => None,
            other => Some(JsonRpcResponse::failure(
                request.id,
                -32601,
                format!("method not found: {other}"),
            )),
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": "cmdgate",
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
        )
    }

    fn handle_tools_list(id: Option<Value>) -> JsonRpcResponse {
        JsonRpcResponse::success(
            id,
            json!({
                "tools": [
                    {
                        "name": "validate_command",
                        "description": "Screen a shell command against the risky-pattern catalog without side effects",
                        "inputSchema": {
                            "type": "object",
                            "properties": {
                                "command": { "type": "string" },
                                "allowed_severities": {
                                    "type": "array", "items": { "type": "string" }
                                },
                                "deny_pattern_ids": {
                                    "type": "array", "items": { "type": "string" }
                                }
                            },
                            "required": ["command"]
                        }
                    },
                    {
                        "name": "approve_command",
                        "description": "Screen a shell command and decide. By default resolves unattended from severity thresholds; set interactive=true to collect human approval over a local challenge page",
                        "inputSchema": {
                            "type": "object",
                            "properties": {
                                "command": { "type": "string" },
                                "interactive": { "type": "boolean" },
                                "challenge_type": {
                                    "type": "string",
                                    "enum": ["confirm", "math", "word", "block"]
                                },
                                "timeout_ms": { "type": "integer" },
                                "allowed_severities": {
                                    "type": "array", "items": { "type": "string" }
                                },
                                "deny_pattern_ids": {
                                    "type": "array", "items": { "type": "string" }
                                }
                            },
                            "required": ["command"]
                        }
                    }
                ]
            }),
        )
    }

    fn handle_tools_call(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let Some(params) = params else {
            return JsonRpcResponse::failure(id, -32602, "missing params");
        };
        let tool_name = params
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

        let outcome = match tool_name.as_str() {
            "validate_command" => self.call_validate(arguments),
            "approve_command" => self.call_approve(arguments),
            other => {
                return JsonRpcResponse::failure(id, -32602, format!("unknown tool: {other}"));
            }
        };

        match outcome {
            Ok(payload) => JsonRpcResponse::success(
                id,
                json!({
                    "content": [{ "type": "text", "text": payload.to_string() }]
                }),
            ),
            Err(err) => JsonRpcResponse::success(
                id,
                json!({
                    "content": [{ "type": "text", "text": err.to_string() }],
                    "isError": true
                }),
            ),
        }
    }

    fn call_validate(&self, arguments: Value) -> Result<Value> {
        let params: ValidateParams = serde_json::from_value(arguments)?;
        let options = ValidationOptions {
            allowed_severities: parse_severities(&params.allowed_severities)?,
            deny_pattern_ids: params.deny_pattern_ids,
        };
        let result = validate(self.catalog, &params.command, &options, &RealPathProbe)?;
        Ok(serde_json::to_value(result)?)
    }

    fn call_approve(&self, arguments: Value) -> Result<Value> {
        let params: ApproveParams = serde_json::from_value(arguments)?;
        let validation = ValidationOptions {
            allowed_severities: parse_severities(&params.allowed_severities)?,
            deny_pattern_ids: params.deny_pattern_ids,
        };

        if !params.interactive {
            let assessment = assess(
                self.catalog,
                &params.command,
                &validation,
                &self.agent_policy,
                &RealPathProbe,
            )?;
            return Ok(json!({
                "allowed": assessment.allowed,
                "reason": assessment.denial_reason,
                "matches": assessment.matched_rules,
                "requires_human_approval": assessment.requires_human_approval,
            }));
        }

        let mut options = self.options.clone();
        options.validation = validation;
        if let Some(ref name) = params.challenge_type {
            options.challenge = name.parse::<ChallengeKind>().map_err(Error::Engine)?;
        }
        if let Some(ms) = params.timeout_ms {
            options.timeout = Duration::from_millis(ms);
        }

        let (outcome, result) = self.runtime.block_on(approve(
            self.catalog,
            &params.command,
            &options,
            &RealPathProbe,
        ))?;
        Ok(json!({
            "allowed": outcome.allowed,
            "reason": outcome.reason,
            "matches": result.matches,
        }))
    }
}
