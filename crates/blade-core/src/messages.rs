//! Blade control message types.
//!
//! Every frame on the wire is a JSON-RPC 2.0 envelope. Requests carry
//! `method` + `params`, responses carry `result` or `error`, both share `id`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::{BladeError, BladeResult};

pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol version announced in `blade.connect`.
pub const BLADE_VERSION: BladeVersion = BladeVersion {
    major: 2,
    minor: 1,
    revision: 0,
};

/// Method names of the Blade protocol.
pub mod method {
    pub const CONNECT: &str = "blade.connect";
    pub const EXECUTE: &str = "blade.execute";
    pub const PING: &str = "blade.ping";
    pub const DISCONNECT: &str = "blade.disconnect";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BladeVersion {
    pub major: u32,
    pub minor: u32,
    pub revision: u32,
}

/// A JSON-RPC request (or a server-initiated call).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Build a request with a fresh UUID v4 identifier.
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Uuid::new_v4().to_string(),
            method: method.into(),
            params: Some(params),
        }
    }
}

/// A JSON-RPC response.
///
/// `id` stays a raw value: replies to server-initiated calls echo whatever
/// id the server chose, string or number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl JsonRpcResponse {
    pub fn result(id: impl Into<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }
}

/// Anything `execute()` can put on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Request(JsonRpcRequest),
    Response(JsonRpcResponse),
}

impl Message {
    /// The message id. Non-string response ids read as empty.
    pub fn id(&self) -> &str {
        match self {
            Self::Request(r) => &r.id,
            Self::Response(r) => r.id.as_str().unwrap_or_default(),
        }
    }

    /// Whether a correlated reply is expected: only messages carrying `params`.
    pub fn expects_reply(&self) -> bool {
        matches!(self, Self::Request(r) if r.params.is_some())
    }
}

impl From<JsonRpcRequest> for Message {
    fn from(r: JsonRpcRequest) -> Self {
        Self::Request(r)
    }
}

impl From<JsonRpcResponse> for Message {
    fn from(r: JsonRpcResponse) -> Self {
        Self::Response(r)
    }
}

// ── Authentication ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectOptions {
    /// Previously negotiated protocol, echoed to resume a session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

/// `params` of a `blade.connect` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectParams {
    pub version: BladeVersion,
    pub authentication: Credentials,
    #[serde(default)]
    pub params: ConnectOptions,
}

impl ConnectParams {
    pub fn new(credentials: Credentials, protocol: Option<String>) -> Self {
        Self {
            version: BLADE_VERSION,
            authentication: credentials,
            params: ConnectOptions { protocol },
        }
    }
}

/// Room grant inside an authorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomGrant {
    pub name: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Server-issued claim returned by a successful handshake.
///
/// Treated as opaque apart from `signature`, which binds the negotiated protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authorization {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub scope_id: String,
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomGrant>,
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IceUrls {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: IceUrls,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiatedProtocol {
    pub protocol: String,
    #[serde(rename = "iceServers", default)]
    pub ice_servers: Vec<IceServer>,
}

/// `result` of a successful `blade.connect`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectResult {
    #[serde(default)]
    pub session_restored: bool,
    pub sessionid: String,
    #[serde(default)]
    pub nodeid: String,
    #[serde(default)]
    pub identity: String,
    #[serde(default)]
    pub master_nodeid: String,
    pub authorization: Authorization,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<NegotiatedProtocol>,
}

// ── Builders ────────────────────────────────────────────────────────

pub fn blade_connect(params: ConnectParams) -> BladeResult<JsonRpcRequest> {
    Ok(JsonRpcRequest::new(
        method::CONNECT,
        serde_json::to_value(params)?,
    ))
}

/// Wrap a business method for the given protocol.
pub fn blade_execute(protocol: &str, method: &str, params: Value) -> JsonRpcRequest {
    JsonRpcRequest::new(
        method::EXECUTE,
        json!({
            "protocol": protocol,
            "method": method,
            "params": params,
        }),
    )
}

/// Pong for a `blade.ping`, echoing its timestamp.
pub fn blade_ping_response(id: impl Into<Value>, timestamp: Option<Value>) -> JsonRpcResponse {
    let mut result = Map::new();
    if let Some(ts) = timestamp {
        result.insert("timestamp".into(), ts);
    }
    JsonRpcResponse::result(id, Value::Object(result))
}

pub fn blade_disconnect_response(id: impl Into<Value>) -> JsonRpcResponse {
    JsonRpcResponse::result(id, json!({}))
}

// ── Validation ──────────────────────────────────────────────────────

/// Validate a correlated response against the request that produced it.
///
/// `blade.connect` results are returned as-is; every other result is
/// unwrapped (status `code`, nested JSON-RPC response, nested `result`).
pub fn parse_rpc_response(
    request: &JsonRpcRequest,
    response: &JsonRpcResponse,
) -> BladeResult<Value> {
    if response.jsonrpc != JSONRPC_VERSION {
        return Err(BladeError::InvalidMessage(format!(
            "unsupported jsonrpc version '{}' in reply to {}",
            response.jsonrpc, request.method
        )));
    }
    if let Some(error) = &response.error {
        return Err(BladeError::Rpc(error.clone()));
    }
    let Some(result) = &response.result else {
        return Err(BladeError::InvalidMessage(format!(
            "reply to {} carries neither result nor error",
            request.method
        )));
    };

    if request.method == method::CONNECT {
        Ok(result.clone())
    } else {
        unwrap_result(result.clone(), None)
    }
}

fn unwrap_result(mut result: Value, node_id: Option<Value>) -> BladeResult<Value> {
    if let Some(code) = result.get("code") {
        if !is_success_code(code) {
            return Err(BladeError::Rpc(result));
        }
    }

    let inner_node = result.get("node_id").cloned();
    let nested = result.get("result").filter(|v| !v.is_null()).cloned();

    match nested {
        None => {
            if let (Some(id), Some(obj)) = (node_id, result.as_object_mut()) {
                obj.insert("node_id".into(), id);
            }
            Ok(result)
        }
        Some(inner) if inner.get("jsonrpc").is_some() => {
            if let Some(error) = inner.get("error") {
                return Err(BladeError::Rpc(error.clone()));
            }
            let inner_result = inner.get("result").cloned().unwrap_or_else(|| json!({}));
            unwrap_result(inner_result, inner_node)
        }
        Some(inner) => Ok(inner),
    }
}

fn is_success_code(code: &Value) -> bool {
    match code {
        Value::String(s) => s == "200",
        Value::Number(n) => n.as_u64() == Some(200),
        Value::Null => true,
        _ => false,
    }
}
