//! Transport layer: one JSON-RPC request in, one JSON-RPC response out

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::error_code;
use crate::ClientError;

/// JSON-RPC 2.0 request envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Correlation id
    pub id: u64,
    /// Method name
    pub method: String,
    /// Positional parameters
    pub params: Vec<Value>,
}

impl JsonRpcRequest {
    /// Create a request envelope
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    /// Error code
    pub code: i64,
    /// Error message
    pub message: String,
    /// Optional additional data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorObject {
    /// Create an error object without data
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// JSON-RPC 2.0 response envelope
///
/// A missing `result` reads as `null`; whether the call failed is decided by `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Correlation id (null for some parse errors)
    #[serde(default)]
    pub id: Value,
    /// Result payload
    #[serde(default)]
    pub result: Value,
    /// Error payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorObject>,
}

impl JsonRpcResponse {
    /// Successful response
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            id: Value::from(id),
            result,
            error: None,
        }
    }

    /// Error response
    pub fn failure(id: u64, error: JsonRpcErrorObject) -> Self {
        Self {
            id: Value::from(id),
            result: Value::Null,
            error: Some(error),
        }
    }
}

/// Transport trait for RPC communication (object-safe)
///
/// Implementations deliver the request and hand back whatever envelope the node sent.
/// Only connectivity problems are errors here; JSON-RPC errors travel inside the response.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and wait for its response
    async fn send(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse, ClientError>;
}

#[derive(Debug, Clone)]
enum Scripted {
    Result(Value),
    Error(JsonRpcErrorObject),
    TransportFailure(String),
}

#[derive(Default)]
struct MockState {
    queued: HashMap<String, VecDeque<Scripted>>,
    fixed: HashMap<String, Scripted>,
    defaults: HashMap<String, Value>,
    calls: Vec<JsonRpcRequest>,
}

/// Scripted in-memory node for tests
///
/// Lookup order per method: queued responses (FIFO, consumed), then the fixed response,
/// then the built-in defaults, then `-32601 Method not found`. Clones share state, so a
/// test can keep one handle for scripting while the client owns another.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a mock with defaults for the common chain-info methods
    pub fn new() -> Self {
        let mut defaults = HashMap::new();
        defaults.insert("eth_chainId".to_string(), Value::from("0x1"));
        defaults.insert("net_version".to_string(), Value::from("1"));
        defaults.insert("eth_gasPrice".to_string(), Value::from("0x3b9aca00")); // 1 gwei
        defaults.insert("eth_blockNumber".to_string(), Value::from("0x100"));
        defaults.insert("eth_getBalance".to_string(), Value::from("0xde0b6b3a7640000")); // 1 ether
        defaults.insert("eth_getTransactionCount".to_string(), Value::from("0x0"));
        defaults.insert("eth_estimateGas".to_string(), Value::from("0x5208"));
        defaults.insert("eth_call".to_string(), Value::from("0x"));
        defaults.insert("eth_getCode".to_string(), Value::from("0x"));

        Self {
            state: Arc::new(Mutex::new(MockState {
                defaults,
                ..Default::default()
            })),
        }
    }

    /// Mock with no defaults at all
    pub fn empty() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Answer every call to `method` with `result`
    pub fn set_response(&self, method: &str, result: Value) {
        self.state
            .lock()
            .fixed
            .insert(method.to_string(), Scripted::Result(result));
    }

    /// Answer every call to `method` with a JSON-RPC error
    pub fn set_error(&self, method: &str, code: i64, message: &str) {
        self.state.lock().fixed.insert(
            method.to_string(),
            Scripted::Error(JsonRpcErrorObject::new(code, message)),
        );
    }

    /// Queue a one-shot result for `method`
    pub fn push_response(&self, method: &str, result: Value) {
        self.push(method, Scripted::Result(result));
    }

    /// Queue a one-shot JSON-RPC error for `method`
    pub fn push_error(&self, method: &str, code: i64, message: &str) {
        self.push(method, Scripted::Error(JsonRpcErrorObject::new(code, message)));
    }

    /// Queue a one-shot connectivity failure for `method`
    pub fn push_transport_failure(&self, method: &str, reason: &str) {
        self.push(method, Scripted::TransportFailure(reason.to_string()));
    }

    fn push(&self, method: &str, scripted: Scripted) {
        self.state
            .lock()
            .queued
            .entry(method.to_string())
            .or_default()
            .push_back(scripted);
    }

    /// Drop all scripted responses (defaults stay)
    pub fn clear_responses(&self) {
        let mut state = self.state.lock();
        state.queued.clear();
        state.fixed.clear();
    }

    /// Every request seen so far, in arrival order
    pub fn calls(&self) -> Vec<JsonRpcRequest> {
        self.state.lock().calls.clone()
    }

    /// Number of requests seen for `method`
    pub fn call_count(&self, method: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    fn answer(state: &mut MockState, method: &str) -> Option<Scripted> {
        if let Some(next) = state.queued.get_mut(method).and_then(VecDeque::pop_front) {
            return Some(next);
        }
        if let Some(fixed) = state.fixed.get(method) {
            return Some(fixed.clone());
        }
        state.defaults.get(method).cloned().map(Scripted::Result)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse, ClientError> {
        let scripted = {
            let mut state = self.state.lock();
            state.calls.push(request.clone());
            Self::answer(&mut state, &request.method)
        };

        match scripted {
            Some(Scripted::Result(result)) => Ok(JsonRpcResponse::success(request.id, result)),
            Some(Scripted::Error(error)) => Ok(JsonRpcResponse::failure(request.id, error)),
            Some(Scripted::TransportFailure(reason)) => Err(ClientError::Transport(reason)),
            None => Ok(JsonRpcResponse::failure(
                request.id,
                JsonRpcErrorObject::new(
                    error_code::METHOD_NOT_FOUND,
                    format!("Method not found: {}", request.method),
                ),
            )),
        }
    }
}

/// HTTP transport for real RPC communication
#[cfg(feature = "http")]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

#[cfg(feature = "http")]
impl HttpTransport {
    /// Create a transport with reqwest's default settings
    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
        }
    }

    /// Create a transport with a per-request timeout
    pub fn with_timeout(url: &str, timeout: std::time::Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// Endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse, ClientError> {
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        // Some nodes pair JSON-RPC errors with 4xx/5xx; the body decides.
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        serde_json::from_slice::<JsonRpcResponse>(&body).map_err(|e| {
            if status.is_success() {
                ClientError::decode(&request.method, e)
            } else {
                ClientError::Transport(format!("HTTP {status}"))
            }
        })
    }
}
