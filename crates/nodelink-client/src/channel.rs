//! Request/response correlation over a [`Transport`]

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::transport::{JsonRpcRequest, Transport};
use crate::ClientError;

/// Shared, cloneable handle for issuing JSON-RPC calls
///
/// All clones draw request ids from one counter, so ids are unique and strictly
/// increasing across every call made through the channel. The channel never retries.
#[derive(Clone)]
pub struct RpcChannel {
    transport: Arc<dyn Transport>,
    next_id: Arc<AtomicU64>,
}

impl RpcChannel {
    /// Wrap a transport
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::from_arc(Arc::new(transport))
    }

    /// Wrap an already shared transport
    pub fn from_arc(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Issue `method` and wait for its raw result
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, ClientError> {
        let id = self.next_id();
        debug!(method, id, "rpc call");
        let payload = Value::Array(params.clone());
        trace!(method, id, params = %payload, "rpc request");

        let response = self
            .transport
            .send(JsonRpcRequest::new(id, method, params))
            .await?;

        if let Some(error) = response.error {
            debug!(method, id, code = error.code, message = %error.message, "rpc error");
            return Err(ClientError::Rpc {
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }

        if !id_matches(&response.id, id) {
            return Err(ClientError::decode(
                method,
                format!("response id {} does not match request id {}", response.id, id),
            ));
        }

        trace!(method, id, result = %response.result, "rpc response");
        Ok(response.result)
    }

    /// Issue `method` and deserialize its result
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, ClientError> {
        let value = self.call(method, params).await?;
        serde_json::from_value(value).map_err(|e| ClientError::decode(method, e))
    }

    /// Issue `method` on the current runtime and return immediately
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime, like `tokio::spawn`.
    pub fn call_detached(&self, method: &str, params: Vec<Value>) -> PendingCall<Value> {
        let channel = self.clone();
        let name = method.to_string();
        let handle = tokio::spawn(async move { channel.call(&name, params).await });
        PendingCall::new(method, handle)
    }

    /// Typed [`RpcChannel::call_detached`]
    pub fn request_detached<T>(&self, method: &str, params: Vec<Value>) -> PendingCall<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let channel = self.clone();
        let name = method.to_string();
        let handle = tokio::spawn(async move { channel.request::<T>(&name, params).await });
        PendingCall::new(method, handle)
    }
}

impl std::fmt::Debug for RpcChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcChannel")
            .field("next_id", &self.next_id.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

fn id_matches(response_id: &Value, id: u64) -> bool {
    match response_id {
        Value::Number(n) => n.as_u64() == Some(id),
        Value::String(s) => s.parse::<u64>().ok() == Some(id),
        _ => false,
    }
}

/// A call running in the background
///
/// Await it (or call [`PendingCall::wait`]) for the result. Dropping it does not
/// cancel the request; use [`PendingCall::abort`] for that.
pub struct PendingCall<T> {
    method: String,
    handle: JoinHandle<Result<T, ClientError>>,
}

impl<T> PendingCall<T> {
    fn new(method: &str, handle: JoinHandle<Result<T, ClientError>>) -> Self {
        Self {
            method: method.to_string(),
            handle,
        }
    }

    /// Method this call was issued for
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Whether the result is ready
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop waiting; the request may already have reached the node
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Wait for the result
    pub async fn wait(self) -> Result<T, ClientError> {
        self.await
    }
}

impl<T> Future for PendingCall<T> {
    type Output = Result<T, ClientError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let polled = Pin::new(&mut self.handle).poll(cx);
        match polled {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(e)) if e.is_cancelled() => {
                Poll::Ready(Err(ClientError::Cancelled(self.method.clone())))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Err(ClientError::Transport(format!(
                "{} task failed: {}",
                self.method, e
            )))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use serde_json::json;

    #[tokio::test]
    async fn test_ids_start_at_one_and_increase() {
        let mock = MockTransport::new();
        let channel = RpcChannel::new(mock.clone());
        channel.call("eth_chainId", vec![]).await.unwrap();
        channel.clone().call("eth_blockNumber", vec![]).await.unwrap();

        let ids: Vec<u64> = mock.calls().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_rpc_error_is_surfaced() {
        let mock = MockTransport::new();
        mock.set_error("eth_sendTransaction", -32000, "The method eth_sendTransaction is not supported");
        let channel = RpcChannel::new(mock);

        match channel.call("eth_sendTransaction", vec![json!({})]).await {
            Err(ClientError::Rpc { code, message, .. }) => {
                assert_eq!(code, -32000);
                assert!(message.contains("not supported"));
            }
            other => panic!("expected Rpc error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_typed_request_shape_mismatch() {
        let mock = MockTransport::new();
        mock.set_response("eth_accounts", json!({"not": "a list"}));
        let channel = RpcChannel::new(mock);
        let err = channel
            .request::<Vec<String>>("eth_accounts", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[tokio::test]
    async fn test_detached_call() {
        let channel = RpcChannel::new(MockTransport::new());
        let pending = channel.request_detached::<String>("eth_chainId", vec![]);
        assert_eq!(pending.method(), "eth_chainId");
        assert_eq!(pending.wait().await.unwrap(), "0x1");
    }

    #[test]
    fn test_id_matching() {
        assert!(id_matches(&json!(4), 4));
        assert!(id_matches(&json!("4"), 4));
        assert!(!id_matches(&json!(5), 4));
        assert!(!id_matches(&Value::Null, 4));
    }
}
