//! JSON-RPC 2.0 protocol layer
//!
//! Request/response correlation, notifications in both directions, and
//! answering requests the server sends to the client.

use crate::lsp::framing::LspFraming;
use crate::io::transport::Transport;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{Level, debug, error, trace, warn};

use crate::log_lsp_message;

/// JSON-RPC 2.0 version identifier
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 error codes used by this client
pub mod error_codes {
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INTERNAL_ERROR: i32 = -32603;
}

// ============================================================================
// JSON-RPC Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    /// Successful response carrying `result`
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Error response
    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(JsonRpcErrorObject {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    pub fn method_not_found(id: Value, method: &str) -> Self {
        Self::error(
            id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {method}"),
        )
    }
}

/// Classification of a message read from the server
#[derive(Debug)]
enum InboundMessage {
    Response(JsonRpcResponse),
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

impl InboundMessage {
    /// Requests carry both `id` and `method`, notifications only `method`,
    /// responses only `id`.
    fn parse(message: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(message)?;
        let has_method = value.get("method").is_some();
        let has_id = value.get("id").is_some_and(|id| !id.is_null());

        match (has_method, has_id) {
            (true, true) => serde_json::from_value(value).map(Self::Request),
            (true, false) => serde_json::from_value(value).map(Self::Notification),
            (false, _) => serde_json::from_value(value).map(Self::Response),
        }
    }
}

// ============================================================================
// JSON-RPC Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum JsonRpcError {
    #[error("JSON-RPC server error ({code}): {message}")]
    Server {
        code: i32,
        message: String,
        data: Option<Value>,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(serde_json::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(serde_json::Error),

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Request was cancelled")]
    RequestCancelled,
}

// ============================================================================
// JSON-RPC Client
// ============================================================================

type NotificationHandler = Arc<dyn Fn(JsonRpcNotification) + Send + Sync>;
type RequestHandler = Arc<dyn Fn(JsonRpcRequest) -> JsonRpcResponse + Send + Sync>;
type PendingRequests = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

/// JSON-RPC client with request/response correlation
///
/// All request methods take `&self`, so one client can serve many
/// concurrent callers.
pub struct JsonRpcClient<T: Transport> {
    outbound_sender: mpsc::UnboundedSender<String>,
    request_id: AtomicU64,
    pending_requests: PendingRequests,
    notification_handler: Arc<Mutex<Option<NotificationHandler>>>,
    request_handler: Arc<Mutex<Option<RequestHandler>>>,
    _phantom: std::marker::PhantomData<fn() -> T>,
}

impl<T: Transport + 'static> JsonRpcClient<T> {
    pub fn new(transport: T) -> Self {
        let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel::<String>();
        let pending_requests: PendingRequests = Arc::new(Mutex::new(HashMap::new()));
        let notification_handler = Arc::new(Mutex::new(None::<NotificationHandler>));
        let request_handler = Arc::new(Mutex::new(None::<RequestHandler>));

        tokio::spawn(Self::transport_task(
            LspFraming::new(transport),
            outbound_receiver,
            Arc::clone(&pending_requests),
            Arc::clone(&notification_handler),
            Arc::clone(&request_handler),
        ));

        Self {
            outbound_sender,
            request_id: AtomicU64::new(1),
            pending_requests,
            notification_handler,
            request_handler,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Owns the framed transport; multiplexes outbound writes and inbound reads
    async fn transport_task(
        mut transport: LspFraming<T>,
        mut outbound_receiver: mpsc::UnboundedReceiver<String>,
        pending_requests: PendingRequests,
        notification_handler: Arc<Mutex<Option<NotificationHandler>>>,
        request_handler: Arc<Mutex<Option<RequestHandler>>>,
    ) {
        loop {
            tokio::select! {
                outbound = outbound_receiver.recv() => {
                    let Some(message) = outbound else {
                        trace!("Outbound channel closed");
                        break;
                    };
                    if let Err(e) = transport.send(&message).await {
                        error!("Failed to send message: {}", e);
                        break;
                    }
                }
                inbound = transport.receive() => {
                    let message = match inbound {
                        Ok(message) => message,
                        Err(e) => {
                            debug!("Transport receive ended: {}", e);
                            break;
                        }
                    };

                    match InboundMessage::parse(&message) {
                        Ok(InboundMessage::Response(response)) => {
                            Self::complete_request(response, &pending_requests).await;
                        }
                        Ok(InboundMessage::Notification(notification)) => {
                            trace!("Received notification: {}", notification.method);
                            let handler = notification_handler.lock().await.clone();
                            if let Some(handler) = handler {
                                handler(notification);
                            }
                        }
                        Ok(InboundMessage::Request(request)) => {
                            log_lsp_message!(Level::DEBUG, "incoming", request.method.as_str(), &request.params);
                            let handler = request_handler.lock().await.clone();
                            let response = match handler {
                                Some(handler) => handler(request),
                                None => JsonRpcResponse::method_not_found(request.id, &request.method),
                            };
                            let reply = match serde_json::to_string(&response) {
                                Ok(reply) => reply,
                                Err(e) => {
                                    warn!("Failed to serialize reply to server request: {}", e);
                                    continue;
                                }
                            };
                            if let Err(e) = transport.send(&reply).await {
                                error!("Failed to reply to server request: {}", e);
                                break;
                            }
                        }
                        Err(e) => {
                            debug!("Received unparseable message ({}): {}", e, message);
                        }
                    }
                }
            }
        }

        // Dropping the senders wakes every waiter with RequestCancelled
        outbound_receiver.close();
        pending_requests.lock().await.clear();
        trace!("Transport handler task finished");
    }

    async fn complete_request(response: JsonRpcResponse, pending_requests: &PendingRequests) {
        let Some(id) = response.id.as_u64() else {
            debug!("Received response with non-numeric id: {}", response.id);
            return;
        };

        match pending_requests.lock().await.remove(&id) {
            Some(sender) => {
                if sender.send(response).is_err() {
                    debug!("Response receiver dropped for request {}", id);
                }
            }
            None => debug!("Received response for unknown request {}", id),
        }
    }

    /// Set the handler for server-to-client notifications
    pub async fn on_notification<F>(&self, handler: F)
    where
        F: Fn(JsonRpcNotification) + Send + Sync + 'static,
    {
        *self.notification_handler.lock().await = Some(Arc::new(handler));
    }

    /// Set the handler for server-to-client requests
    pub async fn on_request<F>(&self, handler: F)
    where
        F: Fn(JsonRpcRequest) -> JsonRpcResponse + Send + Sync + 'static,
    {
        *self.request_handler.lock().await = Some(Arc::new(handler));
    }

    /// Send a request and wait at most `timeout` for its response
    pub async fn request<P, R>(
        &self,
        method: &str,
        params: Option<P>,
        timeout: Duration,
    ) -> Result<R, JsonRpcError>
    where
        P: Serialize,
        R: for<'de> Deserialize<'de>,
    {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let (response_sender, response_receiver) = oneshot::channel();
        self.pending_requests.lock().await.insert(id, response_sender);

        let request = JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Value::from(id),
            method: method.to_string(),
            params: params
                .map(|p| serde_json::to_value(p).map_err(JsonRpcError::Serialization))
                .transpose()?,
        };

        let request_json = serde_json::to_string(&request).map_err(JsonRpcError::Serialization)?;
        log_lsp_message!(Level::DEBUG, "outgoing", method, &request_json);

        if self.outbound_sender.send(request_json).is_err() {
            self.pending_requests.lock().await.remove(&id);
            return Err(JsonRpcError::Transport("Outbound channel closed".to_string()));
        }

        let response = match tokio::time::timeout(timeout, response_receiver).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(JsonRpcError::RequestCancelled),
            Err(_) => {
                self.pending_requests.lock().await.remove(&id);
                return Err(JsonRpcError::Timeout(timeout));
            }
        };

        if let Some(error) = response.error {
            return Err(JsonRpcError::Server {
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }

        // A missing result is tolerated as null: several servers omit it for void methods
        let result = response.result.unwrap_or(Value::Null);
        serde_json::from_value(result).map_err(JsonRpcError::Deserialization)
    }

    /// Send a notification
    pub async fn notify<P>(&self, method: &str, params: Option<P>) -> Result<(), JsonRpcError>
    where
        P: Serialize,
    {
        let notification = JsonRpcNotification {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params: params
                .map(|p| serde_json::to_value(p).map_err(JsonRpcError::Serialization))
                .transpose()?,
        };

        let notification_json =
            serde_json::to_string(&notification).map_err(JsonRpcError::Serialization)?;
        log_lsp_message!(Level::DEBUG, "outgoing", method, &notification_json);

        self.outbound_sender
            .send(notification_json)
            .map_err(|_| JsonRpcError::Transport("Outbound channel closed".to_string()))
    }

    /// Fail every outstanding request
    pub async fn close(&self) {
        let mut pending = self.pending_requests.lock().await;
        for (id, sender) in pending.drain() {
            debug!("JsonRpcClient: Cancelling pending request ID {}", id);
            let _ = sender.send(JsonRpcResponse::error(
                Value::from(id),
                error_codes::INTERNAL_ERROR,
                "Request cancelled because the connection closed",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::transport::{ChannelTransport, ChannelTransportHandle};

    #[cfg(feature = "test-logging")]
    crate::setup_test_logging!();

    fn framed(message: &str) -> String {
        LspFraming::<ChannelTransport>::frame(message)
    }

    /// Strip the header off a framed message sent by the client
    fn body(framed: &str) -> Value {
        let (_, body) = framed.split_once("\r\n\r\n").unwrap();
        serde_json::from_str(body).unwrap()
    }

    async fn next_sent(handle: &mut ChannelTransportHandle) -> Value {
        body(&handle.sent.recv().await.unwrap())
    }

    #[test]
    fn test_inbound_message_classification() {
        let response = InboundMessage::parse(r#"{"jsonrpc":"2.0","id":1,"result":null}"#);
        assert!(matches!(response, Ok(InboundMessage::Response(_))));

        let request = InboundMessage::parse(
            r#"{"jsonrpc":"2.0","id":0,"method":"window/workDoneProgress/create","params":{}}"#,
        );
        assert!(matches!(request, Ok(InboundMessage::Request(_))));

        let notification =
            InboundMessage::parse(r#"{"jsonrpc":"2.0","method":"$/progress","params":{}}"#);
        assert!(matches!(notification, Ok(InboundMessage::Notification(_))));

        assert!(InboundMessage::parse("not json").is_err());
    }

    #[tokio::test]
    async fn test_request_response_correlation() {
        let (transport, mut handle) = ChannelTransport::pair();
        let client = Arc::new(JsonRpcClient::new(transport));

        let first = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .request::<_, String>("first", Some(1), Duration::from_secs(5))
                    .await
            })
        };
        let first_sent = next_sent(&mut handle).await;

        let second = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .request::<_, String>("second", Some(2), Duration::from_secs(5))
                    .await
            })
        };
        let second_sent = next_sent(&mut handle).await;

        // Answer out of order
        for (sent, result) in [(&second_sent, "two"), (&first_sent, "one")] {
            let reply = serde_json::json!({"jsonrpc": "2.0", "id": sent["id"], "result": result});
            handle.inbound.send(framed(&reply.to_string())).unwrap();
        }

        assert_eq!(first.await.unwrap().unwrap(), "one");
        assert_eq!(second.await.unwrap().unwrap(), "two");
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let (transport, mut handle) = ChannelTransport::pair();
        let client = JsonRpcClient::new(transport);

        let request = client.request::<Value, Value>("textDocument/hover", None, Duration::from_secs(5));
        let responder = async {
            let sent = next_sent(&mut handle).await;
            let reply = serde_json::json!({
                "jsonrpc": "2.0",
                "id": sent["id"],
                "error": {"code": -32801, "message": "content modified"}
            });
            handle.inbound.send(framed(&reply.to_string())).unwrap();
        };

        let (result, _) = tokio::join!(request, responder);
        match result {
            Err(JsonRpcError::Server { code, message, .. }) => {
                assert_eq!(code, -32801);
                assert_eq!(message, "content modified");
            }
            other => panic!("Expected server error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let (transport, _handle) = ChannelTransport::pair();
        let client = JsonRpcClient::new(transport);

        let result = client
            .request::<Value, Value>("slow", None, Duration::from_millis(20))
            .await;
        assert!(matches!(result, Err(JsonRpcError::Timeout(_))));
        assert!(client.pending_requests.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_server_request_is_answered_by_handler() {
        let (transport, mut handle) = ChannelTransport::pair();
        let client = JsonRpcClient::new(transport);
        client
            .on_request(|request| JsonRpcResponse::success(request.id, Value::Null))
            .await;

        let request = r#"{"jsonrpc":"2.0","id":"token-1","method":"window/workDoneProgress/create","params":{"token":"x"}}"#;
        handle.inbound.send(framed(request)).unwrap();

        let reply = next_sent(&mut handle).await;
        assert_eq!(reply["id"], "token-1");
        assert!(reply["result"].is_null());
        assert!(reply.get("error").is_none());
    }

    #[tokio::test]
    async fn test_server_request_without_handler_gets_method_not_found() {
        let (transport, mut handle) = ChannelTransport::pair();
        let _client = JsonRpcClient::new(transport);

        let request = r#"{"jsonrpc":"2.0","id":7,"method":"workspace/applyEdit"}"#;
        handle.inbound.send(framed(request)).unwrap();

        let reply = next_sent(&mut handle).await;
        assert_eq!(reply["id"], 7);
        assert_eq!(reply["error"]["code"], error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_notifications_reach_handler() {
        let (transport, handle) = ChannelTransport::pair();
        let client = JsonRpcClient::new(transport);

        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        client
            .on_notification(move |notification| {
                let _ = seen_tx.send(notification.method);
            })
            .await;

        let notification = r#"{"jsonrpc":"2.0","method":"window/logMessage","params":{"type":3,"message":"hi"}}"#;
        handle.inbound.send(framed(notification)).unwrap();

        assert_eq!(seen_rx.recv().await.unwrap(), "window/logMessage");
    }

    #[tokio::test]
    async fn test_closed_transport_cancels_requests() {
        let (transport, handle) = ChannelTransport::pair();
        let client = JsonRpcClient::new(transport);
        drop(handle);

        let result = client
            .request::<Value, Value>("textDocument/documentSymbol", None, Duration::from_secs(5))
            .await;
        assert!(matches!(
            result,
            Err(JsonRpcError::RequestCancelled) | Err(JsonRpcError::Transport(_))
        ));
    }
}
