//! High-level LSP client
//!
//! Typed wrapper over [`JsonRpcClient`] covering the lifecycle handshake and
//! the document queries the indexer issues.

use crate::io::transport::Transport;
use crate::lsp::protocol::{JsonRpcClient, JsonRpcError};
use lsp_types::{
    ClientCapabilities, ClientInfo, DidOpenTextDocumentParams, DocumentSymbolClientCapabilities,
    DocumentSymbolParams, DocumentSymbolResponse, HoverClientCapabilities, HoverParams,
    InitializeParams, InitializeResult, InitializedParams, MarkupKind, Position,
    TextDocumentClientCapabilities, TextDocumentIdentifier, TextDocumentItem,
    TextDocumentPositionParams, Uri, WorkspaceClientCapabilities, WorkspaceFolder,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// LSP Client Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LspError {
    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] JsonRpcError),

    #[error("LSP client not initialized")]
    NotInitialized,

    #[error("LSP protocol error: {0}")]
    Protocol(String),

    #[error("LSP request timeout: {method}")]
    RequestTimeout { method: String },
}

// ============================================================================
// High-level LSP Client
// ============================================================================

pub struct LspClient<T: Transport> {
    rpc_client: JsonRpcClient<T>,
    initialized: bool,
    request_timeout: Duration,
    server_capabilities: Option<lsp_types::ServerCapabilities>,
}

impl<T: Transport + 'static> LspClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            rpc_client: JsonRpcClient::new(transport),
            initialized: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            server_capabilities: None,
        }
    }

    /// Timeout applied to every subsequent request
    pub fn set_request_timeout(&mut self, timeout: Duration) {
        self.request_timeout = timeout;
    }

    /// Perform the `initialize`/`initialized` handshake
    pub async fn initialize(
        &mut self,
        root_uri: Option<Uri>,
        workspace_folders: Vec<WorkspaceFolder>,
        client_info: ClientInfo,
    ) -> Result<InitializeResult, LspError> {
        if self.initialized {
            return Err(LspError::Protocol("Client already initialized".to_string()));
        }

        info!("Initializing LSP client");

        let params = InitializeParams {
            process_id: Some(std::process::id()),
            #[allow(deprecated)]
            root_uri,
            capabilities: ClientCapabilities {
                workspace: Some(WorkspaceClientCapabilities {
                    workspace_folders: Some(true),
                    configuration: Some(true),
                    ..Default::default()
                }),
                text_document: Some(TextDocumentClientCapabilities {
                    hover: Some(HoverClientCapabilities {
                        dynamic_registration: Some(false),
                        content_format: Some(vec![MarkupKind::Markdown, MarkupKind::PlainText]),
                    }),
                    document_symbol: Some(DocumentSymbolClientCapabilities {
                        dynamic_registration: Some(false),
                        symbol_kind: None,
                        hierarchical_document_symbol_support: Some(true),
                        tag_support: None,
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
            workspace_folders: (!workspace_folders.is_empty()).then_some(workspace_folders),
            client_info: Some(client_info),
            ..Default::default()
        };

        let result: InitializeResult = self.call("initialize", Some(params)).await?;

        debug!("LSP server capabilities: {:?}", result.capabilities);
        self.server_capabilities = Some(result.capabilities.clone());

        self.rpc_client
            .notify("initialized", Some(InitializedParams {}))
            .await?;

        self.initialized = true;
        info!("LSP client initialized successfully");

        Ok(result)
    }

    /// Send `shutdown` then `exit`; a no-op before initialization
    pub async fn shutdown(&mut self) -> Result<(), LspError> {
        if !self.initialized {
            return Ok(());
        }

        info!("Shutting down LSP client");

        let _: Value = self.call("shutdown", None::<Value>).await?;
        self.rpc_client.notify("exit", None::<Value>).await?;

        self.initialized = false;
        info!("LSP client shutdown complete");

        Ok(())
    }

    pub fn server_capabilities(&self) -> Option<&lsp_types::ServerCapabilities> {
        self.server_capabilities.as_ref()
    }

    /// Cancel outstanding requests and stop issuing new ones
    ///
    /// Never sends `shutdown`; call [`LspClient::shutdown`] first for a clean exit.
    /// Does not stop the process.
    pub async fn close(&mut self) {
        self.initialized = false;
        self.rpc_client.close().await;
    }

    pub fn rpc_client(&self) -> &JsonRpcClient<T> {
        &self.rpc_client
    }

    // ------------------------------------------------------------------------
    // Document operations
    // ------------------------------------------------------------------------

    /// Notify the server that a document is open
    pub async fn open_text_document(
        &self,
        uri: Uri,
        language_id: &str,
        version: i32,
        text: String,
    ) -> Result<(), LspError> {
        self.ensure_initialized()?;
        let params = DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri,
                language_id: language_id.to_string(),
                version,
                text,
            },
        };
        self.rpc_client
            .notify("textDocument/didOpen", Some(params))
            .await?;
        Ok(())
    }

    /// `textDocument/documentSymbol`; a null result is an empty nested list
    pub async fn document_symbols(&self, uri: Uri) -> Result<DocumentSymbolResponse, LspError> {
        self.ensure_initialized()?;
        let params = DocumentSymbolParams {
            text_document: TextDocumentIdentifier { uri },
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        };

        let response: Option<DocumentSymbolResponse> =
            self.call("textDocument/documentSymbol", Some(params)).await?;
        Ok(response.unwrap_or(DocumentSymbolResponse::Nested(Vec::new())))
    }

    /// `textDocument/hover`, left as raw JSON so callers can judge its shape
    pub async fn hover(&self, uri: Uri, position: Position) -> Result<Option<Value>, LspError> {
        self.ensure_initialized()?;
        let params = HoverParams {
            text_document_position_params: TextDocumentPositionParams {
                text_document: TextDocumentIdentifier { uri },
                position,
            },
            work_done_progress_params: Default::default(),
        };

        let response: Value = self.call("textDocument/hover", Some(params)).await?;
        Ok((!response.is_null()).then_some(response))
    }

    fn ensure_initialized(&self) -> Result<(), LspError> {
        if self.initialized {
            Ok(())
        } else {
            Err(LspError::NotInitialized)
        }
    }

    async fn call<P, R>(&self, method: &str, params: Option<P>) -> Result<R, LspError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        match self
            .rpc_client
            .request(method, params, self.request_timeout)
            .await
        {
            Ok(result) => Ok(result),
            Err(JsonRpcError::Timeout(_)) => Err(LspError::RequestTimeout {
                method: method.to_string(),
            }),
            Err(e) => Err(LspError::JsonRpc(e)),
        }
    }
}
