//! Language server session management
//!
//! A [`LanguageServerSession`] owns the server process and the LSP client
//! talking to it. If `start` succeeds, the session is fully initialized.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use lsp_types::ClientInfo;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{Level, debug, info, warn};

use crate::host::DocumentId;
use crate::io::{ServerProcess, StdioTransport, StopMode};
use crate::log_timing;
use crate::lsp::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::lsp::LspClient;
use crate::server::config::ServerConfig;
use crate::server::error::SessionError;

/// Version sent with every `didOpen`; documents are never edited
const INITIAL_DOCUMENT_VERSION: i32 = 1;

pub struct LanguageServerSession {
    config: ServerConfig,
    process: ServerProcess,
    lsp_client: LspClient<StdioTransport>,
    /// Documents already announced with `didOpen`
    open_documents: Mutex<HashSet<PathBuf>>,
    started_at: Instant,
}

impl LanguageServerSession {
    /// Spawn the server and complete the `initialize` handshake
    pub async fn start(config: ServerConfig) -> Result<Self, SessionError> {
        info!("Starting language server session: {}", config.command);
        debug!("Working directory: {:?}", config.working_directory);
        debug!("Workspace roots: {:?}", config.workspace_roots);

        // Step 1: Spawn the server process
        let mut process = ServerProcess::new(
            config.command.clone(),
            config.args.clone(),
            Some(config.working_directory.clone()),
        );

        match &config.stderr_log_path {
            Some(path) => process.on_stderr_line(stderr_log_writer(path)?),
            None => process.on_stderr_line(|line| debug!(target: "server_stderr", "{}", line)),
        }

        process.spawn()?;

        // Step 2: Transport and client
        let transport = process.take_transport()?;
        let mut lsp_client = LspClient::new(transport);

        // Step 3: Server-to-client traffic, wired before initialize since
        // some servers send requests during the handshake
        lsp_client.rpc_client().on_request(answer_server_request).await;
        lsp_client.rpc_client().on_notification(trace_server_notification).await;

        // Step 4: Handshake under the initialization timeout
        let started = Instant::now();
        lsp_client.set_request_timeout(config.lsp_config.initialization_timeout);
        let client_info = ClientInfo {
            name: config.lsp_config.client_name.clone(),
            version: Some(config.lsp_config.client_version.clone()),
        };
        let init_result = lsp_client
            .initialize(config.root_uri(), config.workspace_folders(), client_info)
            .await;
        lsp_client.set_request_timeout(config.lsp_config.request_timeout);

        let init_result = match init_result {
            Ok(result) => result,
            Err(e) => {
                warn!("Language server initialization failed: {}", e);
                if let Err(e) = process.stop(StopMode::Force).await {
                    debug!("Stopping failed language server: {}", e);
                }
                return Err(e.into());
            }
        };
        log_timing!(Level::DEBUG, "initialize", started.elapsed());

        if let Some(capabilities) = lsp_client.server_capabilities() {
            if capabilities.document_symbol_provider.is_none() {
                warn!("Language server does not advertise documentSymbol support");
            }
            if capabilities.hover_provider.is_none() {
                warn!("Language server does not advertise hover support");
            }
        }

        if let Some(server_info) = &init_result.server_info {
            info!(
                "Connected to {} {}",
                server_info.name,
                server_info.version.as_deref().unwrap_or("")
            );
        }

        Ok(Self {
            config,
            process,
            lsp_client,
            open_documents: Mutex::new(HashSet::new()),
            started_at: Instant::now(),
        })
    }

    /// Graceful async cleanup - consumes self to prevent further use
    ///
    /// LSP shutdown/exit first, then process termination.
    pub async fn close(mut self) -> Result<(), SessionError> {
        info!("Shutting down language server session");

        let shutdown_result = tokio::time::timeout(
            self.config.lsp_config.request_timeout,
            self.lsp_client.shutdown(),
        )
        .await;

        match shutdown_result {
            Ok(Ok(())) => debug!("LSP client shutdown completed"),
            Ok(Err(e)) => warn!("LSP client shutdown error: {}", e),
            Err(_) => warn!("LSP client shutdown timed out"),
        }

        // Drops pending requests without a second shutdown attempt
        self.lsp_client.close().await;

        if self.process.is_running() {
            self.process.stop(StopMode::Graceful).await?;
        }

        info!(
            "Language server session closed after {:?}",
            self.started_at.elapsed()
        );
        Ok(())
    }

    pub fn client(&self) -> &LspClient<StdioTransport> {
        &self.lsp_client
    }

    /// Send `didOpen` for `document` unless it was already opened
    pub async fn ensure_document_open(&self, document: &DocumentId) -> Result<(), SessionError> {
        // Held across the notification so concurrent callers open only once
        let mut open_documents = self.open_documents.lock().await;
        if open_documents.contains(document.path()) {
            return Ok(());
        }

        let text = tokio::fs::read_to_string(document.path())
            .await
            .map_err(|source| SessionError::DocumentRead {
                path: document.path().to_path_buf(),
                source,
            })?;

        let language_id = language_id_for(document.path());
        debug!(
            "Opening {} as {} ({} bytes)",
            document.path().display(),
            language_id,
            text.len()
        );

        self.lsp_client
            .open_text_document(
                document.uri().clone(),
                language_id,
                INITIAL_DOCUMENT_VERSION,
                text,
            )
            .await?;

        open_documents.insert(document.path().to_path_buf());
        Ok(())
    }

}

/// Force cleanup fallback if `close()` wasn't called
impl Drop for LanguageServerSession {
    fn drop(&mut self) {
        if self.process.is_running() {
            warn!("LanguageServerSession dropped without calling close(), killing the server");
            self.process.kill_now();
        }
    }
}

/// LSP language identifier for a file, by extension
pub fn language_id_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("ts") | Some("mts") | Some("cts") => "typescript",
        Some("tsx") => "typescriptreact",
        Some("js") | Some("mjs") | Some("cjs") => "javascript",
        Some("jsx") => "javascriptreact",
        Some("rs") => "rust",
        Some("py") | Some("pyi") => "python",
        Some("go") => "go",
        Some("c") => "c",
        Some("cpp") | Some("cc") | Some("cxx") | Some("c++") => "cpp",
        Some("h") | Some("hpp") | Some("hh") | Some("hxx") | Some("h++") => "cpp",
        Some("java") => "java",
        Some("cs") => "csharp",
        Some("rb") => "ruby",
        Some("lua") => "lua",
        Some("json") => "json",
        Some("md") => "markdown",
        _ => "plaintext",
    }
}

/// Answer the requests servers commonly send to clients
fn answer_server_request(request: JsonRpcRequest) -> JsonRpcResponse {
    match request.method.as_str() {
        "window/workDoneProgress/create"
        | "client/registerCapability"
        | "client/unregisterCapability" => {
            debug!("Accepting {} request: {:?}", request.method, request.id);
            JsonRpcResponse::success(request.id, Value::Null)
        }
        "workspace/configuration" => {
            // No settings to offer: one null per requested item
            let items = request
                .params
                .as_ref()
                .and_then(|params| params.get("items"))
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            JsonRpcResponse::success(request.id, Value::Array(vec![Value::Null; items]))
        }
        _ => {
            debug!("Rejecting unsupported server request: {}", request.method);
            JsonRpcResponse::method_not_found(request.id, &request.method)
        }
    }
}

fn trace_server_notification(notification: JsonRpcNotification) {
    match notification.method.as_str() {
        "window/logMessage" | "window/showMessage" => {
            let message = notification
                .params
                .as_ref()
                .and_then(|params| params.get("message"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            debug!(target: "server_log", "{}", message);
        }
        method => tracing::trace!("Ignoring server notification: {}", method),
    }
}

/// Stderr handler appending timestamped lines to `path`
fn stderr_log_writer(path: &Path) -> Result<impl Fn(String) + Send + Sync + 'static, SessionError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| SessionError::StderrLog {
            path: path.to_path_buf(),
            source,
        })?;
    let file = Arc::new(std::sync::Mutex::new(file));

    Ok(move |line: String| {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        // Intentional .unwrap() - poisoned mutex indicates serious bug, panic is appropriate
        let mut file = file.lock().unwrap();
        if let Err(e) = writeln!(file, "[{timestamp}] {line}") {
            warn!("Failed to write server stderr log: {}", e);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::config::ServerConfigBuilder;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::tempdir;

    #[cfg(feature = "test-logging")]
    crate::setup_test_logging!();

    fn request(method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: json!(3),
            method: method.to_string(),
            params,
        }
    }

    #[test]
    fn test_language_id_for() {
        assert_eq!(language_id_for(Path::new("/ws/src/a.ts")), "typescript");
        assert_eq!(language_id_for(Path::new("/ws/App.tsx")), "typescriptreact");
        assert_eq!(language_id_for(Path::new("/ws/lib.rs")), "rust");
        assert_eq!(language_id_for(Path::new("/ws/x.hpp")), "cpp");
        assert_eq!(language_id_for(Path::new("/ws/Makefile")), "plaintext");
    }

    #[test]
    fn test_progress_and_registration_requests_accepted() {
        for method in ["window/workDoneProgress/create", "client/registerCapability"] {
            let response = answer_server_request(request(method, Some(json!({"token": "t"}))));
            assert_eq!(response.id, json!(3));
            assert_eq!(response.result, Some(Value::Null));
            assert!(response.error.is_none());
        }
    }

    #[test]
    fn test_configuration_request_gets_null_per_item() {
        let params = json!({"items": [{"section": "typescript"}, {"section": "javascript"}]});
        let response = answer_server_request(request("workspace/configuration", Some(params)));
        assert_eq!(response.result, Some(json!([null, null])));

        let response = answer_server_request(request("workspace/configuration", None));
        assert_eq!(response.result, Some(json!([])));
    }

    #[test]
    fn test_unknown_request_is_method_not_found() {
        let response = answer_server_request(request("workspace/applyEdit", None));
        let error = response.error.unwrap();
        assert_eq!(error.code, -32601);
        assert!(error.message.contains("workspace/applyEdit"));
    }

    #[test]
    fn test_stderr_log_writer_appends_timestamped_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("server.log");

        let write = stderr_log_writer(&path).unwrap();
        write("first".to_string());
        write("second".to_string());

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('[') && lines[0].ends_with("] first"));
        assert!(lines[1].ends_with("] second"));
    }

    #[tokio::test]
    async fn test_start_fails_for_missing_executable() {
        let dir = tempdir().unwrap();
        let config = ServerConfigBuilder::new()
            .command("definitely-not-a-language-server-12345")
            .workspace_roots([dir.path().to_path_buf()])
            .build()
            .unwrap();

        let result = LanguageServerSession::start(config).await;
        assert!(matches!(result, Err(SessionError::Process(_))));
    }

    #[tokio::test]
    async fn test_start_fails_when_server_exits_immediately() {
        let dir = tempdir().unwrap();
        let config = ServerConfigBuilder::new()
            .command("true")
            .workspace_roots([dir.path().to_path_buf()])
            .request_timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        let result = LanguageServerSession::start(config).await;
        assert!(matches!(result, Err(SessionError::Lsp(_))));
    }
}
