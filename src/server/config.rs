//! Configuration for language server sessions
//!
//! [`ServerConfig`] is built with [`ServerConfigBuilder`], which fills in
//! defaults and validates before a process is ever spawned.

use std::path::{Path, PathBuf};
use std::time::Duration;

use lsp_types::{Uri, WorkspaceFolder};

use crate::host::uri_from_path;
use crate::server::error::ServerConfigError;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default timeout for the `initialize` handshake (30 seconds)
///
/// Servers such as tsserver or rust-analyzer load the project during
/// initialization, which can take a while on a cold start.
pub const DEFAULT_INITIALIZATION_TIMEOUT_SECS: u64 = 30;

/// Default timeout for individual LSP requests (10 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Maximum allowed timeout for any single operation (5 minutes)
pub const MAX_TIMEOUT_SECS: u64 = 300;

// ============================================================================
// Core Configuration Types
// ============================================================================

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server executable
    pub command: String,

    pub args: Vec<String>,

    /// Working directory for the server process
    pub working_directory: PathBuf,

    /// Workspace roots announced to the server; the first is also `rootUri`
    pub workspace_roots: Vec<PathBuf>,

    pub lsp_config: LspConfig,

    /// Append server stderr here instead of tracing it
    pub stderr_log_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct LspConfig {
    pub initialization_timeout: Duration,
    pub request_timeout: Duration,
    pub client_name: String,
    pub client_version: String,
}

impl Default for LspConfig {
    fn default() -> Self {
        Self {
            initialization_timeout: Duration::from_secs(DEFAULT_INITIALIZATION_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            client_name: env!("CARGO_PKG_NAME").to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// `rootUri` for initialization
    pub fn root_uri(&self) -> Option<Uri> {
        self.workspace_roots
            .first()
            .and_then(|root| uri_from_path(root).ok())
    }

    pub fn workspace_folders(&self) -> Vec<WorkspaceFolder> {
        self.workspace_roots
            .iter()
            .filter_map(|root| {
                let uri = uri_from_path(root).ok()?;
                let name = root
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| root.display().to_string());
                Some(WorkspaceFolder { uri, name })
            })
            .collect()
    }
}

// ============================================================================
// Configuration Builder
// ============================================================================

#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    command: Option<String>,
    args: Vec<String>,
    workspace_roots: Vec<PathBuf>,
    request_timeout: Option<Duration>,
    stderr_log_path: Option<PathBuf>,
}

impl ServerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server executable
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn add_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|arg| arg.into()));
        self
    }

    /// The first root also becomes the server's working directory
    pub fn workspace_roots(mut self, roots: impl IntoIterator<Item = PathBuf>) -> Self {
        self.workspace_roots.extend(roots);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn stderr_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.stderr_log_path = Some(path.into());
        self
    }

    /// Build the configuration with validation
    pub fn build(self) -> Result<ServerConfig, ServerConfigError> {
        let command = self
            .command
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ServerConfigError::missing_field("command"))?;

        for root in &self.workspace_roots {
            if !root.is_absolute() {
                return Err(ServerConfigError::RelativeRoot(root.clone()));
            }
        }

        let working_directory = self
            .workspace_roots
            .first()
            .cloned()
            .ok_or_else(|| ServerConfigError::missing_field("workspace_roots"))?;
        Self::validate_working_directory(&working_directory)?;

        let mut lsp_config = LspConfig::default();
        if let Some(timeout) = self.request_timeout {
            Self::validate_timeout(timeout)?;
            lsp_config.request_timeout = timeout;
        }

        Ok(ServerConfig {
            command,
            args: self.args,
            working_directory,
            workspace_roots: self.workspace_roots,
            lsp_config,
            stderr_log_path: self.stderr_log_path,
        })
    }

    fn validate_working_directory(path: &Path) -> Result<(), ServerConfigError> {
        if !path.is_dir() {
            return Err(ServerConfigError::WorkingDirectoryValidation {
                working_dir: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "Working directory does not exist or is not a directory",
                ),
            });
        }
        Ok(())
    }

    fn validate_timeout(timeout: Duration) -> Result<(), ServerConfigError> {
        if timeout.is_zero() {
            return Err(ServerConfigError::invalid_timeout(
                timeout,
                "Timeout must be greater than zero",
            ));
        }
        if timeout > Duration::from_secs(MAX_TIMEOUT_SECS) {
            return Err(ServerConfigError::invalid_timeout(
                timeout,
                format!("Timeout exceeds the maximum of {MAX_TIMEOUT_SECS}s"),
            ));
        }
        Ok(())
    }
}
