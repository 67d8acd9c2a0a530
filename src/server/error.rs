//! Error types for language server session management

use std::path::PathBuf;
use std::time::Duration;

use crate::io::ProcessError;
use crate::lsp::LspError;

// ============================================================================
// Session Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// LSP client errors (initialization, requests, etc.)
    #[error("LSP error: {0}")]
    Lsp(#[from] LspError),

    /// Process management errors (start, stop, communication)
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    #[error("Configuration error: {0}")]
    Config(#[from] ServerConfigError),

    #[error("Failed to read document {path}")]
    DocumentRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open server stderr log {path}")]
    StderrLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Configuration Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ServerConfigError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid timeout: {timeout:?} - {reason}")]
    InvalidTimeout { timeout: Duration, reason: String },

    #[error("Working directory validation failed: {working_dir}")]
    WorkingDirectoryValidation {
        working_dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Workspace root must be absolute: {0}")]
    RelativeRoot(PathBuf),
}

// ============================================================================
// Context Helpers
// ============================================================================

impl ServerConfigError {
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn invalid_timeout(timeout: Duration, reason: impl Into<String>) -> Self {
        Self::InvalidTimeout {
            timeout,
            reason: reason.into(),
        }
    }
}
