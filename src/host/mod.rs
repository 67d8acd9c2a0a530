//! Host capabilities
//!
//! The indexer only talks to the language host through these traits: a
//! symbol provider, a hover provider and a notifier. The LSP-backed
//! implementation lives in [`lsp_host`]; tests use
//! [`testing::MockLanguageHost`].

use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use lsp_types::{DocumentSymbol, Position, Uri};

use crate::index::Hover;
use crate::lsp::LspError;
use crate::server::SessionError;

pub mod lsp_host;
pub mod notify;
#[cfg(test)]
pub mod testing;

pub use notify::{ConsoleNotifier, Notifier};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("Language server request failed: {0}")]
    Lsp(#[from] LspError),

    #[error("Cannot build a file URI for {path}: {reason}")]
    InvalidUri { path: PathBuf, reason: String },

    #[error("Failed to open document {path}")]
    DocumentOpen {
        path: PathBuf,
        #[source]
        source: SessionError,
    },

    #[error("Query task aborted: {0}")]
    QueryAborted(String),

    /// Only produced by test hosts
    #[cfg(test)]
    #[error("Injected failure: {0}")]
    Injected(String),
}

// ============================================================================
// Document identity
// ============================================================================

/// An absolute source file path and its `file://` URI
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentId {
    path: PathBuf,
    uri: Uri,
}

impl DocumentId {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, HostError> {
        let path = path.as_ref().to_path_buf();
        let uri = uri_from_path(&path)?;
        Ok(Self { path, uri })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// `file://` URI for an absolute path, percent-encoding reserved bytes
pub fn uri_from_path(path: &Path) -> Result<Uri, HostError> {
    if !path.is_absolute() {
        return Err(HostError::InvalidUri {
            path: path.to_path_buf(),
            reason: "path is not absolute".to_string(),
        });
    }

    let raw = path.to_string_lossy();
    let raw = raw.replace('\\', "/");
    let mut encoded = String::with_capacity(raw.len() + 8);
    encoded.push_str("file://");
    if !raw.starts_with('/') {
        // Windows drive paths: file:///C:/...
        encoded.push('/');
    }
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' | b':' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }

    Uri::from_str(&encoded).map_err(|e| HostError::InvalidUri {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

// ============================================================================
// Capabilities
// ============================================================================

/// Yields the top-level symbol tree of a document
#[async_trait]
pub trait SymbolProvider: Send + Sync {
    async fn document_symbols(
        &self,
        document: &DocumentId,
    ) -> Result<Vec<DocumentSymbol>, HostError>;
}

/// Yields every hover at a position; an empty vector means "nothing here"
#[async_trait]
pub trait HoverProvider: Send + Sync {
    async fn hovers(
        &self,
        document: &DocumentId,
        position: Position,
    ) -> Result<Vec<Hover>, HostError>;
}

/// Both query capabilities
pub trait LanguageHost: SymbolProvider + HoverProvider {}

impl<T: SymbolProvider + HoverProvider + ?Sized> LanguageHost for T {}
