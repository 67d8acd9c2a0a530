use std::path::PathBuf;

use crate::host::HostError;

/// Errors raised while indexing one document
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("No active document to index")]
    NoActiveDocument,

    #[error("No workspace root contains {}", file.display())]
    NoWorkspaceRoot { file: PathBuf },

    #[error("Malformed hover: {reason}")]
    MalformedHover { reason: String },

    #[error("Hover query failed for symbol '{symbol}'")]
    HoverQueryFailed {
        symbol: String,
        #[source]
        source: HostError,
    },

    #[error("Document symbol query failed")]
    SymbolQueryFailed(#[source] HostError),

    #[error("Failed to write {}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize index: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IndexError {
    pub fn malformed_hover(reason: impl Into<String>) -> Self {
        Self::MalformedHover {
            reason: reason.into(),
        }
    }
}
