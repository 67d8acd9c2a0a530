//! Sidecar output

use tracing::{debug, info};

use crate::index::builder::IndexEntry;
use crate::index::error::IndexError;
use crate::index::output_path::SidecarLocation;
use crate::io::FileSystemTrait;

/// Serializes index entries and writes them next to the workspace
pub struct SidecarWriter<F: FileSystemTrait> {
    file_system: F,
    pretty_json: bool,
}

impl<F: FileSystemTrait> SidecarWriter<F> {
    pub fn new(file_system: F) -> Self {
        Self {
            file_system,
            pretty_json: false,
        }
    }

    pub fn pretty(mut self, pretty_json: bool) -> Self {
        self.pretty_json = pretty_json;
        self
    }

    pub fn to_json(&self, entries: &[IndexEntry]) -> Result<Vec<u8>, IndexError> {
        let bytes = if self.pretty_json {
            serde_json::to_vec_pretty(entries)?
        } else {
            serde_json::to_vec(entries)?
        };
        Ok(bytes)
    }

    /// Create the parent directories and overwrite the sidecar file
    pub fn write(&self, location: &SidecarLocation, entries: &[IndexEntry]) -> Result<(), IndexError> {
        let bytes = self.to_json(entries)?;
        let write_failed = |source| IndexError::WriteFailed {
            path: location.path.clone(),
            source,
        };

        if let Some(parent) = location.path.parent() {
            debug!("Creating sidecar directory {}", parent.display());
            self.file_system
                .create_dir_all(parent)
                .map_err(write_failed)?;
        }

        self.file_system
            .write(&location.path, &bytes)
            .map_err(write_failed)?;

        info!(
            "Wrote {} entries ({} bytes) to {}",
            entries.len(),
            bytes.len(),
            location.path.display()
        );
        Ok(())
    }
}
