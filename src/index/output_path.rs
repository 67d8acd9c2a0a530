//! Sidecar location resolution

use std::path::{Path, PathBuf};

use crate::index::error::IndexError;

/// Directory created under the workspace root to hold sidecar files
pub const DEFAULT_OUTPUT_DIR: &str = ".hovercraft";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarLocation {
    /// The workspace root that contains the source file
    pub root: PathBuf,
    /// Source path relative to `root`
    pub relative: PathBuf,
    /// `<root>/<output_dir>/<relative>.json`
    pub path: PathBuf,
}

/// Map a source file to its sidecar path under the innermost containing root
///
/// Containment is component-wise, so `/ws2/a.ts` is not inside `/ws`.
pub fn resolve_output_path(
    file: &Path,
    roots: &[PathBuf],
    output_dir: &str,
) -> Result<SidecarLocation, IndexError> {
    let mut best: Option<(&PathBuf, &Path)> = None;
    for root in roots {
        let Ok(relative) = file.strip_prefix(root) else {
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        // Strictly longer only, so ties keep the first root
        let longer = best.is_none_or(|(current, _)| {
            root.components().count() > current.components().count()
        });
        if longer {
            best = Some((root, relative));
        }
    }

    let (root, relative) = best.ok_or_else(|| IndexError::NoWorkspaceRoot {
        file: file.to_path_buf(),
    })?;

    let mut sidecar = root.join(output_dir).join(relative).into_os_string();
    sidecar.push(".json");

    Ok(SidecarLocation {
        root: root.clone(),
        relative: relative.to_path_buf(),
        path: PathBuf::from(sidecar),
    })
}
