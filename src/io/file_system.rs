//! File system abstraction layer
//!
//! Trait-based access to the handful of file operations the indexer needs,
//! so sidecar output can be tested without touching disk.

use std::path::Path;

// ============================================================================
// File System Trait
// ============================================================================

/// Directory/file writer capability
pub trait FileSystemTrait: Clone + Send + Sync {
    /// Create a directory and all missing parents; succeeds if it already exists
    fn create_dir_all(&self, path: &Path) -> Result<(), std::io::Error>;

    /// Write `contents` to `path`, replacing anything already there
    fn write(&self, path: &Path, contents: &[u8]) -> Result<(), std::io::Error>;
}

// ============================================================================
// Real File System Implementation
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystemTrait for RealFileSystem {
    fn create_dir_all(&self, path: &Path) -> Result<(), std::io::Error> {
        std::fs::create_dir_all(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<(), std::io::Error> {
        std::fs::write(path, contents)
    }
}

// ============================================================================
// Test File System Implementation
// ============================================================================


#[cfg(test)]
pub use test_filesystem::TestFileSystem;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_test_filesystem_requires_parent_directory() {
        let fs = TestFileSystem::new();
        let path = PathBuf::from("/ws/.hovercraft/src/a.rs.json");

        assert!(fs.write(&path, b"[]").is_err());

        fs.create_dir_all(path.parent().unwrap()).unwrap();
        fs.write(&path, b"[]").unwrap();

        assert!(fs.has_directory(Path::new("/ws/.hovercraft")));
        assert_eq!(fs.file_content(&path).as_deref(), Some("[]"));
    }

    #[test]
    fn test_test_filesystem_overwrites_and_shares_state() {
        let fs1 = TestFileSystem::new();
        let fs2 = fs1.clone();
        let path = PathBuf::from("/ws/out.json");
        fs1.create_dir_all(Path::new("/ws")).unwrap();

        fs1.write(&path, b"old").unwrap();
        fs2.write(&path, b"new").unwrap();

        assert_eq!(fs1.file_content(&path).as_deref(), Some("new"));
        assert_eq!(fs1.file_count(), 1);
    }

    #[test]
    fn test_test_filesystem_read_only() {
        let fs = TestFileSystem::new();
        fs.set_read_only(true);

        let err = fs.create_dir_all(Path::new("/ws/.hovercraft")).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_real_filesystem_create_and_write() {
        let temp_dir = tempdir().unwrap();
        let fs = RealFileSystem;
        let nested = temp_dir.path().join("a").join("b");

        fs.create_dir_all(&nested).unwrap();
        // Idempotent
        fs.create_dir_all(&nested).unwrap();

        let file = nested.join("out.json");
        fs.write(&file, b"first").unwrap();
        fs.write(&file, b"second").unwrap();

        assert_eq!(std::fs::read(&file).unwrap(), b"second");
        assert!(fs.write(&temp_dir.path().join("missing").join("x"), b"").is_err());
    }
}
