//! I/O layer - Generic abstractions for process management, transport and files
//!
//! - **Transport**: Pure I/O layer for bidirectional message exchange
//! - **Process**: External process lifecycle management with stdio integration
//! - **File system**: Directory creation and file writes behind a trait

pub mod file_system;
pub mod process;
pub mod transport;

pub use file_system::{FileSystemTrait, RealFileSystem};
pub use process::{ProcessError, ServerProcess, StopMode};
pub use transport::StdioTransport;

#[cfg(test)]
pub use file_system::TestFileSystem;
#[cfg(test)]
pub use transport::{ChannelTransport, MockTransport};
