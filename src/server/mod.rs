//! Language server process and LSP session lifecycle

pub mod config;
pub mod error;
pub mod session;

pub use config::ServerConfigBuilder;
pub use error::SessionError;
pub use session::LanguageServerSession;
