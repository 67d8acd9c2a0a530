//! Language Server Protocol client stack
//!
//! Layered bottom-up: Content-Length framing over a [`Transport`], JSON-RPC
//! correlation, then the typed [`LspClient`].
//!
//! [`Transport`]: crate::io::transport::Transport

pub mod client;
pub mod framing;
pub mod protocol;

pub use client::{LspClient, LspError};
