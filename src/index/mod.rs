//! Symbol/hover indexing core
//!
//! Flatten the document's symbol tree, query a hover for every symbol,
//! normalize the results and persist them as a sidecar JSON file.

pub mod builder;
pub mod error;
pub mod flatten;
pub mod hover;
pub mod output_path;
pub mod sidecar;

pub use builder::{HoverScheduling, IndexBuilder, IndexOptions, IndexReport, index_document};
pub use error::IndexError;
pub use flatten::SymbolTreeIter;
pub use hover::{Hover, render_hover};
pub use output_path::{DEFAULT_OUTPUT_DIR, SidecarLocation, resolve_output_path};
pub use sidecar::SidecarWriter;
