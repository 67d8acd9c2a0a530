//! Command entry points: "Index Current File" and "Preview Current File"

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ConfigError;
use crate::host::{DocumentId, HostError, LanguageHost, Notifier};
use crate::index::{
    IndexBuilder, IndexError, IndexOptions, IndexReport, SidecarLocation, SidecarWriter,
    SymbolTreeIter, index_document, render_hover, resolve_output_path,
};
use crate::io::FileSystemTrait;
use crate::server::SessionError;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("Failed to write preview: {0}")]
    Output(#[source] std::io::Error),
}

/// Everything resolved before the host is contacted
#[derive(Debug, Clone)]
pub struct IndexRequest {
    pub document: DocumentId,
    pub location: SidecarLocation,
}

impl IndexRequest {
    /// Fails with `NoActiveDocument`, then `NoWorkspaceRoot`, without querying anything
    pub fn prepare(
        active_file: Option<&Path>,
        roots: &[PathBuf],
        output_dir: &str,
    ) -> Result<Self, CommandError> {
        let file = active_file.ok_or(IndexError::NoActiveDocument)?;
        let location = resolve_output_path(file, roots, output_dir)?;
        let document = DocumentId::new(file)?;
        Ok(Self { document, location })
    }
}

/// Result of a successful index run
#[derive(Debug)]
pub struct IndexSummary {
    pub path: PathBuf,
    pub symbols: usize,
    pub diagnostics: usize,
}

pub async fn index_current_file<H, F>(
    host: Arc<H>,
    request: &IndexRequest,
    options: IndexOptions,
    writer: &SidecarWriter<F>,
) -> Result<IndexSummary, CommandError>
where
    H: LanguageHost + ?Sized + 'static,
    F: FileSystemTrait,
{
    info!("Indexing {}", request.document);

    let builder = IndexBuilder::new(Arc::clone(&host), options);
    let report = index_document(host.as_ref(), &builder, &request.document).await?;
    log_diagnostics(&report);

    writer.write(&request.location, &report.entries)?;

    Ok(IndexSummary {
        path: request.location.path.clone(),
        symbols: report.entries.len(),
        diagnostics: report.diagnostics.len(),
    })
}

/// Surface the outcome of an index run to the user
pub fn notify_index_result(notifier: &dyn Notifier, result: &Result<IndexSummary, CommandError>) {
    match result {
        // Warning level matches what editor hosts show for this command
        Ok(summary) => {
            notifier.show_warning(&format!(
                "Hover index written to {} ({} symbols)",
                summary.path.display(),
                summary.symbols
            ));
            if summary.diagnostics > 0 {
                notifier.show_info(&format!(
                    "{} symbols were indexed without hovers, see the log for details",
                    summary.diagnostics
                ));
            }
        }
        Err(CommandError::Index(IndexError::NoActiveDocument)) => {
            notifier.show_warning("No active document to index")
        }
        Err(e) => notifier.show_error(&e.to_string()),
    }
}

/// Fetch and flatten like the index command, but print instead of writing
///
/// Each symbol prints as `Symbol: Outer::name` followed by its rendered
/// hovers. Rendering is lenient, so a malformed hover prints as an empty line.
pub async fn preview_current_file<H, W>(
    host: Arc<H>,
    document: &DocumentId,
    out: &mut W,
) -> Result<usize, CommandError>
where
    H: LanguageHost + ?Sized + 'static,
    W: Write,
{
    info!("Previewing {}", document);

    let roots = host
        .document_symbols(document)
        .await
        .map_err(IndexError::SymbolQueryFailed)?;

    let mut count = 0;
    for (symbol, path) in SymbolTreeIter::new(&roots) {
        let mut qualified = path.join("::");
        if !qualified.is_empty() {
            qualified.push_str("::");
        }
        qualified.push_str(&symbol.name);
        writeln!(out, "Symbol: {qualified}").map_err(CommandError::Output)?;
        count += 1;

        let position = symbol.selection_range.start;
        match host.hovers(document, position).await {
            Ok(hovers) => {
                for hover in &hovers {
                    writeln!(out, "{}", render_hover(hover)).map_err(CommandError::Output)?;
                }
            }
            Err(e) => warn!(symbol = %symbol.name, "Hover query failed: {}", e),
        }
    }

    Ok(count)
}

pub fn notify_preview_result(
    notifier: &dyn Notifier,
    document: Option<&Path>,
    result: &Result<usize, CommandError>,
) {
    match (result, document) {
        (Ok(count), Some(file)) => notifier.show_warning(&format!(
            "Previewed {count} symbols from {}",
            file.display()
        )),
        (Ok(count), None) => notifier.show_warning(&format!("Previewed {count} symbols")),
        (Err(CommandError::Index(IndexError::NoActiveDocument)), _) => {
            notifier.show_warning("No active document to preview")
        }
        (Err(e), _) => notifier.show_error(&e.to_string()),
    }
}

fn log_diagnostics(report: &IndexReport) {
    for diagnostic in &report.diagnostics {
        warn!(
            symbol = %diagnostic.symbol,
            line = diagnostic.position.line,
            character = diagnostic.position.character,
            "Hover skipped: {}",
            diagnostic.error
        );
    }
}
