//! Index construction: one hover query per symbol, paired back in order

use std::sync::Arc;
use std::time::Instant;

use lsp_types::{DocumentSymbol, Position};
use serde::ser::SerializeTuple;
use serde::{Serialize, Serializer};
use tokio::task::JoinSet;
use tracing::{Level, debug, trace};

use crate::host::{DocumentId, HostError, HoverProvider, SymbolProvider};
use crate::index::error::IndexError;
use crate::index::flatten::{count_symbols, flatten};
use crate::index::hover::{Hover, IndexedHover, normalize_hover};
use crate::log_timing;

/// How hover queries are issued; output order is the same either way
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HoverScheduling {
    /// Await each query before issuing the next
    #[default]
    Sequential,
    /// Spawn every query up front, then gather
    Concurrent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexOptions {
    pub scheduling: HoverScheduling,
    /// Keep each hover's source range in the output
    pub preserve_range: bool,
}

/// One symbol and its hovers; serializes as `[symbol, hovers]`
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub symbol: DocumentSymbol,
    pub hovers: Vec<IndexedHover>,
}

impl Serialize for IndexEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.symbol)?;
        tuple.serialize_element(&self.hovers)?;
        tuple.end()
    }
}

/// A per-symbol problem that degraded the symbol to an empty hover list
#[derive(Debug)]
pub struct SymbolDiagnostic {
    pub symbol: String,
    pub position: Position,
    pub error: IndexError,
}

#[derive(Debug, Default)]
pub struct IndexReport {
    /// One entry per flattened symbol, in flattened order
    pub entries: Vec<IndexEntry>,
    pub diagnostics: Vec<SymbolDiagnostic>,
}

pub struct IndexBuilder<H: ?Sized> {
    hover_provider: Arc<H>,
    options: IndexOptions,
}

impl<H> IndexBuilder<H>
where
    H: HoverProvider + ?Sized + 'static,
{
    pub fn new(hover_provider: Arc<H>, options: IndexOptions) -> Self {
        Self {
            hover_provider,
            options,
        }
    }

    /// Query hovers at each symbol's selection start and pair them up
    ///
    /// Never fails as a whole: per-symbol failures become empty hover lists
    /// plus a diagnostic.
    pub async fn build(&self, document: &DocumentId, symbols: Vec<DocumentSymbol>) -> IndexReport {
        let started = Instant::now();
        let positions: Vec<Position> = symbols.iter().map(|s| s.selection_range.start).collect();

        let results = match self.options.scheduling {
            HoverScheduling::Sequential => self.query_sequential(document, &positions).await,
            HoverScheduling::Concurrent => self.query_concurrent(document, &positions).await,
        };

        let mut report = IndexReport::default();
        for ((symbol, position), result) in symbols.into_iter().zip(positions).zip(results) {
            let hovers = match self.collect_hovers(&symbol, result) {
                Ok(hovers) => hovers,
                Err(error) => {
                    report.diagnostics.push(SymbolDiagnostic {
                        symbol: symbol.name.clone(),
                        position,
                        error,
                    });
                    Vec::new()
                }
            };
            report.entries.push(IndexEntry { symbol, hovers });
        }

        log_timing!(Level::DEBUG, "build_index", started.elapsed());
        report
    }

    async fn query_sequential(
        &self,
        document: &DocumentId,
        positions: &[Position],
    ) -> Vec<Result<Vec<Hover>, HostError>> {
        let mut results = Vec::with_capacity(positions.len());
        for position in positions {
            trace!("Hover query at {}:{}", position.line, position.character);
            results.push(self.hover_provider.hovers(document, *position).await);
        }
        results
    }

    async fn query_concurrent(
        &self,
        document: &DocumentId,
        positions: &[Position],
    ) -> Vec<Result<Vec<Hover>, HostError>> {
        let mut tasks = JoinSet::new();
        for (index, position) in positions.iter().copied().enumerate() {
            let provider = Arc::clone(&self.hover_provider);
            let document = document.clone();
            tasks.spawn(async move { (index, provider.hovers(&document, position).await) });
        }

        let mut slots: Vec<Option<Result<Vec<Hover>, HostError>>> =
            (0..positions.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => debug!("Hover task did not complete: {}", e),
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| Err(HostError::QueryAborted("hover task cancelled".into())))
            })
            .collect()
    }

    fn collect_hovers(
        &self,
        symbol: &DocumentSymbol,
        result: Result<Vec<Hover>, HostError>,
    ) -> Result<Vec<IndexedHover>, IndexError> {
        let hovers = result.map_err(|source| IndexError::HoverQueryFailed {
            symbol: symbol.name.clone(),
            source,
        })?;

        hovers
            .iter()
            .map(|hover| {
                let contents = normalize_hover(hover)?;
                let range = if self.options.preserve_range {
                    hover.range
                } else {
                    None
                };
                Ok(IndexedHover::new(contents, range))
            })
            .collect()
    }
}

/// Fetch, flatten and build the index for one document
///
/// Only a failed symbol query aborts; hover problems are reported per symbol.
pub async fn index_document<S, H>(
    symbol_provider: &S,
    builder: &IndexBuilder<H>,
    document: &DocumentId,
) -> Result<IndexReport, IndexError>
where
    S: SymbolProvider + ?Sized,
    H: HoverProvider + ?Sized + 'static,
{
    let roots = symbol_provider
        .document_symbols(document)
        .await
        .map_err(IndexError::SymbolQueryFailed)?;

    debug!(
        "{}: {} top-level symbols, {} total",
        document,
        roots.len(),
        count_symbols(&roots)
    );

    Ok(builder.build(document, flatten(&roots)).await)
}
