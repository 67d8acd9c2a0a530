//! Hand-written host doubles for tests

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lsp_types::{DocumentSymbol, Position};

use crate::host::{DocumentId, HostError, HoverProvider, Notifier, SymbolProvider};
use crate::index::Hover;

#[derive(Default)]
struct MockHostState {
    symbols: Vec<DocumentSymbol>,
    fail_symbols: bool,
    hovers: HashMap<Position, Vec<Hover>>,
    failing_positions: HashSet<Position>,
    delays: HashMap<Position, Duration>,
    queried_positions: Vec<Position>,
    symbol_queries: usize,
}

/// Canned symbols and position-keyed hovers
#[derive(Default)]
pub struct MockLanguageHost {
    state: Mutex<MockHostState>,
}

impl MockLanguageHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_symbols(&self, symbols: Vec<DocumentSymbol>) {
        self.state.lock().unwrap().symbols = symbols;
    }

    pub fn fail_symbols(&self) {
        self.state.lock().unwrap().fail_symbols = true;
    }

    pub fn set_hover(&self, position: Position, hovers: Vec<Hover>) {
        self.state.lock().unwrap().hovers.insert(position, hovers);
    }

    pub fn fail_hover_at(&self, position: Position) {
        self.state
            .lock()
            .unwrap()
            .failing_positions
            .insert(position);
    }

    pub fn set_delay(&self, position: Position, delay: Duration) {
        self.state.lock().unwrap().delays.insert(position, delay);
    }

    /// Positions in the order hover queries arrived
    pub fn queried_positions(&self) -> Vec<Position> {
        self.state.lock().unwrap().queried_positions.clone()
    }

    pub fn symbol_queries(&self) -> usize {
        self.state.lock().unwrap().symbol_queries
    }
}

#[async_trait]
impl SymbolProvider for MockLanguageHost {
    async fn document_symbols(
        &self,
        _document: &DocumentId,
    ) -> Result<Vec<DocumentSymbol>, HostError> {
        let mut state = self.state.lock().unwrap();
        state.symbol_queries += 1;
        if state.fail_symbols {
            return Err(HostError::Injected("documentSymbol".to_string()));
        }
        Ok(state.symbols.clone())
    }
}

#[async_trait]
impl HoverProvider for MockLanguageHost {
    async fn hovers(
        &self,
        _document: &DocumentId,
        position: Position,
    ) -> Result<Vec<Hover>, HostError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.queried_positions.push(position);
            state.delays.get(&position).copied()
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock().unwrap();
        if state.failing_positions.contains(&position) {
            return Err(HostError::Injected(format!(
                "hover at {}:{}",
                position.line, position.character
            )));
        }
        Ok(state.hovers.get(&position).cloned().unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// Records every notification instead of showing it
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(NotificationLevel, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(NotificationLevel, String)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn at_level(&self, level: NotificationLevel) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, message)| message)
            .collect()
    }

    fn record(&self, level: NotificationLevel, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }
}

impl Notifier for RecordingNotifier {
    fn show_info(&self, message: &str) {
        self.record(NotificationLevel::Info, message);
    }

    fn show_warning(&self, message: &str) {
        self.record(NotificationLevel::Warning, message);
    }

    fn show_error(&self, message: &str) {
        self.record(NotificationLevel::Error, message);
    }
}
