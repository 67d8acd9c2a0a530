//! Host capabilities backed by a running language server

use async_trait::async_trait;
use lsp_types::{DocumentSymbol, DocumentSymbolResponse, Position, SymbolInformation};
use serde_json::Value;

use crate::host::{DocumentId, HostError, HoverProvider, SymbolProvider};
use crate::index::Hover;
use crate::server::LanguageServerSession;

impl LanguageServerSession {
    async fn open_for_query(&self, document: &DocumentId) -> Result<(), HostError> {
        self.ensure_document_open(document)
            .await
            .map_err(|source| HostError::DocumentOpen {
                path: document.path().to_path_buf(),
                source,
            })
    }
}

#[async_trait]
impl SymbolProvider for LanguageServerSession {
    async fn document_symbols(
        &self,
        document: &DocumentId,
    ) -> Result<Vec<DocumentSymbol>, HostError> {
        self.open_for_query(document).await?;
        let response = self
            .client()
            .document_symbols(document.uri().clone())
            .await?;
        Ok(nested_symbols(response))
    }
}

#[async_trait]
impl HoverProvider for LanguageServerSession {
    async fn hovers(
        &self,
        document: &DocumentId,
        position: Position,
    ) -> Result<Vec<Hover>, HostError> {
        self.open_for_query(document).await?;
        let response = self
            .client()
            .hover(document.uri().clone(), position)
            .await?;
        Ok(response.map(hover_from_response).into_iter().collect())
    }
}

/// Servers without hierarchical support answer with flat `SymbolInformation`
pub fn nested_symbols(response: DocumentSymbolResponse) -> Vec<DocumentSymbol> {
    match response {
        DocumentSymbolResponse::Nested(symbols) => symbols,
        DocumentSymbolResponse::Flat(infos) => {
            infos.into_iter().map(symbol_from_information).collect()
        }
    }
}

fn symbol_from_information(info: SymbolInformation) -> DocumentSymbol {
    #[allow(deprecated)]
    DocumentSymbol {
        name: info.name,
        detail: None,
        kind: info.kind,
        tags: info.tags,
        deprecated: info.deprecated,
        range: info.location.range,
        selection_range: info.location.range,
        children: None,
    }
}

/// Keep `contents` untyped; a missing field surfaces later as a malformed hover
fn hover_from_response(response: Value) -> Hover {
    let range = response
        .get("range")
        .and_then(|range| serde_json::from_value(range.clone()).ok());
    let contents = match response {
        Value::Object(mut fields) => fields.remove("contents").unwrap_or(Value::Null),
        _ => Value::Null,
    };
    Hover { contents, range }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::symbols::symbol;
    use lsp_types::{Location, Range, SymbolKind, Uri};
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_nested_response_passes_through() {
        let symbols = vec![symbol("f", 0, 4)];
        let nested = nested_symbols(DocumentSymbolResponse::Nested(symbols.clone()));
        assert_eq!(nested, symbols);
    }

    #[test]
    fn test_flat_response_becomes_childless_symbols() {
        let range = Range::new(Position::new(2, 0), Position::new(4, 1));
        #[allow(deprecated)]
        let info = SymbolInformation {
            name: "g".to_string(),
            kind: SymbolKind::FUNCTION,
            tags: None,
            deprecated: None,
            location: Location::new(Uri::from_str("file:///ws/a.ts").unwrap(), range),
            container_name: Some("mod".to_string()),
        };

        let nested = nested_symbols(DocumentSymbolResponse::Flat(vec![info]));
        assert_eq!(nested.len(), 1);
        assert_eq!(nested[0].name, "g");
        assert_eq!(nested[0].range, range);
        assert_eq!(nested[0].selection_range, range);
        assert!(nested[0].children.is_none());
    }

    #[test]
    fn test_hover_from_response() {
        let hover = hover_from_response(json!({
            "contents": {"kind": "markdown", "value": "```ts\nfunction f(): void\n```"},
            "range": {"start": {"line": 0, "character": 9}, "end": {"line": 0, "character": 10}}
        }));
        assert_eq!(hover.contents["value"], "```ts\nfunction f(): void\n```");
        assert_eq!(
            hover.range,
            Some(Range::new(Position::new(0, 9), Position::new(0, 10)))
        );

        let missing = hover_from_response(json!({"range": "garbage"}));
        assert_eq!(missing, Hover::new(Value::Null));
    }
}
