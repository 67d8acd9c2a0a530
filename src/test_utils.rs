//! Test utilities and global setup
//!
//! Provides centralized test logging configuration and symbol fixtures.

/// Test logging utilities
#[cfg(all(test, feature = "test-logging"))]
pub mod logging {
    use std::sync::Once;
    use tracing_subscriber::{EnvFilter, fmt};

    static INIT: Once = Once::new();

    /// Initialize test logging globally - safe to call multiple times
    ///
    /// Respects `RUST_LOG`, defaulting to debug for this crate and info for
    /// tokio. Output goes through the test writer so it is captured per test.
    ///
    /// ```bash
    /// RUST_LOG=hovercraft::lsp=trace cargo test --features test-logging
    /// ```
    pub fn init() {
        INIT.call_once(|| {
            let env_filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("debug,tokio=info"));

            fmt()
                .with_env_filter(env_filter)
                .with_test_writer()
                .with_target(true)
                .with_thread_ids(true)
                .compact()
                .try_init()
                .ok(); // Ignore errors if already initialized by another test
        });
    }
}

/// Auto-initialize logging for every test in the invoking module
#[cfg(all(test, feature = "test-logging"))]
#[macro_export]
macro_rules! setup_test_logging {
    () => {
        #[ctor::ctor]
        fn init_test_logging() {
            $crate::test_utils::logging::init();
        }
    };
}

/// Language server command for integration tests
///
/// Reads `HOVERCRAFT_TEST_SERVER` (command plus whitespace-separated
/// arguments), falling back to `typescript-language-server --stdio`.
#[cfg(all(test, feature = "server-integration-tests"))]
pub fn test_server_command() -> (String, Vec<String>) {
    let line = std::env::var("HOVERCRAFT_TEST_SERVER")
        .unwrap_or_else(|_| "typescript-language-server --stdio".to_string());
    let mut parts = line.split_whitespace().map(str::to_string);
    let command = parts.next().unwrap_or_default();
    (command, parts.collect())
}

/// `DocumentSymbol` fixtures
#[cfg(test)]
pub mod symbols {
    use lsp_types::{DocumentSymbol, Position, Range, SymbolKind};

    /// A function symbol whose name token starts at `line:character`
    ///
    /// The full range starts at column 0 of the same line, so tests can tell
    /// `range.start` and `selection_range.start` apart.
    pub fn symbol(name: &str, line: u32, character: u32) -> DocumentSymbol {
        let name_end = character + name.len() as u32;
        DocumentSymbol {
            name: name.to_string(),
            detail: None,
            kind: SymbolKind::FUNCTION,
            tags: None,
            #[allow(deprecated)]
            deprecated: None,
            range: Range::new(Position::new(line, 0), Position::new(line + 1, 1)),
            selection_range: Range::new(
                Position::new(line, character),
                Position::new(line, name_end),
            ),
            children: None,
        }
    }

    /// A class symbol at `0:0` containing `children`
    pub fn symbol_with_children(name: &str, children: Vec<DocumentSymbol>) -> DocumentSymbol {
        let mut parent = symbol(name, 0, 0);
        parent.kind = SymbolKind::CLASS;
        parent.children = Some(children);
        parent
    }
}
