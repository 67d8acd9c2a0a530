mod commands;
mod config;
mod host;
mod index;
mod io;
mod logging;
mod lsp;
mod server;

#[cfg(test)]
mod test_utils;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use commands::{
    CommandError, IndexRequest, IndexSummary, index_current_file, notify_index_result,
    notify_preview_result, preview_current_file,
};
use config::{CliOverrides, ConfigError, IndexerConfig};
use host::{ConsoleNotifier, DocumentId, Notifier};
use index::{IndexError, SidecarWriter};
use io::RealFileSystem;
use logging::{LogConfig, init_logging};
use server::{LanguageServerSession, ServerConfigBuilder, SessionError};

/// Index the symbols of a source file together with their hover documentation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Language server executable (overrides HOVERCRAFT_SERVER env var)
    #[arg(long, value_name = "CMD", global = true)]
    server: Option<String>,

    /// Argument passed to the language server, repeatable
    #[arg(long = "server-arg", value_name = "ARG", global = true, allow_hyphen_values = true)]
    server_args: Vec<String>,

    /// Workspace root, repeatable (defaults to the current directory)
    #[arg(long = "root", value_name = "DIR", global = true)]
    roots: Vec<PathBuf>,

    /// Directory name created under the workspace root for index files
    #[arg(long, value_name = "NAME", global = true)]
    output_dir: Option<String>,

    /// Keep the hover range in the index output
    #[arg(long, global = true)]
    preserve_range: bool,

    /// Issue hover requests concurrently instead of one at a time
    #[arg(long, global = true)]
    concurrent: bool,

    /// Pretty-print the index JSON
    #[arg(long, global = true)]
    pretty: bool,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    request_timeout: Option<u64>,

    /// Append language server stderr to this file
    #[arg(long, value_name = "FILE", global = true)]
    server_log: Option<PathBuf>,

    /// Log level (overrides RUST_LOG env var)
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Log file path (overrides HOVERCRAFT_LOG_FILE env var)
    #[arg(long, value_name = "FILE", global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the hover index of FILE to the sidecar directory
    Index {
        /// Source file (overrides HOVERCRAFT_ACTIVE_FILE env var)
        file: Option<PathBuf>,
    },
    /// Print every symbol of FILE with its hover text
    Preview {
        /// Source file (overrides HOVERCRAFT_ACTIVE_FILE env var)
        file: Option<PathBuf>,
    },
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        let active_file = match &self.command {
            Command::Index { file } | Command::Preview { file } => file.clone(),
        };
        CliOverrides {
            server: self.server.clone(),
            server_args: self.server_args.clone(),
            roots: self.roots.clone(),
            output_dir: self.output_dir.clone(),
            preserve_range: self.preserve_range,
            concurrent: self.concurrent,
            pretty: self.pretty,
            request_timeout_secs: self.request_timeout,
            active_file,
        }
    }
}

fn load_config(args: &Args) -> Result<IndexerConfig, ConfigError> {
    resolve_config(IndexerConfig::from_env()?, args)
}

/// Apply CLI settings over `base`, then make every path absolute
///
/// A missing server command is not an error yet: commands report a missing
/// active document first.
fn resolve_config(base: IndexerConfig, args: &Args) -> Result<IndexerConfig, ConfigError> {
    let mut config = base.with_overrides(args.overrides());
    config.validate()?;

    if config.roots.is_empty() {
        config.roots.extend(std::env::current_dir().ok());
    }
    config.roots = config.roots.into_iter().map(absolute).collect();
    config.active_file = config.active_file.map(absolute);
    Ok(config)
}

fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}

async fn start_session(
    config: &IndexerConfig,
    roots: Vec<PathBuf>,
    server_log: Option<PathBuf>,
) -> Result<Arc<LanguageServerSession>, CommandError> {
    let command = config
        .server_command
        .clone()
        .ok_or(ConfigError::MissingServerCommand)?;

    let mut builder = ServerConfigBuilder::new()
        .command(command)
        .add_args(config.server_args.clone())
        .workspace_roots(roots)
        .request_timeout(config.request_timeout);
    if let Some(path) = server_log {
        builder = builder.stderr_log(path);
    }
    let server_config = builder.build().map_err(SessionError::from)?;

    info!(
        "Starting language server: {} {}",
        server_config.command,
        server_config.args.join(" ")
    );
    let session = LanguageServerSession::start(server_config).await?;
    Ok(Arc::new(session))
}

async fn close_session(session: Arc<LanguageServerSession>) {
    match Arc::try_unwrap(session) {
        Ok(session) => {
            if let Err(e) = session.close().await {
                warn!("Failed to close language server session: {}", e);
            }
        }
        // Remaining owners kill the process on drop
        Err(_) => warn!("Language server session still in use, skipping graceful shutdown"),
    }
}

async fn run_index(
    config: &IndexerConfig,
    server_log: Option<PathBuf>,
) -> Result<IndexSummary, CommandError> {
    let request = IndexRequest::prepare(
        config.active_file.as_deref(),
        &config.roots,
        &config.output_dir,
    )?;

    let session = start_session(config, config.roots.clone(), server_log).await?;
    let writer = SidecarWriter::new(RealFileSystem).pretty(config.pretty_json);
    let result = index_current_file(
        Arc::clone(&session),
        &request,
        config.index_options(),
        &writer,
    )
    .await;
    close_session(session).await;
    result
}

async fn run_preview(
    config: &IndexerConfig,
    server_log: Option<PathBuf>,
) -> Result<usize, CommandError> {
    let file = config
        .active_file
        .as_deref()
        .ok_or(IndexError::NoActiveDocument)?;
    let document = DocumentId::new(file)?;

    // Outside every root, the session is rooted at the file's directory
    let mut roots: Vec<PathBuf> = config
        .roots
        .iter()
        .filter(|root| file.starts_with(root))
        .cloned()
        .collect();
    if roots.is_empty() {
        roots.extend(file.parent().map(Path::to_path_buf));
    }

    let session = start_session(config, roots, server_log).await?;
    let mut out = std::io::stdout();
    let result = preview_current_file(Arc::clone(&session), &document, &mut out).await;
    close_session(session).await;
    result
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let log_config =
        LogConfig::from_env().with_overrides(args.log_level.clone(), args.log_file.clone());
    if let Err(e) = init_logging(log_config) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let notifier = ConsoleNotifier;
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            notifier.show_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    let succeeded = match args.command {
        Command::Index { .. } => {
            let result = run_index(&config, args.server_log).await;
            notify_index_result(&notifier, &result);
            result.is_ok()
        }
        Command::Preview { .. } => {
            let result = run_preview(&config, args.server_log).await;
            notify_preview_result(&notifier, config.active_file.as_deref(), &result);
            result.is_ok()
        }
    };

    if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::{NotificationLevel, RecordingNotifier};

    fn resolve(argv: &[&str]) -> IndexerConfig {
        resolve_config(IndexerConfig::default(), &Args::parse_from(argv)).unwrap()
    }

    #[tokio::test]
    async fn test_index_without_document_or_server_warns_no_active_document() {
        let config = resolve(&["hovercraft", "index"]);
        assert!(config.server_command.is_none());

        let result = run_index(&config, None).await;
        assert!(matches!(
            result,
            Err(CommandError::Index(IndexError::NoActiveDocument))
        ));

        let notifier = RecordingNotifier::new();
        notify_index_result(&notifier, &result);
        assert_eq!(
            notifier.messages(),
            [(
                NotificationLevel::Warning,
                "No active document to index".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_preview_without_document_or_server_warns_no_active_document() {
        let config = resolve(&["hovercraft", "preview"]);

        let result = run_preview(&config, None).await;
        assert!(matches!(
            result,
            Err(CommandError::Index(IndexError::NoActiveDocument))
        ));

        let notifier = RecordingNotifier::new();
        notify_preview_result(&notifier, config.active_file.as_deref(), &result);
        assert_eq!(
            notifier.at_level(NotificationLevel::Warning),
            ["No active document to preview"]
        );
    }

    #[tokio::test]
    async fn test_index_with_document_but_no_server_reports_missing_command() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.ts");
        std::fs::write(&file, "function f() {}\n").unwrap();
        let root = dir.path().to_str().unwrap();
        let file_arg = file.to_str().unwrap();

        let config = resolve(&["hovercraft", "index", file_arg, "--root", root]);
        let result = run_index(&config, None).await;
        assert!(matches!(
            result,
            Err(CommandError::Config(ConfigError::MissingServerCommand))
        ));
    }

    #[test]
    fn test_resolve_config_still_rejects_bad_settings() {
        let args = Args::parse_from(["hovercraft", "index", "--output-dir", "a/b"]);
        let result = resolve_config(IndexerConfig::default(), &args);
        assert!(matches!(result, Err(ConfigError::InvalidOutputDir(_))));
    }
}
