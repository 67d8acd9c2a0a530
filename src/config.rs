//! Indexer configuration
//!
//! Resolution order for every setting: CLI flag, then `HOVERCRAFT_*`
//! environment variable, then built-in default.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use crate::index::{DEFAULT_OUTPUT_DIR, HoverScheduling, IndexOptions};
use crate::lsp::client::DEFAULT_REQUEST_TIMEOUT;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error(
        "No language server configured; pass --server or set HOVERCRAFT_SERVER"
    )]
    MissingServerCommand,

    #[error("Request timeout must be greater than zero")]
    ZeroTimeout,

    #[error("Invalid value for {variable}: {value}")]
    InvalidValue { variable: String, value: String },

    #[error("Output directory must be a single relative path component: {0}")]
    InvalidOutputDir(String),
}

/// Values supplied on the command line; `None`/`false` means "not given"
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub server: Option<String>,
    pub server_args: Vec<String>,
    pub roots: Vec<PathBuf>,
    pub output_dir: Option<String>,
    pub preserve_range: bool,
    pub concurrent: bool,
    pub pretty: bool,
    pub request_timeout_secs: Option<u64>,
    pub active_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexerConfig {
    pub server_command: Option<String>,
    pub server_args: Vec<String>,
    /// Workspace roots; empty means "use the current directory"
    pub roots: Vec<PathBuf>,
    pub output_dir: String,
    pub preserve_range: bool,
    pub concurrent: bool,
    pub pretty_json: bool,
    pub request_timeout: Duration,
    pub active_file: Option<PathBuf>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            server_command: None,
            server_args: Vec::new(),
            roots: Vec::new(),
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
            preserve_range: false,
            concurrent: false,
            pretty_json: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            active_file: None,
        }
    }
}

impl IndexerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var_os(key))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Result<Self, ConfigError> {
        let string = |key: &str| lookup(key).map(|v| v.to_string_lossy().into_owned());
        let flag = |key: &str| -> Result<bool, ConfigError> {
            match string(key).as_deref() {
                None | Some("") | Some("false") | Some("0") => Ok(false),
                Some("true") | Some("1") => Ok(true),
                Some(other) => Err(ConfigError::InvalidValue {
                    variable: key.to_string(),
                    value: other.to_string(),
                }),
            }
        };

        let mut config = Self::default();

        config.server_command = string("HOVERCRAFT_SERVER").filter(|s| !s.trim().is_empty());
        if let Some(args) = string("HOVERCRAFT_SERVER_ARGS") {
            config.server_args = args.split_whitespace().map(str::to_string).collect();
        }
        if let Some(roots) = lookup("HOVERCRAFT_ROOTS") {
            config.roots = env::split_paths(&roots)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }
        if let Some(output_dir) = string("HOVERCRAFT_OUTPUT_DIR") {
            config.output_dir = output_dir;
        }
        config.preserve_range = flag("HOVERCRAFT_PRESERVE_RANGE")?;
        config.concurrent = flag("HOVERCRAFT_CONCURRENT")?;
        config.pretty_json = flag("HOVERCRAFT_PRETTY")?;
        if let Some(secs) = string("HOVERCRAFT_REQUEST_TIMEOUT_SECS") {
            let parsed = secs
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    variable: "HOVERCRAFT_REQUEST_TIMEOUT_SECS".to_string(),
                    value: secs.clone(),
                })?;
            config.request_timeout = Duration::from_secs(parsed);
        }
        config.active_file = lookup("HOVERCRAFT_ACTIVE_FILE")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        Ok(config)
    }

    /// Apply CLI values on top of the environment
    pub fn with_overrides(mut self, cli: CliOverrides) -> Self {
        if let Some(server) = cli.server {
            self.server_command = Some(server);
        }
        if !cli.server_args.is_empty() {
            self.server_args = cli.server_args;
        }
        if !cli.roots.is_empty() {
            self.roots = cli.roots;
        }
        if let Some(output_dir) = cli.output_dir {
            self.output_dir = output_dir;
        }
        self.preserve_range |= cli.preserve_range;
        self.concurrent |= cli.concurrent;
        self.pretty_json |= cli.pretty;
        if let Some(secs) = cli.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(active_file) = cli.active_file {
            self.active_file = Some(active_file);
        }
        self
    }

    /// Check settings every command needs
    ///
    /// The server command is checked when a session starts, after the active
    /// document has been resolved.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        let mut components = std::path::Path::new(&self.output_dir).components();
        match (components.next(), components.next()) {
            (Some(std::path::Component::Normal(_)), None) => Ok(()),
            _ => Err(ConfigError::InvalidOutputDir(self.output_dir.clone())),
        }
    }

    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            scheduling: if self.concurrent {
                HoverScheduling::Concurrent
            } else {
                HoverScheduling::Sequential
            },
            preserve_range: self.preserve_range,
        }
    }
}
