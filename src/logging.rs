use std::env;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Configuration for the logging system
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// Log level filter (e.g., "debug", "info", "warn", "error")
    pub level: String,
    /// Optional log file path. If None, logs only to stderr
    pub file_path: Option<PathBuf>,
    /// Whether to use structured JSON format for logs
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: None,
            json_format: false,
        }
    }
}

impl LogConfig {
    /// Create LogConfig from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let level = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let unique = lookup("HOVERCRAFT_LOG_UNIQUE").as_deref() == Some("true");
        let file_path = lookup("HOVERCRAFT_LOG_FILE").map(|path| {
            let path_buf = PathBuf::from(path);
            if unique {
                with_pid_suffix(path_buf, std::process::id())
            } else {
                path_buf
            }
        });

        let json_format = lookup("HOVERCRAFT_LOG_JSON").as_deref() == Some("true");

        Self {
            level,
            file_path,
            json_format,
        }
    }

    /// Override values from CLI arguments
    pub fn with_overrides(mut self, level: Option<String>, file_path: Option<PathBuf>) -> Self {
        if let Some(level) = level {
            self.level = level;
        }
        if let Some(file_path) = file_path {
            self.file_path = Some(file_path);
        }
        self
    }
}

/// `run.log` -> `run.<pid>.log`, so concurrent invocations don't share a file
fn with_pid_suffix(mut path_buf: PathBuf, pid: u32) -> PathBuf {
    if let Some(filename) = path_buf.file_stem() {
        let extension = path_buf
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");

        let unique_filename = if extension.is_empty() {
            format!("{}.{}", filename.to_string_lossy(), pid)
        } else {
            format!("{}.{}.{}", filename.to_string_lossy(), pid, extension)
        };

        path_buf.set_file_name(unique_filename);
    }
    path_buf
}

/// Initialize the logging system based on configuration
///
/// Logs always go to stderr or a file; stdout carries command output.
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_new(&config.level).or_else(|_| EnvFilter::try_new("info"))?;

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match (&config.file_path, config.json_format) {
        (Some(file_path), true) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(file_path)?;

            let file_layer = fmt::layer().json().with_writer(file).with_ansi(false);

            subscriber.with(file_layer).init();
        }
        (Some(file_path), false) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(file_path)?;

            let file_layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true);

            subscriber.with(file_layer).init();
        }
        (None, true) => {
            let stderr_layer = fmt::layer().json().with_writer(io::stderr).with_ansi(false);

            subscriber.with(stderr_layer).init();
        }
        (None, false) => {
            let stderr_layer = fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(true)
                .with_target(true)
                .with_line_number(true);

            subscriber.with(stderr_layer).init();
        }
    }

    Ok(())
}

/// Log a structured LSP request/notification in one line
#[macro_export]
macro_rules! log_lsp_message {
    ($level:expr, $direction:expr, $method:expr, $data:expr) => {
        tracing::event!(
            $level,
            direction = $direction,
            method = $method,
            data = ?$data,
            pid = std::process::id(),
            "LSP message"
        );
    };
}

/// Log the duration of an operation
#[macro_export]
macro_rules! log_timing {
    ($level:expr, $operation:expr, $duration:expr) => {
        tracing::event!(
            $level,
            operation = $operation,
            duration_ms = $duration.as_millis(),
            pid = std::process::id(),
            "Performance timing"
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        assert_eq!(LogConfig::from_lookup(lookup(&[])), LogConfig::default());
    }

    #[test]
    fn test_environment_values() {
        let config = LogConfig::from_lookup(lookup(&[
            ("RUST_LOG", "hovercraft=trace"),
            ("HOVERCRAFT_LOG_FILE", "/tmp/hovercraft.log"),
            ("HOVERCRAFT_LOG_JSON", "true"),
        ]));
        assert_eq!(config.level, "hovercraft=trace");
        assert_eq!(config.file_path, Some(PathBuf::from("/tmp/hovercraft.log")));
        assert!(config.json_format);
    }

    #[test]
    fn test_unique_log_file_gets_pid() {
        let config = LogConfig::from_lookup(lookup(&[
            ("HOVERCRAFT_LOG_FILE", "/tmp/run.log"),
            ("HOVERCRAFT_LOG_UNIQUE", "true"),
        ]));
        let expected = format!("/tmp/run.{}.log", std::process::id());
        assert_eq!(config.file_path, Some(PathBuf::from(expected)));

        assert_eq!(
            with_pid_suffix(PathBuf::from("/tmp/run"), 42),
            PathBuf::from("/tmp/run.42")
        );
    }

    #[test]
    fn test_cli_overrides_win() {
        let config = LogConfig::from_lookup(lookup(&[("RUST_LOG", "warn")]))
            .with_overrides(Some("debug".to_string()), Some(PathBuf::from("/tmp/cli.log")));
        assert_eq!(config.level, "debug");
        assert_eq!(config.file_path, Some(PathBuf::from("/tmp/cli.log")));

        let untouched = LogConfig::default().with_overrides(None, None);
        assert_eq!(untouched, LogConfig::default());
    }
}
