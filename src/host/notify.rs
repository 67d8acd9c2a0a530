//! User-facing notifications

use tracing::{error, info, warn};

/// Surfaces messages to the user at three severities
pub trait Notifier: Send + Sync {
    fn show_info(&self, message: &str);
    fn show_warning(&self, message: &str);
    fn show_error(&self, message: &str);
}

/// Writes notifications to stderr, mirroring them to tracing
#[derive(Debug, Clone, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn show_info(&self, message: &str) {
        info!(notification = true, "{}", message);
        eprintln!("{message}");
    }

    fn show_warning(&self, message: &str) {
        warn!(notification = true, "{}", message);
        eprintln!("warning: {message}");
    }

    fn show_error(&self, message: &str) {
        error!(notification = true, "{}", message);
        eprintln!("error: {message}");
    }
}
