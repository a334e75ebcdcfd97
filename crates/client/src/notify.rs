use tracing::{info, warn};

/// Fire-and-forget notification sink.
///
/// The embedding application decides how messages reach the user (desktop
/// notifications in the reference shell); the core only emits them.
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

/// Notifier that writes to the log instead of a UI.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn success(&self, message: &str) {
        info!(target: "stowbox::notify", "{message}");
    }

    fn error(&self, message: &str) {
        warn!(target: "stowbox::notify", "{message}");
    }
}
