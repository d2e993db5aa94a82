use tracing::warn;

/// Sink for user-visible messages.
///
/// The host surfaces these (toast, status bar, ...); the engine only reports.
pub trait Notifier: Send + Sync {
	/// Report an error the user should see.
	fn error(&self, message: &str);
}

/// Notifier writing messages to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
	fn error(&self, message: &str) {
		warn!(message, "user notice");
	}
}
