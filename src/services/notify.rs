use tracing::{info, warn};

/// Sink for terminal mutation outcomes. The embedding surface decides how
/// to present them; the controller only guarantees exactly one call per
/// settled intent.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn success(&self, action: &str);
    fn failure(&self, action: &str, detail: &str);
}

/// Default sink: structured log lines.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn success(&self, action: &str) {
        info!(action, "completed");
    }

    fn failure(&self, action: &str, detail: &str) {
        warn!(action, detail, "failed");
    }
}
