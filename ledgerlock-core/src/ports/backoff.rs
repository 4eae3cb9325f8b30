//! Backoff port - delay between contended transfer attempts

use std::time::Duration;

/// Decides how long to wait after a failed attempt before retrying
///
/// `attempt` is the 1-based number of the attempt that just failed.
pub trait BackoffPolicy: Send + Sync {
    fn delay(&self, attempt: u32) -> Duration;

    /// Short name for logs and reports
    fn name(&self) -> &'static str;
}
