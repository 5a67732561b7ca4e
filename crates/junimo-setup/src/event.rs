//! Progress and completion signals emitted by the download and install
//! workers.
//!
//! The workers call the sink synchronously, so implementations should hand
//! events off to their own UI machinery rather than block.

use crate::downloader::DownloadSummary;
use crate::installer::InstallOutcome;

/// Sink for worker progress and completion signals.
pub trait Notifier: Send + Sync {
    /// Human-readable progress line.
    fn notify(&self, message: &str);

    /// Byte progress for an in-flight download. `total` is `None` when the
    /// server does not announce a length.
    fn download_progress(&self, _component: &str, _received: u64, _total: Option<u64>) {}

    /// Fired exactly once per download batch, including batches that end
    /// early through cancellation.
    fn downloads_complete(&self, _summary: &DownloadSummary) {}

    /// Fired exactly once when an install run completes normally.
    fn install_complete(&self, _outcome: &InstallOutcome) {}
}

/// Notifier that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _message: &str) {}
}
