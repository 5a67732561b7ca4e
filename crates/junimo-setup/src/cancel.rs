//! Cooperative cancellation between a driving thread and a worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Clonable cancellation flag.
///
/// Workers poll the flag at checkpoints (between components, between
/// chunks) and wind down on their own; no filesystem operation is ever
/// interrupted mid-write. Each worker phase carries its own token, so
/// canceling a finished download batch has no effect on a later install.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent; never unset.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_clear_and_cancels_once() {
        let token = CancelToken::new();
        assert!(!token.is_canceled());
        token.cancel();
        assert!(token.is_canceled());
        token.cancel();
        assert!(token.is_canceled());
    }

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_canceled());
    }

    #[test]
    fn separate_tokens_are_independent() {
        let download = CancelToken::new();
        let install = CancelToken::new();
        download.cancel();
        assert!(download.is_canceled());
        assert!(!install.is_canceled());
    }
}
