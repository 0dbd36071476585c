use std::{
    future::Future,
    sync::{Arc, Mutex},
};

use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(1000);

/// Trailing-edge debouncer. Arming replaces whatever is pending, so only the
/// last action armed within the window runs.
///
/// An action can only be superseded while it is still waiting. Once its window
/// elapses it runs to completion.
#[derive(Debug, Clone)]
pub struct DebounceTimer {
    window: Duration,
    pending: Arc<Mutex<Option<CancellationToken>>>,
}

impl DebounceTimer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Arc::new(Mutex::new(None)),
        }
    }

    pub fn arm<F, Fut>(&self, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        if let Some(previous) = self.swap_pending(Some(token.clone())) {
            previous.cancel();
        }

        let window = self.window;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(window) => action().await,
                _ = token.cancelled() => {}
            }
        });
    }

    /// Drop the pending action, if any.
    pub fn cancel(&self) {
        if let Some(previous) = self.swap_pending(None) {
            previous.cancel();
        }
    }

    fn swap_pending(&self, next: Option<CancellationToken>) -> Option<CancellationToken> {
        let mut guard = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *guard, next)
    }
}

impl Default for DebounceTimer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_WINDOW)
    }
}
