//! Abort signalling for workflow runs.
//!
//! The engine arms a fresh [`CancellationTokenSource`] for every run and
//! races each node dispatch against [`CancellationToken::cancelled`]. Hosts
//! hold an [`AbortHandle`], which outlives individual runs and always
//! targets the one in progress.
//!
//! # Example
//!
//! ```ignore
//! let handle = engine.abort_handle();
//! tokio::spawn(async move {
//!     tokio::time::sleep(Duration::from_secs(5)).await;
//!     handle.abort();
//! });
//! let summary = engine.execute(&graph).await?;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;

/// Thread-safe cancellation token.
///
/// Cloning a token shares the underlying state: cancelling the source is
/// observed by every clone.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Returns true if the token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Waits until the token is cancelled.
    ///
    /// Safe to use in `tokio::select!`: dropping the future loses nothing.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking the flag so a cancel in between
            // still wakes us.
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Owner of a token; the only way to cancel it.
#[derive(Clone, Debug)]
pub struct CancellationTokenSource {
    token: CancellationToken,
}

impl CancellationTokenSource {
    /// Creates a source with a fresh, non-cancelled token.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Returns a token sharing this source's state.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancels the token and wakes every waiter. Idempotent.
    pub fn cancel(&self) {
        self.token.cancelled.store(true, Ordering::SeqCst);
        self.token.notify.notify_waiters();
    }

    /// Returns true if [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Default for CancellationTokenSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle that aborts whichever run is currently armed.
#[derive(Clone, Debug, Default)]
pub struct AbortHandle {
    slot: Arc<Mutex<Option<CancellationTokenSource>>>,
}

impl AbortHandle {
    /// Creates a disarmed handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a fresh source for a new run and returns its token.
    pub(crate) fn arm(&self) -> CancellationToken {
        let source = CancellationTokenSource::new();
        let token = source.token();
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(source);
        token
    }

    /// Removes the source once the run has ended.
    pub(crate) fn disarm(&self) {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    /// Signals the current run to abort.
    ///
    /// # Returns
    ///
    /// False if no run was armed.
    pub fn abort(&self) -> bool {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(source) => {
                tracing::info!("abort requested");
                source.cancel();
                true
            }
            None => {
                tracing::debug!("abort requested with no run in progress");
                false
            }
        }
    }

    /// Returns true while a run is armed.
    pub fn is_armed(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
