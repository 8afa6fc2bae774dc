//! Cancellation signal for running jobs.
//!
//! A watch channel under the hood: the handle flips the flag, every token
//! clone observes it. Dropping the handle without cancelling leaves the
//! tokens pending forever, so a job without a caller-side handle simply
//! never cancels.

use tokio::sync::watch;

/// Caller-side trigger.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Signal every token derived from this handle.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Job-side signal, clonable and awaitable.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// A token that can never fire.
    pub fn never() -> Self {
        let (_handle, token) = cancel_pair();
        token
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is requested; pend forever otherwise.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                // Handle dropped without cancelling: never resolves.
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Create a linked handle/token pair.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}
