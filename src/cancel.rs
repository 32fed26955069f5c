//! Cancelling background work.
//!
//! Every task that feeds the store is tied to a [`CancelToken`]. Its
//! [`TaskHandle`] cancels the token either explicitly or when dropped,
//! whichever happens first, and stops the task at its next suspension
//! point. Updates a task has already queued carry the token along so they
//! can be thrown away if they are only looked at after cancellation.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tokio::task::JoinHandle;


//------------ CancelToken ---------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<TokenInner>);

#[derive(Debug, Default)]
struct TokenInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn cancel(&self) {
        if !self.0.cancelled.swap(true, Ordering::SeqCst) {
            self.0.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the token has been cancelled.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking so a concurrent cancel isn’t lost.
            let notified = self.0.notify.notified();
            if self.is_cancelled() {
                return
            }
            notified.await;
        }
    }
}


//------------ TaskHandle ----------------------------------------------------

/// A spawned task that stops when cancelled.
#[derive(Debug)]
pub struct TaskHandle {
    token: CancelToken,
    join: Option<JoinHandle<()>>,
}

impl TaskHandle {
    /// Spawns a task that runs `fut` until it completes or `token` is
    /// cancelled.
    pub fn spawn<F>(token: CancelToken, fut: F) -> Self
    where F: Future<Output = ()> + Send + 'static {
        let task_token = token.clone();
        let join = tokio::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => { }
                _ = fut => { }
            }
        });
        TaskHandle { token, join: Some(join) }
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Cancels the task and waits for it to wind down.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}


//============ Tests =========================================================
