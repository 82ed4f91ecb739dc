//! Process-lifecycle coordination for the indexing subsystem
//!
//! A [`ShutdownManager`] fans a single shutdown signal out to the consumer
//! loop, the populator, and the startup watchdog, and runs registered
//! terminate hooks exactly once. Fatal conditions mark the manager as
//! failed; the embedding binary checks [`ShutdownManager::is_failed`] after
//! shutdown and exits nonzero, since a library cannot end the process
//! itself.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::watch;

type TerminateHook = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

#[derive(Clone)]
pub struct ShutdownManager {
    shutdown: Arc<watch::Sender<bool>>,
    hooks: Arc<Mutex<Vec<TerminateHook>>>,
    failed: Arc<AtomicBool>,
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownManager {
    #[must_use]
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shutdown: Arc::new(shutdown),
            hooks: Arc::new(Mutex::new(Vec::new())),
            failed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe to the shutdown signal. The receiver observes `true` once
    /// shutdown begins.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Check whether shutdown has begun.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Check whether shutdown was initiated by a fatal condition.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Register a cleanup hook to run when shutdown begins.
    ///
    /// Hooks registered after shutdown already began never run; callers that
    /// register resource-closing hooks must do so before feeding work.
    pub fn on_terminate<F, Fut>(&self, hook: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.hooks
            .lock()
            .push(Box::new(move || Box::pin(hook()) as BoxFuture<'static, ()>));
    }

    /// Begin shutdown: publish the signal, then run every registered hook
    /// exactly once, in registration order.
    pub async fn terminate(&self) {
        self.shutdown.send_replace(true);
        let hooks = {
            let mut guard = self.hooks.lock();
            std::mem::take(&mut *guard)
        };
        for hook in hooks {
            hook().await;
        }
    }

    /// Begin shutdown because of a fatal condition.
    pub async fn fail(&self) {
        self.failed.store(true, Ordering::Release);
        self.terminate().await;
    }

    /// Suspend until shutdown begins.
    pub async fn wait(&self) {
        let mut rx = self.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn terminate_runs_hooks_exactly_once() {
        let manager = ShutdownManager::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let hook_calls = Arc::clone(&calls);
        manager.on_terminate(move || async move {
            hook_calls.fetch_add(1, Ordering::SeqCst);
        });

        manager.terminate().await;
        manager.terminate().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(manager.is_shutdown());
        assert!(!manager.is_failed());
    }

    #[tokio::test]
    async fn fail_marks_the_manager() {
        let manager = ShutdownManager::new();
        manager.fail().await;
        assert!(manager.is_shutdown());
        assert!(manager.is_failed());
    }

    #[tokio::test]
    async fn wait_returns_once_shutdown_begins() {
        let manager = ShutdownManager::new();
        let waiter = manager.clone();
        let handle = tokio::spawn(async move { waiter.wait().await });

        tokio::task::yield_now().await;
        manager.terminate().await;

        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("waiter should wake on shutdown")
            .unwrap();
    }
}
