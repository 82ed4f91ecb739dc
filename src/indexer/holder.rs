//! Single-slot publication of the active backend
//!
//! Readers suspend until backend initialization either succeeds (`set`) or
//! fails fatally (`cancel`). Both transitions are terminal and whichever
//! happens first wins; later calls are ignored.

use std::sync::Arc;

use tokio::sync::watch;

use crate::backend::IndexBackend;

#[derive(Clone)]
enum HolderState {
    Pending,
    Ready(Arc<dyn IndexBackend>),
    Cancelled,
}

#[derive(Clone)]
pub struct IndexerHolder {
    state: Arc<watch::Sender<HolderState>>,
}

impl Default for IndexerHolder {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexerHolder {
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(HolderState::Pending);
        Self {
            state: Arc::new(state),
        }
    }

    /// Publish the initialized backend and wake every blocked reader.
    pub fn set(&self, backend: Arc<dyn IndexBackend>) {
        self.state.send_if_modified(|state| {
            if matches!(state, HolderState::Pending) {
                *state = HolderState::Ready(backend);
                true
            } else {
                false
            }
        });
    }

    /// Mark initialization as failed and wake every blocked reader; they
    /// observe `None` and must treat indexing as unavailable.
    pub fn cancel(&self) {
        self.state.send_if_modified(|state| {
            if matches!(state, HolderState::Pending) {
                *state = HolderState::Cancelled;
                true
            } else {
                false
            }
        });
    }

    /// Obtain the backend, suspending (not spinning) until `set` or
    /// `cancel`. Returns immediately once either transition has happened.
    pub async fn get(&self) -> Option<Arc<dyn IndexBackend>> {
        let mut rx = self.state.subscribe();
        loop {
            match &*rx.borrow_and_update() {
                HolderState::Ready(backend) => return Some(Arc::clone(backend)),
                HolderState::Cancelled => return None,
                HolderState::Pending => {}
            }
            if rx.changed().await.is_err() {
                return None;
            }
        }
    }
}
