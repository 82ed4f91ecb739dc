//! Durable work-queue contract for index mutations
//!
//! The indexer consumes a generic queue abstraction rather than owning
//! persistence or retry. The contract is at-least-once batch delivery: the
//! registered handler returns whatever residual it could not apply, and the
//! queue redelivers exactly that residual later. [`ChannelQueue`] is the
//! in-process implementation.

mod channel;

pub use channel::ChannelQueue;

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

use crate::types::IndexMutationRecord;

/// Batch handler registered by the consumer. The returned records are the
/// batch's residual work; the queue redelivers them. Must be safe to invoke
/// concurrently.
pub type BatchHandler = Arc<
    dyn Fn(Vec<IndexMutationRecord>) -> BoxFuture<'static, Vec<IndexMutationRecord>>
        + Send
        + Sync,
>;

#[derive(Debug, Error)]
pub enum QueueError {
    /// Too many records buffered; the producer must slow down.
    #[error("queue backpressure: {pending} records pending (limit {limit})")]
    Backpressure { pending: usize, limit: usize },

    /// The consumer side has gone away.
    #[error("queue is closed")]
    Closed,
}

#[async_trait]
pub trait MutationQueue: Send + Sync {
    /// Buffer one mutation record. Never blocks on backend readiness.
    async fn push(&self, record: IndexMutationRecord) -> Result<(), QueueError>;

    /// Consume records in batches until `shutdown` signals, draining
    /// already-buffered records before returning.
    async fn run(&self, handler: BatchHandler, shutdown: watch::Receiver<bool>);

    /// Stop delivering batches until [`MutationQueue::resume`].
    fn pause(&self);

    /// Resume delivery after a pause.
    fn resume(&self);

    /// Number of records buffered but not yet applied.
    fn pending(&self) -> usize;
}
