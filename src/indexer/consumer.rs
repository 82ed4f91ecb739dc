//! Queue-consumer batch algorithm
//!
//! Deletes are applied per record; upserts are accumulated and applied as
//! one batched `index()` call. When a backend call fails, `ping()` decides
//! the outcome: a live backend rejected the records (application-level,
//! drop with log), a dead backend is a transient outage (return the records
//! for redelivery). This asymmetry keeps a malformed record from looping
//! forever while still riding out restarts and network blips.

use std::sync::Arc;

use crate::queue::BatchHandler;
use crate::types::IndexMutationRecord;

use super::holder::IndexerHolder;

/// Build the handler registered with the mutation queue.
pub(crate) fn batch_handler(holder: IndexerHolder) -> BatchHandler {
    Arc::new(move |batch| {
        let holder = holder.clone();
        Box::pin(async move { process_batch(&holder, batch).await })
    })
}

/// Apply one delivered batch; the returned records are the residual the
/// queue must redeliver.
pub(crate) async fn process_batch(
    holder: &IndexerHolder,
    batch: Vec<IndexMutationRecord>,
) -> Vec<IndexMutationRecord> {
    let Some(backend) = holder.get().await else {
        tracing::error!("mutation handler could not obtain an index backend");
        return batch;
    };

    let mut upserts = Vec::with_capacity(batch.len());
    let mut unhandled = Vec::new();
    for record in batch {
        tracing::trace!(
            id = record.id,
            ids = ?record.ids,
            is_delete = record.is_delete,
            "processing mutation record"
        );
        if record.is_delete {
            if let Err(err) = backend.delete(&record.ids).await {
                tracing::error!(ids = ?record.ids, error = %err, "deleting from index failed");
                if backend.ping().await {
                    // Live backend rejected the record: dropping it is the
                    // only way out of an infinite redelivery loop.
                    continue;
                }
                unhandled.push(record);
            }
            continue;
        }
        upserts.push(record);
    }

    if !unhandled.is_empty() {
        // Preserve relative ordering on retry: the not-yet-attempted
        // upserts ride along behind the failed deletes.
        unhandled.extend(upserts);
        return unhandled;
    }

    if let Err(err) = backend.index(&upserts).await {
        tracing::error!(count = upserts.len(), error = %err, "indexing batch failed");
        if backend.ping().await {
            return Vec::new();
        }
        return upserts;
    }
    Vec::new()
}
