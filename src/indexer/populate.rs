//! Cold-start population of an empty index
//!
//! Walks every repository in immutable-id order and re-enqueues all of its
//! issues through the regular mutation pipeline, so ordering and failure
//! handling are identical to live updates. Safe to interrupt and resume:
//! indexing is idempotent.

use tokio::sync::watch;

use super::IndexCoordinator;

pub(crate) async fn populate(coordinator: &IndexCoordinator, shutdown: watch::Receiver<bool>) {
    let page_size = coordinator.config().populate_page_size();
    tracing::info!(page_size, "populating issue index from the primary store");

    let mut page = 1usize;
    loop {
        if *shutdown.borrow() {
            tracing::warn!("issue index population interrupted by shutdown");
            return;
        }
        let repo_ids = match coordinator.store().repository_ids(page, page_size).await {
            Ok(ids) => ids,
            Err(err) => {
                tracing::error!(page, error = %err, "listing repositories for population failed");
                page += 1;
                continue;
            }
        };
        if repo_ids.is_empty() {
            tracing::debug!("issue index population complete");
            return;
        }
        for repo_id in repo_ids {
            if *shutdown.borrow() {
                tracing::warn!("issue index population interrupted by shutdown");
                return;
            }
            coordinator.update_repo_index(repo_id).await;
        }
        page += 1;
    }
}
