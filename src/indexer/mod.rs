//! Issue index coordination
//!
//! [`IndexCoordinator`] wires the pieces together: it selects the backend
//! variant from configuration, initializes it on a background task, publishes
//! it through the [`IndexerHolder`], attaches the queue consumer, triggers
//! cold-start population, and exposes the mutation/search API the rest of
//! the system calls.

mod consumer;
mod holder;
mod populate;

pub use holder::IndexerHolder;

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use crate::backend::{DbBackend, ElasticBackend, EmbeddedBackend, IndexBackend};
use crate::config::{BackendKind, IndexerConfig};
use crate::errors::{IndexResult, IndexerError};
use crate::graceful::ShutdownManager;
use crate::queue::MutationQueue;
use crate::store::{CommentKind, Issue, IssueStore};
use crate::types::IndexMutationRecord;

pub struct IndexCoordinator {
    config: IndexerConfig,
    holder: IndexerHolder,
    queue: Arc<dyn MutationQueue>,
    store: Arc<dyn IssueStore>,
    graceful: ShutdownManager,
    // Self-handle so spawned tasks can outlive the borrow they were
    // started from; upgrading cannot fail while a caller holds the Arc.
    this: Weak<IndexCoordinator>,
}

impl IndexCoordinator {
    #[must_use]
    pub fn new(
        config: IndexerConfig,
        queue: Arc<dyn MutationQueue>,
        store: Arc<dyn IssueStore>,
        graceful: ShutdownManager,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            config,
            holder: IndexerHolder::new(),
            queue,
            store,
            graceful,
            this: this.clone(),
        })
    }

    pub(crate) fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &Arc<dyn IssueStore> {
        &self.store
    }

    /// Handle to the shutdown manager driving this coordinator.
    #[must_use]
    pub fn graceful(&self) -> &ShutdownManager {
        &self.graceful
    }

    /// Start the indexing subsystem.
    ///
    /// Backend construction can be slow (opening index files, establishing a
    /// connection), so it runs on a spawned task; the queue consumer starts
    /// immediately and buffers mutations until the backend is published.
    /// With `synchronous` the call returns only once initialization (and,
    /// when `populate_synchronously` is set, population) has finished or
    /// shutdown has begun. Otherwise a configured `startup_timeout` arms a
    /// watchdog that treats an overdue initialization as fatal, unless
    /// shutdown is already in progress.
    pub async fn initialize(&self, synchronous: bool) -> IndexResult<()> {
        let Some(this) = self.this.upgrade() else {
            return Err(IndexerError::Other(
                "index coordinator dropped before initialization".to_string(),
            ));
        };

        let handler = consumer::batch_handler(self.holder.clone());
        let consumer_queue = Arc::clone(&self.queue);
        let consumer_shutdown = self.graceful.subscribe();
        tokio::spawn(async move {
            consumer_queue.run(handler, consumer_shutdown).await;
        });

        let (done_tx, done_rx) = oneshot::channel::<IndexResult<Duration>>();
        let init_this = Arc::clone(&this);
        tokio::spawn(async move {
            let this = init_this;
            let start = Instant::now();
            tracing::info!(backend = %this.config.backend(), "initializing issue index backend");
            let needs_population = match this.install_backend().await {
                Ok(needs_population) => needs_population,
                Err(err) => {
                    this.holder.cancel();
                    tracing::error!(error = %err, "issue index backend initialization failed");
                    this.graceful.fail().await;
                    let _ = done_tx.send(Err(err));
                    return;
                }
            };

            if needs_population {
                if this.config.populate_synchronously() {
                    populate::populate(&this, this.graceful.subscribe()).await;
                } else {
                    let background = Arc::clone(&this);
                    tokio::spawn(async move {
                        populate::populate(&background, background.graceful.subscribe()).await;
                    });
                }
            }
            let _ = done_tx.send(Ok(start.elapsed()));
        });

        if synchronous {
            let mut shutdown = self.graceful.subscribe();
            tokio::select! {
                // A failed initialization also begins shutdown; prefer the
                // concrete result when both are ready.
                biased;
                result = done_rx => match result {
                    Ok(Ok(elapsed)) => {
                        tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "issue index initialization finished");
                        Ok(())
                    }
                    Ok(Err(err)) => Err(err),
                    Err(_) => Err(IndexerError::Other(
                        "issue index initialization task aborted".to_string(),
                    )),
                },
                _ = wait_for_shutdown(&mut shutdown) => {
                    tracing::warn!("shutdown began before issue index initialization completed");
                    Ok(())
                }
            }
        } else {
            if let Some(timeout) = self.config.startup_timeout() {
                tokio::spawn(async move {
                    let mut shutdown = this.graceful.subscribe();
                    tokio::select! {
                        result = done_rx => {
                            if let Ok(Ok(elapsed)) = result {
                                tracing::info!(
                                    elapsed_ms = elapsed.as_millis() as u64,
                                    "issue index initialization finished"
                                );
                            }
                        }
                        _ = wait_for_shutdown(&mut shutdown) => {
                            tracing::warn!("shutdown began before issue index initialization completed");
                        }
                        _ = tokio::time::sleep(timeout) => {
                            if this.graceful.is_shutdown() {
                                return;
                            }
                            let err = IndexerError::StartupTimeout(timeout);
                            tracing::error!(error = %err, "issue index failed to come up in time");
                            this.holder.cancel();
                            this.graceful.fail().await;
                        }
                    }
                });
            }
            Ok(())
        }
    }

    /// Construct and initialize the configured backend, publish it, and
    /// register its close hook. Returns whether population is needed.
    async fn install_backend(&self) -> IndexResult<bool> {
        let mut backend: Box<dyn IndexBackend> = match self.config.backend() {
            BackendKind::Embedded => Box::new(EmbeddedBackend::new(
                self.config.index_path().to_path_buf(),
                self.config.writer_memory_budget(),
            )),
            BackendKind::Elasticsearch => Box::new(ElasticBackend::new(
                self.config.connection_url(),
                self.config.index_name(),
            )?),
            BackendKind::Database => Box::new(DbBackend::new(Arc::clone(&self.store))),
        };

        let existed = backend.init().await?;
        let backend: Arc<dyn IndexBackend> = Arc::from(backend);
        self.holder.set(Arc::clone(&backend));

        self.graceful.on_terminate(move || async move {
            tracing::debug!("closing issue index backend");
            backend.close().await;
        });

        Ok(!existed)
    }

    /// Queue a fresh index entry for an issue's current title, body, and
    /// regular comments. Fire and forget: never blocks on backend readiness,
    /// and push failures are logged rather than surfaced.
    pub async fn update_issue(&self, issue: &Issue) {
        let comments = issue
            .comments
            .iter()
            .filter(|comment| comment.kind == CommentKind::Regular)
            .map(|comment| comment.content.clone())
            .collect();
        let record = IndexMutationRecord::upsert(
            issue.id,
            issue.repo_id,
            issue.title.clone(),
            issue.content.clone(),
            comments,
        );
        tracing::debug!(issue = issue.id, repo = issue.repo_id, "queueing index update");
        if let Err(err) = self.queue.push(record).await {
            tracing::error!(issue = issue.id, error = %err, "unable to queue index update");
        }
    }

    /// Re-enqueue every issue of one repository.
    pub async fn update_repo_index(&self, repo_id: i64) {
        let issues = match self.store.issues_with_comments(repo_id).await {
            Ok(issues) => issues,
            Err(err) => {
                tracing::error!(repo = repo_id, error = %err, "loading issues for reindex failed");
                return;
            }
        };
        for issue in &issues {
            self.update_issue(issue).await;
        }
    }

    /// Queue deletion of every index entry owned by a repository. A no-op
    /// when the repository has no issues.
    pub async fn delete_repository(&self, repo_id: i64) {
        let ids = match self.store.issue_ids(repo_id).await {
            Ok(ids) => ids,
            Err(err) => {
                tracing::error!(repo = repo_id, error = %err, "loading issue ids for index deletion failed");
                return;
            }
        };
        if ids.is_empty() {
            return;
        }
        tracing::debug!(repo = repo_id, count = ids.len(), "queueing index deletion");
        if let Err(err) = self.queue.push(IndexMutationRecord::bulk_delete(ids)).await {
            tracing::error!(repo = repo_id, error = %err, "unable to queue index deletion");
        }
    }

    /// Search issue ids by keyword within the given repositories.
    ///
    /// Blocks until the backend is ready; callers must have already filtered
    /// `repo_ids` down to repositories they are permitted to see.
    pub async fn search(&self, repo_ids: &[i64], keyword: &str) -> IndexResult<Vec<i64>> {
        let Some(backend) = self.holder.get().await else {
            tracing::error!("search requested but indexing is unavailable");
            return Err(IndexerError::Unavailable);
        };
        let results = backend
            .search(keyword, repo_ids, self.config.search_limit(), 0)
            .await?;
        Ok(results.hits.into_iter().map(|hit| hit.id).collect())
    }

    /// Whether the index backend is up, for health-check surfaces. May block
    /// once while the holder is still pending.
    pub async fn is_available(&self) -> bool {
        match self.holder.get().await {
            Some(backend) => backend.ping().await,
            None => false,
        }
    }
}

async fn wait_for_shutdown(rx: &mut tokio::sync::watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}
