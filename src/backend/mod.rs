//! Pluggable content-index backends
//!
//! One trait, three variants: an embedded tantivy index, an external
//! Elasticsearch-compatible service, and a pass-through that queries the
//! primary store directly when no dedicated engine is configured.

pub mod database;
pub mod elastic;
pub mod embedded;

pub use database::DbBackend;
pub use elastic::ElasticBackend;
pub use embedded::EmbeddedBackend;

use async_trait::async_trait;

use crate::errors::IndexResult;
use crate::types::{IndexMutationRecord, SearchResults};

/// Contract every index backend variant implements.
///
/// `init` runs once, before the instance is shared; every other operation
/// takes `&self` and must be safe for concurrent callers. `close` is called
/// exactly once during graceful shutdown, after feeding stops.
#[async_trait]
pub trait IndexBackend: Send + Sync {
    /// Open or create the index storage. Returns whether a pre-existing
    /// index was found, which decides whether population is needed.
    async fn init(&mut self) -> IndexResult<bool>;

    /// Cheap liveness probe with a short bounded timeout. Decides whether a
    /// failed batch apply is transient (retry) or an application-level
    /// rejection (drop with log).
    async fn ping(&self) -> bool;

    /// Upsert a batch of non-delete records. Idempotent: re-indexing an id
    /// replaces the prior entry entirely.
    async fn index(&self, batch: &[IndexMutationRecord]) -> IndexResult<()>;

    /// Remove entries by id. Deleting a non-existent id is not an error.
    async fn delete(&self, ids: &[i64]) -> IndexResult<()>;

    /// Keyword search, relevance-descending. Empty `repo_ids` means no
    /// repository restriction; visibility filtering is the caller's job.
    async fn search(
        &self,
        keyword: &str,
        repo_ids: &[i64],
        limit: usize,
        offset: usize,
    ) -> IndexResult<SearchResults>;

    /// Release underlying resources.
    async fn close(&self);
}
