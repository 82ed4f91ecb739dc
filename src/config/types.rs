//! Core configuration types for issue indexing

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::IndexerError;

/// Which index backend variant the coordinator should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process tantivy index on local disk
    Embedded,
    /// External Elasticsearch-compatible service
    Elasticsearch,
    /// No dedicated index; search queries the primary store directly
    Database,
}

impl FromStr for BackendKind {
    type Err = IndexerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "embedded" => Ok(BackendKind::Embedded),
            "elasticsearch" => Ok(BackendKind::Elasticsearch),
            "database" => Ok(BackendKind::Database),
            other => Err(IndexerError::UnknownBackend(other.to_string())),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BackendKind::Embedded => "embedded",
            BackendKind::Elasticsearch => "elasticsearch",
            BackendKind::Database => "database",
        };
        f.write_str(name)
    }
}

/// Configuration for the index coordinator and its collaborators.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub(crate) backend: BackendKind,
    pub(crate) index_path: PathBuf,
    pub(crate) connection_url: String,
    pub(crate) index_name: String,
    pub(crate) batch_size: usize,
    pub(crate) max_pending: usize,
    pub(crate) flush_interval: Duration,
    pub(crate) redelivery_delay: Duration,
    pub(crate) startup_timeout: Option<Duration>,
    pub(crate) populate_synchronously: bool,
    pub(crate) populate_page_size: usize,
    pub(crate) search_limit: usize,
    pub(crate) writer_memory_budget: usize,
}

impl IndexerConfig {
    /// Create a config builder with production defaults.
    #[must_use]
    pub fn builder() -> super::IndexerConfigBuilder {
        super::IndexerConfigBuilder::new()
    }

    /// Selected backend variant.
    #[must_use]
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Storage directory for the embedded index.
    #[must_use]
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Base URL of the external search service.
    #[must_use]
    pub fn connection_url(&self) -> &str {
        &self.connection_url
    }

    /// Index name on the external search service.
    #[must_use]
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Number of mutation records delivered to the consumer per batch.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Pending-record ceiling before the queue reports backpressure.
    #[must_use]
    pub fn max_pending(&self) -> usize {
        self.max_pending
    }

    /// Maximum wait before a partial batch is dispatched.
    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Delay before unhandled records are returned to the queue.
    #[must_use]
    pub fn redelivery_delay(&self) -> Duration {
        self.redelivery_delay
    }

    /// Window the backend has to initialize before the condition is fatal.
    /// `None` disables the watchdog.
    #[must_use]
    pub fn startup_timeout(&self) -> Option<Duration> {
        self.startup_timeout
    }

    /// Whether cold-start population runs inside the initialization task
    /// rather than in the background.
    #[must_use]
    pub fn populate_synchronously(&self) -> bool {
        self.populate_synchronously
    }

    /// Repositories fetched per page while populating a cold index.
    #[must_use]
    pub fn populate_page_size(&self) -> usize {
        self.populate_page_size
    }

    /// Maximum hits returned by coordinator-level search.
    #[must_use]
    pub fn search_limit(&self) -> usize {
        self.search_limit
    }

    /// Heap budget handed to the embedded index writer, in bytes.
    #[must_use]
    pub fn writer_memory_budget(&self) -> usize {
        self.writer_memory_budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_parses_known_names() {
        assert_eq!(
            "embedded".parse::<BackendKind>().unwrap(),
            BackendKind::Embedded
        );
        assert_eq!(
            "elasticsearch".parse::<BackendKind>().unwrap(),
            BackendKind::Elasticsearch
        );
        assert_eq!(
            "database".parse::<BackendKind>().unwrap(),
            BackendKind::Database
        );
    }

    #[test]
    fn backend_kind_rejects_unknown_names() {
        let err = "solr".parse::<BackendKind>().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("solr"));
    }
}
