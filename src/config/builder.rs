//! Fluent builder for [`IndexerConfig`]
//!
//! Every knob has a usable default; `build` validates the combination that
//! was actually selected (an embedded backend needs a storage path, an
//! external one needs a connection URL).

use anyhow::{Result, ensure};
use std::path::PathBuf;
use std::time::Duration;

use super::types::{BackendKind, IndexerConfig};

const DEFAULT_BATCH_SIZE: usize = 20;
const DEFAULT_MAX_PENDING: usize = 10_000;
const DEFAULT_FLUSH_INTERVAL_MS: u64 = 100;
const DEFAULT_REDELIVERY_DELAY_MS: u64 = 1_000;
const DEFAULT_POPULATE_PAGE_SIZE: usize = 50;
const DEFAULT_SEARCH_LIMIT: usize = 50;
const DEFAULT_WRITER_MEMORY_BUDGET: usize = 50_000_000;

pub struct IndexerConfigBuilder {
    backend: BackendKind,
    index_path: Option<PathBuf>,
    connection_url: Option<String>,
    index_name: String,
    batch_size: usize,
    max_pending: usize,
    flush_interval: Duration,
    redelivery_delay: Duration,
    startup_timeout: Option<Duration>,
    populate_synchronously: bool,
    populate_page_size: usize,
    search_limit: usize,
    writer_memory_budget: usize,
}

impl Default for IndexerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexerConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            backend: BackendKind::Embedded,
            index_path: None,
            connection_url: None,
            index_name: "issues".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_pending: DEFAULT_MAX_PENDING,
            flush_interval: Duration::from_millis(DEFAULT_FLUSH_INTERVAL_MS),
            redelivery_delay: Duration::from_millis(DEFAULT_REDELIVERY_DELAY_MS),
            startup_timeout: None,
            populate_synchronously: false,
            populate_page_size: DEFAULT_POPULATE_PAGE_SIZE,
            search_limit: DEFAULT_SEARCH_LIMIT,
            writer_memory_budget: DEFAULT_WRITER_MEMORY_BUDGET,
        }
    }

    #[must_use]
    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    #[must_use]
    pub fn index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn connection_url(mut self, url: impl Into<String>) -> Self {
        self.connection_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        self.index_name = name.into();
        self
    }

    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    #[must_use]
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    #[must_use]
    pub fn redelivery_delay(mut self, delay: Duration) -> Self {
        self.redelivery_delay = delay;
        self
    }

    #[must_use]
    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn populate_synchronously(mut self, synchronous: bool) -> Self {
        self.populate_synchronously = synchronous;
        self
    }

    #[must_use]
    pub fn populate_page_size(mut self, page_size: usize) -> Self {
        self.populate_page_size = page_size;
        self
    }

    #[must_use]
    pub fn search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }

    #[must_use]
    pub fn writer_memory_budget(mut self, bytes: usize) -> Self {
        self.writer_memory_budget = bytes;
        self
    }

    /// Validate the selected combination and produce the config.
    pub fn build(self) -> Result<IndexerConfig> {
        ensure!(self.batch_size > 0, "batch_size must be non-zero");
        ensure!(
            self.populate_page_size > 0,
            "populate_page_size must be non-zero"
        );
        ensure!(self.search_limit > 0, "search_limit must be non-zero");

        let index_path = match self.backend {
            BackendKind::Embedded => {
                let path = self
                    .index_path
                    .ok_or_else(|| anyhow::anyhow!("embedded backend requires an index path"))?;
                ensure!(
                    !path.as_os_str().is_empty(),
                    "embedded backend requires a non-empty index path"
                );
                path
            }
            _ => self.index_path.unwrap_or_default(),
        };

        let connection_url = match self.backend {
            BackendKind::Elasticsearch => {
                let url = self.connection_url.ok_or_else(|| {
                    anyhow::anyhow!("elasticsearch backend requires a connection URL")
                })?;
                ensure!(
                    !url.is_empty(),
                    "elasticsearch backend requires a non-empty connection URL"
                );
                url
            }
            _ => self.connection_url.unwrap_or_default(),
        };

        Ok(IndexerConfig {
            backend: self.backend,
            index_path,
            connection_url,
            index_name: self.index_name,
            batch_size: self.batch_size,
            max_pending: self.max_pending,
            flush_interval: self.flush_interval,
            redelivery_delay: self.redelivery_delay,
            startup_timeout: self.startup_timeout,
            populate_synchronously: self.populate_synchronously,
            populate_page_size: self.populate_page_size,
            search_limit: self.search_limit,
            writer_memory_budget: self.writer_memory_budget,
        })
    }
}
