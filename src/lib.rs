//! Keyword search index for issues and pull requests
//!
//! This crate keeps a searchable secondary index of issue text content
//! (title, body, regular comments) synchronized with the primary relational
//! store, and serves keyword search against it. Index mutations travel
//! through a durable work queue so the request path that edits issues never
//! blocks on the search backend; three backend variants (embedded tantivy
//! index, external Elasticsearch-compatible service, direct-database
//! pass-through) sit behind one trait.
//!
//! Wiring order: build an [`IndexerConfig`], construct the queue and store
//! collaborators, hand everything to [`IndexCoordinator::new`], then call
//! [`IndexCoordinator::initialize`].

pub mod backend;
pub mod config;
pub mod errors;
pub mod graceful;
pub mod indexer;
pub mod queue;
pub mod store;
pub mod types;

pub use backend::{DbBackend, ElasticBackend, EmbeddedBackend, IndexBackend};
pub use config::{BackendKind, IndexerConfig, IndexerConfigBuilder};
pub use errors::{IndexResult, IndexerError};
pub use graceful::ShutdownManager;
pub use indexer::{IndexCoordinator, IndexerHolder};
pub use queue::{BatchHandler, ChannelQueue, MutationQueue, QueueError};
pub use store::{
    Comment, CommentKind, Issue, IssueStore, MemoryIssueStore, SqliteIssueStore,
};
pub use types::{IndexMutationRecord, SearchMatch, SearchResults};
