//! Configuration for the issue indexing subsystem
//!
//! Backend selection, storage locations, queue batching knobs, and the
//! startup/population behavior are all owned by [`IndexerConfig`], built
//! through the fluent [`IndexerConfigBuilder`].

mod builder;
mod types;

pub use builder::IndexerConfigBuilder;
pub use types::{BackendKind, IndexerConfig};
