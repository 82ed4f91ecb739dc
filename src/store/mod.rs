//! Data access to the primary relational store
//!
//! The indexer never talks to issue tables directly; everything flows
//! through the [`IssueStore`] contract so the coordinator, the populator,
//! and the direct-database backend all share one seam. [`SqliteIssueStore`]
//! is the reference implementation; [`MemoryIssueStore`] backs tests and
//! small deployments.

mod memory;
mod sqlite;

pub use memory::MemoryIssueStore;
pub use sqlite::SqliteIssueStore;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Comment classification. Only regular discussion comments are indexed;
/// review and system comments carry no searchable prose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentKind {
    Regular,
    Review,
    System,
}

impl CommentKind {
    pub(crate) fn code(self) -> i64 {
        match self {
            CommentKind::Regular => 0,
            CommentKind::Review => 1,
            CommentKind::System => 2,
        }
    }

    pub(crate) fn from_code(code: i64) -> Self {
        match code {
            0 => CommentKind::Regular,
            1 => CommentKind::Review,
            _ => CommentKind::System,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub kind: CommentKind,
    pub content: String,
}

/// An issue or pull request with whatever comments the store loaded for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: i64,
    pub repo_id: i64,
    pub title: String,
    pub content: String,
    pub is_closed: bool,
    pub is_pull: bool,
    pub comments: Vec<Comment>,
}

/// Read access the indexing subsystem requires from the primary store.
#[async_trait]
pub trait IssueStore: Send + Sync {
    /// Cheap liveness probe, used by the direct-database backend.
    async fn ping(&self) -> bool;

    /// One page of repository ids, ordered by id ascending. Pages are
    /// 1-based. Ordering by the immutable id keeps a walk resumable even
    /// when repositories are created or deleted mid-walk.
    async fn repository_ids(&self, page: usize, page_size: usize) -> Result<Vec<i64>>;

    /// All issues and pull requests of a repository, open and closed, with
    /// their regular comments loaded.
    async fn issues_with_comments(&self, repo_id: i64) -> Result<Vec<Issue>>;

    /// Ids of every issue owned by a repository.
    async fn issue_ids(&self, repo_id: i64) -> Result<Vec<i64>>;

    /// Substring keyword search straight against the store, scoped to
    /// `repo_ids` unless empty. Returns the total match count and one page
    /// of ids.
    async fn search_issue_ids(
        &self,
        keyword: &str,
        repo_ids: &[i64],
        limit: usize,
        offset: usize,
    ) -> Result<(u64, Vec<i64>)>;
}
