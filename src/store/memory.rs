//! In-memory issue store for tests and small deployments

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;

use super::{CommentKind, Issue, IssueStore};

#[derive(Default)]
pub struct MemoryIssueStore {
    repos: RwLock<BTreeMap<i64, Vec<Issue>>>,
}

impl MemoryIssueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a repository, with or without issues.
    pub fn add_repository(&self, repo_id: i64) {
        self.repos.write().entry(repo_id).or_default();
    }

    /// Add an issue under its owning repository.
    pub fn add_issue(&self, issue: Issue) {
        self.repos.write().entry(issue.repo_id).or_default().push(issue);
    }

    /// Drop a repository and its issues.
    pub fn remove_repository(&self, repo_id: i64) {
        self.repos.write().remove(&repo_id);
    }
}

fn matches_keyword(issue: &Issue, keyword: &str) -> bool {
    let keyword = keyword.to_lowercase();
    issue.title.to_lowercase().contains(&keyword)
        || issue.content.to_lowercase().contains(&keyword)
        || issue
            .comments
            .iter()
            .filter(|c| c.kind == CommentKind::Regular)
            .any(|c| c.content.to_lowercase().contains(&keyword))
}

#[async_trait]
impl IssueStore for MemoryIssueStore {
    async fn ping(&self) -> bool {
        true
    }

    async fn repository_ids(&self, page: usize, page_size: usize) -> Result<Vec<i64>> {
        let repos = self.repos.read();
        let skip = page.saturating_sub(1).saturating_mul(page_size);
        Ok(repos.keys().copied().skip(skip).take(page_size).collect())
    }

    async fn issues_with_comments(&self, repo_id: i64) -> Result<Vec<Issue>> {
        let repos = self.repos.read();
        Ok(repos.get(&repo_id).cloned().unwrap_or_default())
    }

    async fn issue_ids(&self, repo_id: i64) -> Result<Vec<i64>> {
        let repos = self.repos.read();
        Ok(repos
            .get(&repo_id)
            .map(|issues| issues.iter().map(|issue| issue.id).collect())
            .unwrap_or_default())
    }

    async fn search_issue_ids(
        &self,
        keyword: &str,
        repo_ids: &[i64],
        limit: usize,
        offset: usize,
    ) -> Result<(u64, Vec<i64>)> {
        let repos = self.repos.read();
        let mut ids: Vec<i64> = repos
            .iter()
            .filter(|(repo_id, _)| repo_ids.is_empty() || repo_ids.contains(repo_id))
            .flat_map(|(_, issues)| issues.iter())
            .filter(|issue| matches_keyword(issue, keyword))
            .map(|issue| issue.id)
            .collect();
        ids.sort_unstable_by(|a, b| b.cmp(a));

        let total = ids.len() as u64;
        let page = ids.into_iter().skip(offset).take(limit).collect();
        Ok((total, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Comment;

    fn issue(id: i64, repo_id: i64, title: &str, comment: &str) -> Issue {
        Issue {
            id,
            repo_id,
            title: title.to_string(),
            content: String::new(),
            is_closed: false,
            is_pull: false,
            comments: vec![Comment {
                kind: CommentKind::Regular,
                content: comment.to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn repository_pages_are_id_ordered() {
        let store = MemoryIssueStore::new();
        for repo_id in [5, 1, 9, 3] {
            store.add_repository(repo_id);
        }
        assert_eq!(store.repository_ids(1, 3).await.unwrap(), vec![1, 3, 5]);
        assert_eq!(store.repository_ids(2, 3).await.unwrap(), vec![9]);
        assert!(store.repository_ids(3, 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn keyword_search_scans_title_and_regular_comments() {
        let store = MemoryIssueStore::new();
        store.add_issue(issue(1, 7, "fix login bug", "see patch attached"));
        store.add_issue(issue(2, 7, "docs cleanup", "unrelated"));
        store.add_issue(issue(3, 8, "login flow rework", ""));

        let (total, ids) = store.search_issue_ids("login", &[7], 50, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(ids, vec![1]);

        let (total, _) = store.search_issue_ids("login", &[], 50, 0).await.unwrap();
        assert_eq!(total, 2);

        let (total, ids) = store.search_issue_ids("patch", &[7], 50, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(ids, vec![1]);
    }
}
