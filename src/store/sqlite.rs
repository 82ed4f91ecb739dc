//! SQLite-backed issue store
//!
//! Uses WAL mode for concurrent reads during writes and an idempotent
//! schema migration, so opening an existing database is always safe.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use super::{Comment, CommentKind, Issue, IssueStore};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS repository (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS issue (
    id INTEGER PRIMARY KEY,
    repo_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    is_closed INTEGER NOT NULL DEFAULT 0,
    is_pull INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_issue_repo ON issue(repo_id);

CREATE TABLE IF NOT EXISTS comment (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    issue_id INTEGER NOT NULL,
    kind INTEGER NOT NULL DEFAULT 0,
    content TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_comment_issue ON comment(issue_id);
"#;

#[derive(Clone)]
pub struct SqliteIssueStore {
    pool: SqlitePool,
}

impl SqliteIssueStore {
    /// Open an existing database or create a new one at `db_path`.
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create issue store directory")?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .context("Failed to open issue store database")?;

        sqlx::query(SCHEMA_SQL)
            .execute(&pool)
            .await
            .context("Failed to initialize issue store schema")?;

        Ok(Self { pool })
    }

    /// Register a repository row. Idempotent.
    pub async fn create_repository(&self, repo_id: i64, name: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO repository (id, name) VALUES (?, ?)")
            .bind(repo_id)
            .bind(name)
            .execute(&self.pool)
            .await
            .context("Failed to insert repository")?;
        Ok(())
    }

    /// Insert or replace an issue together with its comments.
    pub async fn create_issue(&self, issue: &Issue) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query(
            "INSERT OR REPLACE INTO issue (id, repo_id, title, content, is_closed, is_pull) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(issue.id)
        .bind(issue.repo_id)
        .bind(&issue.title)
        .bind(&issue.content)
        .bind(i64::from(issue.is_closed))
        .bind(i64::from(issue.is_pull))
        .execute(&mut *tx)
        .await
        .context("Failed to insert issue")?;

        sqlx::query("DELETE FROM comment WHERE issue_id = ?")
            .bind(issue.id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear stale comments")?;

        for comment in &issue.comments {
            sqlx::query("INSERT INTO comment (issue_id, kind, content) VALUES (?, ?, ?)")
                .bind(issue.id)
                .bind(comment.kind.code())
                .bind(&comment.content)
                .execute(&mut *tx)
                .await
                .context("Failed to insert comment")?;
        }

        tx.commit().await.context("Failed to commit issue")?;
        Ok(())
    }
}

#[async_trait]
impl IssueStore for SqliteIssueStore {
    async fn ping(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    async fn repository_ids(&self, page: usize, page_size: usize) -> Result<Vec<i64>> {
        let offset = page.saturating_sub(1).saturating_mul(page_size);
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM repository ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(page_size as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list repositories")?;
        Ok(ids)
    }

    async fn issues_with_comments(&self, repo_id: i64) -> Result<Vec<Issue>> {
        let rows = sqlx::query_as::<_, (i64, i64, String, String, i64, i64)>(
            "SELECT id, repo_id, title, content, is_closed, is_pull \
             FROM issue WHERE repo_id = ? ORDER BY id",
        )
        .bind(repo_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load issues")?;

        // One join query for the whole repository instead of a query per issue.
        let comment_rows = sqlx::query_as::<_, (i64, i64, String)>(
            "SELECT c.issue_id, c.kind, c.content FROM comment c \
             JOIN issue i ON i.id = c.issue_id \
             WHERE i.repo_id = ? AND c.kind = ? ORDER BY c.id",
        )
        .bind(repo_id)
        .bind(CommentKind::Regular.code())
        .fetch_all(&self.pool)
        .await
        .context("Failed to load comments")?;

        let mut comments_by_issue: HashMap<i64, Vec<Comment>> = HashMap::new();
        for (issue_id, kind, content) in comment_rows {
            comments_by_issue.entry(issue_id).or_default().push(Comment {
                kind: CommentKind::from_code(kind),
                content,
            });
        }

        Ok(rows
            .into_iter()
            .map(|(id, repo_id, title, content, is_closed, is_pull)| Issue {
                id,
                repo_id,
                title,
                content,
                is_closed: is_closed != 0,
                is_pull: is_pull != 0,
                comments: comments_by_issue.remove(&id).unwrap_or_default(),
            })
            .collect())
    }

    async fn issue_ids(&self, repo_id: i64) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM issue WHERE repo_id = ? ORDER BY id",
        )
        .bind(repo_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load issue ids")?;
        Ok(ids)
    }

    async fn search_issue_ids(
        &self,
        keyword: &str,
        repo_ids: &[i64],
        limit: usize,
        offset: usize,
    ) -> Result<(u64, Vec<i64>)> {
        let pattern = format!("%{}%", keyword.to_lowercase());

        let mut filter = String::from(
            "FROM issue i \
             LEFT JOIN comment c ON c.issue_id = i.id AND c.kind = 0 \
             WHERE (lower(i.title) LIKE ? OR lower(i.content) LIKE ? OR lower(c.content) LIKE ?)",
        );
        if !repo_ids.is_empty() {
            let placeholders = vec!["?"; repo_ids.len()].join(", ");
            filter.push_str(&format!(" AND i.repo_id IN ({placeholders})"));
        }

        let count_sql = format!("SELECT COUNT(DISTINCT i.id) {filter}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(&pattern)
            .bind(&pattern)
            .bind(&pattern);
        for repo_id in repo_ids {
            count_query = count_query.bind(repo_id);
        }
        let total = count_query
            .fetch_one(&self.pool)
            .await
            .context("Failed to count keyword matches")?;

        let ids_sql = format!("SELECT DISTINCT i.id {filter} ORDER BY i.id DESC LIMIT ? OFFSET ?");
        let mut ids_query = sqlx::query_scalar::<_, i64>(&ids_sql)
            .bind(&pattern)
            .bind(&pattern)
            .bind(&pattern);
        for repo_id in repo_ids {
            ids_query = ids_query.bind(repo_id);
        }
        let ids = ids_query
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await
            .context("Failed to search issues by keyword")?;

        Ok((total.max(0) as u64, ids))
    }
}
