//! Integration tests for the embedded tantivy backend
//!
//! Covers the backend-level contract: round-trip content, idempotent
//! replace, scope isolation, and delete-then-search.

use issue_indexer::{EmbeddedBackend, IndexBackend, IndexMutationRecord};
use tempfile::TempDir;

const MEMORY_BUDGET: usize = 50_000_000;

fn record(id: i64, repo_id: i64, title: &str, content: &str, comments: &[&str]) -> IndexMutationRecord {
    IndexMutationRecord::upsert(
        id,
        repo_id,
        title.to_string(),
        content.to_string(),
        comments.iter().map(|c| c.to_string()).collect(),
    )
}

async fn fresh_backend(dir: &TempDir) -> EmbeddedBackend {
    let mut backend = EmbeddedBackend::new(dir.path().join("issues"), MEMORY_BUDGET);
    let existed = backend.init().await.expect("init should succeed");
    assert!(!existed, "a fresh directory has no pre-existing index");
    backend
}

#[tokio::test]
async fn round_trip_content_is_searchable() {
    let dir = TempDir::new().unwrap();
    let backend = fresh_backend(&dir).await;

    backend
        .index(&[record(
            42,
            7,
            "fix login bug",
            "the session cookie expires too early",
            &["see patch attached"],
        )])
        .await
        .unwrap();

    // Keyword present only in the body.
    let results = backend.search("cookie", &[], 50, 0).await.unwrap();
    assert_eq!(results.total, 1);
    assert_eq!(results.hits[0].id, 42);

    // Keyword present only in a comment.
    let results = backend.search("patch", &[], 50, 0).await.unwrap();
    assert_eq!(results.total, 1);
    assert_eq!(results.hits[0].id, 42);
}

#[tokio::test]
async fn reindexing_the_same_id_replaces_the_entry() {
    let dir = TempDir::new().unwrap();
    let backend = fresh_backend(&dir).await;

    let original = record(42, 7, "fix login bug", "first draft", &[]);
    backend.index(&[original.clone()]).await.unwrap();
    backend.index(&[original]).await.unwrap();

    let results = backend.search("login", &[], 50, 0).await.unwrap();
    assert_eq!(results.total, 1, "no duplicate match after double indexing");

    // Replacing with new content removes the old terms entirely.
    backend
        .index(&[record(42, 7, "rework session storage", "second draft", &[])])
        .await
        .unwrap();
    let results = backend.search("login", &[], 50, 0).await.unwrap();
    assert_eq!(results.total, 0, "stale content must not match");
    let results = backend.search("session", &[], 50, 0).await.unwrap();
    assert_eq!(results.total, 1);
    assert_eq!(results.hits[0].id, 42);
}

#[tokio::test]
async fn search_is_scoped_to_the_given_repositories() {
    let dir = TempDir::new().unwrap();
    let backend = fresh_backend(&dir).await;

    backend
        .index(&[
            record(1, 7, "login hangs", "", &[]),
            record(2, 8, "login crashes", "", &[]),
        ])
        .await
        .unwrap();

    let results = backend.search("login", &[7], 50, 0).await.unwrap();
    assert_eq!(results.total, 1);
    assert_eq!(results.hits[0].id, 1);

    let results = backend.search("login", &[8], 50, 0).await.unwrap();
    assert_eq!(results.total, 1);
    assert_eq!(results.hits[0].id, 2);

    let results = backend.search("login", &[], 50, 0).await.unwrap();
    assert_eq!(results.total, 2, "empty scope means no restriction");

    let results = backend.search("login", &[9], 50, 0).await.unwrap();
    assert_eq!(results.total, 0);
}

#[tokio::test]
async fn deleted_ids_never_come_back() {
    let dir = TempDir::new().unwrap();
    let backend = fresh_backend(&dir).await;

    backend
        .index(&[
            record(42, 7, "fix login bug", "", &[]),
            record(43, 7, "login audit log", "", &[]),
        ])
        .await
        .unwrap();
    backend.delete(&[42, 43]).await.unwrap();

    let results = backend.search("login", &[7], 50, 0).await.unwrap();
    assert_eq!(results.total, 0);
    assert!(results.hits.is_empty());

    // Deleting ids that are already gone is not an error.
    backend.delete(&[42, 999]).await.unwrap();
}

#[tokio::test]
async fn reopening_reports_a_pre_existing_index() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("issues");

    let mut backend = EmbeddedBackend::new(path.clone(), MEMORY_BUDGET);
    assert!(!backend.init().await.unwrap());
    backend
        .index(&[record(1, 7, "persisted entry", "", &[])])
        .await
        .unwrap();
    backend.close().await;

    let mut reopened = EmbeddedBackend::new(path, MEMORY_BUDGET);
    let existed = reopened.init().await.unwrap();
    assert!(existed, "second open must find the index on disk");

    let results = reopened.search("persisted", &[], 50, 0).await.unwrap();
    assert_eq!(results.total, 1);
    assert_eq!(results.hits[0].id, 1);
}

#[tokio::test]
async fn ping_reflects_initialization() {
    let dir = TempDir::new().unwrap();
    let uninitialized = EmbeddedBackend::new(dir.path().join("issues"), MEMORY_BUDGET);
    assert!(!uninitialized.ping().await);

    let backend = fresh_backend(&dir).await;
    assert!(backend.ping().await);
}
