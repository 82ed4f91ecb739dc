//! Embedded tantivy backend
//!
//! Keeps the issue index in a local mmap directory. Upserts are
//! delete-then-add under a single writer, committed per batch; the reader is
//! reloaded after every commit so searches observe applied batches.

mod schema;

use std::path::PathBuf;

use tantivy::collector::{Count, TopDocs};
use tantivy::directory::MmapDirectory;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermSetQuery};
use tantivy::schema::Value;
use tantivy::{Index, IndexReader, IndexSettings, IndexWriter, TantivyDocument, Term};
use tokio::sync::Mutex;

use async_trait::async_trait;

use self::schema::IssueSchema;
use super::IndexBackend;
use crate::errors::{IndexResult, IndexerError};
use crate::types::{IndexMutationRecord, SearchMatch, SearchResults};

pub struct EmbeddedBackend {
    path: PathBuf,
    memory_budget: usize,
    inner: Option<Inner>,
}

struct Inner {
    index: Index,
    schema: IssueSchema,
    reader: IndexReader,
    writer: Mutex<Option<IndexWriter>>,
}

impl EmbeddedBackend {
    #[must_use]
    pub fn new(path: PathBuf, memory_budget: usize) -> Self {
        Self {
            path,
            memory_budget,
            inner: None,
        }
    }

    fn inner(&self) -> IndexResult<&Inner> {
        self.inner
            .as_ref()
            .ok_or_else(|| IndexerError::Other("embedded index not initialized".to_string()))
    }

    /// Run a closure against the single index writer on the blocking pool,
    /// returning the writer to its slot afterwards.
    async fn with_writer<F>(&self, op: F) -> IndexResult<()>
    where
        F: FnOnce(&mut IndexWriter) -> tantivy::Result<()> + Send + 'static,
    {
        let inner = self.inner()?;
        let mut slot = inner.writer.lock().await;
        let mut writer = slot
            .take()
            .ok_or_else(|| IndexerError::Other("index writer closed".to_string()))?;

        let (writer, result) = tokio::task::spawn_blocking(move || {
            let result = op(&mut writer);
            (writer, result)
        })
        .await
        .map_err(|err| IndexerError::Other(format!("index write task panicked: {err}")))?;

        *slot = Some(writer);
        drop(slot);

        result?;
        inner.reader.reload()?;
        Ok(())
    }
}

#[async_trait]
impl IndexBackend for EmbeddedBackend {
    async fn init(&mut self) -> IndexResult<bool> {
        let issue_schema = IssueSchema::build();
        std::fs::create_dir_all(&self.path)?;

        let mut existed = self.path.join("meta.json").exists();
        let index = if existed {
            let index = Index::open_in_dir(&self.path).map_err(|err| {
                IndexerError::Corrupted(format!(
                    "unable to open issue index at {:?}: {err}",
                    self.path
                ))
            })?;
            if index.schema().num_fields() != issue_schema.schema.num_fields() {
                // Field-count drift means the index was written by an older
                // schema; rebuild from scratch and let population refill it.
                tracing::warn!(
                    path = ?self.path,
                    "issue index schema mismatch, recreating index"
                );
                drop(index);
                std::fs::remove_dir_all(&self.path)?;
                std::fs::create_dir_all(&self.path)?;
                existed = false;
                let directory = MmapDirectory::open(&self.path).map_err(|err| {
                    IndexerError::Corrupted(format!(
                        "unable to reopen index directory {:?}: {err}",
                        self.path
                    ))
                })?;
                Index::create(
                    directory,
                    issue_schema.schema.clone(),
                    IndexSettings::default(),
                )?
            } else {
                index
            }
        } else {
            let directory = MmapDirectory::open(&self.path).map_err(|err| {
                IndexerError::Corrupted(format!(
                    "unable to open index directory {:?}: {err}",
                    self.path
                ))
            })?;
            Index::create(
                directory,
                issue_schema.schema.clone(),
                IndexSettings::default(),
            )?
        };

        IssueSchema::register_tokenizers(index.tokenizers());

        let writer: IndexWriter = index.writer(self.memory_budget)?;
        let reader = index.reader()?;

        self.inner = Some(Inner {
            index,
            schema: issue_schema,
            reader,
            writer: Mutex::new(Some(writer)),
        });
        tracing::debug!(path = ?self.path, existed, "embedded issue index opened");
        Ok(existed)
    }

    async fn ping(&self) -> bool {
        self.inner.is_some()
    }

    async fn index(&self, batch: &[IndexMutationRecord]) -> IndexResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let inner = self.inner()?;
        let schema = inner.schema.clone();

        let mut docs = Vec::with_capacity(batch.len());
        for record in batch {
            let mut doc = TantivyDocument::default();
            doc.add_i64(schema.id, record.id);
            doc.add_i64(schema.repo_id, record.repo_id);
            doc.add_text(schema.title, &record.title);
            doc.add_text(schema.content, &record.content);
            for comment in &record.comments {
                doc.add_text(schema.comments, comment);
            }
            docs.push((record.id, doc));
        }

        self.with_writer(move |writer| {
            for (id, doc) in docs {
                // Replace, never merge: stale content for the same id is
                // removed before the fresh document lands.
                writer.delete_term(Term::from_field_i64(schema.id, id));
                writer.add_document(doc)?;
            }
            writer.commit()?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, ids: &[i64]) -> IndexResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let inner = self.inner()?;
        let id_field = inner.schema.id;
        let ids = ids.to_vec();

        self.with_writer(move |writer| {
            for id in ids {
                writer.delete_term(Term::from_field_i64(id_field, id));
            }
            writer.commit()?;
            Ok(())
        })
        .await
    }

    async fn search(
        &self,
        keyword: &str,
        repo_ids: &[i64],
        limit: usize,
        offset: usize,
    ) -> IndexResult<SearchResults> {
        let inner = self.inner()?;
        let searcher = inner.reader.searcher();

        let mut query_parser = QueryParser::for_index(
            &inner.index,
            vec![inner.schema.title, inner.schema.content, inner.schema.comments],
        );
        query_parser.set_field_boost(inner.schema.title, 2.0);
        let keyword_query = query_parser
            .parse_query(keyword)
            .map_err(|err| IndexerError::QueryParsing(format!("{keyword:?}: {err}")))?;

        let query: Box<dyn Query> = if repo_ids.is_empty() {
            keyword_query
        } else {
            let scope = TermSetQuery::new(
                repo_ids
                    .iter()
                    .map(|repo_id| Term::from_field_i64(inner.schema.repo_id, *repo_id)),
            );
            Box::new(BooleanQuery::new(vec![
                (Occur::Must, keyword_query),
                (Occur::Must, Box::new(scope) as Box<dyn Query>),
            ]))
        };

        let id_field = inner.schema.id;
        let limit = limit.max(1);
        let results = tokio::task::spawn_blocking(move || -> IndexResult<SearchResults> {
            let total = searcher.search(&*query, &Count)? as u64;
            let top_docs = searcher.search(&*query, &TopDocs::with_limit(limit).and_offset(offset))?;
            let mut hits = Vec::with_capacity(top_docs.len());
            for (score, doc_address) in top_docs {
                let doc: TantivyDocument = searcher.doc(doc_address)?;
                if let Some(id) = doc.get_first(id_field).and_then(|value| value.as_i64()) {
                    hits.push(SearchMatch { id, score });
                }
            }
            Ok(SearchResults { total, hits })
        })
        .await
        .map_err(|err| IndexerError::Other(format!("search task panicked: {err}")))??;

        Ok(results)
    }

    async fn close(&self) {
        if let Some(inner) = &self.inner {
            let mut slot = inner.writer.lock().await;
            if let Some(mut writer) = slot.take() {
                let joined = tokio::task::spawn_blocking(move || {
                    if let Err(err) = writer.commit() {
                        tracing::error!(error = %err, "final index commit failed");
                    }
                    if let Err(err) = writer.wait_merging_threads() {
                        tracing::error!(error = %err, "index merge threads failed to settle");
                    }
                })
                .await;
                if let Err(err) = joined {
                    tracing::error!(error = %err, "index close task panicked");
                }
            }
        }
        tracing::debug!("embedded issue index closed");
    }
}
