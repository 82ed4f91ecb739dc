//! Elasticsearch-compatible external search-service backend
//!
//! Speaks the subset of the REST API the issue index needs: HEAD/PUT for
//! index lifecycle, `_bulk` ndjson for upserts and deletes, `_search` with a
//! multi_match query filtered by a repo_id terms clause.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};

use super::IndexBackend;
use crate::errors::{IndexResult, IndexerError};
use crate::types::{IndexMutationRecord, SearchMatch, SearchResults};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const PING_TIMEOUT: Duration = Duration::from_secs(3);

pub struct ElasticBackend {
    client: reqwest::Client,
    base_url: String,
    index_name: String,
}

impl ElasticBackend {
    pub fn new(connection_url: &str, index_name: &str) -> IndexResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: connection_url.trim_end_matches('/').to_string(),
            index_name: index_name.to_string(),
        })
    }

    fn index_url(&self) -> String {
        format!("{}/{}", self.base_url, self.index_name)
    }

    async fn bulk(&self, body: String) -> IndexResult<()> {
        let response = self
            .client
            .post(format!("{}/_bulk?refresh=true", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(IndexerError::IndexingFailed(format!(
                "bulk request failed with status {}",
                response.status()
            )));
        }
        let payload: Value = response.json().await?;
        if payload
            .get("errors")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            return Err(IndexerError::IndexingFailed(
                "bulk request reported item errors".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl IndexBackend for ElasticBackend {
    async fn init(&mut self) -> IndexResult<bool> {
        let response = self.client.head(self.index_url()).send().await?;
        if response.status().is_success() {
            return Ok(true);
        }
        if response.status() != StatusCode::NOT_FOUND {
            return Err(IndexerError::Other(format!(
                "probing index {:?} failed with status {}",
                self.index_name,
                response.status()
            )));
        }

        let mapping = json!({
            "mappings": {
                "properties": {
                    "id": { "type": "long" },
                    "repo_id": { "type": "long" },
                    "title": { "type": "text" },
                    "content": { "type": "text" },
                    "comments": { "type": "text" }
                }
            }
        });
        let response = self
            .client
            .put(self.index_url())
            .json(&mapping)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(IndexerError::Other(format!(
                "creating index {:?} failed with status {}",
                self.index_name,
                response.status()
            )));
        }
        tracing::info!(index = %self.index_name, "created search service index");
        Ok(false)
    }

    async fn ping(&self) -> bool {
        match self
            .client
            .get(&self.base_url)
            .timeout(PING_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                tracing::warn!(error = %err, "search service ping failed");
                false
            }
        }
    }

    async fn index(&self, batch: &[IndexMutationRecord]) -> IndexResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut body = String::new();
        for record in batch {
            let action = json!({ "index": { "_index": self.index_name, "_id": record.id } });
            let document = json!({
                "id": record.id,
                "repo_id": record.repo_id,
                "title": record.title,
                "content": record.content,
                "comments": record.comments,
            });
            body.push_str(&serde_json::to_string(&action)?);
            body.push('\n');
            body.push_str(&serde_json::to_string(&document)?);
            body.push('\n');
        }
        self.bulk(body).await
    }

    async fn delete(&self, ids: &[i64]) -> IndexResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut body = String::new();
        for id in ids {
            let action = json!({ "delete": { "_index": self.index_name, "_id": id } });
            body.push_str(&serde_json::to_string(&action)?);
            body.push('\n');
        }
        self.bulk(body).await
    }

    async fn search(
        &self,
        keyword: &str,
        repo_ids: &[i64],
        limit: usize,
        offset: usize,
    ) -> IndexResult<SearchResults> {
        let mut query = json!({
            "query": {
                "bool": {
                    "must": [
                        {
                            "multi_match": {
                                "query": keyword,
                                "fields": ["title", "content", "comments"]
                            }
                        }
                    ]
                }
            },
            "from": offset,
            "size": limit,
        });
        if !repo_ids.is_empty() {
            query["query"]["bool"]["filter"] = json!([{ "terms": { "repo_id": repo_ids } }]);
        }

        let response = self
            .client
            .post(format!("{}/_search", self.index_url()))
            .json(&query)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(IndexerError::SearchExecution(format!(
                "search request failed with status {}",
                response.status()
            )));
        }

        let payload: Value = response.json().await?;
        let total = payload["hits"]["total"]["value"].as_u64().unwrap_or(0);
        let mut hits = Vec::new();
        if let Some(raw_hits) = payload["hits"]["hits"].as_array() {
            for hit in raw_hits {
                let id = hit["_source"]["id"]
                    .as_i64()
                    .or_else(|| hit["_id"].as_str().and_then(|raw| raw.parse().ok()));
                if let Some(id) = id {
                    let score = hit["_score"].as_f64().unwrap_or(0.0) as f32;
                    hits.push(SearchMatch { id, score });
                }
            }
        }
        Ok(SearchResults { total, hits })
    }

    async fn close(&self) {
        tracing::debug!(index = %self.index_name, "search service backend closed");
    }
}
