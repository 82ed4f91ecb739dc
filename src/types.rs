//! Common types shared by the queue, the backends, and the coordinator

use serde::{Deserialize, Serialize};

/// Unit of work carried by the mutation queue.
///
/// A record is either a single-issue upsert (`is_delete` false, `id` set) or
/// a bulk delete (`is_delete` true, `ids` set); the constructors below are
/// the only two shapes producers create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMutationRecord {
    pub id: i64,
    pub repo_id: i64,
    pub title: String,
    pub content: String,
    pub comments: Vec<String>,
    pub is_delete: bool,
    pub ids: Vec<i64>,
}

impl IndexMutationRecord {
    /// Build an upsert record from an issue's current text content.
    #[must_use]
    pub fn upsert(
        id: i64,
        repo_id: i64,
        title: String,
        content: String,
        comments: Vec<String>,
    ) -> Self {
        Self {
            id,
            repo_id,
            title,
            content,
            comments,
            is_delete: false,
            ids: Vec::new(),
        }
    }

    /// Build a bulk-delete record covering a set of issue ids.
    #[must_use]
    pub fn bulk_delete(ids: Vec<i64>) -> Self {
        Self {
            id: 0,
            repo_id: 0,
            title: String::new(),
            content: String::new(),
            comments: Vec::new(),
            is_delete: true,
            ids,
        }
    }
}

/// One search hit: an issue id plus a backend-defined relevance score.
///
/// Scores are only meaningful for relative ordering within a single query;
/// they are not comparable across backend variants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub id: i64,
    pub score: f32,
}

/// Search results: total match count (may exceed the returned page) and the
/// returned page of hits, relevance-descending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResults {
    pub total: u64,
    pub hits: Vec<SearchMatch>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_record_has_no_delete_ids() {
        let record = IndexMutationRecord::upsert(
            42,
            7,
            "fix login bug".to_string(),
            "see patch attached".to_string(),
            vec!["works for me".to_string()],
        );
        assert!(!record.is_delete);
        assert_eq!(record.id, 42);
        assert_eq!(record.repo_id, 7);
        assert!(record.ids.is_empty());
    }

    #[test]
    fn bulk_delete_record_carries_only_ids() {
        let record = IndexMutationRecord::bulk_delete(vec![42, 43]);
        assert!(record.is_delete);
        assert_eq!(record.ids, vec![42, 43]);
        assert!(record.title.is_empty());
        assert!(record.comments.is_empty());
    }

    #[test]
    fn record_round_trips_through_json() {
        let record = IndexMutationRecord::upsert(1, 2, "t".into(), "c".into(), vec![]);
        let encoded = serde_json::to_string(&record).unwrap();
        let decoded: IndexMutationRecord = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, record);
    }
}
