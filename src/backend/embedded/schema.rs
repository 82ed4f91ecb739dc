//! Tantivy schema for the issue index

use tantivy::schema::{
    Field, IndexRecordOption, NumericOptions, Schema, TextFieldIndexing, TextOptions,
};
use tantivy::tokenizer::{
    AlphaNumOnlyFilter, Language, LowerCaser, SimpleTokenizer, Stemmer, TextAnalyzer,
    TokenizerManager,
};

/// Tokenizer name registered on the index for all searchable text fields.
const ISSUE_TEXT_TOKENIZER: &str = "issue_text";

/// Issue index schema: numeric identity fields plus tokenized text fields
/// for title, body, and comments. Only `id` is stored; search results carry
/// ids and scores, never document content.
#[derive(Debug, Clone)]
pub(crate) struct IssueSchema {
    pub schema: Schema,
    pub id: Field,
    pub repo_id: Field,
    pub title: Field,
    pub content: Field,
    pub comments: Field,
}

impl IssueSchema {
    pub(crate) fn build() -> Self {
        let mut schema_builder = Schema::builder();

        let id = schema_builder.add_i64_field(
            "id",
            NumericOptions::default().set_stored().set_indexed(),
        );
        let repo_id =
            schema_builder.add_i64_field("repo_id", NumericOptions::default().set_indexed());

        let text_options = TextOptions::default().set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(ISSUE_TEXT_TOKENIZER)
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        );
        let title = schema_builder.add_text_field("title", text_options.clone());
        let content = schema_builder.add_text_field("content", text_options.clone());
        let comments = schema_builder.add_text_field("comments", text_options);

        Self {
            schema: schema_builder.build(),
            id,
            repo_id,
            title,
            content,
            comments,
        }
    }

    /// Register the issue-text analyzer with the index's tokenizer manager.
    pub(crate) fn register_tokenizers(manager: &TokenizerManager) {
        let analyzer = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(LowerCaser)
            .filter(AlphaNumOnlyFilter)
            .filter(Stemmer::new(Language::English))
            .build();
        manager.register(ISSUE_TEXT_TOKENIZER, analyzer);
    }
}
