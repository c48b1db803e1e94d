//! BM25 fulltext query builder. Grounded in the teacher's
//! `storage::types::text_chunk::fts_search`
//! (`chunk @0@ $terms ... search::score(0) ... search::highlight`) and the
//! original Python `FullTextQueryBuilder`/`execute_fulltext_query`.

use serde_json::Value;

use super::{render_filter, render_tail, validate_field, validate_table, Filter, OrderDir, ParamBinder, QueryError};

pub struct FullTextQueryBuilder {
    table: String,
    text_field: String,
    query_text: Option<String>,
    filters: Vec<Filter>,
    order_by: Option<(String, OrderDir)>,
    limit: u32,
}

impl FullTextQueryBuilder {
    pub fn new(table: impl Into<String>, text_field: &str) -> Result<Self, QueryError> {
        let table = table.into();
        validate_table(&table)?;
        validate_field(text_field)?;
        Ok(Self {
            table,
            text_field: text_field.to_string(),
            query_text: None,
            filters: Vec::new(),
            order_by: None,
            limit: 20,
        })
    }

    /// Prepends the `<fulltext_field> @@ $text` predicate (spec §4.3).
    #[must_use]
    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.query_text = Some(text.into());
        self
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Result<Self, QueryError> {
        validate_field(field)?;
        self.filters.push(Filter::Cmp(field.to_string(), super::Op::Eq, value.into()));
        Ok(self)
    }

    /// Overrides the default `relevance_score DESC` ordering.
    pub fn order_by(mut self, field: &str, dir: OrderDir) -> Result<Self, QueryError> {
        validate_field(field)?;
        self.order_by = Some((field.to_string(), dir));
        Ok(self)
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn build(self) -> (String, std::collections::BTreeMap<String, Value>) {
        let mut binder = ParamBinder::new();
        let mut where_parts: Vec<String> = self
            .filters
            .into_iter()
            .map(|filter| render_filter(&mut binder, filter))
            .collect();

        let terms_token = binder.bind(self.query_text.unwrap_or_default());
        where_parts.insert(0, format!("{} @@ {terms_token}", self.text_field));

        let mut sql = format!(
            "SELECT *, search::score(0) AS relevance_score, search::highlight('<b>', '</b>', 0) AS highlight \
             FROM {} WHERE {}",
            self.table,
            where_parts.join(" AND "),
        );

        let order = self
            .order_by
            .as_ref()
            .map(|(f, d)| (f.as_str(), *d))
            .unwrap_or(("relevance_score", OrderDir::Desc));
        render_tail(&mut sql, Some(order), None, Some(self.limit));

        (sql, binder.into_params())
    }
}
