//! Vector similarity query builder: cosine distance over an HNSW-indexed
//! embedding field. Grounded in the teacher's KNN operator usage
//! (`storage::types::knowledge_entity::vector_search`,
//! `storage::types::text_chunk::vector_search`:
//! `embedding <|{take},100|> $embedding ... FETCH ...`) and the original
//! Python `VectorQueryBuilder`/`with_embedding_similarity`.

use serde_json::Value;

use super::{render_filter, render_tail, validate_field, validate_table, Filter, OrderDir, ParamBinder, QueryError};

pub struct VectorQueryBuilder {
    table: String,
    embedding_field: String,
    query_embedding: Option<Vec<f32>>,
    filters: Vec<Filter>,
    order_by: Option<(String, OrderDir)>,
    limit: u32,
    ef: u32,
}

impl VectorQueryBuilder {
    pub fn new(table: impl Into<String>, embedding_field: &str) -> Result<Self, QueryError> {
        let table = table.into();
        validate_table(&table)?;
        validate_field(embedding_field)?;
        Ok(Self {
            table,
            embedding_field: embedding_field.to_string(),
            query_embedding: None,
            filters: Vec::new(),
            order_by: None,
            limit: 20,
            ef: 100,
        })
    }

    /// Binds the query vector (spec §4.3: `.with_embedding_similarity(vec)`).
    #[must_use]
    pub fn with_embedding_similarity(mut self, embedding: Vec<f32>) -> Self {
        self.query_embedding = Some(embedding);
        self
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Result<Self, QueryError> {
        validate_field(field)?;
        self.filters.push(Filter::Cmp(field.to_string(), super::Op::Eq, value.into()));
        Ok(self)
    }

    pub fn where_is_not_none(mut self, field: &str) -> Result<Self, QueryError> {
        validate_field(field)?;
        self.filters.push(Filter::IsNotNone(field.to_string()));
        Ok(self)
    }

    /// Overrides the default `similarity_score DESC` ordering.
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

    /// Builds the KNN query. Projects `similarity_score` as the cosine
    /// similarity between the stored vector and the bound query vector
    /// (spec §4.3: "appends a projection `cosine(<vector_field>, $vec) AS
    /// similarity_score`"). Defaults to `ORDER BY similarity_score DESC`
    /// unless an explicit order was set.
    #[must_use]
    pub fn build(self) -> (String, std::collections::BTreeMap<String, Value>) {
        let mut binder = ParamBinder::new();
        let where_parts: Vec<String> = self
            .filters
            .into_iter()
            .map(|filter| render_filter(&mut binder, filter))
            .collect();

        let embedding = self.query_embedding.unwrap_or_default();
        let embedding_token = binder.bind(
            embedding
                .into_iter()
                .map(|v| Value::from(f64::from(v)))
                .collect::<Vec<_>>(),
        );

        let mut sql = format!(
            "SELECT *, vector::similarity::cosine({embedding_field}, {embedding_token}) AS similarity_score \
             FROM {table}",
            embedding_field = self.embedding_field,
            table = self.table,
        );
        let mut knn_clause = format!(
            "{embedding_field} <|{limit},{ef}|> {embedding_token}",
            embedding_field = self.embedding_field,
            limit = self.limit,
            ef = self.ef,
        );
        if !where_parts.is_empty() {
            knn_clause = format!("{} AND {knn_clause}", where_parts.join(" AND "));
        }
        sql.push_str(&format!(" WHERE {knn_clause}"));

        let order = self
            .order_by
            .as_ref()
            .map(|(f, d)| (f.as_str(), *d))
            .unwrap_or(("similarity_score", OrderDir::Desc));
        render_tail(&mut sql, Some(order), None, Some(self.limit));

        (sql, binder.into_params())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_knn_query_with_cosine_projection() {
        let (sql, params) = VectorQueryBuilder::new("artifact_chunk", "embedding")
            .unwrap()
            .with_embedding_similarity(vec![0.1, 0.2, 0.3])
            .where_eq("tenant_id", "tenant:acme")
            .unwrap()
            .limit(10)
            .build();

        assert!(sql.contains("vector::similarity::cosine(embedding,"));
        assert!(sql.contains("AS similarity_score"));
        assert!(sql.contains("<|10,100|>"));
        assert!(sql.contains("ORDER BY similarity_score DESC"));
        assert!(!sql.contains("acme"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn explicit_order_overrides_default_similarity_ordering() {
        let (sql, _) = VectorQueryBuilder::new("artifact_chunk", "embedding")
            .unwrap()
            .with_embedding_similarity(vec![0.1])
            .order_by("created_at", OrderDir::Asc)
            .unwrap()
            .build();
        assert!(sql.contains("ORDER BY created_at ASC"));
        assert!(!sql.contains("ORDER BY similarity_score"));
    }

    #[test]
    fn rejects_unsafe_embedding_field() {
        assert!(VectorQueryBuilder::new("artifact_chunk", "embedding; DROP TABLE x").is_err());
    }
}
