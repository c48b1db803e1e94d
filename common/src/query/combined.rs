//! Fuses scalar filters, full-text search, and vector similarity into a
//! single `SELECT` over one table; the graph traversal is kept as an
//! independent, separately-executed query since its shape is a `UNION ALL`
//! of per-depth clauses rather than a single projection (spec §4.3:
//! "graph is kept *separate* because its shape is a UNION"). Grounded in the
//! original Python `CombinedQueryBuilder`/`execute_combined_query`.

use std::collections::BTreeMap;

use serde_json::Value;

use super::{graph::GraphQueryBuilder, validate_field, validate_table, ParamBinder, QueryError};

pub struct CombinedQueryBuilder {
    table: String,
    tenant_id: String,
    exact_filters: Vec<(String, Value)>,
    fulltext_field: String,
    fulltext_query: Option<String>,
    vector_field: String,
    vector_embedding: Option<Vec<f32>>,
    vector_limit: u32,
    vector_ef: u32,
    graph_table: Option<String>,
    graph_entity_ids: Vec<String>,
    graph_depth_range: (u32, u32),
    graph_relation_type: Option<String>,
    limit: u32,
}

impl CombinedQueryBuilder {
    pub fn new(table: impl Into<String>, tenant_id: impl Into<String>) -> Result<Self, QueryError> {
        let table = table.into();
        validate_table(&table)?;
        Ok(Self {
            table,
            tenant_id: tenant_id.into(),
            exact_filters: Vec::new(),
            fulltext_field: "text".to_string(),
            fulltext_query: None,
            vector_field: "embedding".to_string(),
            vector_embedding: None,
            vector_limit: 20,
            vector_ef: 100,
            graph_table: None,
            graph_entity_ids: Vec::new(),
            graph_depth_range: (1, 1),
            graph_relation_type: None,
            limit: 20,
        })
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Result<Self, QueryError> {
        validate_field(field)?;
        self.exact_filters.push((field.to_string(), value.into()));
        Ok(self)
    }

    pub fn with_fulltext(mut self, field: &str, text: impl Into<String>) -> Result<Self, QueryError> {
        validate_field(field)?;
        self.fulltext_field = field.to_string();
        self.fulltext_query = Some(text.into());
        Ok(self)
    }

    pub fn with_vector(mut self, field: &str, embedding: Vec<f32>) -> Result<Self, QueryError> {
        validate_field(field)?;
        self.vector_field = field.to_string();
        self.vector_embedding = Some(embedding);
        Ok(self)
    }

    /// Seeds a separate graph traversal over `graph_table`, joined to the
    /// main result by `execute_combined`'s caller, not by SQL.
    pub fn with_graph(
        mut self,
        graph_table: impl Into<String>,
        entity_ids: Vec<String>,
        min_depth: u32,
        max_depth: u32,
    ) -> Result<Self, QueryError> {
        let graph_table = graph_table.into();
        validate_table(&graph_table)?;
        self.graph_table = Some(graph_table);
        self.graph_entity_ids = entity_ids;
        self.graph_depth_range = (min_depth, max_depth);
        Ok(self)
    }

    pub fn graph_relation_type(mut self, relation_type: &str) -> Result<Self, QueryError> {
        validate_field(relation_type)?;
        self.graph_relation_type = Some(relation_type.to_string());
        Ok(self)
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Renders the fused `main` query and, only when graph seeds were
    /// supplied, an independent `graph` query (spec §4.3 `build_all()` →
    /// `{main, graph?}`).
    pub fn build_all(self) -> Result<BTreeMap<String, (String, BTreeMap<String, Value>)>, QueryError> {
        let mut binder = ParamBinder::new();
        let mut projections = vec!["*".to_string()];
        let mut where_parts = vec![
            format!("tenant_id = {}", binder.bind_named("tenant_id", self.tenant_id.clone())),
            format!("is_deleted = {}", binder.bind_named("is_deleted", false)),
        ];

        for (field, value) in self.exact_filters {
            let token = binder.bind(value);
            where_parts.push(format!("{field} = {token}"));
        }

        let fulltext_active = self.fulltext_query.is_some();
        let vector_active = self.vector_embedding.is_some();

        if let Some(text) = self.fulltext_query {
            let token = binder.bind(text);
            where_parts.push(format!("{} @@ {token}", self.fulltext_field));
            projections.push("search::score(0) AS relevance_score".to_string());
        }

        if let Some(embedding) = self.vector_embedding {
            let embedding_token = binder.bind(
                embedding
                    .into_iter()
                    .map(|v| Value::from(f64::from(v)))
                    .collect::<Vec<_>>(),
            );
            projections.push(format!(
                "vector::similarity::cosine({}, {embedding_token}) AS similarity_score",
                self.vector_field
            ));
            where_parts.push(format!(
                "{} <|{},{}|> {embedding_token}",
                self.vector_field, self.vector_limit, self.vector_ef
            ));
        }

        let mut sql = format!(
            "SELECT {} FROM {} WHERE {}",
            projections.join(", "),
            self.table,
            where_parts.join(" AND ")
        );

        // Tie-break: both active orders by similarity first, then relevance
        // (spec §4.3: "ORDER BY similarity_score DESC, relevance_score DESC").
        let order = match (vector_active, fulltext_active) {
            (true, true) => Some("similarity_score DESC, relevance_score DESC".to_string()),
            (true, false) => Some("similarity_score DESC".to_string()),
            (false, true) => Some("relevance_score DESC".to_string()),
            (false, false) => None,
        };
        if let Some(order) = order {
            sql.push_str(&format!(" ORDER BY {order}"));
        }
        sql.push_str(&format!(" LIMIT {}", self.limit));

        let mut out = BTreeMap::new();
        out.insert("main".to_string(), (sql, binder.into_params()));

        if let Some(graph_table) = self.graph_table {
            if !self.graph_entity_ids.is_empty() {
                let mut graph_builder = GraphQueryBuilder::new(graph_table)?
                    .from_entities(&self.graph_entity_ids)
                    .depth_range(self.graph_depth_range.0, self.graph_depth_range.1)?
                    .tenant_id(self.tenant_id)
                    .limit(self.limit);
                if let Some(rt) = &self.graph_relation_type {
                    graph_builder = graph_builder.relation_type(rt)?;
                }
                out.insert("graph".to_string(), graph_builder.build());
            }
        }

        Ok(out)
    }
}
