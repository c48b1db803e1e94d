//! Executes builder-produced `(sql, params)` pairs against the database,
//! timing each query and logging slow ones. Grounded in the teacher's timed,
//! `tracing`-logged index operations (`storage::indexes`) and the original
//! Python `execute_query`/`_detect_query_type` (perf-counter timing,
//! `>1s` slow-query warning, query-type classification by substring).

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::OnceLock;

use crate::db::SurrealDbClient;
use crate::error::AppError;
use crate::query::{
    combined::CombinedQueryBuilder, fulltext::FullTextQueryBuilder, graph::GraphQueryBuilder,
    scalar::ScalarQueryBuilder, vector::VectorQueryBuilder, QueryError,
};

const SLOW_QUERY_THRESHOLD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Vector,
    Fulltext,
    Graph,
    Combined,
    ExactMatch,
}

fn vector_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)vector::similarity|<\|\d+,\d+\|>").unwrap())
}

fn fulltext_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)@\d*@|search::score").unwrap())
}

fn graph_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"->\w*->").unwrap())
}

/// Classifies a rendered query by the operator it contains, for structured
/// logging. Order matters: `UNION ALL` (combined) is checked before the more
/// specific single-strategy patterns since a combined query also contains
/// fulltext/vector markers.
#[must_use]
pub fn classify(sql: &str) -> QueryKind {
    if sql.to_uppercase().contains("UNION ALL") {
        return QueryKind::Combined;
    }
    if vector_pattern().is_match(sql) {
        QueryKind::Vector
    } else if fulltext_pattern().is_match(sql) {
        QueryKind::Fulltext
    } else if graph_pattern().is_match(sql) {
        QueryKind::Graph
    } else {
        QueryKind::ExactMatch
    }
}

pub struct QueryExecutor<'a> {
    db: &'a SurrealDbClient,
}

impl<'a> QueryExecutor<'a> {
    #[must_use]
    pub fn new(db: &'a SurrealDbClient) -> Self {
        Self { db }
    }

    /// Runs a bound query and deserializes the first statement's result set.
    #[tracing::instrument(skip(self, sql, params), fields(kind))]
    pub async fn execute<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: BTreeMap<String, Value>,
    ) -> Result<Vec<T>, AppError> {
        let kind = classify(sql);
        tracing::Span::current().record("kind", tracing::field::debug(kind));

        let started = Instant::now();
        let mut query = self.db.query(sql);
        for (name, value) in params {
            query = query.bind((name, value));
        }
        let mut response = query.await.map_err(|err| {
            let prefix = &sql[..sql.len().min(200)];
            tracing::error!(query = %prefix, error = %err, "query execution failed");
            AppError::from(err)
        })?;
        let elapsed = started.elapsed();

        let rows: Vec<T> = response.take(0)?;

        if elapsed > SLOW_QUERY_THRESHOLD {
            tracing::warn!(?kind, elapsed_ms = elapsed.as_millis(), rows = rows.len(), "slow query");
        } else {
            tracing::debug!(?kind, elapsed_ms = elapsed.as_millis(), rows = rows.len(), "query executed");
        }

        Ok(rows)
    }

    /// Exact-match scalar query over `table`, always scoped to
    /// `tenant_id = $tenant_id AND is_deleted = $is_deleted` (spec §8
    /// invariant: every high-level executor carries both).
    pub async fn execute_exact_match<T: DeserializeOwned>(
        &self,
        table: &str,
        tenant_id: &str,
        filters: Vec<(&str, Value)>,
        limit: u32,
    ) -> Result<Vec<T>, AppError> {
        let mut builder = ScalarQueryBuilder::new(table)
            .map_err(query_err)?
            .where_eq("tenant_id", tenant_id)
            .map_err(query_err)?
            .where_eq("is_deleted", false)
            .map_err(query_err)?;
        for (field, value) in filters {
            builder = builder.where_eq(field, value).map_err(query_err)?;
        }
        let (sql, params) = builder.limit(limit).build();
        self.execute(&sql, params).await
    }

    pub async fn execute_fulltext<T: DeserializeOwned>(
        &self,
        table: &str,
        text_field: &str,
        tenant_id: &str,
        text: &str,
        limit: u32,
    ) -> Result<Vec<T>, AppError> {
        let (sql, params) = FullTextQueryBuilder::new(table, text_field)
            .map_err(query_err)?
            .search(text)
            .where_eq("tenant_id", tenant_id)
            .map_err(query_err)?
            .where_eq("is_deleted", false)
            .map_err(query_err)?
            .limit(limit)
            .build();
        self.execute(&sql, params).await
    }

    pub async fn execute_vector<T: DeserializeOwned>(
        &self,
        table: &str,
        embedding_field: &str,
        tenant_id: &str,
        embedding: Vec<f32>,
        limit: u32,
    ) -> Result<Vec<T>, AppError> {
        let (sql, params) = VectorQueryBuilder::new(table, embedding_field)
            .map_err(query_err)?
            .with_embedding_similarity(embedding)
            .where_eq("tenant_id", tenant_id)
            .map_err(query_err)?
            .where_eq("is_deleted", false)
            .map_err(query_err)?
            .where_is_not_none(embedding_field)
            .map_err(query_err)?
            .limit(limit)
            .build();
        self.execute(&sql, params).await
    }

    pub async fn execute_graph<T: DeserializeOwned>(
        &self,
        node_table: &str,
        tenant_id: &str,
        entity_ids: &[String],
        min_depth: u32,
        max_depth: u32,
        limit: u32,
    ) -> Result<Vec<T>, AppError> {
        let (sql, params) = GraphQueryBuilder::new(node_table)
            .map_err(query_err)?
            .from_entities(entity_ids)
            .depth_range(min_depth, max_depth)
            .map_err(query_err)?
            .tenant_id(tenant_id)
            .limit(limit)
            .build();
        self.execute(&sql, params).await
    }

    /// Runs the combined builder's `main` query, and its `graph` query when
    /// one was produced, returning both result sets.
    pub async fn execute_combined<T: DeserializeOwned>(
        &self,
        builder: CombinedQueryBuilder,
    ) -> Result<(Vec<T>, Vec<T>), AppError> {
        let mut built = builder.build_all().map_err(query_err)?;
        let (main_sql, main_params) = built
            .remove("main")
            .ok_or_else(|| AppError::InternalError("combined query produced no main part".to_string()))?;
        let main_rows = self.execute(&main_sql, main_params).await?;

        let graph_rows = if let Some((graph_sql, graph_params)) = built.remove("graph") {
            self.execute(&graph_sql, graph_params).await?
        } else {
            Vec::new()
        };

        Ok((main_rows, graph_rows))
    }
}

fn query_err(err: QueryError) -> AppError {
    AppError::Validation(err.to_string())
}
