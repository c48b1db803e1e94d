//! Four independent retriever strategies plus a hybrid merger (spec §4.8).
//! Grounded in the teacher's `retrieval-pipeline::pipeline::strategies`
//! (a `Strategy` trait dispatched by a pipeline config) and its
//! `graph.rs`/`fts.rs` fallback postures, applied to `common::query`'s
//! builders instead of the teacher's ad hoc SurrealQL strings.

use async_trait::async_trait;
use common::db::SurrealDbClient;
use futures::future::try_join_all;
use common::error::AppError;
use common::executor::QueryExecutor;
use common::query::graph::GraphQueryBuilder;
use common::query::scalar::ScalarQueryBuilder;
use common::query::vector::VectorQueryBuilder;
use common::types::artifact_chunk::ArtifactChunk;
use common::types::entity::Entity;
use serde_json::Value;

const DEFAULT_LIMIT: u32 = 20;

/// One candidate result, shaped the same regardless of which strategy
/// produced it so the hybrid merger can dedupe/sort over a single type.
#[derive(Debug, Clone)]
pub struct RetrievedDoc {
    pub content: String,
    pub chunk_id: Option<String>,
    pub entity_id: Option<String>,
    pub relation_id: Option<String>,
    pub score: f32,
}

/// Common seam every strategy implements: take a free-text query (and, for
/// graph, seed entity ids) and return scored candidates. Object-safe so the
/// hybrid retriever can hold `Vec<Box<dyn Retriever>>`.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn relevant_documents(&self, query: &str) -> Result<Vec<RetrievedDoc>, AppError>;
}

/// Exact-match lookup over `entity.name`, used when the query is itself a
/// known entity name rather than free text.
pub struct ExactMatchRetriever<'a> {
    db: &'a SurrealDbClient,
    tenant_id: String,
    limit: u32,
}

impl<'a> ExactMatchRetriever<'a> {
    #[must_use]
    pub fn new(db: &'a SurrealDbClient, tenant_id: impl Into<String>) -> Self {
        Self {
            db,
            tenant_id: tenant_id.into(),
            limit: DEFAULT_LIMIT,
        }
    }
}

#[async_trait]
impl<'a> Retriever for ExactMatchRetriever<'a> {
    async fn relevant_documents(&self, query: &str) -> Result<Vec<RetrievedDoc>, AppError> {
        let rows: Vec<Entity> = QueryExecutor::new(self.db)
            .execute_exact_match(
                "entity",
                &self.tenant_id,
                vec![("name", Value::String(query.to_string()))],
                self.limit,
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|entity| RetrievedDoc {
                content: format!("{}: {}", entity.entity_type, entity.name),
                chunk_id: None,
                entity_id: Some(entity.id),
                relation_id: None,
                score: 0.5,
            })
            .collect())
    }
}

/// BM25 fulltext search over `artifact_chunk.text`. Falls back to a bound
/// `LIKE` scan when the fulltext index isn't ready (e.g. right after a
/// `DEFINE INDEX` on a fresh namespace; mirrors the teacher's `fts.rs`
/// degrade-to-scan posture on a driver error).
pub struct FullTextRetriever<'a> {
    db: &'a SurrealDbClient,
    tenant_id: String,
    limit: u32,
}

impl<'a> FullTextRetriever<'a> {
    #[must_use]
    pub fn new(db: &'a SurrealDbClient, tenant_id: impl Into<String>) -> Self {
        Self {
            db,
            tenant_id: tenant_id.into(),
            limit: DEFAULT_LIMIT,
        }
    }

    async fn like_scan_fallback(&self, query: &str) -> Result<Vec<RetrievedDoc>, AppError> {
        let (sql, params) = ScalarQueryBuilder::new("artifact_chunk")
            .map_err(query_err)?
            .where_eq("tenant_id", self.tenant_id.clone())
            .map_err(query_err)?
            .where_eq("is_deleted", false)
            .map_err(query_err)?
            .limit(self.limit)
            .build();
        let rows: Vec<ArtifactChunk> = QueryExecutor::new(self.db).execute(&sql, params).await?;
        let needle = query.to_lowercase();
        Ok(rows
            .into_iter()
            .filter(|chunk| chunk.text.to_lowercase().contains(&needle))
            .map(|chunk| RetrievedDoc {
                content: chunk.text,
                chunk_id: Some(chunk.id),
                entity_id: None,
                relation_id: None,
                score: 0.5,
            })
            .collect())
    }
}

#[async_trait]
impl<'a> Retriever for FullTextRetriever<'a> {
    async fn relevant_documents(&self, query: &str) -> Result<Vec<RetrievedDoc>, AppError> {
        match QueryExecutor::new(self.db)
            .execute_fulltext::<ArtifactChunkWithScore>("artifact_chunk", "text", &self.tenant_id, query, self.limit)
            .await
        {
            Ok(rows) => Ok(rows
                .into_iter()
                .map(|row| RetrievedDoc {
                    content: row.text,
                    chunk_id: Some(row.id),
                    entity_id: None,
                    relation_id: None,
                    score: row.score,
                })
                .collect()),
            Err(err) => {
                tracing::warn!(error = %err, "fulltext search failed, falling back to LIKE scan");
                self.like_scan_fallback(query).await
            }
        }
    }
}

/// Cosine-similarity KNN search over `artifact_chunk.embedding`. Falls back
/// to scanning all chunks and scoring cosine similarity in-process when the
/// HNSW index query fails.
pub struct VectorRetriever<'a> {
    db: &'a SurrealDbClient,
    tenant_id: String,
    embedding: Vec<f32>,
    limit: u32,
}

impl<'a> VectorRetriever<'a> {
    #[must_use]
    pub fn new(db: &'a SurrealDbClient, tenant_id: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            db,
            tenant_id: tenant_id.into(),
            embedding,
            limit: DEFAULT_LIMIT,
        }
    }

    async fn cosine_scan_fallback(&self) -> Result<Vec<RetrievedDoc>, AppError> {
        let (sql, params) = ScalarQueryBuilder::new("artifact_chunk")
            .map_err(query_err)?
            .where_eq("tenant_id", self.tenant_id.clone())
            .map_err(query_err)?
            .where_eq("is_deleted", false)
            .map_err(query_err)?
            .limit(10_000)
            .build();
        let rows: Vec<ArtifactChunk> = QueryExecutor::new(self.db).execute(&sql, params).await?;

        let mut scored: Vec<RetrievedDoc> = rows
            .into_iter()
            .filter_map(|chunk| {
                let embedding = chunk.embedding.as_ref()?;
                let score = cosine_similarity(&self.embedding, embedding);
                Some(RetrievedDoc {
                    content: chunk.text,
                    chunk_id: Some(chunk.id),
                    entity_id: None,
                    relation_id: None,
                    score,
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.limit as usize);
        Ok(scored)
    }
}

#[async_trait]
impl<'a> Retriever for VectorRetriever<'a> {
    async fn relevant_documents(&self, _query: &str) -> Result<Vec<RetrievedDoc>, AppError> {
        let built = VectorQueryBuilder::new("artifact_chunk", "embedding")
            .map_err(query_err)?
            .with_embedding_similarity(self.embedding.clone())
            .where_eq("tenant_id", self.tenant_id.clone())
            .map_err(query_err)?
            .where_eq("is_deleted", false)
            .map_err(query_err)?
            .where_is_not_none("embedding")
            .map_err(query_err)?
            .limit(self.limit)
            .build();

        match QueryExecutor::new(self.db).execute::<ArtifactChunkWithScore>(&built.0, built.1).await {
            Ok(rows) => Ok(rows
                .into_iter()
                .map(|row| RetrievedDoc {
                    content: row.text,
                    chunk_id: Some(row.id),
                    entity_id: None,
                    relation_id: None,
                    score: row.score,
                })
                .collect()),
            Err(err) => {
                tracing::warn!(error = %err, "vector search failed, falling back to in-process cosine scan");
                self.cosine_scan_fallback().await
            }
        }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Bounded-depth graph walk from a set of seed entities over `relation`
/// edges. Requires seeds; an empty seed list yields an empty result rather
/// than an error (mirrors `GraphQueryBuilder`'s own "always-false" empty-seed
/// behavior).
pub struct GraphRetriever<'a> {
    db: &'a SurrealDbClient,
    tenant_id: String,
    seed_entity_ids: Vec<String>,
    max_depth: u32,
    limit: u32,
}

impl<'a> GraphRetriever<'a> {
    #[must_use]
    pub fn new(db: &'a SurrealDbClient, tenant_id: impl Into<String>, seed_entity_ids: Vec<String>, max_depth: u32) -> Self {
        Self {
            db,
            tenant_id: tenant_id.into(),
            seed_entity_ids,
            max_depth,
            limit: DEFAULT_LIMIT,
        }
    }
}

#[async_trait]
impl<'a> Retriever for GraphRetriever<'a> {
    async fn relevant_documents(&self, _query: &str) -> Result<Vec<RetrievedDoc>, AppError> {
        if self.seed_entity_ids.is_empty() {
            return Ok(Vec::new());
        }
        let built = GraphQueryBuilder::new("entity")
            .map_err(query_err)?
            .from_entities(&self.seed_entity_ids)
            .depth_range(1, self.max_depth)
            .map_err(query_err)?
            .tenant_id(self.tenant_id.clone())
            .limit(self.limit)
            .build();
        let rows: Vec<Entity> = QueryExecutor::new(self.db).execute(&built.0, built.1).await?;
        Ok(rows
            .into_iter()
            .map(|entity| RetrievedDoc {
                content: format!("{}: {}", entity.entity_type, entity.name),
                chunk_id: None,
                entity_id: Some(entity.id),
                relation_id: None,
                score: 0.5,
            })
            .collect())
    }
}

/// Runs every enabled strategy, dedupes the union by `(first 100 chars of
/// content, chunk_id, entity_id, relation_id)`, and sorts descending by
/// score (spec §4.8: hybrid merge resolves overlaps by the *maximum* score a
/// candidate received across strategies, not by which strategy ran first).
pub struct HybridRetriever<'a> {
    strategies: Vec<Box<dyn Retriever + 'a>>,
}

impl<'a> HybridRetriever<'a> {
    #[must_use]
    pub fn new(strategies: Vec<Box<dyn Retriever + 'a>>) -> Self {
        Self { strategies }
    }

    pub async fn relevant_documents(&self, query: &str) -> Result<Vec<RetrievedDoc>, AppError> {
        let pending = self.strategies.iter().map(|strategy| strategy.relevant_documents(query));
        let results = try_join_all(pending).await?;
        Ok(dedupe_by_max_score(results.into_iter().flatten().collect()))
    }
}

fn dedupe_key(doc: &RetrievedDoc) -> (String, Option<String>, Option<String>, Option<String>) {
    let prefix: String = doc.content.chars().take(100).collect();
    (prefix, doc.chunk_id.clone(), doc.entity_id.clone(), doc.relation_id.clone())
}

fn dedupe_by_max_score(docs: Vec<RetrievedDoc>) -> Vec<RetrievedDoc> {
    let mut best: Vec<RetrievedDoc> = Vec::new();

    for doc in docs {
        let key = dedupe_key(&doc);
        if let Some(existing) = best.iter_mut().find(|d| dedupe_key(d) == key) {
            if doc.score > existing.score {
                *existing = doc;
            }
        } else {
            best.push(doc);
        }
    }

    best.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    best
}

/// Row shape shared by the fulltext and vector builders, which project
/// their score under different column names (`relevance_score`,
/// `similarity_score` — spec §4.3) onto the same chunk fields.
#[derive(Debug, Clone, serde::Deserialize)]
struct ArtifactChunkWithScore {
    #[serde(deserialize_with = "common::types::deserialize_flexible_id")]
    id: String,
    text: String,
    #[serde(alias = "relevance_score", alias = "similarity_score")]
    score: f32,
}

fn query_err(err: common::query::QueryError) -> AppError {
    AppError::Validation(err.to_string())
}
