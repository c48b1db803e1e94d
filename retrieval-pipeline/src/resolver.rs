//! The six-level retrieval resolver (spec §4.7). Each level returns a
//! progressively richer `ResolverResult`; level 6 is the only one that calls
//! out to the LLM twice (sufficiency check, then a full-corpus fallback).
//! Grounded in the teacher's staged-pipeline style
//! (`ingestion-pipeline::pipeline::IngestionPipeline` threading a context
//! through ordered stage methods) applied to the original Python
//! `resolve`/`_resolve_level_*` ladder (`original_source/app/apps/memory/
//! resolver.py`).

use std::collections::{BTreeMap, HashMap, HashSet};

use common::db::SurrealDbClient;
use common::error::AppError;
use common::executor::QueryExecutor;
use common::llm::{ChatMessage, ChatRole, LlmClient};
use common::persistence::Repository;
use common::prompts::PromptStore;
use common::query::combined::CombinedQueryBuilder;
use common::query::scalar::ScalarQueryBuilder;
use common::types::artifact::Artifact;
use common::types::artifact_chunk::ArtifactChunk;
use common::types::company::Company;
use common::types::entity::Entity;
use common::types::event::Event;
use common::types::relation::Relation;
use ingestion_pipeline::extractors;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const MAJOR_TYPE_NAME_LIMIT: u32 = 100;
const GRAPH_CHUNKS_PER_ARTIFACT: u32 = 5;
const FULL_CORPUS_LIMIT: u32 = 10_000;

/// One of the six resolution shapes, selected explicitly or inferred from
/// the request's other fields (spec §4.7 table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionLevel {
    TypeOnly,
    MajorTypeAndName,
    SelectedEntities,
    SelectedEntitiesAndMutualRelations,
    RelatedArtifactsData,
    RelatedArtifactsText,
}

impl ResolutionLevel {
    #[must_use]
    pub fn from_query_param(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::TypeOnly),
            1 => Some(Self::MajorTypeAndName),
            2 => Some(Self::SelectedEntities),
            3 => Some(Self::SelectedEntitiesAndMutualRelations),
            4 => Some(Self::RelatedArtifactsData),
            5 => Some(Self::RelatedArtifactsText),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolveRequest {
    pub tenant_id: Option<String>,
    pub company_id: Option<String>,
    pub resolution: Option<ResolutionLevel>,
    pub entity_ids: Vec<String>,
    pub text: Option<String>,
}

/// Infers a resolution level from which optional fields a request carries,
/// per the table in spec §4.7: `text` beats `entity_ids` beats the default.
#[must_use]
fn infer_level(request: &ResolveRequest) -> ResolutionLevel {
    if request.text.is_some() {
        ResolutionLevel::RelatedArtifactsData
    } else if !request.entity_ids.is_empty() {
        ResolutionLevel::SelectedEntitiesAndMutualRelations
    } else {
        ResolutionLevel::MajorTypeAndName
    }
}

/// An entity trimmed of audit/permission fields for inclusion in a resolver
/// response (spec §4.7 level 3: "serialize each supplied entity excluding
/// audit/permission fields").
#[derive(Debug, Clone, Serialize)]
pub struct EntitySummary {
    pub id: String,
    pub entity_type: String,
    pub name: String,
    pub data: Value,
}

impl From<&Entity> for EntitySummary {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id.clone(),
            entity_type: entity.entity_type.clone(),
            name: entity.name.clone(),
            data: entity.data.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RelationSummary {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub relation_type: String,
    pub data: Value,
}

impl From<&Relation> for RelationSummary {
    fn from(relation: &Relation) -> Self {
        Self {
            id: relation.id.clone(),
            source_id: relation.source_id.clone(),
            target_id: relation.target_id.clone(),
            relation_type: relation.relation_type.clone(),
            data: relation.data.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkSummary {
    pub id: String,
    pub chunk_index: i64,
    pub text: String,
}

impl From<&ArtifactChunk> for ChunkSummary {
    fn from(chunk: &ArtifactChunk) -> Self {
        Self {
            id: chunk.id.clone(),
            chunk_index: chunk.chunk_index,
            text: chunk.text.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactBundle {
    pub artifact_id: String,
    pub uri: Option<String>,
    pub sensor_name: Option<String>,
    pub chunks: Vec<ChunkSummary>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ResolverResult {
    pub entities: Vec<EntitySummary>,
    pub relations: Vec<RelationSummary>,
    pub artifacts: Vec<ArtifactBundle>,
    pub context: Option<String>,
}

pub struct ResolverConfig {
    pub llm_model: String,
    pub embedding_model: String,
    pub embedding_dimension: u32,
}

/// Resolves a single retrieval request to a `ResolverResult` by dispatching
/// to one of six level implementations (spec §4.7).
pub struct Resolver<'a> {
    db: &'a SurrealDbClient,
    llm: &'a dyn LlmClient,
    prompts: &'a PromptStore,
    config: ResolverConfig,
}

impl<'a> Resolver<'a> {
    #[must_use]
    pub fn new(
        db: &'a SurrealDbClient,
        llm: &'a dyn LlmClient,
        prompts: &'a PromptStore,
        config: ResolverConfig,
    ) -> Self {
        Self { db, llm, prompts, config }
    }

    pub async fn resolve(&self, request: ResolveRequest) -> Result<ResolverResult, AppError> {
        let (tenant_id, company) = self.resolve_tenant(&request).await?;
        let level = request.resolution.unwrap_or_else(|| infer_level(&request));

        match level {
            ResolutionLevel::TypeOnly => Ok(self.level_type_only(company.as_ref())),
            ResolutionLevel::MajorTypeAndName => {
                self.level_major_type_and_name(&tenant_id, company.as_ref()).await
            }
            ResolutionLevel::SelectedEntities => {
                self.level_selected_entities(&tenant_id, &request.entity_ids).await
            }
            ResolutionLevel::SelectedEntitiesAndMutualRelations => {
                self.level_selected_entities_and_mutual_relations(&tenant_id, &request.entity_ids)
                    .await
            }
            ResolutionLevel::RelatedArtifactsData => {
                let text = request
                    .text
                    .as_deref()
                    .ok_or_else(|| AppError::Validation("RELATED_ARTIFACTS_DATA requires text".to_string()))?;
                self.level_related_artifacts_data(&tenant_id, company.as_ref(), text).await
            }
            ResolutionLevel::RelatedArtifactsText => {
                let text = request
                    .text
                    .as_deref()
                    .ok_or_else(|| AppError::Validation("RELATED_ARTIFACTS_TEXT requires text".to_string()))?;
                self.level_related_artifacts_text(&tenant_id, company.as_ref(), text).await
            }
        }
    }

    async fn resolve_tenant(&self, request: &ResolveRequest) -> Result<(String, Option<Company>), AppError> {
        if let Some(company_id) = &request.company_id {
            let company = self.find_company_by_company_id(company_id).await?
                .ok_or_else(|| AppError::NotFound(format!("company '{company_id}' not found")))?;
            return Ok((company.id.clone(), Some(company)));
        }

        let tenant_id = request
            .tenant_id
            .clone()
            .ok_or_else(|| AppError::Validation("either tenant_id or company_id is required".to_string()))?;
        let company_repo: Repository<Company> = Repository::new(self.db, "company");
        let company = company_repo.get_by_id(&tenant_id).await.ok().flatten();
        Ok((tenant_id, company))
    }

    async fn find_company_by_company_id(&self, company_id: &str) -> Result<Option<Company>, AppError> {
        let (sql, params) = ScalarQueryBuilder::new("company")
            .map_err(|e| AppError::Validation(e.to_string()))?
            .where_eq("company_id", company_id)
            .map_err(|e| AppError::Validation(e.to_string()))?
            .where_eq("is_deleted", false)
            .map_err(|e| AppError::Validation(e.to_string()))?
            .limit(1)
            .build();
        let mut rows: Vec<Company> = QueryExecutor::new(self.db).execute(&sql, params).await?;
        Ok(rows.pop())
    }

    /// Level 1: just the tenant policy, no entities/relations/artifacts.
    fn level_type_only(&self, company: Option<&Company>) -> ResolverResult {
        let context = company.map_or_else(
            || "no company policy on record; all entity and relation types allowed".to_string(),
            |c| {
                serde_json::json!({
                    "intro": format!("{} is a tenant with {} allowed sensor types", c.name, c.sensor_types.len()),
                    "entity_types": c.entity_types,
                    "relation_types": c.relation_types,
                })
                .to_string()
            },
        );
        ResolverResult {
            context: Some(context),
            ..Default::default()
        }
    }

    /// Level 2: up to 100 entities per allowed type, grouped by name. When
    /// the company has no declared allow-list (`entity_types = null`,
    /// meaning "all allowed"), the distinct types already present in the
    /// tenant's data are used instead, since there is no fixed list to walk.
    async fn level_major_type_and_name(
        &self,
        tenant_id: &str,
        company: Option<&Company>,
    ) -> Result<ResolverResult, AppError> {
        let executor = QueryExecutor::new(self.db);
        let types = match company.and_then(|c| c.entity_types.clone()) {
            Some(types) => types,
            None => self.distinct_entity_types(tenant_id).await?,
        };

        let mut entities = Vec::new();
        for entity_type in types {
            let rows: Vec<Entity> = executor
                .execute_exact_match(
                    "entity",
                    tenant_id,
                    vec![("entity_type", Value::String(entity_type))],
                    MAJOR_TYPE_NAME_LIMIT,
                )
                .await?;
            entities.extend(rows.iter().map(EntitySummary::from));
        }

        Ok(ResolverResult {
            entities,
            ..Default::default()
        })
    }

    async fn distinct_entity_types(&self, tenant_id: &str) -> Result<Vec<String>, AppError> {
        let executor = QueryExecutor::new(self.db);
        let rows: Vec<Entity> = executor
            .execute_exact_match("entity", tenant_id, vec![], MAJOR_TYPE_NAME_LIMIT)
            .await?;
        let mut seen = HashSet::new();
        let mut types = Vec::new();
        for row in rows {
            if seen.insert(row.entity_type.clone()) {
                types.push(row.entity_type);
            }
        }
        Ok(types)
    }

    /// Level 3: serialize the supplied entities as-is, no relation/artifact walk.
    async fn level_selected_entities(
        &self,
        tenant_id: &str,
        entity_ids: &[String],
    ) -> Result<ResolverResult, AppError> {
        let entities = self.load_entities(entity_ids).await?;
        let _ = tenant_id;
        Ok(ResolverResult {
            entities: entities.iter().map(EntitySummary::from).collect(),
            ..Default::default()
        })
    }

    async fn load_entities(&self, entity_ids: &[String]) -> Result<Vec<Entity>, AppError> {
        let repo: Repository<Entity> = Repository::new(self.db, "entity");
        let mut entities = Vec::with_capacity(entity_ids.len());
        for id in entity_ids {
            if let Some(entity) = repo.get_by_id(id).await? {
                entities.push(entity);
            }
        }
        Ok(entities)
    }

    /// Level 4: (3) plus mutual edges among the selection, plus artifacts
    /// connected to >=2 of the selected entities and (one hop further)
    /// artifacts connected to those artifacts. Entity<->artifact
    /// connectivity is derived from `Event` records (the only edge the data
    /// model gives between an entity and the artifacts that evidenced it —
    /// see DESIGN.md).
    async fn level_selected_entities_and_mutual_relations(
        &self,
        tenant_id: &str,
        entity_ids: &[String],
    ) -> Result<ResolverResult, AppError> {
        let entities = self.load_entities(entity_ids).await?;
        let selected_ids: HashSet<String> = entities.iter().map(|e| e.id.clone()).collect();

        let relations = self.mutual_relations(tenant_id, &selected_ids).await?;
        let artifacts = self.artifacts_connected_to_selection(tenant_id, &selected_ids).await?;

        Ok(ResolverResult {
            entities: entities.iter().map(EntitySummary::from).collect(),
            relations: relations.iter().map(RelationSummary::from).collect(),
            artifacts,
            context: None,
        })
    }

    async fn mutual_relations(
        &self,
        tenant_id: &str,
        selected_ids: &HashSet<String>,
    ) -> Result<Vec<Relation>, AppError> {
        if selected_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = selected_ids.iter().cloned().collect();
        common::persistence::EdgeRepository::new(self.db).find_mutual(tenant_id, &ids).await
    }

    /// Builds the entity<->artifact adjacency from `Event` rows, then finds
    /// artifacts with >=2 links into the selection plus their one-hop
    /// neighbors (sharing any linked entity).
    async fn artifacts_connected_to_selection(
        &self,
        tenant_id: &str,
        selected_ids: &HashSet<String>,
    ) -> Result<Vec<ArtifactBundle>, AppError> {
        let event_repo: Repository<Event> = Repository::new(self.db, "event");
        let events = event_repo.find_many(tenant_id, 10_000).await?;

        let mut entity_to_artifacts: HashMap<String, HashSet<String>> = HashMap::new();
        let mut artifact_to_entities: HashMap<String, HashSet<String>> = HashMap::new();
        for event in &events {
            for artifact_id in &event.artifact_ids {
                entity_to_artifacts
                    .entry(event.entity_id.clone())
                    .or_default()
                    .insert(artifact_id.clone());
                artifact_to_entities
                    .entry(artifact_id.clone())
                    .or_default()
                    .insert(event.entity_id.clone());
            }
        }

        let mut direct = HashSet::new();
        for (artifact_id, linked_entities) in &artifact_to_entities {
            let matches = linked_entities.intersection(selected_ids).count();
            if matches >= 2 {
                direct.insert(artifact_id.clone());
            }
        }

        let mut transitive = HashSet::new();
        for artifact_id in &direct {
            if let Some(entities_of_artifact) = artifact_to_entities.get(artifact_id) {
                for entity_id in entities_of_artifact {
                    if let Some(neighbors) = entity_to_artifacts.get(entity_id) {
                        for neighbor in neighbors {
                            if !direct.contains(neighbor) {
                                transitive.insert(neighbor.clone());
                            }
                        }
                    }
                }
            }
        }

        let mut all_ids: Vec<String> = direct.into_iter().chain(transitive).collect();
        all_ids.sort();
        self.load_artifact_bundles(&all_ids).await
    }

    async fn load_artifact_bundles(&self, artifact_ids: &[String]) -> Result<Vec<ArtifactBundle>, AppError> {
        let artifact_repo: Repository<Artifact> = Repository::new(self.db, "artifact");
        let mut bundles = Vec::with_capacity(artifact_ids.len());
        for artifact_id in artifact_ids {
            let Some(artifact) = artifact_repo.get_by_id(artifact_id).await? else {
                continue;
            };
            let chunks = self.chunks_for_artifact(&artifact.id, GRAPH_CHUNKS_PER_ARTIFACT).await?;
            bundles.push(ArtifactBundle {
                artifact_id: artifact.id,
                uri: artifact.uri,
                sensor_name: artifact.sensor_name,
                chunks: chunks.iter().map(ChunkSummary::from).collect(),
            });
        }
        Ok(bundles)
    }

    async fn chunks_for_artifact(&self, artifact_id: &str, limit: u32) -> Result<Vec<ArtifactChunk>, AppError> {
        let (sql, params) = ScalarQueryBuilder::new("artifact_chunk")
            .map_err(|e| AppError::Validation(e.to_string()))?
            .where_eq("artifact_id", artifact_id)
            .map_err(|e| AppError::Validation(e.to_string()))?
            .where_eq("is_deleted", false)
            .map_err(|e| AppError::Validation(e.to_string()))?
            .limit(limit)
            .build();
        QueryExecutor::new(self.db).execute(&sql, params).await
    }

    /// Level 5: LLM-extract entities from `text`, match them against the
    /// store, embed the text, run a combined search over `artifact_chunk`
    /// plus a bounded-depth graph walk over the matched entities, dedupe and
    /// group the resulting chunks by artifact, and serialize the whole
    /// bundle into `context` (spec §4.7 level 5).
    async fn level_related_artifacts_data(
        &self,
        tenant_id: &str,
        company: Option<&Company>,
        text: &str,
    ) -> Result<ResolverResult, AppError> {
        let allowed_types = company.and_then(|c| c.entity_types.clone());
        let extracted = extractors::extract_entities(
            self.llm,
            self.prompts,
            &self.config.llm_model,
            text,
            allowed_types.as_deref(),
        )
        .await;

        let matched_entities = self.match_extracted_entities(tenant_id, &extracted).await?;
        let matched_ids: Vec<String> = matched_entities.iter().map(|e| e.id.clone()).collect();

        let embeddings = self
            .llm
            .embed_batch(&self.config.embedding_model, &[text.to_string()], self.config.embedding_dimension)
            .await?;
        let embedding = embeddings.into_iter().next().unwrap_or_default();

        let combined = CombinedQueryBuilder::new("artifact_chunk", tenant_id)
            .map_err(|e| AppError::Validation(e.to_string()))?
            .with_fulltext("text", text)
            .map_err(|e| AppError::Validation(e.to_string()))?
            .with_vector("embedding", embedding)
            .map_err(|e| AppError::Validation(e.to_string()))?;
        let (main_sql, main_params) = combined
            .build_all()
            .map_err(|e| AppError::Validation(e.to_string()))?
            .remove("main")
            .ok_or_else(|| AppError::InternalError("combined query produced no main part".to_string()))?;
        let main_chunks: Vec<ArtifactChunk> = QueryExecutor::new(self.db).execute(&main_sql, main_params).await?;

        let graph_chunks = if matched_ids.is_empty() {
            Vec::new()
        } else {
            self.graph_linked_chunks(tenant_id, &matched_ids).await?
        };

        let bundles = self.dedupe_and_group(main_chunks, graph_chunks).await?;

        let context_value = serde_json::json!({
            "entities": matched_entities.iter().map(EntitySummary::from).collect::<Vec<_>>(),
            "relations": Vec::<RelationSummary>::new(),
            "artifacts": bundles,
        });

        Ok(ResolverResult {
            entities: matched_entities.iter().map(EntitySummary::from).collect(),
            relations: Vec::new(),
            artifacts: bundles,
            context: Some(context_value.to_string()),
        })
    }

    async fn match_extracted_entities(
        &self,
        tenant_id: &str,
        extracted: &[extractors::ExtractedEntity],
    ) -> Result<Vec<Entity>, AppError> {
        let mut matched = Vec::new();
        let mut seen = HashSet::new();
        for candidate in extracted {
            let (sql, params) = ScalarQueryBuilder::new("entity")
                .map_err(|e| AppError::Validation(e.to_string()))?
                .where_eq("tenant_id", tenant_id)
                .map_err(|e| AppError::Validation(e.to_string()))?
                .where_eq("is_deleted", false)
                .map_err(|e| AppError::Validation(e.to_string()))?
                .where_eq("name", candidate.name.clone())
                .map_err(|e| AppError::Validation(e.to_string()))?
                .where_eq("entity_type", candidate.entity_type.clone())
                .map_err(|e| AppError::Validation(e.to_string()))?
                .limit(1)
                .build();
            let rows: Vec<Entity> = QueryExecutor::new(self.db).execute(&sql, params).await?;
            for entity in rows {
                if seen.insert(entity.id.clone()) {
                    matched.push(entity);
                }
            }
        }
        Ok(matched)
    }

    /// Bounded-depth (1..2) graph walk over the matched entities, then one
    /// hop out to the artifacts those reached entities were extracted from,
    /// via the same `Event`-derived adjacency as level 4.
    async fn graph_linked_chunks(&self, tenant_id: &str, seed_entity_ids: &[String]) -> Result<Vec<ArtifactChunk>, AppError> {
        let reached: Vec<Entity> = QueryExecutor::new(self.db)
            .execute_graph("entity", tenant_id, seed_entity_ids, 1, 2, 100)
            .await
            .unwrap_or_default();

        let mut reached_ids: HashSet<String> = reached.iter().map(|e| e.id.clone()).collect();
        reached_ids.extend(seed_entity_ids.iter().cloned());

        let event_repo: Repository<Event> = Repository::new(self.db, "event");
        let events = event_repo.find_many(tenant_id, 10_000).await?;
        let mut artifact_ids: Vec<String> = Vec::new();
        let mut seen_artifacts = HashSet::new();
        for event in &events {
            if reached_ids.contains(&event.entity_id) {
                for artifact_id in &event.artifact_ids {
                    if seen_artifacts.insert(artifact_id.clone()) {
                        artifact_ids.push(artifact_id.clone());
                    }
                }
            }
        }

        let mut chunks = Vec::new();
        for artifact_id in artifact_ids {
            chunks.extend(self.chunks_for_artifact(&artifact_id, GRAPH_CHUNKS_PER_ARTIFACT).await?);
        }
        Ok(chunks)
    }

    /// Dedupes chunks by id (main results keep priority over graph results)
    /// and groups the survivors under their owning artifact.
    async fn dedupe_and_group(
        &self,
        main_chunks: Vec<ArtifactChunk>,
        graph_chunks: Vec<ArtifactChunk>,
    ) -> Result<Vec<ArtifactBundle>, AppError> {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        for chunk in main_chunks.into_iter().chain(graph_chunks) {
            if seen.insert(chunk.id.clone()) {
                ordered.push(chunk);
            }
        }

        let mut by_artifact: BTreeMap<String, Vec<ArtifactChunk>> = BTreeMap::new();
        for chunk in ordered {
            by_artifact.entry(chunk.artifact_id.clone()).or_default().push(chunk);
        }

        let artifact_repo: Repository<Artifact> = Repository::new(self.db, "artifact");
        let mut bundles = Vec::with_capacity(by_artifact.len());
        for (artifact_id, chunks) in by_artifact {
            let Some(artifact) = artifact_repo.get_by_id(&artifact_id).await? else {
                continue;
            };
            bundles.push(ArtifactBundle {
                artifact_id: artifact.id,
                uri: artifact.uri,
                sensor_name: artifact.sensor_name,
                chunks: chunks.iter().map(ChunkSummary::from).collect(),
            });
        }
        Ok(bundles)
    }

    /// Level 6: run level 5, ask the LLM whether the retrieved content
    /// suffices to answer `text`. If not, fall back to every non-deleted
    /// artifact's text for the tenant, concatenated ahead of the level-5
    /// bundle (spec §4.7 level 6).
    async fn level_related_artifacts_text(
        &self,
        tenant_id: &str,
        company: Option<&Company>,
        text: &str,
    ) -> Result<ResolverResult, AppError> {
        let base = self.level_related_artifacts_data(tenant_id, company, text).await?;

        let sufficient = self.content_sufficiency_check(text, base.context.as_deref().unwrap_or("")).await;
        if sufficient {
            return Ok(base);
        }

        let artifact_repo: Repository<Artifact> = Repository::new(self.db, "artifact");
        let all_artifacts = artifact_repo.find_many(tenant_id, FULL_CORPUS_LIMIT).await?;

        let mut full_text = String::new();
        for artifact in &all_artifacts {
            if let Some(raw) = &artifact.raw_text {
                full_text.push_str(raw);
                full_text.push_str("\n\n");
            }
        }
        full_text.push_str(base.context.as_deref().unwrap_or(""));

        Ok(ResolverResult {
            context: Some(full_text),
            ..base
        })
    }

    /// LLM yes/no classifier; any transport/parse failure degrades to "not
    /// sufficient" so the caller falls back to the full corpus rather than
    /// silently under-answering (spec §4.7, §7: retrieval degrades
    /// gracefully).
    async fn content_sufficiency_check(&self, user_question: &str, retrieved_content: &str) -> bool {
        let schema = serde_json::json!({
            "type": "object",
            "properties": { "sufficient": { "type": "boolean" } },
            "required": ["sufficient"]
        });
        let messages = vec![
            ChatMessage {
                role: ChatRole::System,
                content: "Decide whether the retrieved content is sufficient to answer the user's question. \
                          Respond with JSON {\"sufficient\": true|false}.".to_string(),
            },
            ChatMessage {
                role: ChatRole::User,
                content: format!("Question: {user_question}\n\nRetrieved content:\n{retrieved_content}"),
            },
        ];

        match self
            .llm
            .chat_json(&self.config.llm_model, messages, "content_sufficiency_check", schema)
            .await
        {
            Ok(value) => value.get("sufficient").and_then(Value::as_bool).unwrap_or(false),
            Err(err) => {
                tracing::warn!(error = %err, "content sufficiency check failed, falling back to full corpus");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::llm::fake::FakeLlmClient;
    use common::model::Permission;
    use common::persistence::Repository;
    use chrono::Utc;

    async fn memory_db() -> SurrealDbClient {
        let db = SurrealDbClient::memory("resolver_test", &uuid::Uuid::new_v4().to_string())
            .await
            .unwrap();
        db.apply_migrations(4).await.unwrap();
        db
    }

    fn prompts() -> PromptStore {
        let dir = std::env::temp_dir().join(format!("resolver_prompts_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(dir.join("prompts")).unwrap();
        std::fs::write(
            dir.join("prompts/entity_extraction.yaml"),
            "system: extract entities\nuser: \"{text}\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("prompts/relation_extraction.yaml"),
            "system: extract relations\nuser: \"{text} {entities}\"\n",
        )
        .unwrap();
        PromptStore::new(dir.to_str().unwrap())
    }

    fn config() -> ResolverConfig {
        ResolverConfig {
            llm_model: "test-model".to_string(),
            embedding_model: "test-embed".to_string(),
            embedding_dimension: 4,
        }
    }

    async fn seed_company(db: &SurrealDbClient) -> Company {
        let repo: Repository<Company> = Repository::new(db, "company");
        repo.save(&Company {
            id: String::new(),
            company_id: "acme".to_string(),
            name: "Acme".to_string(),
            sensor_types: vec![],
            entity_types: None,
            relation_types: None,
            data: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            is_deleted: false,
            meta_data: None,
        })
        .await
        .unwrap()
    }

    async fn seed_entity(db: &SurrealDbClient, tenant_id: &str, name: &str, entity_type: &str) -> Entity {
        let repo: Repository<Entity> = Repository::new(db, "entity");
        repo.save(&Entity {
            id: String::new(),
            tenant_id: tenant_id.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            is_deleted: false,
            meta_data: None,
            user_permissions: vec![],
            group_permissions: vec![],
            public_permission: Permission::Read,
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            data: serde_json::json!({}),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn type_only_returns_non_empty_context_and_nothing_else() {
        let db = memory_db().await;
        let company = seed_company(&db).await;
        let llm = FakeLlmClient::with_chat_response("{}");
        let prompts = prompts();
        let resolver = Resolver::new(&db, &llm, &prompts, config());

        let result = resolver
            .resolve(ResolveRequest {
                tenant_id: Some(company.id.clone()),
                resolution: Some(ResolutionLevel::TypeOnly),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(result.entities.is_empty());
        assert!(result.relations.is_empty());
        assert!(result.artifacts.is_empty());
        assert!(result.context.is_some());
    }

    #[tokio::test]
    async fn selected_entities_and_mutual_relations_scenario() {
        let db = memory_db().await;
        let tenant_id = "tenant:acme".to_string();
        let e1 = seed_entity(&db, &tenant_id, "Ada", "person").await;
        let e2 = seed_entity(&db, &tenant_id, "Bob", "person").await;
        let e3 = seed_entity(&db, &tenant_id, "Cleo", "person").await;

        let edges = common::persistence::EdgeRepository::new(&db);
        edges
            .relate(&tenant_id, strip(&e1.id), strip(&e2.id), "knows", serde_json::json!({}))
            .await
            .unwrap();
        edges
            .relate(&tenant_id, strip(&e1.id), strip(&e3.id), "knows", serde_json::json!({}))
            .await
            .unwrap();

        let artifact_repo: Repository<Artifact> = Repository::new(&db, "artifact");
        let a1 = artifact_repo
            .save(&Artifact {
                id: String::new(),
                tenant_id: tenant_id.clone(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
                is_deleted: false,
                meta_data: None,
                user_permissions: vec![],
                group_permissions: vec![],
                public_permission: Permission::Read,
                uri: None,
                sensor_name: Some("doc".into()),
                raw_text: Some("a1".into()),
                data: serde_json::json!({}),
            })
            .await
            .unwrap();
        let a2 = artifact_repo
            .save(&Artifact {
                id: String::new(),
                tenant_id: tenant_id.clone(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
                is_deleted: false,
                meta_data: None,
                user_permissions: vec![],
                group_permissions: vec![],
                public_permission: Permission::Read,
                uri: None,
                sensor_name: Some("doc".into()),
                raw_text: Some("a2".into()),
                data: serde_json::json!({}),
            })
            .await
            .unwrap();

        let event_repo: Repository<Event> = Repository::new(&db, "event");
        event_repo
            .save(&Event {
                id: String::new(),
                tenant_id: tenant_id.clone(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
                is_deleted: false,
                meta_data: None,
                user_permissions: vec![],
                group_permissions: vec![],
                public_permission: Permission::Read,
                entity_id: e1.id.clone(),
                event_type: "entity_created".to_string(),
                artifact_ids: vec![a1.id.clone()],
                data: serde_json::json!({}),
            })
            .await
            .unwrap();
        event_repo
            .save(&Event {
                id: String::new(),
                tenant_id: tenant_id.clone(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
                is_deleted: false,
                meta_data: None,
                user_permissions: vec![],
                group_permissions: vec![],
                public_permission: Permission::Read,
                entity_id: e2.id.clone(),
                event_type: "entity_created".to_string(),
                artifact_ids: vec![a1.id.clone()],
                data: serde_json::json!({}),
            })
            .await
            .unwrap();
        event_repo
            .save(&Event {
                id: String::new(),
                tenant_id: tenant_id.clone(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
                is_deleted: false,
                meta_data: None,
                user_permissions: vec![],
                group_permissions: vec![],
                public_permission: Permission::Read,
                entity_id: e1.id.clone(),
                event_type: "entity_created".to_string(),
                artifact_ids: vec![a2.id.clone()],
                data: serde_json::json!({}),
            })
            .await
            .unwrap();

        let llm = FakeLlmClient::with_chat_response("{}");
        let prompts = prompts();
        let resolver = Resolver::new(&db, &llm, &prompts, config());

        let result = resolver
            .resolve(ResolveRequest {
                tenant_id: Some(tenant_id),
                resolution: Some(ResolutionLevel::SelectedEntitiesAndMutualRelations),
                entity_ids: vec![e1.id.clone(), e2.id.clone(), e3.id.clone()],
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(result.entities.len(), 3);
        assert_eq!(result.relations.len(), 2);
        let artifact_ids: HashSet<_> = result.artifacts.iter().map(|b| b.artifact_id.clone()).collect();
        assert!(artifact_ids.contains(&a1.id));
        assert!(artifact_ids.contains(&a2.id));
    }

    fn strip(id: &str) -> &str {
        id.rsplit(':').next().unwrap()
    }

    #[tokio::test]
    async fn infers_major_type_and_name_when_no_text_or_entity_ids() {
        let request = ResolveRequest {
            tenant_id: Some("tenant:acme".to_string()),
            ..Default::default()
        };
        assert_eq!(infer_level(&request), ResolutionLevel::MajorTypeAndName);
    }

    #[tokio::test]
    async fn infers_related_artifacts_data_when_text_present() {
        let request = ResolveRequest {
            tenant_id: Some("tenant:acme".to_string()),
            text: Some("hello".to_string()),
            ..Default::default()
        };
        assert_eq!(infer_level(&request), ResolutionLevel::RelatedArtifactsData);
    }

    #[tokio::test]
    async fn infers_selected_entities_and_mutual_relations_when_entity_ids_present() {
        let request = ResolveRequest {
            tenant_id: Some("tenant:acme".to_string()),
            entity_ids: vec!["entity:1".to_string()],
            ..Default::default()
        };
        assert_eq!(infer_level(&request), ResolutionLevel::SelectedEntitiesAndMutualRelations);
    }
}
