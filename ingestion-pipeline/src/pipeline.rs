//! Structured ingest: normalize a request, resolve internal ids against the
//! store, upsert artifacts/entities/relations, and enqueue one job per
//! artifact (spec §4.6.1). Organized the way the teacher's
//! `IngestionPipeline` threads a context struct through stage functions
//! (`pipeline::context`/`pipeline::stages`), but the stage list itself is
//! spec's own rather than the teacher's enrich/retrieve/persist state
//! machine.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use common::db::SurrealDbClient;
use common::error::AppError;
use common::model::Permission;
use common::persistence::{EdgeRepository, Repository};
use common::queue::QueueClient;
use common::types::artifact::Artifact;
use common::types::company::Company;
use common::types::entity::Entity;
use common::types::event::Event;
use common::types::ingest_job::{IngestJob, JobStatus};
use common::types::relation::Relation;
use futures::future::join_all;
use serde_json::Value;

use crate::request::{ContentInput, EntityInput, IngestRequest, IngestResponse, RelationInput};

pub const QUEUE_NAME: &str = "ingestion";

pub struct IngestionPipeline {
    db: Arc<SurrealDbClient>,
    queue: Arc<dyn QueueClient>,
    queue_name: String,
}

impl IngestionPipeline {
    #[must_use]
    pub fn new(db: Arc<SurrealDbClient>, queue: Arc<dyn QueueClient>, queue_name: impl Into<String>) -> Self {
        Self {
            db,
            queue,
            queue_name: queue_name.into(),
        }
    }

    /// Runs the full structured-ingest processing order from spec §4.6.1:
    /// resolve tenant, create artifacts, upsert entities in parallel,
    /// resolve+collect relations, upsert relations in parallel, enqueue one
    /// job per artifact.
    #[tracing::instrument(skip(self, request), fields(sensor_name = %request.sensor_name))]
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestResponse, AppError> {
        let tenant_id = self.resolve_tenant(&request).await?;
        let policy = self.load_policy(&tenant_id).await;

        if let Some(policy) = &policy {
            if !policy.allows_sensor(&request.sensor_name) {
                return Err(AppError::Validation(format!(
                    "sensor type '{}' not allowed by tenant config",
                    request.sensor_name
                )));
            }
        }

        let mut warnings = Vec::new();

        let (artifacts, artifact_map) = self.create_artifacts(&tenant_id, &request).await?;

        let (entities, entity_map) = self
            .upsert_entities(&tenant_id, &request.entities, policy.as_ref())
            .await?;

        let relation_inputs = collect_relation_inputs(&request);
        let (relations, relation_warnings) = self
            .upsert_relations(&tenant_id, relation_inputs, &entity_map, &artifact_map, policy.as_ref())
            .await?;
        warnings.extend(relation_warnings);

        let job_ids = self.enqueue_jobs(&tenant_id, &artifacts).await?;

        Ok(IngestResponse {
            job_ids,
            entities,
            relations,
            warnings,
        })
    }

    async fn resolve_tenant(&self, request: &IngestRequest) -> Result<String, AppError> {
        if let Some(company_id) = &request.company_id {
            return self
                .find_company_by_company_id(company_id)
                .await?
                .map(|company| company.id)
                .ok_or_else(|| AppError::NotFound(format!("company '{company_id}' not found")));
        }

        request
            .tenant_id
            .clone()
            .ok_or_else(|| AppError::Validation("either tenant_id or company_id is required".to_string()))
    }

    async fn find_company_by_company_id(&self, company_id: &str) -> Result<Option<Company>, AppError> {
        let (sql, params) = common::query::scalar::ScalarQueryBuilder::new("company")
            .map_err(|err| AppError::Validation(err.to_string()))?
            .where_eq("company_id", company_id)
            .map_err(|err| AppError::Validation(err.to_string()))?
            .where_eq("is_deleted", false)
            .map_err(|err| AppError::Validation(err.to_string()))?
            .limit(1)
            .build();

        let mut rows: Vec<Company> = common::executor::QueryExecutor::new(&self.db)
            .execute(&sql, params)
            .await?;
        Ok(rows.pop())
    }

    /// Best-effort tenant policy lookup; absence (e.g. a bare `tenant_id`
    /// with no backing `Company` row) means "unrestricted", matching spec's
    /// "`*_types = null` means all allowed".
    async fn load_policy(&self, tenant_id: &str) -> Option<Company> {
        let repo: Repository<Company> = Repository::new(&self.db, "company");
        repo.get_by_id(tenant_id).await.ok().flatten()
    }

    async fn create_artifacts(
        &self,
        tenant_id: &str,
        request: &IngestRequest,
    ) -> Result<(Vec<Artifact>, BTreeMap<String, String>), AppError> {
        let repo: Repository<Artifact> = Repository::new(&self.db, "artifact");
        let mut artifacts = Vec::with_capacity(request.contents.len());
        let mut id_map = BTreeMap::new();

        for content in &request.contents {
            let artifact = new_artifact(tenant_id, request, content);
            let saved = repo.save(&artifact).await?;
            id_map.insert(content.id.clone(), saved.id.clone());
            artifacts.push(saved);
        }

        Ok((artifacts, id_map))
    }

    async fn upsert_entities(
        &self,
        tenant_id: &str,
        inputs: &[EntityInput],
        policy: Option<&Company>,
    ) -> Result<(Vec<Entity>, BTreeMap<String, String>), AppError> {
        let entity_repo: Repository<Entity> = Repository::new(&self.db, "entity");
        let event_repo: Repository<Event> = Repository::new(&self.db, "event");

        if let Some(policy) = policy {
            for input in inputs {
                if !policy.allows_entity_type(&input.entity_type) {
                    return Err(AppError::Validation(format!(
                        "entity type '{}' not allowed by tenant config",
                        input.entity_type
                    )));
                }
            }
        }

        let results = join_all(
            inputs
                .iter()
                .map(|input| upsert_one_entity(&entity_repo, &event_repo, tenant_id, input)),
        )
        .await;

        let mut entities = Vec::with_capacity(results.len());
        let mut id_map = BTreeMap::new();
        for (input, result) in inputs.iter().zip(results) {
            let entity = result?;
            id_map.insert(input.id.clone(), entity.id.clone());
            entities.push(entity);
        }

        Ok((entities, id_map))
    }

    async fn upsert_relations(
        &self,
        tenant_id: &str,
        inputs: Vec<RelationInput>,
        entity_map: &BTreeMap<String, String>,
        artifact_map: &BTreeMap<String, String>,
        policy: Option<&Company>,
    ) -> Result<(Vec<Relation>, Vec<String>), AppError> {
        let entity_repo: Repository<Entity> = Repository::new(&self.db, "entity");
        let artifact_repo: Repository<Artifact> = Repository::new(&self.db, "artifact");
        let edges = EdgeRepository::new(&self.db);

        let mut warnings = Vec::new();
        let mut resolved = Vec::new();

        if let Some(policy) = policy {
            for input in &inputs {
                if !policy.allows_relation_type(&input.relation_type) {
                    return Err(AppError::Validation(format!(
                        "relation type '{}' not allowed by tenant config",
                        input.relation_type
                    )));
                }
            }
        }

        for input in &inputs {
            let from = resolve_endpoint(&input.from_entity_id, entity_map, artifact_map, &entity_repo, &artifact_repo).await;
            let to = resolve_endpoint(&input.to_entity_id, entity_map, artifact_map, &entity_repo, &artifact_repo).await;

            match (from, to) {
                (Some(from_id), Some(to_id)) => resolved.push((from_id, to_id, input)),
                (None, _) => warnings.push(format!(
                    "relation endpoint '{}' could not be resolved, skipping relation",
                    input.from_entity_id
                )),
                (_, None) => warnings.push(format!(
                    "relation endpoint '{}' could not be resolved, skipping relation",
                    input.to_entity_id
                )),
            }
        }

        let relate_futures = resolved.iter().map(|(from_id, to_id, input)| {
            edges.relate(
                tenant_id,
                strip_table_prefix(from_id),
                strip_table_prefix(to_id),
                &input.relation_type,
                input.data.clone(),
            )
        });
        let relate_results = join_all(relate_futures).await;

        let mut relations = Vec::with_capacity(relate_results.len());
        for result in relate_results {
            relations.push(result?);
        }

        Ok((relations, warnings))
    }

    async fn enqueue_jobs(&self, tenant_id: &str, artifacts: &[Artifact]) -> Result<Vec<String>, AppError> {
        let job_repo: Repository<IngestJob> = Repository::new(&self.db, "ingest_job");
        let mut job_ids = Vec::with_capacity(artifacts.len());

        for artifact in artifacts {
            let job = new_job(tenant_id, &artifact.id);
            let saved = job_repo.save(&job).await?;

            let payload = serde_json::to_string(&saved)
                .map_err(|err| AppError::InternalError(format!("failed to encode job: {err}")))?;
            self.queue.enqueue(&self.queue_name, &payload).await?;

            job_ids.push(saved.id);
        }

        Ok(job_ids)
    }
}

async fn upsert_one_entity(
    entity_repo: &Repository<'_, Entity>,
    event_repo: &Repository<'_, Event>,
    tenant_id: &str,
    input: &EntityInput,
) -> Result<Entity, AppError> {
    let (entity, event_type) = match &input.entity_id {
        Some(existing_id) => {
            if let Some(mut existing) = entity_repo.get_by_id(existing_id).await? {
                let mut patch = BTreeMap::new();
                patch.insert("name".to_string(), Value::String(input.name.clone()));
                patch.insert("entity_type".to_string(), Value::String(input.entity_type.clone()));
                patch.insert("data".to_string(), input.data.clone());
                entity_repo.update(existing_id, patch).await?;

                existing.name = input.name.clone();
                existing.entity_type = input.entity_type.clone();
                existing.data = input.data.clone();
                (existing, "entity_updated")
            } else {
                (create_entity(entity_repo, tenant_id, input).await?, "entity_created")
            }
        }
        None => (create_entity(entity_repo, tenant_id, input).await?, "entity_created"),
    };

    let event = Event {
        id: String::new(),
        tenant_id: tenant_id.to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        is_deleted: false,
        meta_data: None,
        user_permissions: vec![],
        group_permissions: vec![],
        public_permission: Permission::Read,
        entity_id: entity.id.clone(),
        event_type: event_type.to_string(),
        artifact_ids: vec![],
        data: serde_json::to_value(&entity).unwrap_or(Value::Null),
    };
    event_repo.save(&event).await?;

    Ok(entity)
}

async fn create_entity(
    entity_repo: &Repository<'_, Entity>,
    tenant_id: &str,
    input: &EntityInput,
) -> Result<Entity, AppError> {
    let entity = Entity {
        id: String::new(),
        tenant_id: tenant_id.to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        is_deleted: false,
        meta_data: None,
        user_permissions: vec![],
        group_permissions: vec![],
        public_permission: Permission::Read,
        name: input.name.clone(),
        entity_type: input.entity_type.clone(),
        data: input.data.clone(),
    };
    entity_repo.save(&entity).await
}

fn new_artifact(tenant_id: &str, request: &IngestRequest, content: &ContentInput) -> Artifact {
    Artifact {
        id: String::new(),
        tenant_id: tenant_id.to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        is_deleted: false,
        meta_data: content.meta_data.clone(),
        user_permissions: vec![],
        group_permissions: vec![],
        public_permission: Permission::Read,
        uri: request.uri.clone(),
        sensor_name: Some(request.sensor_name.clone()),
        raw_text: content.text.clone(),
        data: content.data.clone(),
    }
}

fn new_job(tenant_id: &str, artifact_id: &str) -> IngestJob {
    IngestJob {
        id: String::new(),
        tenant_id: tenant_id.to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        is_deleted: false,
        meta_data: None,
        user_permissions: vec![],
        group_permissions: vec![],
        public_permission: Permission::None,
        artifact_id: artifact_id.to_string(),
        status: JobStatus::Queued,
        error_message: None,
        completed_at: None,
    }
}

/// Relations come from three places: `payload.relations` as-is, each
/// content's own `relations[]` (whose `from_entity_id` is implicitly that
/// content's internal id), and each entity's own `relations[]` (whose
/// `from_entity_id` is implicitly that entity's internal id) — spec §4.6.1
/// step 4.
fn collect_relation_inputs(request: &IngestRequest) -> Vec<RelationInput> {
    let mut collected = request.relations.clone();
    for content in &request.contents {
        for relation in &content.relations {
            let mut relation = relation.clone();
            relation.from_entity_id = content.id.clone();
            collected.push(relation);
        }
    }
    for entity in &request.entities {
        for relation in &entity.relations {
            let mut relation = relation.clone();
            relation.from_entity_id = entity.id.clone();
            collected.push(relation);
        }
    }
    collected
}

/// Resolves a relation endpoint id in order: the entity-id map, then the
/// artifact-id map, then a direct database lookup (treating the raw id as
/// already a db id) — first in the entity table, then the artifact table.
/// `None` means the endpoint is unresolvable (spec §4.6.1 step 4: produces a
/// warning, not a failure).
async fn resolve_endpoint(
    raw_id: &str,
    entity_map: &BTreeMap<String, String>,
    artifact_map: &BTreeMap<String, String>,
    entity_repo: &Repository<'_, Entity>,
    artifact_repo: &Repository<'_, Artifact>,
) -> Option<String> {
    if let Some(id) = entity_map.get(raw_id) {
        return Some(id.clone());
    }
    if let Some(id) = artifact_map.get(raw_id) {
        return Some(id.clone());
    }
    if entity_repo.get_by_id(raw_id).await.ok().flatten().is_some() {
        return Some(raw_id.to_string());
    }
    if artifact_repo.get_by_id(raw_id).await.ok().flatten().is_some() {
        return Some(raw_id.to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{ContentInput, EntityInput, IngestRequest, RelationInput};
    use common::queue::fake::FakeQueueClient;

    async fn memory_pipeline() -> IngestionPipeline {
        let db = SurrealDbClient::memory("ingest_test", "ingest_test").await.unwrap();
        db.apply_migrations(4).await.unwrap();
        IngestionPipeline::new(Arc::new(db), Arc::new(FakeQueueClient::default()), "ingestion")
    }

    fn base_request() -> IngestRequest {
        IngestRequest {
            tenant_id: Some("tenant:acme".to_string()),
            company_id: None,
            sensor_name: "doc".to_string(),
            uri: None,
            contents: vec![ContentInput {
                id: "c1".to_string(),
                text: Some("# Hello".to_string()),
                relations: vec![],
                data: serde_json::json!({}),
                meta_data: None,
            }],
            entities: vec![EntityInput {
                id: "e1".to_string(),
                entity_id: None,
                entity_type: "person".to_string(),
                name: "Ada".to_string(),
                data: serde_json::json!({}),
                relations: vec![],
            }],
            relations: vec![RelationInput {
                from_entity_id: "e1".to_string(),
                to_entity_id: "e1".to_string(),
                relation_type: "knows".to_string(),
                data: serde_json::json!({}),
            }],
        }
    }

    #[tokio::test]
    async fn structured_ingest_creates_one_job_one_entity_one_relation() {
        let pipeline = memory_pipeline().await;
        let response = pipeline.ingest(base_request()).await.unwrap();

        assert_eq!(response.job_ids.len(), 1);
        assert_eq!(response.entities.len(), 1);
        assert_eq!(response.relations.len(), 1);
        assert!(response.warnings.is_empty());
    }

    #[tokio::test]
    async fn entity_level_relations_are_resolved_against_that_entitys_internal_id() {
        let pipeline = memory_pipeline().await;
        let mut request = base_request();
        request.entities.push(EntityInput {
            id: "e2".to_string(),
            entity_id: None,
            entity_type: "person".to_string(),
            name: "Bob".to_string(),
            data: serde_json::json!({}),
            relations: vec![],
        });
        request.entities[0].relations = vec![RelationInput {
            from_entity_id: String::new(),
            to_entity_id: "e2".to_string(),
            relation_type: "knows".to_string(),
            data: serde_json::json!({}),
        }];
        request.relations = vec![];

        let response = pipeline.ingest(request).await.unwrap();
        assert_eq!(response.entities.len(), 2);
        assert_eq!(response.relations.len(), 1);
        assert!(response.warnings.is_empty());
    }

    #[tokio::test]
    async fn unresolvable_relation_endpoint_produces_a_warning_not_a_failure() {
        let pipeline = memory_pipeline().await;
        let mut request = base_request();
        request.relations = vec![RelationInput {
            from_entity_id: "ghost".to_string(),
            to_entity_id: "e1".to_string(),
            relation_type: "knows".to_string(),
            data: serde_json::json!({}),
        }];

        let response = pipeline.ingest(request).await.unwrap();
        assert!(response.relations.is_empty());
        assert_eq!(response.warnings.len(), 1);
        assert!(response.warnings[0].contains("ghost"));
    }

    #[tokio::test]
    async fn empty_request_produces_no_jobs_no_warnings() {
        let pipeline = memory_pipeline().await;
        let request = IngestRequest {
            tenant_id: Some("tenant:acme".to_string()),
            company_id: None,
            sensor_name: "doc".to_string(),
            uri: None,
            contents: vec![],
            entities: vec![],
            relations: vec![],
        };

        let response = pipeline.ingest(request).await.unwrap();
        assert!(response.job_ids.is_empty());
        assert!(response.entities.is_empty());
        assert!(response.relations.is_empty());
        assert!(response.warnings.is_empty());
    }

    #[tokio::test]
    async fn missing_company_resolves_to_not_found() {
        let pipeline = memory_pipeline().await;
        let mut request = base_request();
        request.tenant_id = None;
        request.company_id = Some("does-not-exist".to_string());

        let result = pipeline.ingest(request).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
