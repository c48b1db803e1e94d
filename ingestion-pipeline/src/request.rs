//! Wire shape of a structured ingest request and its response (spec §4.6.1,
//! §6 `POST /ingest`). Grounded in the teacher's ingestion DTOs
//! (`ingestion-pipeline::pipeline::preparation`), generalized from a
//! single-content-blob shape to the spec's batched contents/entities/
//! relations request.

use common::types::{entity::Entity, relation::Relation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_data() -> Value {
    Value::Object(serde_json::Map::new())
}

/// One piece of text content to persist as an `Artifact`. `id` is an
/// internal, request-scoped identifier used to wire up relations and is
/// never persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentInput {
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub relations: Vec<RelationInput>,
    #[serde(default = "default_data")]
    pub data: Value,
    #[serde(default)]
    pub meta_data: Option<Value>,
}

/// One entity to upsert. `id` is the internal id; `entity_id`, when set,
/// names an existing db entity to update instead of creating a new one.
/// `relations`, like `ContentInput::relations`, is folded into the request's
/// overall relation list with `from_entity_id` implicitly this entity's `id`
/// (spec §4.6.1: "entities[] ... optional per-entity relations[]").
#[derive(Debug, Clone, Deserialize)]
pub struct EntityInput {
    pub id: String,
    #[serde(default)]
    pub entity_id: Option<String>,
    pub entity_type: String,
    pub name: String,
    #[serde(default = "default_data")]
    pub data: Value,
    #[serde(default)]
    pub relations: Vec<RelationInput>,
}

/// A relation between two endpoints, each an internal content/entity id, a
/// db id, or (for content-level relations) implicitly the owning content's
/// id — see `resolve_endpoint` in `pipeline.rs`.
#[derive(Debug, Clone, Deserialize)]
pub struct RelationInput {
    #[serde(default)]
    pub from_entity_id: String,
    pub to_entity_id: String,
    pub relation_type: String,
    #[serde(default = "default_data")]
    pub data: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub company_id: Option<String>,
    pub sensor_name: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub contents: Vec<ContentInput>,
    #[serde(default)]
    pub entities: Vec<EntityInput>,
    #[serde(default)]
    pub relations: Vec<RelationInput>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    pub job_ids: Vec<String>,
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
    pub warnings: Vec<String>,
}
