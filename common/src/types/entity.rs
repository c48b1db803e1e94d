//! A node in the tenant's knowledge graph, extracted from ingested artifacts
//! by the LLM entity extractor (spec §4.6.4). Grounded in the teacher's
//! `KnowledgeEntity` (`storage::types::knowledge_entity`), generalized from
//! its `user_id`-scoped model to the spec's `tenant_id` scoping.

use crate::registry::{FieldDescriptor, FieldType, TableDescriptor};
use crate::types::tenant_record;

pub const DESCRIPTOR: TableDescriptor = TableDescriptor {
    table_name: "entity",
    fields: &[
        FieldDescriptor::indexed("name", FieldType::String, "idx_entity_name"),
        FieldDescriptor::indexed("entity_type", FieldType::String, "idx_entity_type"),
        FieldDescriptor::scalar("data", FieldType::Object),
    ],
    is_edge: false,
    abstract_model: false,
};

tenant_record!(Entity, {
    name: String,
    entity_type: String,
    #[serde(default)]
    data: serde_json::Value,
});
