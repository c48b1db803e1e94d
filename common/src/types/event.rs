//! A timestamped occurrence tied to an entity and the artifacts that
//! evidenced it. Grounded in the original Python `Event` model
//! (`original_source/app/apps/memory/models.py`); the teacher repo has no
//! direct analogue, so this follows the same `tenant_record!` shape as
//! `Entity`/`Artifact`.

use crate::registry::{FieldDescriptor, FieldType, TableDescriptor};
use crate::types::tenant_record;

pub const DESCRIPTOR: TableDescriptor = TableDescriptor {
    table_name: "event",
    fields: &[
        FieldDescriptor::indexed("entity_id", FieldType::String, "idx_event_entity_id"),
        FieldDescriptor::indexed("event_type", FieldType::String, "idx_event_type"),
        FieldDescriptor::scalar(
            "artifact_ids",
            FieldType::Array(&FieldType::String),
        ),
        FieldDescriptor::scalar("data", FieldType::Object),
    ],
    is_edge: false,
    abstract_model: false,
};

tenant_record!(Event, {
    entity_id: String,
    event_type: String,
    #[serde(default)]
    artifact_ids: Vec<String>,
    #[serde(default)]
    data: serde_json::Value,
});
