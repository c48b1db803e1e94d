//! A directed, typed edge between two `Entity` nodes. Persisted as a native
//! SurrealDB graph edge (`RELATE source -> relation -> target`), which stores
//! the endpoints as `out`/`in`. Spec §9 requires the public API to speak
//! `source_id`/`target_id`; `EdgeRepository` (in `crate::persistence`) is the
//! single place that translates between the two — this struct always holds
//! `source_id`/`target_id`, never raw `out`/`in`.
//!
//! Grounded in the teacher's `KnowledgeRelationship`
//! (`storage::types::knowledge_relationship`), including its
//! bound-parameter-only query discipline (see
//! `test_store_relationship_resists_query_injection` in that file).

use crate::registry::{FieldDescriptor, FieldType, TableDescriptor};
use crate::types::tenant_record;

pub const DESCRIPTOR: TableDescriptor = TableDescriptor {
    table_name: "relation",
    fields: &[
        FieldDescriptor::scalar("source_id", FieldType::Record("entity")),
        FieldDescriptor::scalar("target_id", FieldType::Record("entity")),
        FieldDescriptor::indexed("relation_type", FieldType::String, "idx_relation_type"),
        FieldDescriptor::scalar("data", FieldType::Object),
    ],
    is_edge: true,
    abstract_model: false,
};

tenant_record!(Relation, {
    source_id: String,
    target_id: String,
    relation_type: String,
    #[serde(default)]
    data: serde_json::Value,
});
