//! A single ingested document (spec §3). Text lives inline in `raw_text`;
//! there is no separate blob store (see DESIGN.md "Dropped teacher
//! crates/modules" — `object_store`-backed `StorageManager` was dropped).
//! Grounded in the teacher's `Artifact`-shaped tables and the original
//! Python `Artifact` model (`original_source/app/apps/memory/models.py`).

use crate::registry::{FieldDescriptor, FieldType, TableDescriptor};
use crate::types::tenant_record;

pub const DESCRIPTOR: TableDescriptor = TableDescriptor {
    table_name: "artifact",
    fields: &[
        FieldDescriptor::scalar("uri", FieldType::Option(&FieldType::String)),
        FieldDescriptor::indexed(
            "sensor_name",
            FieldType::Option(&FieldType::String),
            "idx_artifact_sensor_name",
        ),
        FieldDescriptor::scalar("raw_text", FieldType::Option(&FieldType::String)),
        FieldDescriptor::scalar("data", FieldType::Object),
    ],
    is_edge: false,
    abstract_model: false,
};

tenant_record!(Artifact, {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    sensor_name: Option<String>,
    #[serde(default)]
    raw_text: Option<String>,
    #[serde(default)]
    data: serde_json::Value,
});

impl Artifact {
    /// Chunking and LLM extraction both treat a missing body as empty text.
    #[must_use]
    pub fn text(&self) -> &str {
        self.raw_text.as_deref().unwrap_or("")
    }
}
