//! A chunk of an artifact's text, produced by the recursive character
//! splitter (spec §4.6.3) and carrying its own embedding for vector search.
//! Grounded in the teacher's `TextChunk` (`storage::types::text_chunk`).

use crate::registry::{FieldDescriptor, FieldType, TableDescriptor};
use crate::types::tenant_record;

pub const DESCRIPTOR: TableDescriptor = TableDescriptor {
    table_name: "artifact_chunk",
    fields: &[
        FieldDescriptor::indexed("artifact_id", FieldType::String, "idx_chunk_artifact_id"),
        FieldDescriptor::scalar("chunk_index", FieldType::Int),
        FieldDescriptor::fulltext("text", "idx_chunk_text_fts"),
        FieldDescriptor::vector("embedding", "idx_chunk_embedding_hnsw"),
    ],
    is_edge: false,
    abstract_model: false,
};

tenant_record!(ArtifactChunk, {
    artifact_id: String,
    chunk_index: i64,
    text: String,
    #[serde(default)]
    embedding: Option<Vec<f32>>,
});
