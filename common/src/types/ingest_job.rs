//! A queued unit of post-ingest work (chunk + embed one artifact). The
//! worker pops job ids off the Redis queue and loads the `IngestJob` record
//! to drive `status` transitions. Per DESIGN.md open question (a), `status`
//! is the sole authoritative lifecycle state — nothing else reconstructs it.
//! Status names and `completed_at` semantics follow spec §3 exactly:
//! `completed_at` is set iff `status ∈ {Completed, Failed}`.
//!
//! Grounded in the teacher's `IngestionTask` (`storage::types::
//! ingestion_task`), whose `mark_processing`/`mark_succeeded`/`mark_failed`
//! state machine this mirrors under the spec's own status names.

use crate::registry::{FieldDescriptor, FieldType, TableDescriptor};
use crate::types::tenant_record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DESCRIPTOR: TableDescriptor = TableDescriptor {
    table_name: "ingest_job",
    fields: &[
        FieldDescriptor::indexed("artifact_id", FieldType::String, "idx_job_artifact_id"),
        FieldDescriptor::indexed("status", FieldType::String, "idx_job_status"),
        FieldDescriptor::scalar(
            "error_message",
            FieldType::Option(&FieldType::String),
        ),
        FieldDescriptor::scalar(
            "completed_at",
            FieldType::Option(&FieldType::Datetime),
        ),
    ],
    is_edge: false,
    abstract_model: false,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

tenant_record!(IngestJob, {
    artifact_id: String,
    status: JobStatus,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
});

impl IngestJob {
    /// spec §3 invariant: `completed_at` set iff `status ∈ {Completed, Failed}`.
    #[must_use]
    pub fn completed_at_invariant_holds(&self) -> bool {
        let should_be_set = matches!(self.status, JobStatus::Completed | JobStatus::Failed);
        self.completed_at.is_some() == should_be_set
    }

    pub fn mark_processing(&mut self) {
        self.status = JobStatus::Processing;
        self.updated_at = Utc::now();
    }

    pub fn mark_completed(&mut self) {
        let now = Utc::now();
        self.status = JobStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    pub fn mark_failed(&mut self, error_message: impl Into<String>) {
        let now = Utc::now();
        self.status = JobStatus::Failed;
        self.error_message = Some(error_message.into());
        self.completed_at = Some(now);
        self.updated_at = now;
    }
}
