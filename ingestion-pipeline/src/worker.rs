//! Background worker loop (spec §4.6.2): pops job ids from the Redis queue,
//! chunks and embeds the job's artifact, and drives the job's status
//! machine. Grounded in the teacher's `run_worker_loop`
//! (`ingestion-pipeline::lib::run_worker_loop`), generalized from its
//! `IngestionTask`/lease-based claim to the spec's simple
//! `BRPOP`-then-status-transition loop.

use std::sync::Arc;

use common::db::SurrealDbClient;
use common::error::AppError;
use common::llm::LlmClient;
use common::model::Permission;
use common::persistence::Repository;
use common::queue::QueueClient;
use common::types::artifact::Artifact;
use common::types::artifact_chunk::ArtifactChunk;
use common::types::ingest_job::{IngestJob, JobStatus};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use crate::chunking::chunk_text;

const BRPOP_TIMEOUT_SECS: u64 = 60;
const EMPTY_POLL_SLEEP: std::time::Duration = std::time::Duration::from_millis(100);
const EMBED_BATCH_SIZE: usize = 100;

pub struct Worker {
    db: Arc<SurrealDbClient>,
    queue: Arc<dyn QueueClient>,
    llm: Arc<dyn LlmClient>,
    queue_name: String,
    embedding_model: String,
    embedding_dimension: u32,
}

impl Worker {
    #[must_use]
    pub fn new(
        db: Arc<SurrealDbClient>,
        queue: Arc<dyn QueueClient>,
        llm: Arc<dyn LlmClient>,
        queue_name: impl Into<String>,
        embedding_model: impl Into<String>,
        embedding_dimension: u32,
    ) -> Self {
        Self {
            db,
            queue,
            llm,
            queue_name: queue_name.into(),
            embedding_model: embedding_model.into(),
            embedding_dimension,
        }
    }

    /// Runs until `shutdown` resolves. Honors the shutdown signal between
    /// jobs only; an in-flight job always completes (spec §5).
    pub async fn run(&self, mut shutdown: tokio::sync::mpsc::Receiver<()>) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("worker received shutdown signal, draining");
                    break;
                }
                payload = self.queue.dequeue(&self.queue_name, BRPOP_TIMEOUT_SECS) => {
                    match payload {
                        Ok(Some(raw)) => self.handle_payload(&raw).await,
                        Ok(None) => tracing::debug!("queue poll returned empty, continuing"),
                        Err(err) => {
                            tracing::error!(error = %err, "queue poll failed, backing off");
                            tokio::time::sleep(EMPTY_POLL_SLEEP).await;
                        }
                    }
                }
            }
        }
    }

    async fn handle_payload(&self, raw: &str) {
        let job_id = match extract_job_id(raw) {
            Some(id) => id,
            None => {
                tracing::error!(payload = raw, "queue payload has no job id, dropping");
                return;
            }
        };

        if let Err(err) = self.process_job(&job_id).await {
            tracing::error!(job_id, error = %err, "job processing failed");
        }
    }

    /// Processes one job end-to-end: claim, chunk+embed, persist, complete.
    /// On any error after the job was claimed, marks it `FAILED` with the
    /// error recorded (spec §4.6.2.e, §7: ingest fails loudly).
    #[tracing::instrument(skip(self), fields(job_id))]
    pub async fn process_job(&self, job_id: &str) -> Result<(), AppError> {
        let job_repo: Repository<IngestJob> = Repository::new(&self.db, "ingest_job");

        let Some(mut job) = job_repo.get_by_id(job_id).await? else {
            tracing::warn!(job_id, "job not found, skipping");
            return Ok(());
        };
        if job.status != JobStatus::Queued {
            tracing::warn!(job_id, status = ?job.status, "job not in QUEUED state, skipping");
            return Ok(());
        }

        job.mark_processing();
        job_repo.save(&job).await?;

        let result = self.chunk_and_embed(&job).await;

        match result {
            Ok(()) => {
                job.mark_completed();
                job_repo.save(&job).await?;
            }
            Err(err) => {
                job.mark_failed(err.to_string());
                job_repo.save(&job).await?;
                return Err(err);
            }
        }

        Ok(())
    }

    async fn chunk_and_embed(&self, job: &IngestJob) -> Result<(), AppError> {
        let artifact_repo: Repository<Artifact> = Repository::new(&self.db, "artifact");
        let Some(artifact) = artifact_repo.get_by_id(&job.artifact_id).await? else {
            // spec §4.6.2.c: artifact missing leaves the job stuck in
            // PROCESSING; per the open question in DESIGN.md this worker
            // instead promotes it to FAILED for operability.
            return Err(AppError::NotFound(format!("artifact '{}' not found", job.artifact_id)));
        };

        let pieces = chunk_text(artifact.text());
        if pieces.is_empty() {
            return Ok(());
        }

        let chunk_repo: Repository<ArtifactChunk> = Repository::new(&self.db, "artifact_chunk");
        for (batch_index, batch) in pieces.chunks(EMBED_BATCH_SIZE).enumerate() {
            let embeddings = self.embed_with_retry(batch).await?;
            for (offset, (text, embedding)) in batch.iter().zip(embeddings).enumerate() {
                let chunk_index = (batch_index * EMBED_BATCH_SIZE + offset) as i64;
                let chunk = ArtifactChunk {
                    id: String::new(),
                    tenant_id: job.tenant_id.clone(),
                    created_at: chrono::Utc::now(),
                    updated_at: chrono::Utc::now(),
                    is_deleted: false,
                    meta_data: merge_meta_data(&artifact, job),
                    user_permissions: vec![],
                    group_permissions: vec![],
                    public_permission: Permission::Read,
                    artifact_id: artifact.id.clone(),
                    chunk_index,
                    text: text.clone(),
                    embedding: Some(embedding),
                };
                chunk_repo.save(&chunk).await?;
            }
        }

        Ok(())
    }

    /// Transient embedding failures get exponential backoff with jitter
    /// (teacher pattern in `KnowledgeEntity::update_all_embeddings`). A
    /// non-retryable error (e.g. the LLM rejecting malformed input) gives up
    /// immediately instead of burning the full backoff schedule.
    async fn embed_with_retry(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        let strategy = ExponentialBackoff::from_millis(100).map(jitter).take(3);
        let llm = Arc::clone(&self.llm);
        let model = self.embedding_model.clone();
        let dimension = self.embedding_dimension;
        let owned_inputs: Vec<String> = inputs.to_vec();

        RetryIf::spawn(
            strategy,
            move || {
                let llm = Arc::clone(&llm);
                let model = model.clone();
                let owned_inputs = owned_inputs.clone();
                async move { llm.embed_batch(&model, &owned_inputs, dimension).await }
            },
            AppError::is_retryable,
        )
        .await
    }
}

fn merge_meta_data(artifact: &Artifact, job: &IngestJob) -> Option<serde_json::Value> {
    match (&artifact.meta_data, &job.meta_data) {
        (None, None) => None,
        (Some(a), None) => Some(a.clone()),
        (None, Some(b)) => Some(b.clone()),
        (Some(a), Some(b)) => {
            let mut merged = a.clone();
            if let (Some(merged_obj), Some(b_obj)) = (merged.as_object_mut(), b.as_object()) {
                for (key, value) in b_obj {
                    merged_obj.insert(key.clone(), value.clone());
                }
            }
            Some(merged)
        }
    }
}

/// The queued payload is the job's full field dump (spec §6); only `id` is
/// needed here since the worker re-loads the authoritative row.
fn extract_job_id(payload: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(payload).ok()?;
    value.get("id")?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::llm::fake::FakeLlmClient;
    use common::queue::fake::FakeQueueClient;

    async fn memory_worker() -> (Worker, Arc<SurrealDbClient>) {
        let db = Arc::new(SurrealDbClient::memory("worker_test", "worker_test").await.unwrap());
        db.apply_migrations(4).await.unwrap();
        let queue: Arc<dyn QueueClient> = Arc::new(FakeQueueClient::default());
        let llm: Arc<dyn LlmClient> = Arc::new(FakeLlmClient::with_chat_response("{}"));
        let worker = Worker::new(Arc::clone(&db), queue, llm, "ingestion", "test-embed", 4);
        (worker, db)
    }

    async fn seed_job(db: &SurrealDbClient, raw_text: &str) -> IngestJob {
        let artifact_repo: Repository<Artifact> = Repository::new(db, "artifact");
        let artifact = Artifact {
            id: String::new(),
            tenant_id: "tenant:acme".into(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            is_deleted: false,
            meta_data: None,
            user_permissions: vec![],
            group_permissions: vec![],
            public_permission: Permission::Read,
            uri: None,
            sensor_name: Some("doc".into()),
            raw_text: Some(raw_text.to_string()),
            data: serde_json::json!({}),
        };
        let saved_artifact = artifact_repo.save(&artifact).await.unwrap();

        let job_repo: Repository<IngestJob> = Repository::new(db, "ingest_job");
        let job = IngestJob {
            id: String::new(),
            tenant_id: "tenant:acme".into(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            is_deleted: false,
            meta_data: None,
            user_permissions: vec![],
            group_permissions: vec![],
            public_permission: Permission::None,
            artifact_id: saved_artifact.id,
            status: JobStatus::Queued,
            error_message: None,
            completed_at: None,
        };
        job_repo.save(&job).await.unwrap()
    }

    #[tokio::test]
    async fn processes_a_queued_job_to_completion() {
        let (worker, db) = memory_worker().await;
        let job = seed_job(&db, "hello world, this is a short artifact").await;

        worker.process_job(&job.id).await.unwrap();

        let job_repo: Repository<IngestJob> = Repository::new(&db, "ingest_job");
        let reloaded = job_repo.get_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, JobStatus::Completed);
        assert!(reloaded.completed_at.is_some());

        let chunk_repo: Repository<ArtifactChunk> = Repository::new(&db, "artifact_chunk");
        let chunks = chunk_repo.find_many("tenant:acme", 10).await.unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[tokio::test]
    async fn already_completed_job_is_left_untouched() {
        let (worker, db) = memory_worker().await;
        let mut job = seed_job(&db, "text").await;
        job.mark_completed();
        let job_repo: Repository<IngestJob> = Repository::new(&db, "ingest_job");
        job_repo.save(&job).await.unwrap();
        let completed_at_before = job.completed_at;

        worker.process_job(&job.id).await.unwrap();

        let reloaded = job_repo.get_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, JobStatus::Completed);
        assert_eq!(reloaded.completed_at, completed_at_before);
    }

    #[tokio::test]
    async fn missing_artifact_fails_the_job() {
        let (worker, db) = memory_worker().await;
        let job_repo: Repository<IngestJob> = Repository::new(&db, "ingest_job");
        let job = IngestJob {
            id: String::new(),
            tenant_id: "tenant:acme".into(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            is_deleted: false,
            meta_data: None,
            user_permissions: vec![],
            group_permissions: vec![],
            public_permission: Permission::None,
            artifact_id: "artifact:does-not-exist".into(),
            status: JobStatus::Queued,
            error_message: None,
            completed_at: None,
        };
        let saved = job_repo.save(&job).await.unwrap();

        let result = worker.process_job(&saved.id).await;
        assert!(result.is_err());

        let reloaded = job_repo.get_by_id(&saved.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, JobStatus::Failed);
        assert!(reloaded.error_message.is_some());
    }

    #[test]
    fn extracts_job_id_from_payload() {
        let payload = serde_json::json!({"id": "ingest_job:abc", "status": "QUEUED"}).to_string();
        assert_eq!(extract_job_id(&payload), Some("ingest_job:abc".to_string()));
    }
}
