//! Shared application state handed to every route handler through
//! `axum::extract::State`. Grounded in the teacher's `ApiState` (`db` +
//! `config` + `storage`), generalized with the queue/LLM/prompt seams this
//! service's ingest and retrieve routes need.

use std::sync::Arc;

use common::config::AppConfig;
use common::db::SurrealDbClient;
use common::llm::LlmClient;
use common::prompts::PromptStore;
use common::queue::QueueClient;
use ingestion_pipeline::pipeline::IngestionPipeline;

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<SurrealDbClient>,
    pub config: AppConfig,
    pub queue: Arc<dyn QueueClient>,
    pub llm: Arc<dyn LlmClient>,
    pub prompts: Arc<PromptStore>,
    pub ingestion: Arc<IngestionPipeline>,
}

impl ApiState {
    #[must_use]
    pub fn new(
        db: Arc<SurrealDbClient>,
        config: AppConfig,
        queue: Arc<dyn QueueClient>,
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptStore>,
    ) -> Self {
        let ingestion = Arc::new(IngestionPipeline::new(
            Arc::clone(&db),
            Arc::clone(&queue),
            config.redis_queue_name.clone(),
        ));

        Self {
            db,
            config,
            queue,
            llm,
            prompts,
            ingestion,
        }
    }
}
