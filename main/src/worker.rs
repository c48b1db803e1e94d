//! `worker` binary: the background ingest worker only (spec §4.6.2, §5).
//! Deploying N copies of this binary gives N-way job parallelism, the
//! supported horizontal scaling knob. Each worker initializes its own db
//! connection (spec §5: "connection handles are NOT safe for use across
//! processes").

use std::sync::Arc;

use common::config::AppConfig;
use common::db::SurrealDbClient;
use common::llm::{LlmClient, OpenRouterClient};
use common::queue::{QueueClient, RedisQueueClient};
use ingestion_pipeline::worker::Worker;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = AppConfig::load()?;

    let db = Arc::new(
        SurrealDbClient::new(
            &config.surrealdb_uri,
            &config.surrealdb_username,
            &config.surrealdb_password,
            &config.surrealdb_namespace,
            &config.surrealdb_database,
        )
        .await?,
    );
    db.apply_migrations(config.embedding_dimension).await?;

    let queue: Arc<dyn QueueClient> = Arc::new(RedisQueueClient::new(&config.redis_uri)?);
    let llm: Arc<dyn LlmClient> = Arc::new(OpenRouterClient::new(
        &config.openrouter_api_key,
        &config.openrouter_base_url,
    ));

    let worker = Worker::new(
        db,
        queue,
        llm,
        config.redis_queue_name.clone(),
        config.embedding_model.clone(),
        config.embedding_dimension as u32,
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(()).await;
        }
    });

    info!("starting ingestion worker");
    worker.run(shutdown_rx).await;
    info!("worker shut down");

    Ok(())
}
