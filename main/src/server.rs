//! `server` binary: HTTP surface only (spec §6). Builds the shared
//! `ApiState` (db, queue, LLM, prompt store) and serves `/api/memory/v1`.
//! Grounded in the teacher's `main.rs` startup sequence (config -> db ->
//! migrations -> clients -> router -> serve), generalized to this service's
//! client set and minus the teacher's session store / HTML router / local
//! reranker, none of which this spec has.

use std::sync::Arc;

use api_router::{api_routes_v1, api_state::ApiState};
use axum::Router;
use common::config::AppConfig;
use common::db::SurrealDbClient;
use common::llm::{LlmClient, OpenRouterClient};
use common::prompts::PromptStore;
use common::queue::{QueueClient, RedisQueueClient};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_PORT: u16 = 8080;
const API_PREFIX: &str = "/api/memory/v1";

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
    let prompts = Arc::new(PromptStore::new(&config.prompt_source));

    let api_state = ApiState::new(db, config.clone(), queue, llm, prompts);

    let app = Router::new()
        .nest(API_PREFIX, api_routes_v1())
        .layer(cors_layer(&config.cors_origins))
        .with_state(api_state);

    let serve_address = format!("0.0.0.0:{DEFAULT_PORT}");
    info!(address = %serve_address, "starting memory-service HTTP server");
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// `CORS_ORIGINS = ["*"]` (the config default) is permissive; any other list
/// is taken literally as the set of allowed origins.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let parsed: Vec<_> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new().allow_origin(AllowOrigin::list(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_origin_is_permissive() {
        // CorsLayer::permissive() doesn't expose its internals for
        // inspection; this just asserts construction doesn't panic.
        let _ = cors_layer(&["*".to_string()]);
    }

    #[test]
    fn explicit_origin_list_parses() {
        let _ = cors_layer(&["https://example.com".to_string()]);
    }
}
