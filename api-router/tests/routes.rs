//! End-to-end route tests against an in-memory SurrealDB instance, a fake
//! Redis queue, and a fake LLM client. Mirrors the teacher's
//! `main::tests::build_test_app` / `oneshot` style smoke tests.

use std::sync::Arc;

use api_router::{api_routes_v1, api_state::ApiState};
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use common::config::AppConfig;
use common::db::SurrealDbClient;
use common::llm::{fake::FakeLlmClient, LlmClient};
use common::prompts::PromptStore;
use common::queue::{fake::FakeQueueClient, QueueClient};
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_config() -> AppConfig {
    AppConfig {
        domain: "localhost".into(),
        project_name: "memory-service-test".into(),
        debug: true,
        cors_origins: vec!["*".into()],
        redis_uri: "redis://localhost:6379".into(),
        redis_queue_name: "ingestion".into(),
        surrealdb_uri: "mem://".into(),
        surrealdb_username: "root".into(),
        surrealdb_password: "root".into(),
        surrealdb_namespace: "test_ns".into(),
        surrealdb_database: "test_db".into(),
        storage_path: "./data".into(),
        openrouter_api_key: "test-key".into(),
        openrouter_base_url: "https://example.com".into(),
        llm_model: "test-model".into(),
        embedding_model: "test-embed".into(),
        embedding_dimension: 4,
        prompt_source: "/nonexistent".into(),
    }
}

async fn build_app() -> Router {
    let db = Arc::new(
        SurrealDbClient::memory(
            &format!("ns_{}", uuid::Uuid::new_v4().simple()),
            &format!("db_{}", uuid::Uuid::new_v4().simple()),
        )
        .await
        .expect("in-memory surrealdb"),
    );
    db.apply_migrations(4).await.expect("migrations");

    let queue: Arc<dyn QueueClient> = Arc::new(FakeQueueClient::default());
    let llm: Arc<dyn LlmClient> = Arc::new(FakeLlmClient::with_chat_response(
        json!({"entities": []}).to_string(),
    ));
    let prompts = Arc::new(PromptStore::new(&test_config().prompt_source));

    let api_state = ApiState::new(db, test_config(), queue, llm, prompts);

    Router::new()
        .nest("/api/memory/v1", api_routes_v1())
        .with_state(api_state)
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn liveness_and_readiness_report_ok() {
    let app = build_app().await;

    let live = app
        .clone()
        .oneshot(Request::builder().uri("/api/memory/v1/live").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(live.status(), StatusCode::OK);

    let ready = app
        .oneshot(Request::builder().uri("/api/memory/v1/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(ready.status(), StatusCode::OK);
}

#[tokio::test]
async fn company_create_then_conflict_then_metadata() {
    let app = build_app().await;

    let create_body = json!({
        "company_id": "acme",
        "name": "Acme Corp",
        "sensor_types": ["doc"],
    });

    let created = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/memory/v1/company")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(create_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);

    let conflict = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/memory/v1/company")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(create_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(conflict.status(), StatusCode::CONFLICT);

    let metadata = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/memory/v1/company/acme/metadata")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(metadata.status(), StatusCode::OK);
    let body = json_body(metadata).await;
    assert_eq!(body["company_id"], "acme");

    let missing = app
        .oneshot(
            Request::builder()
                .uri("/api/memory/v1/company/does-not-exist/metadata")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn company_abstract_type_only_returns_context() {
    let app = build_app().await;

    let create_body = json!({"company_id": "acme2", "name": "Acme Two"});
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/memory/v1/company")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(create_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/memory/v1/company/acme2/abstract?resolution=0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert!(body["entities"].as_array().unwrap().is_empty());
    assert!(body["context"].is_string());
}

#[tokio::test]
async fn ingest_then_retrieve_roundtrip() {
    let app = build_app().await;

    let ingest_body = json!({
        "tenant_id": "tenant:roundtrip",
        "sensor_name": "doc",
        "contents": [{"id": "c1", "text": "# Hello"}],
        "entities": [{"id": "e1", "entity_type": "person", "name": "Ada", "data": {}}],
        "relations": [{"from_entity_id": "e1", "to_entity_id": "e1", "relation_type": "knows", "data": {}}],
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/memory/v1/ingest")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(ingest_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["job_ids"].as_array().unwrap().len(), 1);
    assert_eq!(body["entities"].as_array().unwrap().len(), 1);
    assert_eq!(body["relations"].as_array().unwrap().len(), 1);
    assert!(body["warnings"].as_array().unwrap().is_empty());

    let entity_id = body["entities"][0]["id"].as_str().unwrap().to_string();

    let retrieve_body = json!({
        "tenant_id": "tenant:roundtrip",
        "resolution": 2,
        "entity_ids": [entity_id],
    });

    let retrieve_response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/memory/v1/retrieve")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(retrieve_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(retrieve_response.status(), StatusCode::OK);

    let retrieve_json = json_body(retrieve_response).await;
    assert_eq!(retrieve_json["entities"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn ingest_with_unresolvable_relation_endpoint_returns_warning() {
    let app = build_app().await;

    let ingest_body = json!({
        "tenant_id": "tenant:warn",
        "sensor_name": "doc",
        "contents": [],
        "entities": [{"id": "e1", "entity_type": "person", "name": "Ada", "data": {}}],
        "relations": [{"from_entity_id": "ghost", "to_entity_id": "e1", "relation_type": "knows", "data": {}}],
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/memory/v1/ingest")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(ingest_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert!(body["relations"].as_array().unwrap().is_empty());
    let warnings = body["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].as_str().unwrap().contains("ghost"));
}
