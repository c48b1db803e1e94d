//! `POST /ingest` (spec §4.6.1, §6): hands a structured ingest request to
//! `ingestion_pipeline::pipeline::IngestionPipeline` and returns its
//! `{job_ids, entities, relations, warnings}` bundle verbatim.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use ingestion_pipeline::request::IngestRequest;

use crate::{api_state::ApiState, error::ApiError};

pub async fn ingest_data(
    State(state): State<ApiState>,
    Json(request): Json<IngestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.ingestion.ingest(request).await.map_err(ApiError::from)?;
    Ok((StatusCode::OK, Json(response)))
}
