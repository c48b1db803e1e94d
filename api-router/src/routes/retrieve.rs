//! `POST /retrieve` (spec §4.7, §6): runs the resolver against a retrieval
//! request, inferring a resolution level when the caller doesn't name one.

use axum::{extract::State, response::IntoResponse, Json};
use common::error::AppError;
use retrieval_pipeline::resolver::{ResolutionLevel, Resolver, ResolverConfig, ResolveRequest};
use serde::Deserialize;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct RetrieveRequest {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub resolution: Option<u8>,
    #[serde(default)]
    pub entity_ids: Vec<String>,
    #[serde(default)]
    pub text: Option<String>,
}

pub async fn retrieve(
    State(state): State<ApiState>,
    Json(request): Json<RetrieveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let resolution = match request.resolution {
        Some(raw) => Some(
            ResolutionLevel::from_query_param(raw)
                .ok_or_else(|| ApiError::from(AppError::Validation(format!("unknown resolution level '{raw}'"))))?,
        ),
        None => None,
    };

    let resolver = Resolver::new(
        &state.db,
        state.llm.as_ref(),
        state.prompts.as_ref(),
        ResolverConfig {
            llm_model: state.config.llm_model.clone(),
            embedding_model: state.config.embedding_model.clone(),
            embedding_dimension: state.config.embedding_dimension as u32,
        },
    );

    let result = resolver
        .resolve(ResolveRequest {
            tenant_id: request.tenant_id,
            company_id: request.company_id,
            resolution,
            entity_ids: request.entity_ids,
            text: request.text,
        })
        .await
        .map_err(ApiError::from)?;

    Ok(Json(result))
}
