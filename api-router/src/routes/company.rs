//! `/company` route group (spec §6): tenant creation/listing and the
//! resolver-backed `abstract` endpoint.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use common::error::AppError;
use common::executor::QueryExecutor;
use common::persistence::Repository;
use common::query::scalar::ScalarQueryBuilder;
use common::types::company::Company;
use retrieval_pipeline::resolver::{ResolutionLevel, Resolver, ResolverConfig, ResolveRequest};
use serde::Deserialize;
use serde_json::Value;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct CreateCompanyRequest {
    pub company_id: String,
    pub name: String,
    #[serde(default)]
    pub sensor_types: Vec<String>,
    #[serde(default)]
    pub entity_types: Option<Vec<String>>,
    #[serde(default)]
    pub relation_types: Option<Vec<String>>,
    #[serde(default)]
    pub data: Option<Value>,
}

pub async fn list_companies(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let (sql, params) = ScalarQueryBuilder::new("company")
        .map_err(|err| ApiError::from(AppError::Validation(err.to_string())))?
        .where_eq("is_deleted", false)
        .map_err(|err| ApiError::from(AppError::Validation(err.to_string())))?
        .limit(1000)
        .build();

    let companies: Vec<Company> = QueryExecutor::new(&state.db)
        .execute(&sql, params)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(companies))
}

pub async fn create_company(
    State(state): State<ApiState>,
    Json(request): Json<CreateCompanyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if find_company_by_company_id(&state, &request.company_id)
        .await
        .map_err(ApiError::from)?
        .is_some()
    {
        return Err(ApiError::from(AppError::Conflict(format!(
            "company_id '{}' already exists",
            request.company_id
        ))));
    }

    let company = Company {
        id: String::new(),
        company_id: request.company_id,
        name: request.name,
        sensor_types: request.sensor_types,
        entity_types: request.entity_types,
        relation_types: request.relation_types,
        data: request.data.unwrap_or_else(|| serde_json::json!({})),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        is_deleted: false,
        meta_data: None,
    };

    let repo: Repository<Company> = Repository::new(&state.db, "company");
    let saved = repo.save(&company).await.map_err(ApiError::from)?;

    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn get_company_metadata(
    State(state): State<ApiState>,
    Path(company_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let company = find_company_by_company_id(&state, &company_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::from(AppError::NotFound(format!("company '{company_id}' not found"))))?;

    Ok(Json(company))
}

#[derive(Debug, Deserialize)]
pub struct AbstractQuery {
    pub resolution: Option<u8>,
}

pub async fn get_company_abstract(
    State(state): State<ApiState>,
    Path(company_id): Path<String>,
    Query(query): Query<AbstractQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let resolution = match query.resolution {
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
            tenant_id: None,
            company_id: Some(company_id),
            resolution,
            entity_ids: vec![],
            text: None,
        })
        .await
        .map_err(ApiError::from)?;

    Ok(Json(result))
}

/// Duplicated in `ingestion-pipeline::pipeline` and `retrieval-pipeline::resolver`
/// rather than shared: each crate resolves a `company_id` independently and
/// `api-router` sits above both, so pulling this into `common` would mean
/// teaching a leaf crate about tenant-lookup policy it otherwise has no need of.
async fn find_company_by_company_id(state: &ApiState, company_id: &str) -> Result<Option<Company>, AppError> {
    let (sql, params) = ScalarQueryBuilder::new("company")
        .map_err(|err| AppError::Validation(err.to_string()))?
        .where_eq("company_id", company_id)
        .map_err(|err| AppError::Validation(err.to_string()))?
        .where_eq("is_deleted", false)
        .map_err(|err| AppError::Validation(err.to_string()))?
        .limit(1)
        .build();

    let mut rows: Vec<Company> = QueryExecutor::new(&state.db).execute(&sql, params).await?;
    Ok(rows.pop())
}
