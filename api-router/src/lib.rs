//! Axum route table for the `/api/memory/v1` surface (spec §6). Grounded in
//! the teacher's `api_routes_v1` (public probe routes merged with a
//! protected group), minus the teacher's session-key auth layer: spec's
//! authorization Non-goal stops at permission-list propagation, it names no
//! API authentication scheme.

use api_state::ApiState;
use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use routes::{
    company::{create_company, get_company_abstract, get_company_metadata, list_companies},
    ingest::ingest_data,
    liveness::live,
    readiness::ready,
    retrieve::retrieve,
};

pub mod api_state;
pub mod error;
pub mod routes;

/// Router for API functionality, version 1, mounted at `/api/memory/v1`.
pub fn api_routes_v1<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    Router::new()
        .route("/ready", get(ready))
        .route("/live", get(live))
        .route("/company", get(list_companies).post(create_company))
        .route("/company/{company_id}/metadata", get(get_company_metadata))
        .route("/company/{company_id}/abstract", get(get_company_abstract))
        .route("/ingest", post(ingest_data))
        .route("/retrieve", post(retrieve))
}
