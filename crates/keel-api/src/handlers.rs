//! Query handlers.
//!
//! Each handler reads through the `QueryEngine` and returns JSON. Query
//! string fields arrive as raw strings; all validation is left to the
//! filter evaluator so malformed input surfaces as `InvalidFilter`.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use keel_query::{
    CertificateFilters, DeploymentFilters, DeploymentIdParams, GroupIdParams, PageRequest,
};

use crate::ApiState;
use crate::error::{ApiError, ApiResponse};

fn params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query
        .map(|Query(params)| params)
        .map_err(|e| ApiError::bad_request(format!("invalid query: {}", e.body_text())))
}

fn respond<T: Serialize>(result: Result<T, ApiError>) -> Response {
    match result {
        Ok(data) => ApiResponse::ok(data).into_response(),
        Err(e) => e.into_response(),
    }
}

// ── Deployments ────────────────────────────────────────────────

/// Query string of `deployments/list`.
#[derive(Debug, Default, Deserialize)]
pub struct ListDeploymentsParams {
    #[serde(rename = "filters.owner")]
    pub owner: Option<String>,
    #[serde(rename = "filters.dseq")]
    pub dseq: Option<String>,
    #[serde(rename = "filters.gseq")]
    pub gseq: Option<String>,
    #[serde(rename = "filters.state")]
    pub state: Option<String>,
    #[serde(rename = "pagination.key")]
    pub key: Option<String>,
    #[serde(rename = "pagination.offset")]
    pub offset: Option<String>,
    #[serde(rename = "pagination.limit")]
    pub limit: Option<String>,
    #[serde(rename = "pagination.count_total")]
    pub count_total: Option<String>,
}

/// GET /keel/deployment/v1/deployments/list
pub async fn list_deployments(
    State(state): State<ApiState>,
    query: Result<Query<ListDeploymentsParams>, QueryRejection>,
) -> Response {
    let result = params(query).and_then(|params| {
        let filters = DeploymentFilters {
            owner: params.owner,
            dseq: params.dseq,
            gseq: params.gseq,
            state: params.state,
        };
        PageRequest::parse(
            params.key.as_deref(),
            params.offset.as_deref(),
            params.limit.as_deref(),
            params.count_total.as_deref(),
        )
        .and_then(|page| state.query.query_deployments(&filters, &page))
        .map_err(ApiError::from)
    });
    respond(result)
}

/// Query string of `deployments/info`.
#[derive(Debug, Default, Deserialize)]
pub struct DeploymentIdQuery {
    #[serde(rename = "id.owner")]
    pub owner: Option<String>,
    #[serde(rename = "id.dseq")]
    pub dseq: Option<String>,
}

/// GET /keel/deployment/v1/deployments/info
pub async fn get_deployment(
    State(state): State<ApiState>,
    query: Result<Query<DeploymentIdQuery>, QueryRejection>,
) -> Response {
    let result = params(query).and_then(|params| {
        let id = DeploymentIdParams {
            owner: params.owner,
            dseq: params.dseq,
        };
        state.query.query_deployment(&id).map_err(ApiError::from)
    });
    respond(result)
}

/// Query string of `groups/info`.
#[derive(Debug, Default, Deserialize)]
pub struct GroupIdQuery {
    #[serde(rename = "id.owner")]
    pub owner: Option<String>,
    #[serde(rename = "id.dseq")]
    pub dseq: Option<String>,
    #[serde(rename = "id.gseq")]
    pub gseq: Option<String>,
}

/// GET /keel/deployment/v1/groups/info
pub async fn get_group(
    State(state): State<ApiState>,
    query: Result<Query<GroupIdQuery>, QueryRejection>,
) -> Response {
    let result = params(query).and_then(|params| {
        let id = GroupIdParams {
            owner: params.owner,
            dseq: params.dseq,
            gseq: params.gseq,
        };
        state.query.query_group(&id).map_err(ApiError::from)
    });
    respond(result)
}

// ── Certificates ───────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListCertificatesParams {
    #[serde(rename = "filter.owner")]
    pub owner: Option<String>,
    #[serde(rename = "filter.state")]
    pub state: Option<String>,
}

/// GET /keel/cert/v1/certificates/list
pub async fn list_certificates(
    State(state): State<ApiState>,
    query: Result<Query<ListCertificatesParams>, QueryRejection>,
) -> Response {
    let result = params(query).and_then(|params| {
        let filters = CertificateFilters {
            owner: params.owner,
            state: params.state,
        };
        state.query.query_certificates(&filters).map_err(ApiError::from)
    });
    respond(result)
}

#[derive(Debug, Default, Deserialize)]
pub struct CertificateOwnerQuery {
    pub owner: Option<String>,
}

/// GET /keel/cert/v1/certificates/info
pub async fn get_certificate(
    State(state): State<ApiState>,
    query: Result<Query<CertificateOwnerQuery>, QueryRejection>,
) -> Response {
    let result = params(query).and_then(|params| {
        let owner = params.owner.unwrap_or_default();
        state.query.query_certificate(&owner).map_err(ApiError::from)
    });
    respond(result)
}

// ── Ledger ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct HeightResponse {
    pub height: u64,
}

/// GET /keel/ledger/v1/height
pub async fn get_height(State(state): State<ApiState>) -> Response {
    respond::<HeightResponse>(Ok(HeightResponse {
        height: state.ledger.current_height(),
    }))
}
