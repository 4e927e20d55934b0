//! Mutation handlers.
//!
//! Each handler turns its JSON body into a ledger [`Transition`], submits
//! it, and answers with the finalized [`Receipt`]. Owner strings in bodies
//! are resolved here; an unresolvable one is an invalid message.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use keel_core::{DeploymentId, GroupId, GroupSpec, Owner};
use keel_ledger::{Receipt, Transition};

use crate::ApiState;
use crate::error::{ApiError, ApiResponse};

fn owner(field: &str, raw: &str) -> Result<Owner, ApiError> {
    Owner::parse(raw).map_err(|e| ApiError::bad_request(format!("invalid message: {field}: {e}")))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::bad_request(format!("invalid message: {}", e.body_text())))
}

async fn submit(state: &ApiState, transition: Result<Transition, ApiError>, created: bool) -> Response {
    let result = match transition {
        Ok(transition) => state.ledger.submit(transition).await.map_err(ApiError::from),
        Err(e) => Err(e),
    };
    match result {
        Ok(receipt) if created => (StatusCode::CREATED, ApiResponse::ok(receipt)).into_response(),
        Ok(receipt) => ApiResponse::<Receipt>::ok(receipt).into_response(),
        Err(e) => e.into_response(),
    }
}

// ── Certificates ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateRequest {
    pub owner: String,
    /// Replace a generated or published certificate.
    #[serde(default)]
    pub overwrite: bool,
}

/// POST /keel/cert/v1/certificates/generate
pub async fn generate_certificate(
    State(state): State<ApiState>,
    payload: Result<Json<CertificateRequest>, JsonRejection>,
) -> Response {
    let transition = body(payload).and_then(|req| {
        Ok(Transition::GenerateCertificate {
            owner: owner("owner", &req.owner)?,
            overwrite: req.overwrite,
        })
    });
    submit(&state, transition, true).await
}

/// POST /keel/cert/v1/certificates/publish
pub async fn publish_certificate(
    State(state): State<ApiState>,
    payload: Result<Json<CertificateRequest>, JsonRejection>,
) -> Response {
    let transition = body(payload).and_then(|req| {
        Ok(Transition::PublishCertificate {
            owner: owner("owner", &req.owner)?,
        })
    });
    submit(&state, transition, false).await
}

/// POST /keel/cert/v1/certificates/revoke
pub async fn revoke_certificate(
    State(state): State<ApiState>,
    payload: Result<Json<CertificateRequest>, JsonRejection>,
) -> Response {
    let transition = body(payload).and_then(|req| {
        Ok(Transition::RevokeCertificate {
            owner: owner("owner", &req.owner)?,
        })
    });
    submit(&state, transition, false).await
}

// ── Deployments ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentIdBody {
    pub owner: String,
    pub dseq: u64,
}

impl DeploymentIdBody {
    fn resolve(&self) -> Result<DeploymentId, ApiError> {
        if self.dseq == 0 {
            return Err(ApiError::bad_request("invalid message: id.dseq must be positive"));
        }
        Ok(DeploymentId::new(owner("id.owner", &self.owner)?, self.dseq))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupIdBody {
    pub owner: String,
    pub dseq: u64,
    pub gseq: u32,
}

impl GroupIdBody {
    fn resolve(&self) -> Result<GroupId, ApiError> {
        if self.gseq == 0 {
            return Err(ApiError::bad_request("invalid message: id.gseq must be positive"));
        }
        let deployment = DeploymentIdBody {
            owner: self.owner.clone(),
            dseq: self.dseq,
        }
        .resolve()?;
        Ok(deployment.group(self.gseq))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDeploymentRequest {
    pub signer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dseq: Option<u64>,
    pub groups: Vec<GroupSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateDeploymentRequest {
    pub signer: String,
    pub id: DeploymentIdBody,
    pub groups: Vec<GroupSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseDeploymentRequest {
    pub signer: String,
    pub id: DeploymentIdBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRequest {
    pub signer: String,
    pub id: GroupIdBody,
}

/// POST /keel/deployment/v1/deployments/create
pub async fn create_deployment(
    State(state): State<ApiState>,
    payload: Result<Json<CreateDeploymentRequest>, JsonRejection>,
) -> Response {
    let transition = body(payload).and_then(|req| {
        Ok(Transition::CreateDeployment {
            signer: owner("signer", &req.signer)?,
            dseq: req.dseq,
            groups: req.groups,
        })
    });
    submit(&state, transition, true).await
}

/// POST /keel/deployment/v1/deployments/update
pub async fn update_deployment(
    State(state): State<ApiState>,
    payload: Result<Json<UpdateDeploymentRequest>, JsonRejection>,
) -> Response {
    let transition = body(payload).and_then(|req| {
        Ok(Transition::UpdateDeployment {
            signer: owner("signer", &req.signer)?,
            id: req.id.resolve()?,
            groups: req.groups,
        })
    });
    submit(&state, transition, false).await
}

/// POST /keel/deployment/v1/deployments/close
pub async fn close_deployment(
    State(state): State<ApiState>,
    payload: Result<Json<CloseDeploymentRequest>, JsonRejection>,
) -> Response {
    let transition = body(payload).and_then(|req| {
        Ok(Transition::CloseDeployment {
            signer: owner("signer", &req.signer)?,
            id: req.id.resolve()?,
        })
    });
    submit(&state, transition, false).await
}

// ── Groups ─────────────────────────────────────────────────────

fn group_transition(
    payload: Result<Json<GroupRequest>, JsonRejection>,
    build: fn(Owner, GroupId) -> Transition,
) -> Result<Transition, ApiError> {
    let req = body(payload)?;
    Ok(build(owner("signer", &req.signer)?, req.id.resolve()?))
}

/// POST /keel/deployment/v1/groups/close
pub async fn close_group(
    State(state): State<ApiState>,
    payload: Result<Json<GroupRequest>, JsonRejection>,
) -> Response {
    let transition = group_transition(payload, |signer, id| Transition::CloseGroup { signer, id });
    submit(&state, transition, false).await
}

/// POST /keel/deployment/v1/groups/pause
pub async fn pause_group(
    State(state): State<ApiState>,
    payload: Result<Json<GroupRequest>, JsonRejection>,
) -> Response {
    let transition = group_transition(payload, |signer, id| Transition::PauseGroup { signer, id });
    submit(&state, transition, false).await
}

/// POST /keel/deployment/v1/groups/start
pub async fn start_group(
    State(state): State<ApiState>,
    payload: Result<Json<GroupRequest>, JsonRejection>,
) -> Response {
    let transition = group_transition(payload, |signer, id| Transition::StartGroup { signer, id });
    submit(&state, transition, false).await
}
