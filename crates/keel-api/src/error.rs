//! Response envelope and error-to-status mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use keel_cert::CertError;
use keel_ledger::{LedgerError, TransitionError};
use keel_query::QueryError;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

pub fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

/// A failed request: the status to answer with and the message to carry.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "request failed");
        }
        error_response(&self.message, self.status).into_response()
    }
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        let status = match &e {
            QueryError::InvalidFilter(_) => StatusCode::BAD_REQUEST,
            QueryError::NotFound(_) => StatusCode::NOT_FOUND,
            QueryError::StaleCursor(_) => StatusCode::GONE,
            QueryError::State(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

fn cert_status(e: &CertError) -> StatusCode {
    match e {
        CertError::AlreadyExists { .. } | CertError::InvalidTransition { .. } => StatusCode::CONFLICT,
        CertError::NotGenerated(_) => StatusCode::NOT_FOUND,
        CertError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        CertError::Config(_) | CertError::Generation(_) | CertError::State(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn transition_status(e: &TransitionError) -> StatusCode {
    match e {
        TransitionError::InvalidMessage(_) => StatusCode::BAD_REQUEST,
        TransitionError::Unauthorized(_) => StatusCode::FORBIDDEN,
        TransitionError::NotFound(_) => StatusCode::NOT_FOUND,
        TransitionError::DuplicateKey(_) | TransitionError::InvalidTransition(_) => {
            StatusCode::CONFLICT
        }
        TransitionError::Certificate(inner) => cert_status(inner),
        TransitionError::State(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        let status = match &e {
            LedgerError::Rejected(inner) => transition_status(inner),
            LedgerError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            LedgerError::Closed => StatusCode::SERVICE_UNAVAILABLE,
            LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}
