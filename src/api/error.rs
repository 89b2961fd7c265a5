//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::core_state::CoreError;
use crate::protocol::{ProtocolError, Rejection};

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Acting user required")]
    ActorRequired,
    #[error("Instructor PIN required")]
    InstructorRequired,
    #[error("Instructor controls disabled")]
    InstructorDisabled,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Administration rejected: {}", .0.code)]
    Rejected(Rejection),
    #[error("{message}")]
    Protocol {
        status: StatusCode,
        code: &'static str,
        message: String,
    },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match self {
            ApiError::ActorRequired => (
                StatusCode::UNAUTHORIZED,
                "ACTOR_REQUIRED",
                "X-Acting-User header missing or invalid".to_string(),
                None,
            ),
            ApiError::InstructorRequired => (
                StatusCode::FORBIDDEN,
                "INSTRUCTOR_REQUIRED",
                "Instructor PIN missing or incorrect".to_string(),
                None,
            ),
            ApiError::InstructorDisabled => (
                StatusCode::FORBIDDEN,
                "INSTRUCTOR_DISABLED",
                "Instructor controls are not configured".to_string(),
                None,
            ),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail, None),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail, None),
            ApiError::Rejected(rejection) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                rejection.code.as_str(),
                rejection.message,
                serde_json::to_value(&rejection.details).ok(),
            ),
            ApiError::Protocol {
                status,
                code,
                message,
            } => (status, code, message, None),
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::LockPoisoned => ApiError::Internal("lock poisoned".into()),
            CoreError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<ProtocolError> for ApiError {
    fn from(err: ProtocolError) -> Self {
        let status = match &err {
            ProtocolError::Database(e) => return ApiError::Internal(e.to_string()),
            ProtocolError::PrescriptionNotFound(_)
            | ProtocolError::MedicineNotFound(_)
            | ProtocolError::FollowMedicineNotFound(_)
            | ProtocolError::LinkNotFound(_)
            | ProtocolError::AdministrationNotFound(_) => StatusCode::NOT_FOUND,
            ProtocolError::PatientMismatch | ProtocolError::MedicineMismatch => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ProtocolError::DuplicateInstance | ProtocolError::LinkInUse { .. } => StatusCode::CONFLICT,
            ProtocolError::InvalidLink(_)
            | ProtocolError::InvalidPrescription(_)
            | ProtocolError::InvalidMedicine(_) => StatusCode::BAD_REQUEST,
        };
        ApiError::Protocol {
            status,
            code: err.code(),
            message: err.to_string(),
        }
    }
}
