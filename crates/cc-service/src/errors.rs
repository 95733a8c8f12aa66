use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Service-wide error taxonomy.
///
/// `NotFound` and `Gone` are deliberately distinct: a `Gone` resource
/// existed and expired, and callers (tag renderers, scan clients) react
/// differently to the two.
#[derive(Debug, Error)]
pub enum CcError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Gone: {0}")]
    Gone(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid ticket")]
    InvalidTicket,

    #[error("Ticket expired")]
    TicketExpired,

    #[error("Ticket purpose mismatch")]
    PurposeMismatch,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for CcError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            CcError::NotFound(what) => (StatusCode::NOT_FOUND, "NOT_FOUND", what.clone()),
            CcError::Gone(what) => (StatusCode::GONE, "GONE", what.clone()),
            CcError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            CcError::InvalidTicket => (
                StatusCode::UNAUTHORIZED,
                "INVALID_TICKET",
                "Ticket is not recognized".to_string(),
            ),
            CcError::TicketExpired => (
                StatusCode::UNAUTHORIZED,
                "TICKET_EXPIRED",
                "Ticket has expired".to_string(),
            ),
            CcError::PurposeMismatch => (
                StatusCode::FORBIDDEN,
                "PURPOSE_MISMATCH",
                "Ticket was issued for a different purpose".to_string(),
            ),
            CcError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            CcError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(error_response)).into_response()
    }
}
