use axum::{http::StatusCode, response::IntoResponse, Json};

use crate::helpdesk::forms::FieldError;
use crate::helpdesk::HelpdeskError;

#[derive(Debug, thiserror::Error)]
pub enum TicketsError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid form values")]
    InvalidFields(Vec<FieldError>),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<diesel::result::Error> for TicketsError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::NotFound => Self::NotFound("record not found".to_string()),
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                info,
            ) => Self::Conflict(info.message().to_string()),
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for TicketsError {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<tokio::task::JoinError> for TicketsError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<HelpdeskError> for TicketsError {
    fn from(e: HelpdeskError) -> Self {
        match e {
            HelpdeskError::NotFound(m) => Self::NotFound(m),
            HelpdeskError::Validation(m) => Self::Validation(m),
            HelpdeskError::InvalidFields(f) => Self::InvalidFields(f),
            HelpdeskError::Conflict(m) => Self::Conflict(m),
            HelpdeskError::Database(m) => Self::Database(m),
            HelpdeskError::Internal(m) => Self::Internal(m),
        }
    }
}

impl IntoResponse for TicketsError {
    fn into_response(self) -> axum::response::Response {
        if let Self::InvalidFields(fields) = &self {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": self.to_string(), "fields": fields })),
            )
                .into_response();
        }
        let (status, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::Database(msg) | Self::Internal(msg) => {
                log::error!("ticket request failed: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            Self::InvalidFields(_) => (StatusCode::BAD_REQUEST, self.to_string()),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
