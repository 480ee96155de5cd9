//! Error types for the eSignature API

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use esign_core::CoreError;
use serde_json::json;
use thiserror::Error;

/// Step of request creation that failed after validation passed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Artifact,
    Persistence,
    Notification,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Artifact => "artifact",
            Stage::Persistence => "persistence",
            Stage::Notification => "notification",
        })
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Signature request not found: {0}")]
    RequestNotFound(String),

    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Invalid or expired signing link")]
    InvalidToken,

    #[error(transparent)]
    Validation(#[from] CoreError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Fields still need a value: {}", .0.join(", "))]
    IncompleteFields(Vec<String>),

    #[error("{0}")]
    Conflict(String),

    #[error("{stage} failed: {message}")]
    Stage { stage: Stage, message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn stage(stage: Stage, message: impl fmt::Display) -> Self {
        ApiError::Stage {
            stage,
            message: message.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::RequestNotFound(_) | ApiError::FieldNotFound(_) => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            ApiError::InvalidToken => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::IncompleteFields(_) | ApiError::Conflict(_) => {
                (StatusCode::CONFLICT, self.to_string())
            }
            ApiError::Stage { stage, message } => {
                tracing::error!(%stage, "Stage failed: {}", message);
                let status = match stage {
                    Stage::Artifact => StatusCode::UNPROCESSABLE_ENTITY,
                    Stage::Persistence | Stage::Notification => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, message.clone())
            }
            ApiError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                )
            }
        };

        let mut body = json!({
            "error": message,
            "status": status.as_u16(),
        });
        if let ApiError::Stage { stage, .. } = &self {
            body["stage"] = json!(stage.to_string());
        }
        if let ApiError::IncompleteFields(fields) = &self {
            body["fields"] = json!(fields);
        }

        (status, Json(body)).into_response()
    }
}
