use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::remote::RemoteError;
use crate::social::SocialError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Conflict: {0}")]
    Conflict(String),

    /// An optimistic update was reverted. `restored` is the view to render again.
    #[error("Rolled back: {message}")]
    RolledBack {
        message: String,
        retryable: bool,
        restored: Option<Value>,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Remote skill service error: {0}")]
    Remote(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<SocialError> for AppError {
    fn from(err: SocialError) -> Self {
        match err {
            SocialError::NotFound(msg) => AppError::NotFound(msg),
            SocialError::Validation(msg) => AppError::Validation(msg),
            SocialError::Storage(e) => AppError::Storage(e.to_string()),
            e @ SocialError::Conflict { .. } => AppError::Conflict(e.to_string()),
            SocialError::Serialization(e) => AppError::Internal(e.into()),
            SocialError::Remote(RemoteError::Unauthorized) => AppError::Unauthorized,
            SocialError::Remote(e) => AppError::Remote(e.to_string()),
            SocialError::RolledBack { cause, restored } => AppError::RolledBack {
                retryable: cause.is_retryable(),
                message: cause.to_string(),
                restored,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::RolledBack { message, .. } => {
                tracing::warn!("Update rolled back: {message}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "ROLLED_BACK",
                    "The update could not be saved and was reverted".to_string(),
                )
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORAGE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Remote(msg) => {
                tracing::error!("Remote skill service error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "REMOTE_ERROR",
                    "The skill service is unavailable".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let AppError::RolledBack {
            retryable,
            restored,
            ..
        } = self
        {
            error["retryable"] = json!(retryable);
            error["restored"] = restored.unwrap_or(Value::Null);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    #[test]
    fn test_social_errors_map_to_status_codes() {
        let cases = [
            (SocialError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (SocialError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (
                SocialError::Conflict {
                    key: "shared_skills".into(),
                    expected: 1,
                    found: 2,
                },
                StatusCode::CONFLICT,
            ),
            (
                SocialError::Storage(StorageError::Unavailable("down".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                SocialError::Remote(RemoteError::Unauthorized),
                StatusCode::UNAUTHORIZED,
            ),
            (
                SocialError::Remote(RemoteError::Disabled),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_rolled_back_keeps_cause_and_restored_view() {
        let err = AppError::from(SocialError::RolledBack {
            cause: Box::new(SocialError::Storage(StorageError::Unavailable("down".into()))),
            restored: Some(json!({"liked": false, "likes_count": 5})),
        });

        match &err {
            AppError::RolledBack {
                retryable,
                restored,
                message,
            } => {
                assert!(*retryable);
                assert_eq!(restored.as_ref().unwrap()["likes_count"], 5);
                assert!(message.contains("down"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
