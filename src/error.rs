//! Domain error taxonomy shared by every handler and access-control
//! operation. Each variant maps to exactly one HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::routes::ErrorResponse;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or semantically invalid input.
    #[error("{0}")]
    Validation(String),

    /// No usable bearer token on a request that requires one.
    #[error("authentication required")]
    Unauthenticated,

    /// Authenticated but not permitted to see or touch the target.
    #[error("not authorized")]
    NotAuthorized,

    /// Target entity missing, or a request already resolved.
    #[error("not found")]
    NotFound,

    /// Duplicate request, already-member, duplicate engagement, and the
    /// losing side of a double-resolve race.
    #[error("{0}")]
    Conflict(String),

    /// Connection pool has not been initialized.
    #[error("database not available")]
    Unavailable,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::NotAuthorized => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Validation(msg) => ErrorResponse {
                error: "Invalid request".to_string(),
                message: Some(msg.clone()),
            },
            ApiError::Unauthenticated => ErrorResponse {
                error: "Authorization required".to_string(),
                message: None,
            },
            ApiError::NotAuthorized => ErrorResponse {
                error: "Not authorized".to_string(),
                message: None,
            },
            ApiError::NotFound => ErrorResponse {
                error: "Not found".to_string(),
                message: None,
            },
            ApiError::Conflict(msg) => ErrorResponse {
                error: "Conflict".to_string(),
                message: Some(msg.clone()),
            },
            ApiError::Unavailable => ErrorResponse {
                error: "Database not available".to_string(),
                message: None,
            },
            ApiError::Database(e) => {
                tracing::error!("database error: {}", e);
                ErrorResponse {
                    error: "Database error".to_string(),
                    message: None,
                }
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping_covers_taxonomy() {
        assert_eq!(
            ApiError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::NotAuthorized.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Unavailable.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::Database(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_conflict_carries_detail_message() {
        let response = ApiError::Conflict("already a member of this blog".into());
        assert_eq!(
            response.to_string(),
            "already a member of this blog"
        );
    }
}
