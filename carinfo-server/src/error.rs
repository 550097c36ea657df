//! Error types for the HTTP API

use crate::api::MessageResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use carinfo_core::CarInfoError;
use thiserror::Error;
use tracing::error;

/// Message returned for every authorization denial, whatever the cause
pub const FORBIDDEN_MESSAGE: &str = "action prohibited by policy";

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed identifier or payload (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Policy denied the action, or no decision could be obtained (403)
    #[error("Forbidden")]
    Forbidden,

    /// Unknown car or missing status (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage or runtime failure (500)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Label used for the error metric
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "validation",
            ApiError::Forbidden => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl From<CarInfoError> for ApiError {
    fn from(err: CarInfoError) -> Self {
        match err {
            CarInfoError::InvalidIdentifier(_) | CarInfoError::Schema(_) => {
                ApiError::BadRequest(err.to_string())
            }
            CarInfoError::CarNotFound(_) | CarInfoError::StatusNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        crate::metrics::record_error(self.kind());

        let (status, msg) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, FORBIDDEN_MESSAGE.to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(detail) => {
                error!(error = %detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(MessageResponse::new(msg))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use carinfo_core::SchemaError;
    use std::path::PathBuf;

    async fn body_of(response: Response) -> MessageResponse {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_api_error_display() {
        let err = ApiError::BadRequest("invalid car ID 'car05'".to_string());
        assert_eq!(format!("{}", err), "Bad request: invalid car ID 'car05'");

        assert_eq!(format!("{}", ApiError::Forbidden), "Forbidden");

        let err = ApiError::NotFound("no such car with ID 'car3'".to_string());
        assert_eq!(format!("{}", err), "Not found: no such car with ID 'car3'");
    }

    #[test]
    fn test_from_core_errors() {
        let err: ApiError = CarInfoError::InvalidIdentifier("car05".into()).into();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err: ApiError = CarInfoError::Schema(SchemaError::new("year", "is required")).into();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m.contains("year")));

        let err: ApiError = CarInfoError::StatusNotFound("car1".into()).into();
        assert!(matches!(err, ApiError::NotFound(ref m) if m == "no status for car with ID 'car1'"));

        let err: ApiError = CarInfoError::Storage {
            path: PathBuf::from("/data.json"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        }
        .into();
        assert!(matches!(err, ApiError::Internal(_)));
    }

    #[tokio::test]
    async fn test_forbidden_response_is_fixed() {
        let response = ApiError::Forbidden.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_of(response).await.msg, FORBIDDEN_MESSAGE);
    }

    #[tokio::test]
    async fn test_not_found_response_names_id() {
        let response = ApiError::from(CarInfoError::CarNotFound("car9".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(response).await.msg, "no such car with ID 'car9'");
    }

    #[tokio::test]
    async fn test_internal_response_hides_detail() {
        let response = ApiError::Internal("Storage error at /secret/path".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body_of(response).await.msg.contains("/secret/path"));
    }

    #[tokio::test]
    async fn test_bad_request_response() {
        let response = ApiError::BadRequest("invalid car ID 'car05'".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_of(response).await.msg, "invalid car ID 'car05'");
    }
}
