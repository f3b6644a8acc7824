use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;

/// One field-level validation failure.
#[derive(Debug, Clone, Serialize)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: String,
}

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] to produce consistent JSON error
/// responses: validation problems map to 422, a not-yet-loaded model
/// to 503, and generation failures to 500.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// One or more request fields violated the schema.
    #[error("invalid request parameters")]
    Validation(Vec<FieldViolation>),

    /// Generation requested before startup finished loading the model.
    #[error("model not loaded yet, please retry later")]
    NotReady,

    /// The generation/encoding pipeline failed; fatal to the request.
    #[error("video generation failed: {0}")]
    Generation(#[source] anyhow::Error),
}

/// Convenience type alias for handler return values.
pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, body) = match &self {
            ApiError::Validation(violations) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
                json!({
                    "error": self.to_string(),
                    "code": "VALIDATION_ERROR",
                    "details": violations,
                }),
            ),
            ApiError::NotReady => (
                StatusCode::SERVICE_UNAVAILABLE,
                "NOT_READY",
                json!({
                    "error": self.to_string(),
                    "code": "NOT_READY",
                }),
            ),
            ApiError::Generation(source) => {
                tracing::error!(error = ?source, "generation pipeline failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "GENERATION_FAILED",
                    json!({
                        "error": self.to_string(),
                        "code": "GENERATION_FAILED",
                    }),
                )
            }
        };
        tracing::debug!(code, status = %status, "request rejected");
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn validation_maps_to_422() {
        let err = ApiError::Validation(vec![FieldViolation {
            field: "height",
            message: "must be between 256 and 1024".to_string(),
        }]);
        assert_eq!(
            err.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn not_ready_maps_to_503() {
        assert_eq!(
            ApiError::NotReady.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn generation_failure_maps_to_500() {
        let err = ApiError::Generation(anyhow::anyhow!("sampling blew up"));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
