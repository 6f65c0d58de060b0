//! API error handling module
//!
//! Single place where pipeline outcomes become HTTP statuses. Full details
//! are logged; clients get a sanitized message and a stable `code`.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use labelscout_core::{PipelineError, PipelineFailure};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Error body returned by every endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable, sanitized message
    #[schema(example = "product URL is not reachable (status: 404)")]
    pub error: String,
    /// Stable machine-readable code
    #[schema(example = "UPSTREAM_UNREACHABLE")]
    pub code: &'static str,
    /// Pipeline stage the run stopped in
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "validate_url")]
    pub stage: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "0012345678905")]
    pub upc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
    /// Status returned by the failing upstream service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
    /// Body returned by the failing upstream service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_body: Option<String>,
}

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Not found - requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server error - unexpected server-side failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Service unavailable - a backing service could not be reached
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// A pipeline run stopped before producing a score
    #[error(transparent)]
    Pipeline(#[from] PipelineFailure),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Pipeline(failure) => match failure.error {
                PipelineError::InputInvalid(_) => StatusCode::BAD_REQUEST,
                PipelineError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
                PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
                PipelineError::UpstreamUnreachable { .. } => StatusCode::FAILED_DEPENDENCY,
                PipelineError::UpstreamError { .. } => StatusCode::BAD_GATEWAY,
                PipelineError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
                PipelineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get the error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Pipeline(failure) => failure.error.code(),
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ServiceUnavailable(_) => true,
            Self::Pipeline(failure) => failure.error.is_transient(),
            _ => false,
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "Internal server error".to_string(),
            Self::ServiceUnavailable(_) => "Storage backend unavailable".to_string(),
            Self::Pipeline(failure) => match &failure.error {
                PipelineError::Internal(_) => "Internal server error".to_string(),
                PipelineError::UpstreamError { service, .. } => {
                    format!("Upstream service error ({service})")
                }
                PipelineError::RateLimited { .. } => {
                    "Rate limit exceeded. Try again shortly.".to_string()
                }
                other => other.to_string(),
            },
            _ => self.to_string(),
        }
    }

    fn body(&self) -> ErrorResponse {
        let mut body = ErrorResponse {
            error: self.client_message(),
            code: self.error_code(),
            stage: None,
            upc: None,
            product_url: None,
            upstream_status: None,
            upstream_body: None,
        };

        if let Self::Pipeline(failure) = self {
            body.stage = Some(failure.stage.as_str());
            body.upc = failure.upc.clone();
            body.product_url = failure.product_url.clone();
            match &failure.error {
                PipelineError::UpstreamError { status, body: upstream, .. } => {
                    body.upstream_status = *status;
                    body.upstream_body = Some(upstream.clone());
                }
                PipelineError::UpstreamUnreachable { status, .. } => {
                    body.upstream_status = *status;
                }
                _ => {}
            }
        }
        body
    }

    /// Seconds to advertise in `Retry-After`, rounded up.
    fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::Pipeline(PipelineFailure {
                error: PipelineError::RateLimited { retry_after },
                ..
            }) => {
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                Some(secs.max(1))
            }
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let internal_message = self.to_string();
        let transient = self.is_transient();

        // Log based on severity, always including internal details.
        // The request span supplies the request id.
        if status.is_server_error() {
            tracing::error!(
                status = %status,
                code = code,
                transient,
                error = %internal_message,
                "Server error"
            );
        } else {
            tracing::warn!(
                status = %status,
                code = code,
                transient,
                error = %internal_message,
                "Client error"
            );
        }

        let retry_after = self.retry_after_secs();
        let mut response = (status, Json(self.body())).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use labelscout_core::Stage;

    use super::*;

    fn failure(error: PipelineError) -> ApiError {
        ApiError::Pipeline(PipelineFailure {
            stage: Stage::Extract,
            error,
            upc: Some("0012345678905".into()),
            product_url: Some("https://acme.com/whey".into()),
        })
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (PipelineError::InputInvalid("x".into()), StatusCode::BAD_REQUEST),
            (
                PipelineError::RateLimited {
                    retry_after: Duration::from_secs(3),
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (PipelineError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                PipelineError::UpstreamUnreachable {
                    reason: "x".into(),
                    status: Some(404),
                },
                StatusCode::FAILED_DEPENDENCY,
            ),
            (PipelineError::UpstreamTimeout("x".into()), StatusCode::GATEWAY_TIMEOUT),
            (
                PipelineError::UpstreamError {
                    service: "scraper",
                    status: Some(500),
                    body: "x".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (PipelineError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in &cases {
            assert_eq!(failure(error.clone()).status_code(), *status);
        }

        // Every taxonomy entry gets its own status
        let distinct: std::collections::HashSet<_> = cases.iter().map(|(_, s)| *s).collect();
        assert_eq!(distinct.len(), cases.len());
    }

    #[test]
    fn test_transient_classification() {
        assert!(failure(PipelineError::UpstreamTimeout("x".into())).is_transient());
        assert!(ApiError::service_unavailable("db down").is_transient());
        assert!(!failure(PipelineError::InputInvalid("x".into())).is_transient());
        assert!(!ApiError::not_found("x").is_transient());
    }

    #[test]
    fn test_upstream_error_body_echoes_status_and_body() {
        let err = failure(PipelineError::UpstreamError {
            service: "scraper",
            status: Some(402),
            body: "payment required".into(),
        });
        let body = err.body();
        assert_eq!(body.code, "UPSTREAM_ERROR");
        assert_eq!(body.stage, Some("extract"));
        assert_eq!(body.upstream_status, Some(402));
        assert_eq!(body.upstream_body.as_deref(), Some("payment required"));
        assert_eq!(body.product_url.as_deref(), Some("https://acme.com/whey"));
    }

    #[test]
    fn test_internal_message_is_sanitized() {
        let err = failure(PipelineError::Internal("task panicked at src/x.rs:12".into()));
        assert_eq!(err.body().error, "Internal server error");

        let err = ApiError::internal("connection string postgres://secret");
        assert_eq!(err.body().error, "Internal server error");
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let err = failure(PipelineError::RateLimited {
            retry_after: Duration::from_millis(1500),
        });
        assert_eq!(err.retry_after_secs(), Some(2));

        let err = failure(PipelineError::RateLimited {
            retry_after: Duration::ZERO,
        });
        assert_eq!(err.retry_after_secs(), Some(1));
    }
}
