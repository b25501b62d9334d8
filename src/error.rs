use actix_web::{
    error::JsonPayloadError,
    http::StatusCode,
    HttpRequest, HttpResponse, ResponseError,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::StoreError;
use crate::services::itinerary_generation_service::GenerationError;
use crate::services::llm_gateway::GatewayError;

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("Database error")]
    Store(#[from] StoreError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Generation(err) => match err {
                GenerationError::TripNotFound => StatusCode::NOT_FOUND,
                GenerationError::InProgress => StatusCode::CONFLICT,
                GenerationError::Gateway(GatewayError::RateLimited) => StatusCode::TOO_MANY_REQUESTS,
                GenerationError::Gateway(GatewayError::UsageLimit) => StatusCode::PAYMENT_REQUIRED,
                GenerationError::Gateway(_)
                | GenerationError::InvalidResponse(_)
                | GenerationError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            match self {
                ApiError::Store(err) => log::error!("Database error: {}", err),
                other => log::error!("{}", other),
            }
        }
        HttpResponse::build(status).json(ErrorBody {
            error: self.to_string(),
        })
    }
}

/// Keeps malformed JSON bodies in the `{error}` shape.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::BadRequest(format!("Invalid request body: {}", err)).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::response_parser::ResponseFormatError;

    #[test]
    fn test_upstream_limits_keep_their_status() {
        let rate_limited = ApiError::from(GenerationError::from(GatewayError::RateLimited));
        assert_eq!(rate_limited.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(rate_limited.to_string(), "Rate limited. Please try again in a moment.");

        let usage = ApiError::from(GenerationError::from(GatewayError::UsageLimit));
        assert_eq!(usage.status_code(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(usage.to_string(), "AI usage limit reached. Please add credits.");
    }

    #[test]
    fn test_other_failures_are_internal() {
        let upstream = ApiError::from(GenerationError::from(GatewayError::Upstream {
            status: 503,
            body: "unavailable".to_string(),
        }));
        assert_eq!(upstream.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(upstream.to_string(), "AI gateway error");

        let invalid = ApiError::from(GenerationError::from(ResponseFormatError::Schema(Vec::new())));
        assert_eq!(invalid.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(invalid.to_string().starts_with("Invalid AI response format"));
    }

    #[test]
    fn test_guard_errors() {
        assert_eq!(
            ApiError::from(GenerationError::InProgress).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(GenerationError::TripNotFound).status_code(),
            StatusCode::NOT_FOUND
        );
    }
}
