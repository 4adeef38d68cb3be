//! HTTP error responses
//!
//! Every error body has the shape `{"error": {"code": ..., "message": ...}}`.

use crate::completion::ProviderError;
use crate::errors::FanoutError;
use crate::messaging::BrokerError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Upstream provider failed: {message}")]
    BadGateway { message: String },

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    fn parts(&self) -> (StatusCode, &'static str, &str) {
        match self {
            Self::NotFound { message } => (StatusCode::NOT_FOUND, "NOT_FOUND", message),
            Self::BadRequest { message } => (StatusCode::BAD_REQUEST, "BAD_REQUEST", message),
            Self::BadGateway { message } => (StatusCode::BAD_GATEWAY, "BAD_GATEWAY", message),
            Self::ServiceUnavailable { message } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                message,
            ),
            Self::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                message,
            ),
        }
    }
}

impl From<FanoutError> for ApiError {
    fn from(err: FanoutError) -> Self {
        let message = err.to_string();
        match err {
            FanoutError::Validation(_) => Self::BadRequest { message },
            FanoutError::Provider(provider_error) => match provider_error {
                ProviderError::InvalidRequest(_) | ProviderError::UnknownProvider(_) => {
                    Self::BadRequest { message }
                }
                ProviderError::NoProviderConfigured => Self::ServiceUnavailable { message },
                _ => Self::BadGateway { message },
            },
            FanoutError::Broker(BrokerError::NotRunning { .. }) => {
                Self::ServiceUnavailable { message }
            }
            FanoutError::Broker(_)
            | FanoutError::Cache(_)
            | FanoutError::Configuration(_)
            | FanoutError::Internal(_) => Self::Internal { message },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_code, message) = self.parts();
        if status_code.is_server_error() {
            error!(status = %status_code, error = %message, "Request failed");
        }

        let body = json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });
        (status_code, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                FanoutError::Validation("bad".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                FanoutError::Provider(ProviderError::UnknownProvider("gemini".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                FanoutError::Provider(ProviderError::Upstream {
                    status: 500,
                    body: "oops".into(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (
                FanoutError::Provider(ProviderError::NoProviderConfigured),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                FanoutError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let api_error = ApiError::from(err);
            assert_eq!(api_error.parts().0, expected, "{api_error}");
        }
    }
}
