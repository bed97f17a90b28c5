use axum::extract::multipart::{ MultipartError, MultipartRejection };
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{ IntoResponse, Response };
use axum::Json;
use log::error;
use serde::Serialize;
use thiserror::Error;

pub const UPSTREAM_APOLOGY: &str =
    "Sorry, something went wrong reaching our assistant. Please try again shortly.";

/// Failures talking to an upstream provider.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{0} credential is not configured")]
    MissingCredential(&'static str),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Upstream {
        status: u16,
        body: String,
    },

    #[error("malformed upstream response: {0}")]
    Malformed(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RelayError {
    /// Turns a non-2xx reqwest response into `RelayError::Upstream`, passing 2xx through.
    pub async fn check(resp: reqwest::Response) -> Result<reqwest::Response, RelayError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(RelayError::Upstream { status: status.as_u16(), body })
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: &'static str,
    pub message: String,
}

/// Errors surfaced at the handler boundary.
#[derive(Debug)]
pub enum ApiError {
    /// 400, missing or invalid input.
    BadRequest(String),
    NotFound(String),
    PayloadTooLarge(String),
    TooManyRequests,
    /// 502, provider failed. The detail is logged, the caller gets an apology.
    Upstream(String),
    /// 503, credential for this route is not configured.
    ServiceUnavailable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::PayloadTooLarge(msg) =>
                (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", msg),
            ApiError::TooManyRequests =>
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "rate_limited",
                    "Too many requests, slow down.".to_string(),
                ),
            ApiError::Upstream(detail) => {
                error!("Upstream failure: {}", detail);
                (StatusCode::BAD_GATEWAY, "upstream_error", UPSTREAM_APOLOGY.to_string())
            }
            ApiError::ServiceUnavailable(msg) =>
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg),
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        };

        (status, Json(ErrorBody { ok: false, error: code, message })).into_response()
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::MissingCredential(provider) =>
                ApiError::ServiceUnavailable(
                    format!("The {} integration is not configured on this server.", provider)
                ),
            RelayError::InvalidConfig(msg) => ApiError::Internal(msg),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

/// Extractor rejections keep their message but take the JSON error shape.
fn rejected(status: StatusCode, text: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(text)
    } else {
        ApiError::BadRequest(text)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        rejected(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        rejected(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        rejected(err.status(), err.body_text())
    }
}
