//! Error taxonomy for the proxy.
//!
//! Upstream failures map onto the statuses the frontend contract promises:
//! 502 when Elexon answered with an error status, 503 when it could not be
//! reached at all, 404 when a derived dataset came back empty.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ProxyError {
    /// Upstream answered with a non-success HTTP status.
    #[error("upstream returned HTTP {status}")]
    UpstreamStatus { status: u16 },

    /// The upstream request could not complete (connect, timeout, bad body).
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// Upstream succeeded but the requested window holds no usable records.
    #[error("no data available")]
    NoData,

    /// Anything that should never happen in normal operation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ProxyError::UpstreamStatus { status } => (
                StatusCode::BAD_GATEWAY,
                json!({ "error": self.to_string(), "status": status }),
            ),
            ProxyError::Unavailable(detail) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": "Upstream unavailable", "detail": detail }),
            ),
            ProxyError::NoData => (
                StatusCode::NOT_FOUND,
                json!({ "error": "No data available" }),
            ),
            ProxyError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal server error", "detail": detail }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
