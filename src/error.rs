//! Gateway errors and their client-facing responses.
//!
//! Only failures of the gateway itself end up here. Upstream 4xx/5xx responses
//! are passed through verbatim and the redirect-budget sentinel is an ordinary
//! response, so neither is modelled as an error.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Header naming the error class on gateway-generated error responses.
pub const X_GATEWAY_ERROR: &str = "x-gateway-error";

/// Errors produced while proxying a request.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Network failure talking to the upstream.
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The upstream exchange did not finish in time.
    #[error("upstream did not answer within {0} seconds")]
    Timeout(u64),

    /// Inbound body larger than the configured limit.
    #[error("request body exceeds {0} bytes")]
    BodyTooLarge(usize),

    /// Malformed inbound request.
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Transport(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Transport(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Stable error code for the `x-gateway-error` header and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Transport(e) if e.is_timeout() => "UPSTREAM_TIMEOUT",
            GatewayError::Transport(_) => "UPSTREAM_UNREACHABLE",
            GatewayError::Timeout(_) => "UPSTREAM_TIMEOUT",
            GatewayError::BodyTooLarge(_) => "BODY_TOO_LARGE",
            GatewayError::BadRequest(_) => "BAD_REQUEST",
        }
    }

    /// Transport-class failures (network, timeout).
    pub fn is_transport(&self) -> bool {
        matches!(self, GatewayError::Transport(_) | GatewayError::Timeout(_))
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        // Detailed error is logged by the caller; clients get a generic message.
        let message = match &self {
            GatewayError::Transport(_) => "Upstream request failed".to_string(),
            other => other.to_string(),
        };
        let mut response = (self.status_code(), message).into_response();
        response
            .headers_mut()
            .insert(X_GATEWAY_ERROR, HeaderValue::from_static(self.code()));
        response
    }
}
