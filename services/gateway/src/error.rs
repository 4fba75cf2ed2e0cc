use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Central error type for the gateway
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// CONNECT rejected: missing, malformed or undecodable credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// SUBSCRIBE rejected for the bound principal.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Malformed client frame.
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl GatewayError {
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Authentication(_) => "UNAUTHORIZED",
            GatewayError::AccessDenied(_) => "FORBIDDEN",
            GatewayError::Protocol(_) => "BAD_REQUEST",
            GatewayError::Configuration(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match self {
            GatewayError::Authentication(_) => StatusCode::UNAUTHORIZED,
            GatewayError::AccessDenied(_) => StatusCode::FORBIDDEN,
            GatewayError::Protocol(_) => StatusCode::BAD_REQUEST,
            GatewayError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string()
        }));

        (status, body).into_response()
    }
}

/// A single publish that could not be handed to the transport.
///
/// Caught at the broadcast boundary and logged; never surfaced to the feed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransientBroadcastError {
    #[error("failed to encode payload for {destination}: {reason}")]
    Encode { destination: String, reason: String },

    #[error("transport rejected publish to {destination}: {reason}")]
    Transport { destination: String, reason: String },
}
