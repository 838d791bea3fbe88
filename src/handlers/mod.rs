pub mod quote;
pub mod swap;
pub mod transfer;

use crate::swap::SwapError;

use axum::{
    extract::Json,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
};
use log::{error, warn};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Serialize)]
#[serde(untagged)]
pub enum ApiResponse<T> {
    T(T),
    Error(ErrorResponse),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    error: String,
    kind: &'static str,
    /// False once a transaction may have reached the chain
    retry_safe: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
}

pub type HandlerResponse<T> = (StatusCode, Json<ApiResponse<T>>);

pub fn status_for(e: &SwapError) -> StatusCode {
    match e {
        SwapError::AuthInvalid(_) => StatusCode::UNAUTHORIZED,
        SwapError::NoDelegatedWallet(_) => StatusCode::FORBIDDEN,
        SwapError::InvalidAmount(_)
        | SwapError::InvalidQuote(_)
        | SwapError::NoRoute(_)
        | SwapError::MalformedSwapPayload(_) => StatusCode::BAD_REQUEST,
        SwapError::OnChainFailure { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        SwapError::Upstream(_) | SwapError::SigningRejected(_) => StatusCode::BAD_GATEWAY,
        SwapError::ConfirmationTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
    }
}

pub fn error_response<T>(context: &str, e: SwapError) -> HandlerResponse<T> {
    let status = status_for(&e);
    if status.is_server_error() || status == StatusCode::UNPROCESSABLE_ENTITY {
        error!("{} error: {}", context, e);
    } else {
        warn!("{} rejected: {}", context, e);
    }
    (
        status,
        Json(ApiResponse::Error(ErrorResponse {
            error: e.to_string(),
            kind: e.kind(),
            retry_safe: e.retry_safe(),
            signature: e.signature().map(|s| s.to_string()),
        })),
    )
}

pub fn bad_request<T>(error: String) -> HandlerResponse<T> {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::Error(ErrorResponse {
            error,
            kind: "bad_request",
            retry_safe: true,
            signature: None,
        })),
    )
}

pub fn missing_token<T>() -> HandlerResponse<T> {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiResponse::Error(ErrorResponse {
            error: "No authorization token provided".to_string(),
            kind: "auth_invalid",
            retry_safe: true,
            signature: None,
        })),
    )
}

/// The token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
