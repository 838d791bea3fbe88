use crate::handlers::{bad_request, bearer_token, error_response, missing_token, ApiResponse, HandlerResponse};
use crate::swap::{SwapService, TransferResult};

use std::str::FromStr;

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::{HeaderMap, StatusCode},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferBody {
    pub user_address: String,
    pub recipient_address: String,
    /// In SOL
    pub amount: Decimal,
}

pub async fn transfer(
    State(service): State<SwapService>,
    headers: HeaderMap,
    body: Result<Json<TransferBody>, JsonRejection>,
) -> HandlerResponse<TransferResult> {
    let Some(token) = bearer_token(&headers) else {
        return missing_token();
    };
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    let (Ok(from), Ok(to)) = (
        Pubkey::from_str(&body.user_address),
        Pubkey::from_str(&body.recipient_address),
    ) else {
        return bad_request("Invalid userAddress or recipientAddress".to_string());
    };

    match service.transfer(token, &from, &to, body.amount).await {
        Ok(transfer) => (StatusCode::OK, Json(ApiResponse::T(transfer))),
        Err(e) => error_response("transfer", e),
    }
}
