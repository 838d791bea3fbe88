use crate::handlers::{bad_request, error_response, ApiResponse, HandlerResponse};
use crate::models::{SwapIntent, TradeDirection, DEFAULT_SLIPPAGE_BPS, DEFAULT_TOKEN_DECIMALS};
use crate::priofee::PriorityLevel;
use crate::quote::Quote;
use crate::swap::SwapService;

use std::str::FromStr;

use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteParams {
    pub token_mint: String,
    pub amount: Decimal,
    pub is_buy: bool,
    pub decimals: Option<u8>,
}

pub async fn quote(
    State(service): State<SwapService>,
    Query(params): Query<QuoteParams>,
) -> HandlerResponse<Quote> {
    let Ok(token_mint) = Pubkey::from_str(&params.token_mint) else {
        return bad_request(format!("Invalid tokenMint: {}", params.token_mint));
    };
    let intent = SwapIntent {
        direction: TradeDirection::from_is_buy(params.is_buy),
        amount: params.amount,
        token_mint,
        token_decimals: params.decimals.unwrap_or(DEFAULT_TOKEN_DECIMALS),
        slippage_bps: DEFAULT_SLIPPAGE_BPS,
        priority_level: PriorityLevel::default(),
    };
    match service.quotes().quote(&intent).await {
        Ok(quote) => (StatusCode::OK, Json(ApiResponse::T(quote))),
        Err(e) => error_response("quote", e.into()),
    }
}
