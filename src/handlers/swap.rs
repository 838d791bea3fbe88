use crate::handlers::{bad_request, bearer_token, error_response, missing_token, ApiResponse, HandlerResponse};
use crate::models::{QuoteResponse, SwapIntent, TradeDirection, DEFAULT_SLIPPAGE_BPS, DEFAULT_TOKEN_DECIMALS};
use crate::priofee::PriorityLevel;
use crate::swap::{QuotedSwap, SwapResult, SwapService};

use std::str::FromStr;

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::{HeaderMap, StatusCode},
};
use log::debug;
use rust_decimal::Decimal;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapBody {
    /// A quote from `/quote`; when absent the service quotes `tokenMint`/`amount` itself
    pub quote_response: Option<QuoteResponse>,
    pub is_buy: bool,
    pub decimals: Option<u8>,
    pub input_decimals: Option<u8>,
    pub output_decimals: Option<u8>,
    pub slippage_bps: Option<u16>,
    pub priority_level: Option<PriorityLevel>,
    pub token_mint: Option<String>,
    pub amount: Option<Decimal>,
}

pub async fn swap(
    State(service): State<SwapService>,
    headers: HeaderMap,
    body: Result<Json<SwapBody>, JsonRejection>,
) -> HandlerResponse<SwapResult> {
    let Some(token) = bearer_token(&headers) else {
        return missing_token();
    };
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    debug!(
        "Swap request: isBuy={} decimals={:?} input={:?} output={:?} quoted={}",
        body.is_buy,
        body.decimals,
        body.input_decimals,
        body.output_decimals,
        body.quote_response.is_some()
    );

    let direction = TradeDirection::from_is_buy(body.is_buy);
    let slippage_bps = body.slippage_bps.unwrap_or(DEFAULT_SLIPPAGE_BPS);
    let priority_level = body.priority_level.unwrap_or_default();

    let result = match body.quote_response {
        Some(quote_response) => {
            service
                .execute_quoted(
                    QuotedSwap {
                        quote_response,
                        direction,
                        slippage_bps,
                        priority_level,
                    },
                    token,
                )
                .await
        }
        None => {
            let (Some(token_mint), Some(amount)) = (body.token_mint, body.amount) else {
                return bad_request(
                    "Either quoteResponse or tokenMint and amount are required".to_string(),
                );
            };
            let Ok(token_mint) = Pubkey::from_str(&token_mint) else {
                return bad_request(format!("Invalid tokenMint: {}", token_mint));
            };
            let intent = SwapIntent {
                direction,
                amount,
                token_mint,
                token_decimals: body.decimals.unwrap_or(DEFAULT_TOKEN_DECIMALS),
                slippage_bps,
                priority_level,
            };
            service.execute(&intent, token).await
        }
    };

    match result {
        Ok(swap) => (StatusCode::OK, Json(ApiResponse::T(swap))),
        Err(e) => error_response("swap", e),
    }
}
