use crate::priofee::PriorityLevel;
use crate::serde_helpers::{field_as_string, string_or_number};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use solana_sdk::{pubkey, pubkey::Pubkey};

/// Wrapped SOL mint. Every trade has SOL on one side.
pub const SOL_MINT: Pubkey = pubkey!("So11111111111111111111111111111111111111112");
pub const SOL_DECIMALS: u8 = 9;
/// Used when the caller doesn't know the token's decimals
pub const DEFAULT_TOKEN_DECIMALS: u8 = 9;
/// Slippage applied to the swap build when the caller doesn't send one (1%)
pub const DEFAULT_SLIPPAGE_BPS: u16 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeDirection {
    /// SOL -> token
    Buy,
    /// token -> SOL
    Sell,
}

impl TradeDirection {
    pub fn from_is_buy(is_buy: bool) -> Self {
        if is_buy {
            TradeDirection::Buy
        } else {
            TradeDirection::Sell
        }
    }

    /// Returns `(input_mint, output_mint)`
    pub fn mints(self, token_mint: Pubkey) -> (Pubkey, Pubkey) {
        match self {
            TradeDirection::Buy => (SOL_MINT, token_mint),
            TradeDirection::Sell => (token_mint, SOL_MINT),
        }
    }

    /// Returns `(input_decimals, output_decimals)`
    pub fn decimals(self, token_decimals: u8) -> (u8, u8) {
        match self {
            TradeDirection::Buy => (SOL_DECIMALS, token_decimals),
            TradeDirection::Sell => (token_decimals, SOL_DECIMALS),
        }
    }
}

/// A user's trade request, in human units.
#[derive(Clone, Debug)]
pub struct SwapIntent {
    pub direction: TradeDirection,
    pub amount: Decimal,
    pub token_mint: Pubkey,
    pub token_decimals: u8,
    pub slippage_bps: u16,
    pub priority_level: PriorityLevel,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapMode {
    #[default]
    ExactIn,
    ExactOut,
}

/// Query parameters for the aggregator's `GET /quote`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    #[serde(with = "field_as_string")]
    pub input_mint: Pubkey,
    #[serde(with = "field_as_string")]
    pub output_mint: Pubkey,
    pub amount: u64,
    pub slippage_bps: u16,
    pub platform_fee_bps: u16,
    pub only_direct_routes: bool,
    pub as_legacy_transaction: bool,
    pub restrict_intermediate_tokens: bool,
}

impl QuoteRequest {
    /// Slippage is always quoted as zero; it's applied later on the swap build.
    pub fn new(input_mint: Pubkey, output_mint: Pubkey, amount: u64) -> Self {
        QuoteRequest {
            input_mint,
            output_mint,
            amount,
            slippage_bps: 0,
            platform_fee_bps: 0,
            only_direct_routes: false,
            as_legacy_transaction: false,
            restrict_intermediate_tokens: true,
        }
    }
}

/// The aggregator's quote. Only the numeric fields are read here; everything
/// else is kept in `extra` so the quote can be echoed back verbatim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    #[serde(with = "field_as_string")]
    pub input_mint: Pubkey,
    #[serde(with = "field_as_string")]
    pub in_amount: u64,
    #[serde(with = "field_as_string")]
    pub output_mint: Pubkey,
    #[serde(with = "field_as_string")]
    pub out_amount: u64,
    #[serde(with = "field_as_string")]
    pub other_amount_threshold: u64,
    #[serde(default)]
    pub swap_mode: SwapMode,
    #[serde(default)]
    pub slippage_bps: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_fee: Option<PlatformFee>,
    #[serde(default = "zero_impact", with = "string_or_number")]
    pub price_impact_pct: String,
    #[serde(default)]
    pub route_plan: Vec<RoutePlanStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_slot: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_taken: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn zero_impact() -> String {
    "0".to_string()
}

impl QuoteResponse {
    pub fn price_impact(&self) -> f64 {
        self.price_impact_pct.parse().unwrap_or(0.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformFee {
    #[serde(with = "string_or_number")]
    pub amount: String,
    pub fee_bps: u16,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlanStep {
    pub swap_info: SwapInfo,
    pub percent: u8,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapInfo {
    pub amm_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub input_mint: String,
    pub output_mint: String,
    pub in_amount: String,
    pub out_amount: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body for the aggregator's `POST /swap`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    pub quote_response: QuoteResponse,
    #[serde(with = "field_as_string")]
    pub user_public_key: Pubkey,
    pub wrap_and_unwrap_sol: bool,
    pub use_shared_accounts: bool,
    pub prioritization_fee_lamports: u64,
    pub as_legacy_transaction: bool,
    pub dynamic_compute_unit_limit: bool,
}

impl SwapRequest {
    /// Legacy transactions only: the swap instructions get decompiled and
    /// merged with the fee transfer, which lookup tables would prevent.
    pub fn new(quote_response: QuoteResponse, user_public_key: Pubkey) -> Self {
        SwapRequest {
            quote_response,
            user_public_key,
            wrap_and_unwrap_sol: true,
            use_shared_accounts: false,
            prioritization_fee_lamports: 0,
            as_legacy_transaction: true,
            dynamic_compute_unit_limit: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapResponse {
    /// Base64 encoded, unsigned transaction
    #[serde(default)]
    pub swap_transaction: Option<String>,
    #[serde(default)]
    pub last_valid_block_height: Option<u64>,
    #[serde(default)]
    pub prioritization_fee_lamports: Option<u64>,
}
