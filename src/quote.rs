use crate::aggregator::{AggregatorError, SwapAggregator};
use crate::fee::{BPS_DENOMINATOR, FEE_BPS};
use crate::models::{QuoteRequest, QuoteResponse, SwapIntent, TradeDirection};

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("No route found: {0}")]
    NoRoute(String),
    #[error("Aggregator error: {0}")]
    Upstream(#[source] AggregatorError),
}

impl From<AggregatorError> for QuoteError {
    fn from(e: AggregatorError) -> Self {
        match e {
            AggregatorError::NoRoute(message) => QuoteError::NoRoute(message),
            e => QuoteError::Upstream(e),
        }
    }
}

/// The aggregator's quote plus the fields a UI displays.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub quote_response: QuoteResponse,
    /// Input amount sent to the aggregator, in base units, net of the fee for buys
    pub in_amount: u64,
    /// Expected output, in base units of the output side
    pub expected_output: u64,
    pub price_impact_pct: f64,
    pub input_decimals: u8,
    pub output_decimals: u8,
}

/// Converts a human amount into base units. `amount` must be positive and
/// must not round down to zero units.
pub fn ui_amount_to_base_units(
    amount: Decimal,
    decimals: u8,
    strategy: RoundingStrategy,
) -> Result<u64, QuoteError> {
    if amount <= Decimal::ZERO {
        return Err(QuoteError::InvalidAmount(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    let scale = 10u64
        .checked_pow(u32::from(decimals))
        .map(Decimal::from)
        .ok_or_else(|| QuoteError::InvalidAmount(format!("unsupported decimals {}", decimals)))?;
    let units = amount
        .checked_mul(scale)
        .map(|scaled| scaled.round_dp_with_strategy(0, strategy))
        .and_then(|scaled| scaled.to_u64())
        .ok_or_else(|| QuoteError::InvalidAmount(format!("amount {} is too large", amount)))?;
    if units == 0 {
        return Err(QuoteError::InvalidAmount(format!(
            "amount {} is too small",
            amount
        )));
    }
    Ok(units)
}

/// Base units to send to the aggregator. Buys are quoted on the net spend, after the
/// protocol fee is taken out of the nominal SOL amount.
pub fn quote_amount(
    amount: Decimal,
    direction: TradeDirection,
    token_decimals: u8,
) -> Result<u64, QuoteError> {
    if amount <= Decimal::ZERO {
        return Err(QuoteError::InvalidAmount(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    let (input_decimals, _) = direction.decimals(token_decimals);
    let net = match direction {
        TradeDirection::Buy => amount
            .checked_mul(Decimal::from(BPS_DENOMINATOR - FEE_BPS))
            .and_then(|gross| gross.checked_div(Decimal::from(BPS_DENOMINATOR)))
            .ok_or_else(|| QuoteError::InvalidAmount(format!("amount {} is too large", amount)))?,
        TradeDirection::Sell => amount,
    };
    ui_amount_to_base_units(net, input_decimals, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Clone)]
pub struct QuoteClient {
    aggregator: Arc<dyn SwapAggregator>,
}

impl QuoteClient {
    pub fn new(aggregator: Arc<dyn SwapAggregator>) -> Self {
        QuoteClient { aggregator }
    }

    /// Fetches a fresh quote for `intent`. Invalid amounts are rejected before
    /// anything is sent.
    pub async fn quote(&self, intent: &SwapIntent) -> Result<Quote, QuoteError> {
        let start = Instant::now();
        let in_amount = quote_amount(intent.amount, intent.direction, intent.token_decimals)?;
        let (input_mint, output_mint) = intent.direction.mints(intent.token_mint);
        let (input_decimals, output_decimals) = intent.direction.decimals(intent.token_decimals);
        debug!(
            "Quoting {:?} {} ({} base units) {} -> {}",
            intent.direction, intent.amount, in_amount, input_mint, output_mint
        );

        let response = self
            .aggregator
            .quote(&QuoteRequest::new(input_mint, output_mint, in_amount))
            .await?;
        if response.route_plan.is_empty() {
            return Err(QuoteError::NoRoute(format!(
                "no route from {} to {}",
                input_mint, output_mint
            )));
        }

        info!(
            "Quote {:?}: in={} out={} impact={} ({:?})",
            intent.direction,
            response.in_amount,
            response.out_amount,
            response.price_impact_pct,
            start.elapsed()
        );
        Ok(Quote {
            in_amount,
            expected_output: response.out_amount,
            price_impact_pct: response.price_impact(),
            input_decimals,
            output_decimals,
            quote_response: response,
        })
    }
}
