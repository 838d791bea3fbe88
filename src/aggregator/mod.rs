pub mod jupiter;

use crate::models::{QuoteRequest, QuoteResponse, SwapRequest, SwapResponse};

use async_trait::async_trait;
use thiserror::Error;

pub use jupiter::JupiterClient;

#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("No route found: {0}")]
    NoRoute(String),
    #[error("Aggregator API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error("Failed to decode aggregator response: {0}")]
    Decode(#[from] serde_path_to_error::Error<serde_json::Error>),
}

/// A swap aggregator that prices routes and builds ready-to-sign swap
/// transactions.
#[async_trait]
pub trait SwapAggregator: Send + Sync {
    async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, AggregatorError>;

    async fn build_swap_transaction(
        &self,
        request: &SwapRequest,
    ) -> Result<SwapResponse, AggregatorError>;
}
