//! Jupiter v6 client over plain reqwest. Replaces `jupiter-swap-api-client`, which
//! cannot send an exact `prioritizationFeeLamports` or echo the quote back with
//! unknown fields intact.

use super::{AggregatorError, SwapAggregator};
use crate::models::{QuoteRequest, QuoteResponse, SwapRequest, SwapResponse};

use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;

pub const DEFAULT_JUPITER_API_URL: &str = "https://quote-api.jup.ag/v6";

const QUOTE: &str = "/quote";
const SWAP: &str = "/swap";

/// Error codes the API uses when there is no tradable path
const NO_ROUTE_CODES: [&str; 3] = [
    "COULD_NOT_FIND_ANY_ROUTE",
    "NO_ROUTES_FOUND",
    "TOKEN_NOT_TRADABLE",
];

#[derive(Clone)]
pub struct JupiterClient {
    base_url: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiError {
    error: Option<String>,
    error_code: Option<String>,
}

impl JupiterClient {
    pub fn new(base_url: String, http: reqwest::Client) -> Self {
        JupiterClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            http,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("x-api-key", key),
            None => builder,
        }
    }

    async fn read_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, AggregatorError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }
        let de = &mut serde_json::Deserializer::from_str(&body);
        Ok(serde_path_to_error::deserialize(de)?)
    }
}

fn api_error(status: u16, body: &str) -> AggregatorError {
    let parsed = serde_json::from_str::<ApiError>(body).ok();
    let (message, code) = match parsed {
        Some(ApiError { error, error_code }) => (error.unwrap_or_else(|| body.to_string()), error_code),
        None => (body.to_string(), None),
    };
    match code {
        Some(code) if NO_ROUTE_CODES.contains(&code.as_str()) => AggregatorError::NoRoute(message),
        _ => AggregatorError::Api { status, message },
    }
}

#[async_trait]
impl SwapAggregator for JupiterClient {
    async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, AggregatorError> {
        let url = format!("{}{}", self.base_url, QUOTE);
        debug!("Quote request: {:?}", request);
        let response = self
            .request(self.http.get(&url).query(request))
            .send()
            .await?;
        Self::read_response(response).await
    }

    async fn build_swap_transaction(
        &self,
        request: &SwapRequest,
    ) -> Result<SwapResponse, AggregatorError> {
        let url = format!("{}{}", self.base_url, SWAP);
        debug!(
            "Swap build request: user={} prioritization_fee_lamports={}",
            request.user_public_key, request.prioritization_fee_lamports
        );
        let response = self
            .request(self.http.post(&url).json(request))
            .send()
            .await?;
        Self::read_response(response).await
    }
}
