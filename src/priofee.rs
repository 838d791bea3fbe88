use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use thiserror::Error;

// https://docs.helius.dev/solana-apis/priority-fee-api

/// Used whenever the estimate can't be obtained. The priority fee only
/// speeds up inclusion, so a failed estimate never aborts a swap.
pub const FALLBACK_PRIORITY_FEE_LAMPORTS: u64 = 3_333_333;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub enum PriorityLevel {
    Low,
    #[default]
    Medium,
    High,
    VeryHigh,
}

impl PriorityLevel {
    /// Unknown levels fall back to `Medium`.
    pub fn parse(level: &str) -> Self {
        let normalized: String = level
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "low" => PriorityLevel::Low,
            "medium" => PriorityLevel::Medium,
            "high" => PriorityLevel::High,
            "veryhigh" => PriorityLevel::VeryHigh,
            _ => PriorityLevel::Medium,
        }
    }
}

impl<'de> Deserialize<'de> for PriorityLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let level = String::deserialize(deserializer)?;
        Ok(PriorityLevel::parse(&level))
    }
}

#[derive(Copy, Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityFeeLevels {
    #[serde(default)]
    pub min: f64,
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub very_high: f64,
    #[serde(default)]
    pub unsafe_max: f64,
}

impl PriorityFeeLevels {
    pub fn for_level(&self, level: PriorityLevel) -> Option<u64> {
        let fee = match level {
            PriorityLevel::Low => self.low,
            PriorityLevel::Medium => self.medium,
            PriorityLevel::High => self.high,
            PriorityLevel::VeryHigh => self.very_high,
        };
        (fee.is_finite() && fee >= 0.0).then(|| fee.floor() as u64)
    }
}

#[derive(Debug, Error)]
pub enum PriofeeError {
    #[error("Priofee req send error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Priofee response decode error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("getPriorityFeeEstimate error: {0}")]
    Rpc(String),
    #[error("getPriorityFeeEstimate error: Invalid response")]
    InvalidResponse,
}

#[async_trait]
pub trait PriorityFeeSource: Send + Sync {
    /// Fee levels for the given base64 encoded transaction
    async fn fee_levels(&self, transaction: &str) -> Result<PriorityFeeLevels, PriofeeError>;
}

pub struct HeliusPriorityFees {
    url: String,
    http: reqwest::Client,
}

impl HeliusPriorityFees {
    pub fn new(url: String, http: reqwest::Client) -> Self {
        HeliusPriorityFees { url, http }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EstimateResult {
    priority_fee_levels: Option<PriorityFeeLevels>,
}

#[async_trait]
impl PriorityFeeSource for HeliusPriorityFees {
    async fn fee_levels(&self, transaction: &str) -> Result<PriorityFeeLevels, PriofeeError> {
        let mut json = self
            .http
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&json!({
                "jsonrpc": "2.0",
                "id": "1",
                "method": "getPriorityFeeEstimate",
                "params": [{
                    "transaction": transaction,
                    "options": { "includeAllPriorityFeeLevels": true }
                }]
            }))
            .send()
            .await?
            .json::<serde_json::Value>()
            .await?;

        if let Some(result) = json.get_mut("result").map(|res| res.take()) {
            serde_json::from_value::<EstimateResult>(result)?
                .priority_fee_levels
                .ok_or(PriofeeError::InvalidResponse)
        } else if let Some(error) = json.get_mut("error").map(|err| err.take()) {
            Err(PriofeeError::Rpc(error.to_string()))
        } else {
            Err(PriofeeError::InvalidResponse)
        }
    }
}

/// Picks the fee for `level`, optionally capped. Never fails: any error from
/// the source is logged and replaced by [`FALLBACK_PRIORITY_FEE_LAMPORTS`].
pub async fn estimate_priority_fee(
    source: &dyn PriorityFeeSource,
    transaction: &str,
    level: PriorityLevel,
    cap: Option<u64>,
) -> u64 {
    let fee = match source.fee_levels(transaction).await {
        Ok(levels) => levels.for_level(level).unwrap_or_else(|| {
            warn!("Unusable priority fee for {:?}: {:?}", level, levels);
            FALLBACK_PRIORITY_FEE_LAMPORTS
        }),
        Err(e) => {
            warn!("Priority fee estimate failed, using fallback: {}", e);
            FALLBACK_PRIORITY_FEE_LAMPORTS
        }
    };
    let fee = cap.map_or(fee, |cap| fee.min(cap));
    debug!("Priority fee for {:?}: {}", level, fee);
    fee
}
