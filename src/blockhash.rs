use crate::network::{NetworkError, SolanaNetwork};

use log::warn;
use solana_sdk::hash::Hash;

pub const DEFAULT_BLOCKHASH_RETRIES: u8 = 3;

/// A blockhash expires within ~60s, so one is fetched per swap attempt.
pub async fn get_blockhash_with_retry(
    network: &dyn SolanaNetwork,
    retries: u8,
) -> Result<Hash, NetworkError> {
    for i in 0..retries {
        match network.latest_blockhash().await {
            Ok(hash) => return Ok(hash),
            Err(e) => warn!("i={}. Failed to get blockhash data: {}", i, e),
        }
    }

    Err(NetworkError::Other(format!(
        "Failed to get blockhash data after {} retries",
        retries
    )))
}
