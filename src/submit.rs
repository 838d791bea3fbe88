use crate::network::{NetworkError, SendOptions, SolanaNetwork};

use std::time::Duration;

use log::{debug, info, warn};
use solana_sdk::commitment_config::CommitmentLevel;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use thiserror::Error;

pub const MAX_CONFIRMATION_ATTEMPTS: usize = 5;
pub const CONFIRMATION_POLL_DELAY: Duration = Duration::from_secs(2);
/// Rebroadcast attempts left to the RPC node
pub const SEND_MAX_RETRIES: usize = 2;

#[derive(Copy, Clone, Debug)]
pub struct ConfirmationPolicy {
    pub max_attempts: usize,
    pub poll_delay: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        ConfirmationPolicy {
            max_attempts: MAX_CONFIRMATION_ATTEMPTS,
            poll_delay: CONFIRMATION_POLL_DELAY,
        }
    }
}

/// The transaction was already checked by the aggregator and carries a fresh
/// blockhash, so preflight simulation is skipped.
pub fn send_options() -> SendOptions {
    SendOptions {
        skip_preflight: true,
        max_retries: Some(SEND_MAX_RETRIES),
        preflight_commitment: CommitmentLevel::Confirmed,
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Failed to broadcast transaction: {0}")]
    Broadcast(#[source] NetworkError),
    #[error("Transaction {signature} failed: {reason}")]
    OnChainFailure { signature: Signature, reason: String },
    /// The outcome is unknown. The transaction may still land, so it must not
    /// be resubmitted blindly.
    #[error("Transaction {signature} not confirmed after {attempts} status checks; it may still land")]
    ConfirmationTimeout {
        signature: Signature,
        attempts: usize,
    },
}

pub async fn submit_and_confirm(
    network: &dyn SolanaNetwork,
    transaction: &Transaction,
    policy: ConfirmationPolicy,
) -> Result<Signature, SubmitError> {
    let signature = network
        .send_raw_transaction(transaction, send_options())
        .await
        .map_err(SubmitError::Broadcast)?;
    info!("Transaction submitted: {}", signature);

    confirm_signature(network, &signature, policy).await?;
    Ok(signature)
}

/// Polls sequentially until the signature is confirmed, fails on-chain, or
/// `policy.max_attempts` checks have been made (at least one). A failed
/// status lookup counts as an attempt without a result.
pub async fn confirm_signature(
    network: &dyn SolanaNetwork,
    signature: &Signature,
    policy: ConfirmationPolicy,
) -> Result<(), SubmitError> {
    let max_attempts = policy.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        match network.signature_status(signature).await {
            Ok(Some(state)) => {
                if let Some(reason) = state.err {
                    return Err(SubmitError::OnChainFailure {
                        signature: *signature,
                        reason,
                    });
                }
                if state.is_confirmed() {
                    info!("Transaction confirmed: {} (attempt {})", signature, attempt);
                    return Ok(());
                }
                debug!(
                    "Attempt {} - {} status: {:?}",
                    attempt, signature, state.confirmation
                );
            }
            Ok(None) => debug!("Attempt {} - {} not yet seen", attempt, signature),
            Err(e) => warn!(
                "Attempt {} - status check for {} failed: {}",
                attempt, signature, e
            ),
        }

        if attempt < max_attempts {
            tokio::time::sleep(policy.poll_delay).await;
        }
    }

    Err(SubmitError::ConfirmationTimeout {
        signature: *signature,
        attempts: max_attempts,
    })
}
