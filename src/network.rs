use std::sync::Arc;

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};
use solana_sdk::hash::Hash;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use solana_transaction_status::TransactionConfirmationStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("RPC error: {0}")]
    ClientError(#[from] solana_rpc_client_api::client_error::Error),
    #[error("{0}")]
    Other(String),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SendOptions {
    pub skip_preflight: bool,
    pub max_retries: Option<usize>,
    pub preflight_commitment: CommitmentLevel,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConfirmationLevel {
    Processed,
    Confirmed,
    Finalized,
}

/// What the node reports for a signature it has seen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureState {
    pub confirmation: Option<ConfirmationLevel>,
    /// Set when the transaction executed and failed
    pub err: Option<String>,
}

impl SignatureState {
    pub fn is_confirmed(&self) -> bool {
        matches!(
            self.confirmation,
            Some(ConfirmationLevel::Confirmed | ConfirmationLevel::Finalized)
        )
    }
}

/// The subset of a Solana RPC node used to land a transaction.
#[async_trait]
pub trait SolanaNetwork: Send + Sync {
    async fn latest_blockhash(&self) -> Result<Hash, NetworkError>;

    async fn send_raw_transaction(
        &self,
        transaction: &Transaction,
        options: SendOptions,
    ) -> Result<Signature, NetworkError>;

    /// `None` while the node hasn't seen the signature
    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureState>, NetworkError>;
}

pub struct RpcNetwork {
    /// Reads: blockhash and signature statuses
    rpc_client: Arc<RpcClient>,
    /// Broadcasts; may point at a dedicated sending endpoint
    send_client: Arc<RpcClient>,
    commitment: CommitmentConfig,
}

impl RpcNetwork {
    pub fn new(rpc_client: Arc<RpcClient>, send_client: Option<Arc<RpcClient>>) -> Self {
        RpcNetwork {
            send_client: send_client.unwrap_or_else(|| Arc::clone(&rpc_client)),
            rpc_client,
            commitment: CommitmentConfig::confirmed(),
        }
    }
}

#[async_trait]
impl SolanaNetwork for RpcNetwork {
    async fn latest_blockhash(&self) -> Result<Hash, NetworkError> {
        let (hash, _last_valid_block_height) = self
            .rpc_client
            .get_latest_blockhash_with_commitment(self.commitment)
            .await?;
        Ok(hash)
    }

    async fn send_raw_transaction(
        &self,
        transaction: &Transaction,
        options: SendOptions,
    ) -> Result<Signature, NetworkError> {
        Ok(self
            .send_client
            .send_transaction_with_config(
                transaction,
                RpcSendTransactionConfig {
                    skip_preflight: options.skip_preflight,
                    preflight_commitment: Some(options.preflight_commitment),
                    max_retries: options.max_retries,
                    ..RpcSendTransactionConfig::default()
                },
            )
            .await?)
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureState>, NetworkError> {
        let response = self.rpc_client.get_signature_statuses(&[*signature]).await?;
        let status = response.value.into_iter().next().flatten();
        Ok(status.map(|status| SignatureState {
            confirmation: match status.confirmation_status {
                Some(TransactionConfirmationStatus::Processed) => Some(ConfirmationLevel::Processed),
                Some(TransactionConfirmationStatus::Confirmed) => Some(ConfirmationLevel::Confirmed),
                Some(TransactionConfirmationStatus::Finalized) => Some(ConfirmationLevel::Finalized),
                // rooted statuses from older nodes carry no confirmation count
                None if status.confirmations.is_none() => Some(ConfirmationLevel::Finalized),
                None => None,
            },
            err: status.err.map(|err| err.to_string()),
        }))
    }
}
