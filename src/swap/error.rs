use crate::aggregator::AggregatorError;
use crate::fee::FeeError;
use crate::network::NetworkError;
use crate::quote::QuoteError;
use crate::signer::SignerError;
use crate::submit::SubmitError;
use crate::tx_utils::assemble::AssembleError;

use solana_sdk::signature::Signature;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SwapError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid quote: {0}")]
    InvalidQuote(String),
    #[error("No route found: {0}")]
    NoRoute(String),
    #[error("Upstream error: {0}")]
    Upstream(String),
    #[error("Invalid authorization token: {0}")]
    AuthInvalid(String),
    #[error("{0}")]
    NoDelegatedWallet(String),
    #[error("Signing rejected: {0}")]
    SigningRejected(String),
    #[error("Malformed swap payload: {0}")]
    MalformedSwapPayload(String),
    #[error("Transaction {signature} failed: {reason}")]
    OnChainFailure { signature: Signature, reason: String },
    #[error("Transaction {signature} not confirmed after {attempts} status checks; check the wallet before retrying")]
    ConfirmationTimeout {
        signature: Signature,
        attempts: usize,
    },
}

impl SwapError {
    pub fn kind(&self) -> &'static str {
        match self {
            SwapError::InvalidAmount(_) => "invalid_amount",
            SwapError::InvalidQuote(_) => "invalid_quote",
            SwapError::NoRoute(_) => "no_route",
            SwapError::Upstream(_) => "upstream_error",
            SwapError::AuthInvalid(_) => "auth_invalid",
            SwapError::NoDelegatedWallet(_) => "no_delegated_wallet",
            SwapError::SigningRejected(_) => "signing_rejected",
            SwapError::MalformedSwapPayload(_) => "malformed_swap_payload",
            SwapError::OnChainFailure { .. } => "on_chain_failure",
            SwapError::ConfirmationTimeout { .. } => "confirmation_timeout",
        }
    }

    /// True when nothing reached the chain, so the request can be repeated
    /// without risking a double swap.
    pub fn retry_safe(&self) -> bool {
        !matches!(
            self,
            SwapError::OnChainFailure { .. } | SwapError::ConfirmationTimeout { .. }
        )
    }

    /// Signature of the broadcast transaction, if it got that far
    pub fn signature(&self) -> Option<&Signature> {
        match self {
            SwapError::OnChainFailure { signature, .. }
            | SwapError::ConfirmationTimeout { signature, .. } => Some(signature),
            _ => None,
        }
    }
}

impl From<QuoteError> for SwapError {
    fn from(e: QuoteError) -> Self {
        match e {
            QuoteError::InvalidAmount(message) => SwapError::InvalidAmount(message),
            QuoteError::NoRoute(message) => SwapError::NoRoute(message),
            QuoteError::Upstream(e) => SwapError::Upstream(e.to_string()),
        }
    }
}

impl From<AggregatorError> for SwapError {
    fn from(e: AggregatorError) -> Self {
        match e {
            AggregatorError::NoRoute(message) => SwapError::NoRoute(message),
            e => SwapError::Upstream(e.to_string()),
        }
    }
}

impl From<FeeError> for SwapError {
    fn from(e: FeeError) -> Self {
        match e {
            FeeError::InvalidAmount(message) => SwapError::InvalidAmount(message),
        }
    }
}

impl From<AssembleError> for SwapError {
    fn from(e: AssembleError) -> Self {
        SwapError::MalformedSwapPayload(e.to_string())
    }
}

impl From<SignerError> for SwapError {
    fn from(e: SignerError) -> Self {
        match e {
            SignerError::AuthInvalid(message) => SwapError::AuthInvalid(message),
            SignerError::NoDelegatedWallet(message) => SwapError::NoDelegatedWallet(message),
            SignerError::SigningRejected(message) => SwapError::SigningRejected(message),
            SignerError::Provider(e) => SwapError::Upstream(e.to_string()),
        }
    }
}

impl From<NetworkError> for SwapError {
    fn from(e: NetworkError) -> Self {
        SwapError::Upstream(e.to_string())
    }
}

impl From<SubmitError> for SwapError {
    fn from(e: SubmitError) -> Self {
        match e {
            SubmitError::Broadcast(e) => SwapError::Upstream(e.to_string()),
            SubmitError::OnChainFailure { signature, reason } => {
                SwapError::OnChainFailure { signature, reason }
            }
            SubmitError::ConfirmationTimeout {
                signature,
                attempts,
            } => SwapError::ConfirmationTimeout {
                signature,
                attempts,
            },
        }
    }
}
