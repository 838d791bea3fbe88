pub mod error;
pub mod execute;
pub mod transfer;

use crate::aggregator::SwapAggregator;
use crate::blockhash::DEFAULT_BLOCKHASH_RETRIES;
use crate::fee::FEE_COLLECTOR;
use crate::network::SolanaNetwork;
use crate::priofee::PriorityFeeSource;
use crate::quote::QuoteClient;
use crate::signer::{CustodyProvider, DelegatedSigner};
use crate::submit::ConfirmationPolicy;

use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;

pub use error::SwapError;
pub use execute::{QuotedSwap, SwapResult};
pub use transfer::TransferResult;

#[derive(Copy, Clone, Debug)]
pub struct SwapSettings {
    /// Receiver of the protocol fee
    pub fee_collector: Pubkey,
    /// Upper bound on the priority fee passed to the aggregator, if any
    pub max_priority_fee_lamports: Option<u64>,
    pub confirmation: ConfirmationPolicy,
    pub blockhash_retries: u8,
}

impl Default for SwapSettings {
    fn default() -> Self {
        SwapSettings {
            fee_collector: FEE_COLLECTOR,
            max_priority_fee_lamports: None,
            confirmation: ConfirmationPolicy::default(),
            blockhash_retries: DEFAULT_BLOCKHASH_RETRIES,
        }
    }
}

/// Runs swaps and transfers for delegated wallets. Built once at startup
/// and cloned into every request.
#[derive(Clone)]
pub struct SwapService {
    aggregator: Arc<dyn SwapAggregator>,
    quotes: QuoteClient,
    priofees: Arc<dyn PriorityFeeSource>,
    signer: DelegatedSigner,
    network: Arc<dyn SolanaNetwork>,
    settings: SwapSettings,
}

impl SwapService {
    pub fn new(
        aggregator: Arc<dyn SwapAggregator>,
        priofees: Arc<dyn PriorityFeeSource>,
        custody: Arc<dyn CustodyProvider>,
        network: Arc<dyn SolanaNetwork>,
        settings: SwapSettings,
    ) -> Self {
        SwapService {
            quotes: QuoteClient::new(Arc::clone(&aggregator)),
            aggregator,
            priofees,
            signer: DelegatedSigner::new(custody),
            network,
            settings,
        }
    }

    pub fn quotes(&self) -> &QuoteClient {
        &self.quotes
    }
}
