use super::{SwapError, SwapService};
use crate::blockhash::get_blockhash_with_retry;
use crate::models::SOL_DECIMALS;
use crate::quote::ui_amount_to_base_units;
use crate::serde_helpers::field_as_string;
use crate::submit::submit_and_confirm;

use log::info;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::system_instruction;
use solana_sdk::transaction::Transaction;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    #[serde(with = "field_as_string")]
    pub signature: Signature,
    pub lamports: u64,
}

impl SwapService {
    /// Sends `amount` SOL from a delegated wallet of the caller. No protocol
    /// fee is charged on transfers.
    pub async fn transfer(
        &self,
        auth_token: &str,
        from: &Pubkey,
        to: &Pubkey,
        amount: Decimal,
    ) -> Result<TransferResult, SwapError> {
        // never round up what leaves the wallet
        let lamports = ui_amount_to_base_units(amount, SOL_DECIMALS, RoundingStrategy::ToZero)?;
        let wallet = self.signer.verify_delegated_address(auth_token, from).await?;

        let blockhash =
            get_blockhash_with_retry(self.network.as_ref(), self.settings.blockhash_retries).await?;
        let message = Message::new_with_blockhash(
            &[system_instruction::transfer(from, to, lamports)],
            Some(from),
            &blockhash,
        );
        let signed = self
            .signer
            .sign(&wallet, Transaction::new_unsigned(message))
            .await?;
        let signature =
            submit_and_confirm(self.network.as_ref(), &signed, self.settings.confirmation).await?;

        info!("Transferred {} lamports {} -> {}: {}", lamports, from, to, signature);
        Ok(TransferResult {
            signature,
            lamports,
        })
    }
}
