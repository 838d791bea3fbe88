use super::{SwapError, SwapService};
use crate::blockhash::get_blockhash_with_retry;
use crate::fee::compute_fee;
use crate::models::{QuoteResponse, SwapIntent, SwapRequest, TradeDirection, SOL_MINT};
use crate::priofee::{estimate_priority_fee, PriorityLevel};
use crate::serde_helpers::field_as_string;
use crate::signer::DelegatedWallet;
use crate::submit::submit_and_confirm;
use crate::tx_utils::assemble::assemble;

use std::time::Instant;

use log::{debug, info};
use serde::Serialize;
use solana_sdk::signature::Signature;

/// A quote obtained earlier, plus how to execute it.
#[derive(Clone, Debug)]
pub struct QuotedSwap {
    pub quote_response: QuoteResponse,
    pub direction: TradeDirection,
    pub slippage_bps: u16,
    pub priority_level: PriorityLevel,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapResult {
    #[serde(with = "field_as_string")]
    pub signature: Signature,
    pub fee_lamports: u64,
    pub priority_fee_lamports: u64,
    /// Expected output from the quote, in base units
    pub out_amount: u64,
}

/// Every trade has SOL on one side; which side follows from the direction.
fn check_quote(quote: &QuoteResponse, direction: TradeDirection) -> Result<(), SwapError> {
    let sol_side = match direction {
        TradeDirection::Buy => quote.input_mint,
        TradeDirection::Sell => quote.output_mint,
    };
    if sol_side != SOL_MINT {
        return Err(SwapError::InvalidQuote(format!(
            "{:?} quote must trade SOL, got {} -> {}",
            direction, quote.input_mint, quote.output_mint
        )));
    }
    if quote.route_plan.is_empty() {
        return Err(SwapError::NoRoute("quote has an empty route plan".to_string()));
    }
    Ok(())
}

impl SwapService {
    /// Quotes and executes `intent` for the caller's delegated wallet.
    pub async fn execute(&self, intent: &SwapIntent, auth_token: &str) -> Result<SwapResult, SwapError> {
        let wallet = self.signer.resolve_wallet(auth_token).await?;
        let quote = self.quotes.quote(intent).await?;
        self.run(
            &wallet,
            QuotedSwap {
                quote_response: quote.quote_response,
                direction: intent.direction,
                slippage_bps: intent.slippage_bps,
                priority_level: intent.priority_level,
            },
        )
        .await
    }

    /// Executes a quote the caller already holds.
    pub async fn execute_quoted(
        &self,
        swap: QuotedSwap,
        auth_token: &str,
    ) -> Result<SwapResult, SwapError> {
        let wallet = self.signer.resolve_wallet(auth_token).await?;
        self.run(&wallet, swap).await
    }

    async fn run(&self, wallet: &DelegatedWallet, swap: QuotedSwap) -> Result<SwapResult, SwapError> {
        let start = Instant::now();
        let QuotedSwap {
            mut quote_response,
            direction,
            slippage_bps,
            priority_level,
        } = swap;
        check_quote(&quote_response, direction)?;
        quote_response.slippage_bps = slippage_bps;

        let (fee, placement) = compute_fee(
            direction,
            quote_response.in_amount,
            quote_response.out_amount,
            wallet.address,
            self.settings.fee_collector,
        )?;
        debug!("Fee {} lamports ({:?})", fee.amount, placement);

        // draft build, only used to price the priority fee
        let draft = self
            .aggregator
            .build_swap_transaction(&SwapRequest::new(quote_response.clone(), wallet.address))
            .await?;
        let draft_blob = draft.swap_transaction.ok_or_else(|| {
            SwapError::MalformedSwapPayload("No swap transaction returned".to_string())
        })?;
        let priority_fee = estimate_priority_fee(
            self.priofees.as_ref(),
            &draft_blob,
            priority_level,
            self.settings.max_priority_fee_lamports,
        )
        .await;

        let out_amount = quote_response.out_amount;
        let mut request = SwapRequest::new(quote_response, wallet.address);
        request.prioritization_fee_lamports = priority_fee;
        let built = self.aggregator.build_swap_transaction(&request).await?;

        let blockhash =
            get_blockhash_with_retry(self.network.as_ref(), self.settings.blockhash_retries).await?;
        let assembled = assemble(
            built.swap_transaction.as_deref(),
            &fee,
            placement,
            blockhash,
            &wallet.address,
        )?;
        debug!(
            "Assembled {} swap instructions, fee at {}",
            assembled.swap_instruction_count, assembled.fee_index
        );

        let signed = self.signer.sign(wallet, assembled.transaction).await?;
        let signature =
            submit_and_confirm(self.network.as_ref(), &signed, self.settings.confirmation).await?;

        info!(
            "Swap {:?} for {} confirmed: {} ({:?})",
            direction,
            wallet.address,
            signature,
            start.elapsed()
        );
        Ok(SwapResult {
            signature,
            fee_lamports: fee.amount,
            priority_fee_lamports: priority_fee,
            out_amount,
        })
    }
}
