use crate::models::TradeDirection;

use solana_sdk::instruction::Instruction;
use solana_sdk::system_instruction;
use solana_sdk::{pubkey, pubkey::Pubkey};
use thiserror::Error;

/// Protocol commission, in basis points (1%)
pub const FEE_BPS: u64 = 100;
pub const BPS_DENOMINATOR: u64 = 10_000;
/// Default receiver of the protocol commission
pub const FEE_COLLECTOR: Pubkey = pubkey!("ESMNwDW8FCTHXC8UEopL7MkjMaXCnecFghVtmmESyoLs");

#[derive(Debug, Error)]
pub enum FeeError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// Where the fee transfer goes relative to the swap instructions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FeePlacement {
    /// Before the swap: the payer's pre-swap SOL covers it
    Prepend,
    /// After the swap: skimmed off the SOL proceeds
    Append,
}

/// A SOL transfer of the protocol fee. Always denominated in lamports, whatever
/// the trade direction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FeeInstruction {
    pub amount: u64,
    pub payer: Pubkey,
    pub collector: Pubkey,
}

impl FeeInstruction {
    pub fn to_instruction(&self) -> Instruction {
        system_instruction::transfer(&self.payer, &self.collector, self.amount)
    }
}

/// `floor(base * FEE_BPS / 10_000)`. The product is taken in u128, so it
/// can't overflow, and the result never exceeds `base`.
pub fn fee_amount(base: u64) -> u64 {
    let fee = u128::from(base) * u128::from(FEE_BPS) / u128::from(BPS_DENOMINATOR);
    fee as u64
}

/// Buys pay the fee out of `in_amount` (SOL spent) up front; sells pay it out
/// of `out_amount` (SOL received) after the swap.
pub fn compute_fee(
    direction: TradeDirection,
    in_amount: u64,
    out_amount: u64,
    payer: Pubkey,
    collector: Pubkey,
) -> Result<(FeeInstruction, FeePlacement), FeeError> {
    if in_amount == 0 {
        return Err(FeeError::InvalidAmount(
            "quote has a zero input amount".to_string(),
        ));
    }
    let (base, placement) = match direction {
        TradeDirection::Buy => (in_amount, FeePlacement::Prepend),
        TradeDirection::Sell => (out_amount, FeePlacement::Append),
    };
    let fee = FeeInstruction {
        amount: fee_amount(base),
        payer,
        collector,
    };
    Ok((fee, placement))
}
