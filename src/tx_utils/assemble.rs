use crate::fee::{FeeInstruction, FeePlacement};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use solana_sdk::hash::Hash;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::message::{Message, MessageHeader, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::{Transaction, VersionedTransaction};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("No swap transaction returned from the aggregator")]
    MissingSwapTransaction,
    #[error("Swap transaction is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Failed to deserialize swap transaction: {0}")]
    Deserialize(#[from] bincode::Error),
    #[error("Swap transaction uses address lookup tables and can't be merged")]
    AddressLookupTables,
    #[error("Swap transaction references account index {0} out of range")]
    AccountIndex(usize),
}

/// An unsigned transaction holding the swap and exactly one fee transfer.
#[derive(Clone, Debug)]
pub struct AssembledTransaction {
    pub transaction: Transaction,
    /// Position of the fee transfer among the instructions
    pub fee_index: usize,
    pub swap_instruction_count: usize,
}

fn account_flags(header: &MessageHeader, index: usize, num_keys: usize) -> (bool, bool) {
    let signers = usize::from(header.num_required_signatures);
    let is_signer = index < signers;
    let is_writable = if is_signer {
        index < signers.saturating_sub(usize::from(header.num_readonly_signed_accounts))
    } else {
        index < num_keys.saturating_sub(usize::from(header.num_readonly_unsigned_accounts))
    };
    (is_signer, is_writable)
}

/// Turns compiled instructions back into [`Instruction`]s, recovering signer
/// and writable flags from the message header. Order is preserved.
pub fn decompile_instructions(message: &VersionedMessage) -> Result<Vec<Instruction>, AssembleError> {
    if message
        .address_table_lookups()
        .is_some_and(|lookups| !lookups.is_empty())
    {
        return Err(AssembleError::AddressLookupTables);
    }
    let keys = message.static_account_keys();
    let header = message.header();
    let key_at = |index: usize| keys.get(index).copied().ok_or(AssembleError::AccountIndex(index));

    message
        .instructions()
        .iter()
        .map(|compiled| {
            let program_id = key_at(usize::from(compiled.program_id_index))?;
            let accounts = compiled
                .accounts
                .iter()
                .map(|&index| {
                    let index = usize::from(index);
                    let pubkey = key_at(index)?;
                    let (is_signer, is_writable) = account_flags(header, index, keys.len());
                    Ok(AccountMeta {
                        pubkey,
                        is_signer,
                        is_writable,
                    })
                })
                .collect::<Result<Vec<_>, AssembleError>>()?;
            Ok(Instruction {
                program_id,
                accounts,
                data: compiled.data.clone(),
            })
        })
        .collect()
}

/// Decodes the aggregator's base64 swap transaction into its instructions.
pub fn decode_swap_instructions(swap_transaction: &str) -> Result<Vec<Instruction>, AssembleError> {
    let bytes = STANDARD.decode(swap_transaction.trim())?;
    let transaction = bincode::deserialize::<VersionedTransaction>(&bytes)?;
    decompile_instructions(&transaction.message)
}

/// Merges the swap instructions with the fee transfer. The transfer goes in
/// front for buys and at the back for sells.
pub fn assemble(
    swap_transaction: Option<&str>,
    fee: &FeeInstruction,
    placement: FeePlacement,
    recent_blockhash: Hash,
    fee_payer: &Pubkey,
) -> Result<AssembledTransaction, AssembleError> {
    let swap_transaction = swap_transaction
        .filter(|blob| !blob.trim().is_empty())
        .ok_or(AssembleError::MissingSwapTransaction)?;
    let swap_instructions = decode_swap_instructions(swap_transaction)?;
    let swap_instruction_count = swap_instructions.len();

    let mut instructions = Vec::with_capacity(swap_instruction_count + 1);
    let fee_index = match placement {
        FeePlacement::Prepend => {
            instructions.push(fee.to_instruction());
            instructions.extend(swap_instructions);
            0
        }
        FeePlacement::Append => {
            instructions.extend(swap_instructions);
            instructions.push(fee.to_instruction());
            swap_instruction_count
        }
    };

    let message = Message::new_with_blockhash(&instructions, Some(fee_payer), &recent_blockhash);
    Ok(AssembledTransaction {
        transaction: Transaction::new_unsigned(message),
        fee_index,
        swap_instruction_count,
    })
}
