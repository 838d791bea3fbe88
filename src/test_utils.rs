use crate::aggregator::{AggregatorError, SwapAggregator};
use crate::models::{
    QuoteRequest, QuoteResponse, RoutePlanStep, SwapInfo, SwapMode, SwapRequest, SwapResponse,
    TradeDirection,
};
use crate::network::{ConfirmationLevel, NetworkError, SendOptions, SignatureState, SolanaNetwork};
use crate::priofee::{PriofeeError, PriorityFeeLevels, PriorityFeeSource};
use crate::signer::{
    CustodyError, CustodyProvider, LinkedAccount, VerifiedClaims, WalletAccount,
    EMBEDDED_WALLET_CLIENT_TYPE, SOLANA_CHAIN_TYPE,
};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Map;
use solana_sdk::compute_budget::ComputeBudgetInstruction;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use solana_sdk::system_instruction;
use solana_sdk::transaction::Transaction;

pub const TEST_USER_ID: &str = "did:privy:test-user";

const SWAP_PROGRAM: Pubkey = Pubkey::new_from_array([42; 32]);

impl SignatureState {
    pub fn pending() -> Self {
        SignatureState {
            confirmation: Some(ConfirmationLevel::Processed),
            err: None,
        }
    }

    pub fn confirmed() -> Self {
        SignatureState {
            confirmation: Some(ConfirmationLevel::Confirmed),
            err: None,
        }
    }

    pub fn finalized() -> Self {
        SignatureState {
            confirmation: Some(ConfirmationLevel::Finalized),
            err: None,
        }
    }

    pub fn failed(reason: &str) -> Self {
        SignatureState {
            confirmation: Some(ConfirmationLevel::Confirmed),
            err: Some(reason.to_string()),
        }
    }
}

/// A compute budget instruction followed by `n - 1` swap-program instructions.
/// Every swap instruction has the payer as writable signer, a writable pool
/// and a readonly mint as its third account.
pub fn swap_instructions(payer: &Pubkey, n: usize) -> Vec<Instruction> {
    let mut instructions = vec![ComputeBudgetInstruction::set_compute_unit_limit(200_000)];
    for i in 1..n {
        let seed = i as u8;
        instructions.push(Instruction::new_with_bytes(
            SWAP_PROGRAM,
            &[0xe4, seed, 0x01, 0x02],
            vec![
                AccountMeta::new(*payer, true),
                AccountMeta::new(Pubkey::new_from_array([seed; 32]), false),
                AccountMeta::new_readonly(Pubkey::new_from_array([100 + seed; 32]), false),
            ],
        ));
    }
    instructions
}

/// What the aggregator returns from `/swap`: an unsigned legacy transaction, base64.
pub fn swap_blob(payer: &Pubkey, n: usize) -> String {
    let message = Message::new_with_blockhash(
        &swap_instructions(payer, n),
        Some(payer),
        &Hash::new_from_array([9; 32]),
    );
    let tx = Transaction::new_unsigned(message);
    STANDARD.encode(bincode::serialize(&tx).unwrap())
}

pub fn signed_transfer(blockhash: Hash) -> Transaction {
    let payer = Keypair::new();
    let ix = system_instruction::transfer(&payer.pubkey(), &Pubkey::new_unique(), 5_000);
    Transaction::new_signed_with_payer(&[ix], Some(&payer.pubkey()), &[&payer], blockhash)
}

pub fn sample_quote(direction: TradeDirection, in_amount: u64, out_amount: u64) -> QuoteResponse {
    let token = Pubkey::new_from_array([77; 32]);
    let (input_mint, output_mint) = direction.mints(token);
    QuoteResponse {
        input_mint,
        in_amount,
        output_mint,
        out_amount,
        other_amount_threshold: out_amount,
        swap_mode: SwapMode::ExactIn,
        slippage_bps: 0,
        platform_fee: None,
        price_impact_pct: "0.0012".to_string(),
        route_plan: vec![RoutePlanStep {
            swap_info: SwapInfo {
                amm_key: Pubkey::new_from_array([5; 32]).to_string(),
                label: Some("Raydium".to_string()),
                input_mint: input_mint.to_string(),
                output_mint: output_mint.to_string(),
                in_amount: in_amount.to_string(),
                out_amount: out_amount.to_string(),
                extra: Map::new(),
            },
            percent: 100,
        }],
        context_slot: Some(1),
        time_taken: Some(0.01),
        extra: Map::new(),
    }
}

pub enum FakeQuote {
    Ok(QuoteResponse),
    Status(u16, String),
    NoRoute,
}

/// Records every request. Swap builds return [`swap_blob`] for the requesting
/// user with `swap_instruction_count` instructions.
pub struct FakeAggregator {
    quote: FakeQuote,
    quote_requests: Mutex<Vec<QuoteRequest>>,
    swap_requests: Mutex<Vec<SwapRequest>>,
    swap_instruction_count: usize,
    fail_swap_builds: AtomicBool,
    omit_swap_transaction: AtomicBool,
}

impl Default for FakeAggregator {
    fn default() -> Self {
        Self::with_quote(FakeQuote::Ok(sample_quote(TradeDirection::Buy, 990_000_000, 5_000_000)))
    }
}

impl FakeAggregator {
    pub fn with_quote(quote: FakeQuote) -> Self {
        FakeAggregator {
            quote,
            quote_requests: Mutex::new(Vec::new()),
            swap_requests: Mutex::new(Vec::new()),
            swap_instruction_count: 3,
            fail_swap_builds: AtomicBool::new(false),
            omit_swap_transaction: AtomicBool::new(false),
        }
    }

    pub fn quote_calls(&self) -> usize {
        self.quote_requests.lock().unwrap().len()
    }

    pub fn quote_requests(&self) -> Vec<QuoteRequest> {
        self.quote_requests.lock().unwrap().clone()
    }

    pub fn swap_requests(&self) -> Vec<SwapRequest> {
        self.swap_requests.lock().unwrap().clone()
    }

    pub fn fail_swap_builds(&self) {
        self.fail_swap_builds.store(true, Ordering::SeqCst);
    }

    pub fn omit_swap_transaction(&self) {
        self.omit_swap_transaction.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SwapAggregator for FakeAggregator {
    async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, AggregatorError> {
        self.quote_requests.lock().unwrap().push(request.clone());
        match &self.quote {
            FakeQuote::Ok(response) => Ok(response.clone()),
            FakeQuote::Status(status, message) => Err(AggregatorError::Api {
                status: *status,
                message: message.clone(),
            }),
            FakeQuote::NoRoute => Err(AggregatorError::NoRoute(
                "COULD_NOT_FIND_ANY_ROUTE".to_string(),
            )),
        }
    }

    async fn build_swap_transaction(
        &self,
        request: &SwapRequest,
    ) -> Result<SwapResponse, AggregatorError> {
        self.swap_requests.lock().unwrap().push(request.clone());
        if self.fail_swap_builds.load(Ordering::SeqCst) {
            return Err(AggregatorError::Api {
                status: 500,
                message: "swap build failed".to_string(),
            });
        }
        let swap_transaction = (!self.omit_swap_transaction.load(Ordering::SeqCst))
            .then(|| swap_blob(&request.user_public_key, self.swap_instruction_count));
        Ok(SwapResponse {
            swap_transaction,
            last_valid_block_height: Some(1_000),
            prioritization_fee_lamports: Some(request.prioritization_fee_lamports),
        })
    }
}

pub struct FakePriorityFees {
    levels: Option<PriorityFeeLevels>,
    transactions: Mutex<Vec<String>>,
}

impl FakePriorityFees {
    pub fn medium(medium: f64) -> Self {
        FakePriorityFees {
            levels: Some(PriorityFeeLevels {
                min: 0.0,
                low: medium / 2.0,
                medium,
                high: medium * 2.0,
                very_high: medium * 4.0,
                unsafe_max: medium * 8.0,
            }),
            transactions: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        FakePriorityFees {
            levels: None,
            transactions: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.transactions.lock().unwrap().len()
    }
}

#[async_trait]
impl PriorityFeeSource for FakePriorityFees {
    async fn fee_levels(&self, transaction: &str) -> Result<PriorityFeeLevels, PriofeeError> {
        self.transactions.lock().unwrap().push(transaction.to_string());
        self.levels
            .ok_or_else(|| PriofeeError::Rpc("estimator unavailable".to_string()))
    }
}

pub fn embedded_wallet(address: &Pubkey, delegated: bool) -> LinkedAccount {
    LinkedAccount::Wallet(WalletAccount {
        address: address.to_string(),
        chain_type: SOLANA_CHAIN_TYPE.to_string(),
        wallet_client_type: Some(EMBEDDED_WALLET_CLIENT_TYPE.to_string()),
        delegated,
    })
}

/// Custody backed by a local keypair.
pub struct FakeCustody {
    keypair: Keypair,
    accounts: Vec<LinkedAccount>,
    reject_tokens: bool,
    return_no_signature: bool,
    sign_calls: AtomicUsize,
}

impl FakeCustody {
    pub fn new(accounts: Vec<LinkedAccount>) -> Self {
        FakeCustody {
            keypair: Keypair::new(),
            accounts,
            reject_tokens: false,
            return_no_signature: false,
            sign_calls: AtomicUsize::new(0),
        }
    }

    /// One delegated embedded wallet whose key this fake holds.
    pub fn with_signing_wallet() -> Self {
        let keypair = Keypair::new();
        let accounts = vec![embedded_wallet(&keypair.pubkey(), true)];
        FakeCustody {
            keypair,
            ..FakeCustody::new(accounts)
        }
    }

    pub fn rejecting_tokens(mut self) -> Self {
        self.reject_tokens = true;
        self
    }

    pub fn returning_no_signature(mut self) -> Self {
        self.return_no_signature = true;
        self
    }

    pub fn wallet_address(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CustodyProvider for FakeCustody {
    async fn verify_auth_token(&self, token: &str) -> Result<VerifiedClaims, CustodyError> {
        if self.reject_tokens || token.is_empty() {
            return Err(CustodyError::InvalidToken("token rejected".to_string()));
        }
        Ok(VerifiedClaims {
            user_id: TEST_USER_ID.to_string(),
        })
    }

    async fn linked_accounts(&self, _user_id: &str) -> Result<Vec<LinkedAccount>, CustodyError> {
        Ok(self.accounts.clone())
    }

    async fn sign_transaction(
        &self,
        _address: &Pubkey,
        transaction: &[u8],
    ) -> Result<Option<Vec<u8>>, CustodyError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        if self.return_no_signature {
            return Ok(None);
        }
        let mut tx: Transaction = bincode::deserialize(transaction)
            .map_err(|e| CustodyError::InvalidToken(e.to_string()))?;
        let blockhash = tx.message.recent_blockhash;
        // a key mismatch leaves the transaction unsigned
        let _ = tx.try_partial_sign(&[&self.keypair], blockhash);
        Ok(Some(bincode::serialize(&tx).unwrap()))
    }
}

/// An RPC node that accepts every broadcast and replays scripted statuses.
/// Once the script runs out, signatures are reported as unseen.
pub struct FakeNetwork {
    pub blockhash: Hash,
    statuses: Mutex<VecDeque<Result<Option<SignatureState>, String>>>,
    blockhash_failures: AtomicUsize,
    blockhash_calls: AtomicUsize,
    status_calls: AtomicUsize,
    fail_sends: AtomicBool,
    sent: Mutex<Vec<Transaction>>,
    send_options: Mutex<Vec<SendOptions>>,
}

impl Default for FakeNetwork {
    fn default() -> Self {
        Self::with_statuses(Vec::new())
    }
}

impl FakeNetwork {
    pub fn with_statuses(statuses: Vec<Result<Option<SignatureState>, String>>) -> Self {
        FakeNetwork {
            blockhash: Hash::new_unique(),
            statuses: Mutex::new(statuses.into()),
            blockhash_failures: AtomicUsize::new(0),
            blockhash_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            fail_sends: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            send_options: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_blockhash_times(&self, times: usize) {
        self.blockhash_failures.store(times, Ordering::SeqCst);
    }

    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    pub fn blockhash_calls(&self) -> usize {
        self.blockhash_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<Transaction> {
        self.sent.lock().unwrap().clone()
    }

    pub fn send_options(&self) -> Vec<SendOptions> {
        self.send_options.lock().unwrap().clone()
    }
}

#[async_trait]
impl SolanaNetwork for FakeNetwork {
    async fn latest_blockhash(&self) -> Result<Hash, NetworkError> {
        self.blockhash_calls.fetch_add(1, Ordering::SeqCst);
        let failures = self.blockhash_failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.blockhash_failures.store(failures - 1, Ordering::SeqCst);
            return Err(NetworkError::Other("blockhash unavailable".to_string()));
        }
        Ok(self.blockhash)
    }

    async fn send_raw_transaction(
        &self,
        transaction: &Transaction,
        options: SendOptions,
    ) -> Result<Signature, NetworkError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(NetworkError::Other("node rejected transaction".to_string()));
        }
        self.sent.lock().unwrap().push(transaction.clone());
        self.send_options.lock().unwrap().push(options);
        Ok(transaction.signatures[0])
    }

    async fn signature_status(
        &self,
        _signature: &Signature,
    ) -> Result<Option<SignatureState>, NetworkError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        match self.statuses.lock().unwrap().pop_front() {
            Some(Ok(state)) => Ok(state),
            Some(Err(e)) => Err(NetworkError::Other(e)),
            None => Ok(None),
        }
    }
}
