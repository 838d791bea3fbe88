pub mod privy;

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::Transaction;
use thiserror::Error;

pub use privy::{PrivyClient, PrivyConfig};

pub const SOLANA_CHAIN_TYPE: &str = "solana";
/// Wallet client type of the provider's custodial embedded wallets
pub const EMBEDDED_WALLET_CLIENT_TYPE: &str = "privy";

#[derive(Debug, Error)]
pub enum CustodyError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Invalid verification key: {0}")]
    InvalidKey(String),
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error("Custody provider error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Failed to decode custody provider response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid signed transaction encoding: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Custody provider client is shut down")]
    Closed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedClaims {
    pub user_id: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct WalletAccount {
    pub address: String,
    #[serde(alias = "chainType")]
    pub chain_type: String,
    #[serde(default, alias = "walletClientType")]
    pub wallet_client_type: Option<String>,
    #[serde(default)]
    pub delegated: bool,
}

impl WalletAccount {
    fn is_delegated_embedded_solana(&self) -> bool {
        self.delegated
            && self.chain_type == SOLANA_CHAIN_TYPE
            && self.wallet_client_type.as_deref() == Some(EMBEDDED_WALLET_CLIENT_TYPE)
    }
}

/// One of the accounts linked to a user. Only wallets matter for signing.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkedAccount {
    Wallet(WalletAccount),
    Email {
        #[serde(default)]
        address: String,
    },
    Phone {
        #[serde(default, alias = "phoneNumber")]
        number: String,
    },
    #[serde(other)]
    Other,
}

/// Holding one proves the token was verified and the wallet is delegated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DelegatedWallet {
    pub user_id: String,
    pub address: Pubkey,
}

/// The identity and custody provider: verifies tokens, knows the user's
/// linked accounts, and signs with delegated keys it never hands out.
#[async_trait]
pub trait CustodyProvider: Send + Sync {
    async fn verify_auth_token(&self, token: &str) -> Result<VerifiedClaims, CustodyError>;

    async fn linked_accounts(&self, user_id: &str) -> Result<Vec<LinkedAccount>, CustodyError>;

    /// Returns the signed transaction bytes, or `None` if the provider gave
    /// back no signed payload.
    async fn sign_transaction(
        &self,
        address: &Pubkey,
        transaction: &[u8],
    ) -> Result<Option<Vec<u8>>, CustodyError>;
}

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("Invalid authorization token: {0}")]
    AuthInvalid(String),
    #[error("{0}")]
    NoDelegatedWallet(String),
    #[error("Signing rejected: {0}")]
    SigningRejected(String),
    #[error("Custody provider error: {0}")]
    Provider(#[source] CustodyError),
}

/// Delegated embedded Solana wallets, in linked-account order
pub fn delegated_wallets(accounts: &[LinkedAccount]) -> Vec<Pubkey> {
    accounts
        .iter()
        .filter_map(|account| match account {
            LinkedAccount::Wallet(wallet) if wallet.is_delegated_embedded_solana() => {
                Pubkey::from_str(&wallet.address).ok()
            }
            LinkedAccount::Wallet(_)
            | LinkedAccount::Email { .. }
            | LinkedAccount::Phone { .. }
            | LinkedAccount::Other => None,
        })
        .collect()
}

/// Drives a request from an auth token to a signed transaction:
/// token verified, wallet resolved, delegation checked, then signed.
#[derive(Clone)]
pub struct DelegatedSigner {
    provider: Arc<dyn CustodyProvider>,
}

impl DelegatedSigner {
    pub fn new(provider: Arc<dyn CustodyProvider>) -> Self {
        DelegatedSigner { provider }
    }

    async fn delegated_addresses(&self, auth_token: &str) -> Result<(String, Vec<Pubkey>), SignerError> {
        let claims = self
            .provider
            .verify_auth_token(auth_token)
            .await
            .map_err(|e| SignerError::AuthInvalid(e.to_string()))?;
        debug!("Token verified for {}", claims.user_id);

        let accounts = self
            .provider
            .linked_accounts(&claims.user_id)
            .await
            .map_err(SignerError::Provider)?;
        Ok((claims.user_id, delegated_wallets(&accounts)))
    }

    /// Resolves the first delegated embedded Solana wallet of the caller.
    pub async fn resolve_wallet(&self, auth_token: &str) -> Result<DelegatedWallet, SignerError> {
        let (user_id, wallets) = self.delegated_addresses(auth_token).await?;
        let address = wallets.first().copied().ok_or_else(|| {
            SignerError::NoDelegatedWallet("No delegated wallet found".to_string())
        })?;
        info!("Using delegated wallet {} for {}", address, user_id);
        Ok(DelegatedWallet { user_id, address })
    }

    /// Like [`Self::resolve_wallet`], for a caller-named address.
    pub async fn verify_delegated_address(
        &self,
        auth_token: &str,
        address: &Pubkey,
    ) -> Result<DelegatedWallet, SignerError> {
        let (user_id, wallets) = self.delegated_addresses(auth_token).await?;
        if !wallets.contains(address) {
            return Err(SignerError::NoDelegatedWallet(format!(
                "Wallet {} is not delegated",
                address
            )));
        }
        Ok(DelegatedWallet {
            user_id,
            address: *address,
        })
    }

    /// Has the provider sign `transaction` with the delegated key. The signed
    /// copy must carry the same message and a complete set of signatures.
    pub async fn sign(
        &self,
        wallet: &DelegatedWallet,
        transaction: Transaction,
    ) -> Result<Transaction, SignerError> {
        let payload = bincode::serialize(&transaction)
            .map_err(|e| SignerError::SigningRejected(format!("unserializable transaction: {e}")))?;
        let signed = self
            .provider
            .sign_transaction(&wallet.address, &payload)
            .await
            .map_err(SignerError::Provider)?
            .ok_or_else(|| {
                SignerError::SigningRejected("No signed transaction in response".to_string())
            })?;

        let signed = bincode::deserialize::<Transaction>(&signed).map_err(|e| {
            SignerError::SigningRejected(format!("undecodable signed transaction: {e}"))
        })?;
        if signed.message != transaction.message {
            return Err(SignerError::SigningRejected(
                "signed transaction differs from the one submitted".to_string(),
            ));
        }
        if !signed.is_signed() {
            return Err(SignerError::SigningRejected(
                "signed transaction is missing signatures".to_string(),
            ));
        }
        debug!("Got signed transaction for {}", wallet.address);
        Ok(signed)
    }
}
