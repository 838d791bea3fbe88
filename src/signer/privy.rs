use super::{CustodyError, CustodyProvider, LinkedAccount, VerifiedClaims, SOLANA_CHAIN_TYPE};

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use log::debug;
use moka::future::Cache;
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::pkcs8::DecodePublicKey;
use serde::Deserialize;
use serde_json::json;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::Semaphore;

pub const DEFAULT_PRIVY_API_URL: &str = "https://api.privy.io";
pub const DEFAULT_PRIVY_AUTH_URL: &str = "https://auth.privy.io";
/// Linked accounts are reused for this long, so a revoked delegation can
/// still be honoured until the entry expires.
pub const DEFAULT_ACCOUNT_CACHE_TTL: Duration = Duration::from_secs(30);
pub const DEFAULT_ACCOUNT_CACHE_CAPACITY: u64 = 10_000;
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 16;

const TOKEN_ISSUER: &str = "privy.io";
const TOKEN_ALGORITHM: &str = "ES256";

#[derive(Clone, Debug)]
pub struct PrivyConfig {
    pub app_id: String,
    pub app_secret: String,
    /// PEM encoded P-256 public key from the dashboard
    pub verification_key: String,
    pub api_url: String,
    pub auth_url: String,
    pub account_cache_ttl: Duration,
    /// Most users whose linked accounts are kept at once
    pub account_cache_capacity: u64,
    pub max_concurrent_requests: usize,
}

#[derive(Deserialize)]
struct TokenHeader {
    alg: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn contains(&self, app_id: &str) -> bool {
        match self {
            Audience::One(aud) => aud == app_id,
            Audience::Many(auds) => auds.iter().any(|aud| aud == app_id),
        }
    }
}

#[derive(Deserialize)]
struct TokenClaims {
    iss: String,
    aud: Audience,
    sub: String,
    exp: u64,
}

#[derive(Deserialize)]
struct PrivyUser {
    #[serde(default)]
    linked_accounts: Vec<LinkedAccount>,
}

#[derive(Deserialize)]
struct SignTransactionData {
    signed_transaction: Option<String>,
}

#[derive(Deserialize)]
struct SignTransactionResponse {
    data: Option<SignTransactionData>,
}

/// Client for the Privy server API. Tokens are verified locally; users and
/// signatures come from the REST API.
#[derive(Clone)]
pub struct PrivyClient {
    /// Privy app id, also the expected token audience
    app_id: String,
    app_secret: String,
    api_url: String,
    auth_url: String,
    verifying_key: VerifyingKey,
    /// Shared reqwest client
    http: reqwest::Client,
    /// User id -> linked accounts, expired after the configured TTL
    accounts: Cache<String, Vec<LinkedAccount>>,
    /// Bounds concurrent calls to the Privy API
    permits: Arc<Semaphore>,
}

impl PrivyClient {
    pub fn new(config: PrivyConfig, http: reqwest::Client) -> Result<Self, CustodyError> {
        let pem = config.verification_key.replace("\\n", "\n");
        let verifying_key = VerifyingKey::from_public_key_pem(pem.trim())
            .map_err(|e| CustodyError::InvalidKey(e.to_string()))?;
        Ok(Self::with_verifying_key(config, verifying_key, http))
    }

    pub(crate) fn with_verifying_key(
        config: PrivyConfig,
        verifying_key: VerifyingKey,
        http: reqwest::Client,
    ) -> Self {
        PrivyClient {
            app_id: config.app_id,
            app_secret: config.app_secret,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            auth_url: config.auth_url.trim_end_matches('/').to_string(),
            verifying_key,
            http,
            accounts: Cache::builder()
                .max_capacity(config.account_cache_capacity)
                .time_to_live(config.account_cache_ttl)
                .build(),
            permits: Arc::new(Semaphore::new(config.max_concurrent_requests.max(1))),
        }
    }

    fn verify_token_at(&self, token: &str, now: u64) -> Result<VerifiedClaims, CustodyError> {
        let invalid = |reason: &str| CustodyError::InvalidToken(reason.to_string());

        let (signing_input, signature) = token.rsplit_once('.').ok_or_else(|| invalid("not a JWT"))?;
        let (header, payload) = signing_input
            .split_once('.')
            .filter(|(_, payload)| !payload.contains('.'))
            .ok_or_else(|| invalid("not a JWT"))?;

        let header: TokenHeader = serde_json::from_slice(
            &URL_SAFE_NO_PAD
                .decode(header)
                .map_err(|_| invalid("bad header encoding"))?,
        )?;
        if header.alg != TOKEN_ALGORITHM {
            return Err(invalid("unexpected algorithm"));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| invalid("bad signature encoding"))?;
        let signature = Signature::from_slice(&signature).map_err(|_| invalid("bad signature"))?;
        self.verifying_key
            .verify(signing_input.as_bytes(), &signature)
            .map_err(|_| invalid("signature mismatch"))?;

        let claims: TokenClaims = serde_json::from_slice(
            &URL_SAFE_NO_PAD
                .decode(payload)
                .map_err(|_| invalid("bad payload encoding"))?,
        )?;
        if claims.iss != TOKEN_ISSUER {
            return Err(invalid("unexpected issuer"));
        }
        if !claims.aud.contains(&self.app_id) {
            return Err(invalid("unexpected audience"));
        }
        if claims.exp <= now {
            return Err(invalid("token expired"));
        }
        Ok(VerifiedClaims {
            user_id: claims.sub,
        })
    }

    async fn error_for(response: reqwest::Response) -> CustodyError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        CustodyError::Api { status, message }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[async_trait]
impl CustodyProvider for PrivyClient {
    async fn verify_auth_token(&self, token: &str) -> Result<VerifiedClaims, CustodyError> {
        self.verify_token_at(token, unix_now())
    }

    async fn linked_accounts(&self, user_id: &str) -> Result<Vec<LinkedAccount>, CustodyError> {
        if let Some(accounts) = self.accounts.get(user_id).await {
            debug!("Linked accounts for {} served from cache", user_id);
            return Ok(accounts);
        }

        let _permit = self.permits.acquire().await.map_err(|_| CustodyError::Closed)?;
        let response = self
            .http
            .get(format!("{}/api/v1/users/{}", self.auth_url, user_id))
            .basic_auth(&self.app_id, Some(&self.app_secret))
            .header("privy-app-id", &self.app_id)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }
        let user: PrivyUser = serde_json::from_slice(&response.bytes().await?)?;

        self.accounts
            .insert(user_id.to_string(), user.linked_accounts.clone())
            .await;
        Ok(user.linked_accounts)
    }

    async fn sign_transaction(
        &self,
        address: &Pubkey,
        transaction: &[u8],
    ) -> Result<Option<Vec<u8>>, CustodyError> {
        let _permit = self.permits.acquire().await.map_err(|_| CustodyError::Closed)?;
        let response = self
            .http
            .post(format!("{}/v1/wallets/rpc", self.api_url))
            .basic_auth(&self.app_id, Some(&self.app_secret))
            .header("privy-app-id", &self.app_id)
            .json(&json!({
                "address": address.to_string(),
                "chain_type": SOLANA_CHAIN_TYPE,
                "method": "signTransaction",
                "params": {
                    "transaction": STANDARD.encode(transaction),
                    "encoding": "base64",
                }
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let body: SignTransactionResponse = serde_json::from_slice(&response.bytes().await?)?;
        match body.data.and_then(|data| data.signed_transaction) {
            Some(signed) => Ok(Some(STANDARD.decode(signed)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::embedded_wallet;
    use p256::ecdsa::signature::Signer;
    use p256::ecdsa::SigningKey;

    const APP_ID: &str = "test-app";

    fn signing_key() -> SigningKey {
        SigningKey::from_slice(&[7u8; 32]).unwrap()
    }

    fn config(url: &str) -> PrivyConfig {
        PrivyConfig {
            app_id: APP_ID.to_string(),
            app_secret: "secret".to_string(),
            verification_key: String::new(),
            api_url: url.to_string(),
            auth_url: url.to_string(),
            account_cache_ttl: DEFAULT_ACCOUNT_CACHE_TTL,
            account_cache_capacity: DEFAULT_ACCOUNT_CACHE_CAPACITY,
            max_concurrent_requests: 2,
        }
    }

    fn client(url: &str) -> PrivyClient {
        PrivyClient::with_verifying_key(
            config(url),
            *signing_key().verifying_key(),
            reqwest::Client::new(),
        )
    }

    fn token(key: &SigningKey, alg: &str, claims: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(json!({"alg": alg, "typ": "JWT"}).to_string());
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        let input = format!("{header}.{payload}");
        let signature: Signature = key.sign(input.as_bytes());
        format!("{input}.{}", URL_SAFE_NO_PAD.encode(signature.to_bytes()))
    }

    fn claims(exp: u64) -> serde_json::Value {
        json!({"iss": "privy.io", "aud": APP_ID, "sub": "did:privy:abc", "sid": "s", "exp": exp})
    }

    #[test]
    fn accepts_valid_token() {
        let client = client("http://localhost");
        let token = token(&signing_key(), "ES256", claims(2_000));
        let verified = client.verify_token_at(&token, 1_000).unwrap();
        assert_eq!(verified.user_id, "did:privy:abc");
    }

    #[test]
    fn rejects_expired_token() {
        let client = client("http://localhost");
        let token = token(&signing_key(), "ES256", claims(1_000));
        assert!(matches!(
            client.verify_token_at(&token, 1_000),
            Err(CustodyError::InvalidToken(_))
        ));
    }

    #[test]
    fn rejects_foreign_signature_and_claims() {
        let client = client("http://localhost");
        let other = SigningKey::from_slice(&[9u8; 32]).unwrap();
        let forged = token(&other, "ES256", claims(2_000));
        assert!(client.verify_token_at(&forged, 1_000).is_err());

        let wrong_aud = token(
            &signing_key(),
            "ES256",
            json!({"iss": "privy.io", "aud": "other-app", "sub": "u", "exp": 2_000}),
        );
        assert!(client.verify_token_at(&wrong_aud, 1_000).is_err());

        let wrong_iss = token(
            &signing_key(),
            "ES256",
            json!({"iss": "evil.io", "aud": APP_ID, "sub": "u", "exp": 2_000}),
        );
        assert!(client.verify_token_at(&wrong_iss, 1_000).is_err());

        let wrong_alg = token(&signing_key(), "HS256", claims(2_000));
        assert!(client.verify_token_at(&wrong_alg, 1_000).is_err());

        assert!(client.verify_token_at("not-a-token", 1_000).is_err());
    }

    #[test]
    fn invalid_pem_is_rejected() {
        let mut config = config("http://localhost");
        config.verification_key = "-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----".to_string();
        assert!(matches!(
            PrivyClient::new(config, reqwest::Client::new()),
            Err(CustodyError::InvalidKey(_))
        ));
    }

    fn user_body(address: &Pubkey) -> String {
        json!({
            "id": "did:privy:abc",
            "created_at": 1,
            "linked_accounts": [
                {"type": "email", "address": "a@b.c"},
                {
                    "type": "wallet",
                    "address": address.to_string(),
                    "chain_type": "solana",
                    "wallet_client_type": "privy",
                    "delegated": true
                }
            ]
        })
        .to_string()
    }

    #[tokio::test]
    async fn caches_linked_accounts() {
        let mut server = mockito::Server::new_async().await;
        let address = Pubkey::new_unique();
        let mock = server
            .mock("GET", "/api/v1/users/did:privy:abc")
            .match_header("privy-app-id", APP_ID)
            .match_header("authorization", mockito::Matcher::Regex("^Basic ".to_string()))
            .with_status(200)
            .with_body(user_body(&address))
            .expect(1)
            .create_async()
            .await;

        let client = client(&server.url());
        for _ in 0..2 {
            let accounts = client.linked_accounts("did:privy:abc").await.unwrap();
            assert_eq!(accounts.len(), 2);
            assert_eq!(accounts[1], embedded_wallet(&address, true));
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn expired_accounts_are_fetched_again() {
        let mut server = mockito::Server::new_async().await;
        let address = Pubkey::new_unique();
        let mock = server
            .mock("GET", "/api/v1/users/did:privy:abc")
            .with_status(200)
            .with_body(user_body(&address))
            .expect(2)
            .create_async()
            .await;

        let mut config = config(&server.url());
        config.account_cache_ttl = Duration::from_millis(50);
        let client = PrivyClient::with_verifying_key(
            config,
            *signing_key().verifying_key(),
            reqwest::Client::new(),
        );
        client.linked_accounts("did:privy:abc").await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        let accounts = client.linked_accounts("did:privy:abc").await.unwrap();
        assert_eq!(accounts[1], embedded_wallet(&address, true));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn user_lookup_error_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/users/did:privy:gone")
            .with_status(404)
            .with_body(r#"{"error":"User not found"}"#)
            .create_async()
            .await;
        let err = client(&server.url())
            .linked_accounts("did:privy:gone")
            .await
            .unwrap_err();
        assert!(matches!(err, CustodyError::Api { status: 404, .. }));
    }

    #[tokio::test]
    async fn signs_through_wallet_rpc() {
        let mut server = mockito::Server::new_async().await;
        let address = Pubkey::new_unique();
        let mock = server
            .mock("POST", "/v1/wallets/rpc")
            .match_body(mockito::Matcher::PartialJson(json!({
                "address": address.to_string(),
                "chain_type": "solana",
                "method": "signTransaction",
                "params": {"transaction": STANDARD.encode([1u8, 2, 3]), "encoding": "base64"}
            })))
            .with_status(200)
            .with_body(
                json!({
                    "method": "signTransaction",
                    "data": {"signed_transaction": STANDARD.encode([4u8, 5, 6]), "encoding": "base64"}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let signed = client(&server.url())
            .sign_transaction(&address, &[1, 2, 3])
            .await
            .unwrap();
        assert_eq!(signed, Some(vec![4, 5, 6]));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_signed_transaction_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/wallets/rpc")
            .with_status(200)
            .with_body(r#"{"method":"signTransaction","data":{}}"#)
            .create_async()
            .await;
        let signed = client(&server.url())
            .sign_transaction(&Pubkey::new_unique(), &[1])
            .await
            .unwrap();
        assert_eq!(signed, None);
    }
}
