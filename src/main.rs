use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use delegated_swap_api::aggregator::jupiter::DEFAULT_JUPITER_API_URL;
use delegated_swap_api::aggregator::JupiterClient;
use delegated_swap_api::blockhash::DEFAULT_BLOCKHASH_RETRIES;
use delegated_swap_api::fee::FEE_COLLECTOR;
use delegated_swap_api::handlers;
use delegated_swap_api::network::RpcNetwork;
use delegated_swap_api::priofee::HeliusPriorityFees;
use delegated_swap_api::signer::privy::{
    DEFAULT_ACCOUNT_CACHE_CAPACITY, DEFAULT_ACCOUNT_CACHE_TTL, DEFAULT_MAX_CONCURRENT_REQUESTS,
    DEFAULT_PRIVY_API_URL, DEFAULT_PRIVY_AUTH_URL,
};
use delegated_swap_api::signer::{PrivyClient, PrivyConfig};
use delegated_swap_api::submit::{
    ConfirmationPolicy, CONFIRMATION_POLL_DELAY, MAX_CONFIRMATION_ATTEMPTS,
};
use delegated_swap_api::swap::{SwapService, SwapSettings};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;

#[derive(Debug, Parser)]
#[clap(version, about, long_about = None)]
pub struct Opts {
    #[clap(long, env, help = "Solana cluster RPC-URL")]
    rpc_url: String,

    #[clap(long, env, help = "Separate RPC-URL to submit transactions to")]
    send_rpc_url: Option<String>,

    #[clap(long, env, default_value = DEFAULT_JUPITER_API_URL, help = "Jupiter swap API base URL")]
    jupiter_api_url: String,

    #[clap(long, env, help = "Jupiter API key, if the endpoint requires one")]
    jupiter_api_key: Option<String>,

    #[clap(long, env, help = "The URL to make priority fee requests to")]
    priofee_url: String,

    #[clap(long, env, help = "Privy app id")]
    privy_app_id: String,

    #[clap(long, env, help = "Privy app secret")]
    privy_app_secret: String,

    #[clap(long, env, help = "Privy token verification key (PEM)")]
    privy_verification_key: String,

    #[clap(long, env, default_value = DEFAULT_PRIVY_API_URL, help = "Privy wallet API base URL")]
    privy_api_url: String,

    #[clap(long, env, default_value = DEFAULT_PRIVY_AUTH_URL, help = "Privy auth API base URL")]
    privy_auth_url: String,

    #[clap(long, env, help = "Receiver of the protocol fee")]
    fee_collector: Option<Pubkey>,

    #[clap(long, env, help = "Cap on the priority fee, in lamports")]
    max_priority_fee_lamports: Option<u64>,

    #[clap(long, env, value_parser = clap::value_parser!(u8).range(1..), help = "How many times to poll for confirmation")]
    confirm_max_attempts: Option<u8>,

    #[clap(long, env, help = "Delay between confirmation polls (in milliseconds)")]
    confirm_poll_delay_ms: Option<u64>,

    #[clap(long, env, help = "How long to cache a user's linked accounts (in seconds)")]
    account_cache_ttl_secs: Option<u64>,

    #[clap(long, env, help = "Server host")]
    host: String,

    #[clap(long, env, help = "Server port")]
    port: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();
    let opts = Opts::parse();

    let http = reqwest::Client::new();
    let commitment_config = CommitmentConfig::confirmed();
    let rpc_client = Arc::new(RpcClient::new_with_commitment(
        opts.rpc_url,
        commitment_config,
    ));
    let send_client = opts
        .send_rpc_url
        .map(|url| Arc::new(RpcClient::new_with_commitment(url, commitment_config)));

    let privy = PrivyClient::new(
        PrivyConfig {
            app_id: opts.privy_app_id,
            app_secret: opts.privy_app_secret,
            verification_key: opts.privy_verification_key,
            api_url: opts.privy_api_url,
            auth_url: opts.privy_auth_url,
            account_cache_ttl: opts
                .account_cache_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_ACCOUNT_CACHE_TTL),
            account_cache_capacity: DEFAULT_ACCOUNT_CACHE_CAPACITY,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        },
        http.clone(),
    )?;

    let settings = SwapSettings {
        fee_collector: opts.fee_collector.unwrap_or(FEE_COLLECTOR),
        max_priority_fee_lamports: opts.max_priority_fee_lamports,
        confirmation: ConfirmationPolicy {
            max_attempts: opts
                .confirm_max_attempts
                .map(usize::from)
                .unwrap_or(MAX_CONFIRMATION_ATTEMPTS),
            poll_delay: opts
                .confirm_poll_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(CONFIRMATION_POLL_DELAY),
        },
        blockhash_retries: DEFAULT_BLOCKHASH_RETRIES,
    };

    let service = SwapService::new(
        Arc::new(
            JupiterClient::new(opts.jupiter_api_url, http.clone())
                .with_api_key(opts.jupiter_api_key),
        ),
        Arc::new(HeliusPriorityFees::new(opts.priofee_url, http)),
        Arc::new(privy),
        Arc::new(RpcNetwork::new(rpc_client, send_client)),
        settings,
    );
    let socket_addr = format!("{}:{}", opts.host, opts.port).parse::<SocketAddr>()?;

    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/quote", get(handlers::quote::quote))
        .route("/swap", post(handlers::swap::swap))
        .route("/api/swap", post(handlers::swap::swap))
        .route("/transfer", post(handlers::transfer::transfer))
        .with_state(service)
        .layer(CorsLayer::permissive());

    log::info!("Delegated Swap API running on {}", socket_addr);
    axum::Server::bind(&socket_addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
