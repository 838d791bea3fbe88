use clap::Parser;
use delegated_swap_api::aggregator::jupiter::DEFAULT_JUPITER_API_URL;
use delegated_swap_api::aggregator::JupiterClient;
use delegated_swap_api::models::{
    SwapIntent, TradeDirection, DEFAULT_SLIPPAGE_BPS, DEFAULT_TOKEN_DECIMALS,
};
use delegated_swap_api::priofee::PriorityLevel;
use delegated_swap_api::quote::QuoteClient;
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;

/// Prints the quote the service would trade on, without touching any wallet.
#[derive(Debug, Parser)]
#[clap(version, about, long_about = None)]
struct Opts {
    #[clap(long, env, default_value = DEFAULT_JUPITER_API_URL)]
    jupiter_api_url: String,

    #[clap(long, env)]
    jupiter_api_key: Option<String>,

    #[clap(long, help = "Token traded against SOL")]
    token_mint: Pubkey,

    #[clap(long, help = "SOL to spend when buying, tokens to sell otherwise")]
    amount: Decimal,

    #[clap(long, help = "Sell the token instead of buying it")]
    sell: bool,

    #[clap(long, default_value_t = DEFAULT_TOKEN_DECIMALS)]
    decimals: u8,
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();
    let opts = Opts::parse();

    let aggregator = JupiterClient::new(opts.jupiter_api_url, reqwest::Client::new())
        .with_api_key(opts.jupiter_api_key);
    let client = QuoteClient::new(Arc::new(aggregator));

    let quote = client
        .quote(&SwapIntent {
            direction: TradeDirection::from_is_buy(!opts.sell),
            amount: opts.amount,
            token_mint: opts.token_mint,
            token_decimals: opts.decimals,
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            priority_level: PriorityLevel::default(),
        })
        .await?;

    log::info!("Quote response: {:#?}", quote.quote_response);
    println!("{}", serde_json::to_string_pretty(&quote)?);
    Ok(())
}
