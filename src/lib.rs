pub mod aggregator;
pub mod blockhash;
pub mod fee;
pub mod handlers;
pub mod models;
pub mod network;
pub mod priofee;
pub mod quote;
pub mod serde_helpers;
pub mod signer;
pub mod submit;
pub mod swap;
pub mod tx_utils;

#[cfg(test)]
mod test_utils;
#[cfg(test)]
mod tests;
