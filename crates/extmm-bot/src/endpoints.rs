//! Venue endpoints per environment.

use crate::config::Environment;
use extmm_core::MarketName;

/// Browser origin the account stream expects.
pub const ACCOUNT_ORIGIN: &str = "https://app.extended.exchange";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub rest_base: String,
    pub ws_base: String,
    /// Account stream targets, tried in order.
    pub account_candidates: Vec<String>,
}

impl Endpoints {
    pub fn for_environment(environment: Environment) -> Self {
        let (rest_base, ws_base) = match environment {
            Environment::Testnet => (
                "https://api.starknet.sepolia.extended.exchange/api/v1",
                "wss://starknet.sepolia.extended.exchange/stream.extended.exchange/v1",
            ),
            Environment::Mainnet => (
                "https://api.starknet.extended.exchange/api/v1",
                "wss://api.starknet.extended.exchange/stream.extended.exchange/v1",
            ),
        };
        let mut account_candidates = vec![format!("{ws_base}/account")];
        if environment == Environment::Mainnet {
            account_candidates
                .push("ws://api.starknet.extended.exchange/stream.extended.exchange/v1/account".to_string());
        }
        Self {
            rest_base: rest_base.to_string(),
            ws_base: ws_base.to_string(),
            account_candidates,
        }
    }

    pub fn orderbook_url(&self, market: &MarketName) -> String {
        format!("{}/orderbooks/{}", self.ws_base, market)
    }
}
