//! The shipped configuration file parses and validates.

use extmm_bot::{AppConfig, OperatingMode};
use extmm_core::SelfTradeProtection;
use rust_decimal_macros::dec;

fn shipped_path() -> String {
    format!("{}/../../config/default.toml", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn test_default_toml_loads() {
    let config = AppConfig::from_file(&shipped_path()).unwrap();
    assert_eq!(config.mode, OperatingMode::Observation);
    assert_eq!(config.self_trade_protection().unwrap(), SelfTradeProtection::Account);
    assert_eq!(config.metrics_port, Some(9100));
    assert_eq!(config.risk.max_net_position_usd, dec!(200));
    assert!(config.fees_override.is_none());

    let enabled: Vec<_> = config.enabled_markets().map(|m| m.name.clone()).collect();
    assert_eq!(enabled, vec!["BTC-USD".to_string()]);
    let btc = &config.markets[0];
    assert_eq!(btc.quoting.min_order_size, dec!(0.0001));
    assert_eq!(btc.quoting.quote_notional_cap_usd, dec!(50));

    let eth = &config.markets[1];
    assert!(!eth.enabled);
    assert_eq!(eth.fallback_rules().price_tick.inner(), dec!(0.1));
}

#[test]
fn test_load_prefers_existing_file() {
    let loaded = AppConfig::load(&shipped_path()).unwrap();
    assert_eq!(loaded.markets.len(), 2);
}
