//! Application configuration.

use crate::error::{AppError, AppResult};
use extmm_core::{MarketName, MarketRules, Price, SelfTradeProtection, Size, TimeInForce};
use extmm_executor::ExecutionSettings;
use extmm_feed::BookConfig;
use extmm_position::FeeRates;
use extmm_quote::QuotingConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Floor for the quote loop interval.
pub const MIN_QUOTE_LOOP_MS: u64 = 50;

/// Operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    /// Full loop against the paper gateway.
    #[default]
    Observation,
    /// Orders go to the embedder-supplied gateway.
    Trading,
}

/// Venue deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Testnet,
    Mainnet,
}

impl FromStr for Environment {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "testnet" => Ok(Self::Testnet),
            "mainnet" => Ok(Self::Mainnet),
            _ => Err(AppError::UnsupportedEnvironment(s.to_string())),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Testnet => write!(f, "testnet"),
            Self::Mainnet => write!(f, "mainnet"),
        }
    }
}

/// Account-wide risk limits and advisory breaker thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSettings {
    /// Max |position| notional per market (USD). Converted to units every tick.
    #[serde(default = "default_max_net_position_usd")]
    pub max_net_position_usd: Decimal,
    #[serde(default = "default_max_open_orders")]
    pub max_open_orders: usize,
    /// σ above which the volatility breaker trips.
    #[serde(default = "default_sigma_limit")]
    pub sigma_limit: Decimal,
    /// Book staleness above which the latency breaker trips.
    #[serde(default = "default_latency_threshold_ms")]
    pub latency_threshold_ms: u64,
}

fn default_max_net_position_usd() -> Decimal {
    dec!(200)
}

fn default_max_open_orders() -> usize {
    30
}

fn default_sigma_limit() -> Decimal {
    dec!(0.005)
}

fn default_latency_threshold_ms() -> u64 {
    2_000
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            max_net_position_usd: default_max_net_position_usd(),
            max_open_orders: default_max_open_orders(),
            sigma_limit: default_sigma_limit(),
            latency_threshold_ms: default_latency_threshold_ms(),
        }
    }
}

/// One quoted market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Venue symbol, e.g. `BTC-USD`.
    pub name: String,
    #[serde(default = "default_replace_threshold_bps")]
    pub replace_threshold_bps: Decimal,
    #[serde(default = "default_true")]
    pub post_only: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Used when the venue's market description has no tick.
    #[serde(default)]
    pub price_tick: Option<Decimal>,
    /// Used when the venue's market description has no size increment.
    #[serde(default)]
    pub size_increment: Option<Decimal>,
    #[serde(flatten)]
    pub quoting: QuotingConfig,
}

fn default_replace_threshold_bps() -> Decimal {
    dec!(2)
}

fn default_true() -> bool {
    true
}

impl MarketConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            replace_threshold_bps: default_replace_threshold_bps(),
            post_only: true,
            enabled: true,
            price_tick: None,
            size_increment: None,
            quoting: QuotingConfig::default(),
        }
    }

    pub fn market(&self) -> MarketName {
        MarketName::new(&self.name)
    }

    /// Rules to fall back on when hydration fails or is incomplete.
    pub fn fallback_rules(&self) -> MarketRules {
        let defaults = MarketRules::default();
        let min_order_size = self.quoting.min_order_size;
        MarketRules {
            min_order_size: Size::new(min_order_size),
            size_increment: Size::new(self.size_increment.unwrap_or(min_order_size)),
            price_tick: self.price_tick.map(Price::new).unwrap_or(defaults.price_tick),
        }
    }

    pub fn execution_settings(&self, stp: SelfTradeProtection) -> ExecutionSettings {
        ExecutionSettings {
            replace_threshold_bps: self.replace_threshold_bps,
            post_only: self.post_only,
            time_in_force: TimeInForce::Gtt,
            stp,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub mode: OperatingMode,

    #[serde(default)]
    pub environment: Environment,

    /// Self-trade protection level sent with every order.
    #[serde(default = "default_stp")]
    pub stp: String,

    #[serde(default = "default_quote_loop_ms")]
    pub quote_loop_ms: u64,

    /// Countdown armed on the venue. 0 disables the switch.
    #[serde(default = "default_dead_mans_switch_sec")]
    pub dead_mans_switch_sec: u64,

    #[serde(default = "default_funding_refresh_secs")]
    pub funding_refresh_secs: u64,

    #[serde(default = "default_pnl_report_secs")]
    pub pnl_report_secs: u64,

    /// Serve `/metrics` on this port when set.
    #[serde(default)]
    pub metrics_port: Option<u16>,

    #[serde(default)]
    pub risk: RiskSettings,

    #[serde(default)]
    pub book: BookConfig,

    #[serde(default = "default_markets")]
    pub markets: Vec<MarketConfig>,

    /// Replaces the fee schedule from the account stream.
    #[serde(default)]
    pub fees_override: Option<FeeRates>,
}

fn default_stp() -> String {
    "ACCOUNT".to_string()
}

fn default_quote_loop_ms() -> u64 {
    250
}

fn default_dead_mans_switch_sec() -> u64 {
    120
}

fn default_funding_refresh_secs() -> u64 {
    60
}

fn default_pnl_report_secs() -> u64 {
    5
}

fn default_markets() -> Vec<MarketConfig> {
    vec![MarketConfig::new("BTC-USD")]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: OperatingMode::default(),
            environment: Environment::default(),
            stp: default_stp(),
            quote_loop_ms: default_quote_loop_ms(),
            dead_mans_switch_sec: default_dead_mans_switch_sec(),
            funding_refresh_secs: default_funding_refresh_secs(),
            pnl_report_secs: default_pnl_report_secs(),
            metrics_port: None,
            risk: RiskSettings::default(),
            book: BookConfig::default(),
            markets: default_markets(),
            fees_override: None,
        }
    }
}

impl AppConfig {
    /// Load from `path`, or defaults when the file does not exist.
    pub fn load(path: &str) -> AppResult<Self> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            tracing::warn!(path = %path, "Config file not found, using defaults");
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the bot cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        self.self_trade_protection()?;

        let mut seen = HashSet::new();
        for market in &self.markets {
            if market.name.trim().is_empty() {
                return Err(AppError::Config("market name is empty".to_string()));
            }
            if !seen.insert(market.name.as_str()) {
                return Err(AppError::Config(format!("duplicate market {}", market.name)));
            }
            if market.quoting.quote_notional_cap_usd <= Decimal::ZERO {
                return Err(AppError::Config(format!(
                    "{}: quote_notional_cap_usd must be positive",
                    market.name
                )));
            }
            if market.quoting.base_spread < Decimal::ZERO {
                return Err(AppError::Config(format!(
                    "{}: base_spread must not be negative",
                    market.name
                )));
            }
        }
        if self.enabled_markets().next().is_none() {
            return Err(AppError::Config("no enabled markets".to_string()));
        }
        Ok(())
    }

    pub fn self_trade_protection(&self) -> AppResult<SelfTradeProtection> {
        Ok(self.stp.parse::<SelfTradeProtection>()?)
    }

    /// Quote tick interval, floored at [`MIN_QUOTE_LOOP_MS`].
    pub fn quote_interval(&self) -> Duration {
        Duration::from_millis(self.quote_loop_ms.max(MIN_QUOTE_LOOP_MS))
    }

    pub fn enabled_markets(&self) -> impl Iterator<Item = &MarketConfig> {
        self.markets.iter().filter(|m| m.enabled)
    }

    pub fn is_observation_mode(&self) -> bool {
        self.mode == OperatingMode::Observation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.is_observation_mode());
        assert_eq!(config.environment, Environment::Testnet);
        assert_eq!(config.markets.len(), 1);
        assert_eq!(config.markets[0].name, "BTC-USD");
        assert_eq!(config.quote_interval(), Duration::from_millis(250));
        assert_eq!(config.self_trade_protection().unwrap(), SelfTradeProtection::Account);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            mode = "trading"
            environment = "mainnet"
            quote_loop_ms = 20
            metrics_port = 9100

            [risk]
            max_net_position_usd = "500"
            sigma_limit = "0.004"

            [book]
            max_depth = 10

            [[markets]]
            name = "ETH-USD"
            base_spread = "0.0015"
            quote_notional_cap_usd = 75
            replace_threshold_bps = 3
            post_only = false
            price_tick = "0.1"

            [[markets]]
            name = "SOL-USD"
            enabled = false
        "#;
        let config = AppConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.mode, OperatingMode::Trading);
        assert_eq!(config.environment, Environment::Mainnet);
        assert_eq!(config.quote_interval(), Duration::from_millis(MIN_QUOTE_LOOP_MS));
        assert_eq!(config.metrics_port, Some(9100));
        assert_eq!(config.risk.max_net_position_usd, dec!(500));
        assert_eq!(config.risk.max_open_orders, 30);
        assert_eq!(config.book.max_depth, 10);
        assert_eq!(config.book.sigma_window_secs, 120);

        let eth = &config.markets[0];
        assert_eq!(eth.quoting.base_spread, dec!(0.0015));
        assert_eq!(eth.quoting.quote_notional_cap_usd, dec!(75));
        assert_eq!(eth.replace_threshold_bps, dec!(3));
        assert!(!eth.post_only);
        assert_eq!(eth.fallback_rules().price_tick.inner(), dec!(0.1));

        let enabled: Vec<_> = config.enabled_markets().map(|m| m.name.as_str()).collect();
        assert_eq!(enabled, vec!["ETH-USD"]);
    }

    #[test]
    fn test_market_defaults() {
        let config = AppConfig::from_toml_str("[[markets]]\nname = \"BTC-USD\"\n").unwrap();
        let btc = &config.markets[0];
        assert!(btc.enabled);
        assert!(btc.post_only);
        assert_eq!(btc.replace_threshold_bps, dec!(2));
        assert_eq!(btc.quoting, QuotingConfig::default());

        let rules = btc.fallback_rules();
        assert_eq!(rules.min_order_size.inner(), btc.quoting.min_order_size);
        assert_eq!(rules.size_increment, rules.min_order_size);

        let settings = btc.execution_settings(SelfTradeProtection::Client);
        assert_eq!(settings.stp, SelfTradeProtection::Client);
        assert_eq!(settings.replace_threshold_bps, dec!(2));
    }

    #[test]
    fn test_unsupported_stp_is_fatal() {
        let result = AppConfig::from_toml_str("stp = \"SOMETIMES\"\n");
        assert!(matches!(result, Err(AppError::Core(_))));
    }

    #[test]
    fn test_unsupported_environment_is_fatal() {
        assert!(AppConfig::from_toml_str("environment = \"devnet\"\n").is_err());
        assert!(matches!(
            "devnet".parse::<Environment>(),
            Err(AppError::UnsupportedEnvironment(_))
        ));
        assert_eq!("MAINNET".parse::<Environment>().unwrap(), Environment::Mainnet);
    }

    #[test]
    fn test_rejects_invalid_markets() {
        let duplicate = r#"
            [[markets]]
            name = "BTC-USD"
            [[markets]]
            name = "BTC-USD"
        "#;
        assert!(AppConfig::from_toml_str(duplicate).is_err());

        let none_enabled = "[[markets]]\nname = \"BTC-USD\"\nenabled = false\n";
        assert!(AppConfig::from_toml_str(none_enabled).is_err());

        let zero_cap = "[[markets]]\nname = \"BTC-USD\"\nquote_notional_cap_usd = 0\n";
        assert!(AppConfig::from_toml_str(zero_cap).is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load("does/not/exist.toml").unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
