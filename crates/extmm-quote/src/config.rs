//! Per-market quoting parameters.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Quote model configuration for one market.
///
/// Spread terms are fractions of price (0.001 = 10 bps) unless the field
/// name says `_bps`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotingConfig {
    /// Fair-price shift at a full inventory cap, in bps of mid.
    #[serde(default = "default_k_bps")]
    pub k_bps: Decimal,

    #[serde(default = "default_base_spread")]
    pub base_spread: Decimal,

    /// Scales `base_spread` by `(1 + vol_multiplier * σ)`.
    #[serde(default = "default_vol_multiplier")]
    pub vol_multiplier: Decimal,

    /// Additive σ term.
    #[serde(default = "default_alpha")]
    pub alpha: Decimal,

    /// Additive |funding| term.
    #[serde(default = "default_beta")]
    pub beta: Decimal,

    /// Extra spread at full inventory, as a multiple of `base_spread`.
    #[serde(default = "default_inventory_spread_multiplier")]
    pub inventory_spread_multiplier: Decimal,

    #[serde(default = "default_min_half_spread")]
    pub min_half_spread: Decimal,

    /// Notional per quote side (USD). Base order size is this over mid.
    #[serde(default = "default_quote_notional_cap_usd")]
    pub quote_notional_cap_usd: Decimal,

    /// Notional at which the inventory ratio reaches 1 (USD).
    #[serde(default = "default_inventory_cap_usd")]
    pub inventory_cap_usd: Decimal,

    #[serde(default = "default_min_order_size")]
    pub min_order_size: Decimal,

    #[serde(default)]
    pub max_order_size: Option<Decimal>,

    #[serde(default = "default_inventory_sensitivity")]
    pub inventory_sensitivity: Decimal,

    /// Above this inventory ratio the side adding to the position is zeroed.
    #[serde(default = "default_disable_threshold")]
    pub disable_threshold: Decimal,

    /// Maximum allowed |price - mid| / mid for a quoted side.
    #[serde(default = "default_sanity_band")]
    pub sanity_band: Decimal,

    #[serde(default = "default_book_buffer_min_ticks")]
    pub book_buffer_min_ticks: u32,

    #[serde(default = "default_book_buffer_max_ticks")]
    pub book_buffer_max_ticks: u32,

    /// Fair shift per unit of |funding| when the held side pays.
    #[serde(default = "default_funding_bias_multiplier")]
    pub funding_bias_multiplier: Decimal,

    /// Position age that counts as stale. 0 disables the stale bias.
    #[serde(default)]
    pub stale_position_secs: u64,

    #[serde(default = "default_stale_position_bias_bps")]
    pub stale_position_bias_bps: Decimal,

    #[serde(default = "default_quote_log_interval_ms")]
    pub quote_log_interval_ms: u64,
}

impl Default for QuotingConfig {
    fn default() -> Self {
        Self {
            k_bps: default_k_bps(),
            base_spread: default_base_spread(),
            vol_multiplier: default_vol_multiplier(),
            alpha: default_alpha(),
            beta: default_beta(),
            inventory_spread_multiplier: default_inventory_spread_multiplier(),
            min_half_spread: default_min_half_spread(),
            quote_notional_cap_usd: default_quote_notional_cap_usd(),
            inventory_cap_usd: default_inventory_cap_usd(),
            min_order_size: default_min_order_size(),
            max_order_size: None,
            inventory_sensitivity: default_inventory_sensitivity(),
            disable_threshold: default_disable_threshold(),
            sanity_band: default_sanity_band(),
            book_buffer_min_ticks: default_book_buffer_min_ticks(),
            book_buffer_max_ticks: default_book_buffer_max_ticks(),
            funding_bias_multiplier: default_funding_bias_multiplier(),
            stale_position_secs: 0,
            stale_position_bias_bps: default_stale_position_bias_bps(),
            quote_log_interval_ms: default_quote_log_interval_ms(),
        }
    }
}

fn default_k_bps() -> Decimal {
    Decimal::new(5, 0) // 5 bps at full inventory
}
fn default_base_spread() -> Decimal {
    Decimal::new(1, 3) // 0.001
}
fn default_vol_multiplier() -> Decimal {
    Decimal::new(50, 0)
}
fn default_alpha() -> Decimal {
    Decimal::new(5, 1) // 0.5
}
fn default_beta() -> Decimal {
    Decimal::new(25, 2) // 0.25
}
fn default_inventory_spread_multiplier() -> Decimal {
    Decimal::new(5, 1) // 0.5
}
fn default_min_half_spread() -> Decimal {
    Decimal::new(2, 4) // 2 bps
}
fn default_quote_notional_cap_usd() -> Decimal {
    Decimal::new(50, 0)
}
fn default_inventory_cap_usd() -> Decimal {
    Decimal::new(200, 0)
}
fn default_min_order_size() -> Decimal {
    Decimal::new(1, 3) // 0.001
}
fn default_inventory_sensitivity() -> Decimal {
    Decimal::new(1, 1) // 0.1
}
fn default_disable_threshold() -> Decimal {
    Decimal::new(9, 1) // 0.9
}
fn default_sanity_band() -> Decimal {
    Decimal::new(5, 2) // 5%
}
fn default_book_buffer_min_ticks() -> u32 {
    1
}
fn default_book_buffer_max_ticks() -> u32 {
    3
}
fn default_funding_bias_multiplier() -> Decimal {
    Decimal::ONE
}
fn default_stale_position_bias_bps() -> Decimal {
    Decimal::new(2, 0)
}
fn default_quote_log_interval_ms() -> u64 {
    5_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config() {
        let config = QuotingConfig::default();
        assert_eq!(config.base_spread, dec!(0.001));
        assert_eq!(config.quote_notional_cap_usd, dec!(50));
        assert_eq!(config.book_buffer_min_ticks, 1);
        assert_eq!(config.book_buffer_max_ticks, 3);
        assert_eq!(config.stale_position_secs, 0);
        assert!(config.max_order_size.is_none());
    }

    #[test]
    fn test_deserialize_partial() {
        let toml_str = r#"
            base_spread = "0.002"
            quote_notional_cap_usd = 100
            max_order_size = "0.5"
            stale_position_secs = 600
        "#;
        let config: QuotingConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.base_spread, dec!(0.002));
        assert_eq!(config.quote_notional_cap_usd, dec!(100));
        assert_eq!(config.max_order_size, Some(dec!(0.5)));
        assert_eq!(config.stale_position_secs, 600);
        // untouched fields keep defaults
        assert_eq!(config.alpha, dec!(0.5));
        assert_eq!(config.sanity_band, dec!(0.05));
    }
}
