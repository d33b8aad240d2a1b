//! Typed venue calls on top of `RestClient`.

use extmm_core::{MarketName, MarketRules};
use extmm_position::FeeSchedule;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, info};

use crate::client::RestClient;
use crate::error::{RegistryError, RegistryResult};
use crate::rules::parse_market_rules;

/// Payload under `data`, or the whole body when there is no envelope.
fn data(body: &Value) -> &Value {
    body.get("data").unwrap_or(body)
}

pub struct VenueClient {
    rest: RestClient,
}

impl VenueClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// Market description from `/info/markets`.
    pub async fn market(&self, market: &MarketName) -> RegistryResult<Value> {
        let body = self
            .rest
            .get_json("/info/markets", &[("market", market.to_string())])
            .await?;
        let entry = match data(&body) {
            Value::Array(entries) => entries
                .iter()
                .find(|e| e.get("name").and_then(Value::as_str) == Some(market.as_str()))
                .cloned(),
            entry @ Value::Object(_) => Some(entry.clone()),
            _ => None,
        };
        entry.ok_or_else(|| RegistryError::MarketNotFound(market.to_string()))
    }

    pub async fn market_rules(&self, market: &MarketName, fallback: &MarketRules) -> RegistryResult<MarketRules> {
        let entry = self.market(market).await?;
        let rules = parse_market_rules(&entry, fallback);
        info!(
            market = %market,
            tick = %rules.price_tick,
            lot = %rules.size_increment,
            min = %rules.min_order_size,
            "Market rules loaded"
        );
        Ok(rules)
    }

    /// Current funding rate from `marketStats.fundingRate`.
    pub async fn funding_rate(&self, market: &MarketName) -> RegistryResult<Decimal> {
        let entry = self.market(market).await?;
        let stats = entry.get("marketStats").unwrap_or(&entry);
        let rate = match stats.get("fundingRate") {
            Some(Value::String(s)) => s.trim().parse::<Decimal>().ok(),
            Some(Value::Number(n)) => n.to_string().parse::<Decimal>().ok(),
            _ => None,
        };
        let rate = rate.ok_or_else(|| RegistryError::ParseError(format!("{market}: fundingRate missing")))?;
        debug!(market = %market, funding_rate = %rate, "Funding rate fetched");
        Ok(rate)
    }

    /// Account fee rates from `/user/fees`.
    pub async fn fees(&self) -> RegistryResult<FeeSchedule> {
        let body = self.rest.get_json("/user/fees", &[]).await?;
        Ok(FeeSchedule::from_value(data(&body))?)
    }

    /// Arm (or re-arm) the venue's cancel-all countdown.
    pub async fn arm_dead_mans_switch(&self, countdown_secs: u64) -> RegistryResult<()> {
        self.rest
            .post_json(
                "/user/deadmansswitch",
                &[("countdownTime", countdown_secs.to_string())],
                None,
            )
            .await?;
        debug!(countdown_secs, "Dead man's switch armed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_data_envelope() {
        let wrapped = json!({"status": "OK", "data": [1, 2]});
        assert_eq!(data(&wrapped), &json!([1, 2]));
        let bare = json!([3]);
        assert_eq!(data(&bare), &json!([3]));
    }
}
