//! Task wiring.
//!
//! One order-book stream and one quote loop per market, one account stream
//! shared by all markets, plus periodic funding refresh, dead man's switch
//! re-arming and PnL reporting. Ctrl-C stops the quote loops, cancels every
//! tracked order, then stops everything else.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use extmm_executor::{DynOrderGateway, PaperGateway};
use extmm_feed::BookMessageParser;
use extmm_position::{
    AccountEvent, AccountEventConsumer, FeeSchedule, MarketStateRegistry, PnLBook,
};
use extmm_registry::{RestClient, RestConfig, RulesCache, VenueClient};
use extmm_telemetry::Metrics;
use extmm_ws::{CancellationToken, StreamClient, StreamConfig};
use rust_decimal::prelude::ToPrimitive;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, OperatingMode};
use crate::credentials::Credentials;
use crate::endpoints::{Endpoints, ACCOUNT_ORIGIN};
use crate::error::{AppError, AppResult};
use crate::runtime::{ExecutionRouter, MarketRuntime};

const STREAM_CHANNEL_SIZE: usize = 1024;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Main application.
pub struct Application {
    config: AppConfig,
    credentials: Credentials,
    endpoints: Endpoints,
    gateway: Option<DynOrderGateway>,
    shutdown: CancellationToken,
}

impl Application {
    pub fn new(config: AppConfig, credentials: Credentials) -> AppResult<Self> {
        config.validate()?;
        let environment = credentials.resolve_environment(config.environment);
        let endpoints = Endpoints::for_environment(environment);
        info!(
            mode = ?config.mode,
            environment = %environment,
            rest = %endpoints.rest_base,
            markets = config.enabled_markets().count(),
            "Application configured"
        );
        Ok(Self {
            config,
            credentials,
            endpoints,
            gateway: None,
            shutdown: CancellationToken::new(),
        })
    }

    /// Order gateway used in trading mode.
    pub fn with_gateway(mut self, gateway: DynOrderGateway) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Cancelling this token stops a running application as Ctrl-C would.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Paper gateway in observation mode; the embedder's gateway in trading.
    pub fn order_gateway(&self) -> AppResult<DynOrderGateway> {
        match (self.config.mode, &self.gateway) {
            (OperatingMode::Observation, gateway) => {
                if gateway.is_some() {
                    warn!("Observation mode ignores the supplied order gateway");
                }
                Ok(Arc::new(PaperGateway::new()))
            }
            (OperatingMode::Trading, Some(gateway)) => Ok(gateway.clone()),
            (OperatingMode::Trading, None) => Err(AppError::Config(
                "trading mode requires an order gateway".to_string(),
            )),
        }
    }

    pub fn rest_config(&self) -> RestConfig {
        let mut rest = RestConfig::new(self.endpoints.rest_base.clone());
        rest.api_key = Some(self.credentials.api_key.clone());
        rest.subaccount_id = self.credentials.subaccount_id.clone();
        if let Some(user_agent) = &self.credentials.user_agent {
            rest.user_agent = user_agent.clone();
        }
        rest
    }

    fn account_stream_config(&self) -> StreamConfig {
        let user_agent = self.rest_config().user_agent;
        let mut stream = StreamConfig::new("account", self.endpoints.account_candidates.clone())
            .with_header("X-Api-Key", self.credentials.api_key.clone())
            .with_header("User-Agent", user_agent)
            .with_header("Origin", ACCOUNT_ORIGIN);
        if let Some(subaccount) = &self.credentials.subaccount_id {
            stream = stream.with_header("X-Subaccount-Id", subaccount.clone());
        }
        stream
    }

    /// Hydrate rules and funding, build one runtime per enabled market.
    async fn build_markets(
        &self,
        venue: &VenueClient,
        gateway: &DynOrderGateway,
        rules_cache: &RulesCache,
    ) -> AppResult<Vec<Arc<MarketRuntime>>> {
        let stp = self.config.self_trade_protection()?;
        let mut runtimes = Vec::new();
        for market_config in self.config.enabled_markets() {
            let market = market_config.market();
            let fallback = market_config.fallback_rules();
            let rules = match venue.market_rules(&market, &fallback).await {
                Ok(rules) => rules,
                Err(e) => {
                    warn!(market = %market, error = %e, "Rule hydration failed, using configured rules");
                    fallback
                }
            };
            rules_cache.update(&market, rules.clone());

            let runtime = MarketRuntime::new(
                market_config,
                rules,
                &self.config.book,
                &self.config.risk,
                gateway.clone(),
                stp,
            );
            match venue.funding_rate(&market).await {
                Ok(rate) => runtime.set_funding_rate(rate),
                Err(e) => warn!(market = %market, error = %e, "Initial funding rate unavailable"),
            }
            runtimes.push(Arc::new(runtime));
        }
        Ok(runtimes)
    }

    /// Run until Ctrl-C or the shutdown token fires.
    pub async fn run(self) -> AppResult<()> {
        let gateway = self.order_gateway()?;
        let venue = Arc::new(VenueClient::new(RestClient::new(self.rest_config())?));
        let rules_cache = Arc::new(RulesCache::new());
        let runtimes = self.build_markets(&venue, &gateway, &rules_cache).await?;

        let router = Arc::new(ExecutionRouter::new(runtimes.iter().map(Arc::as_ref)));
        let mut consumer = AccountEventConsumer::new(
            Arc::new(MarketStateRegistry::new()),
            Arc::new(PnLBook::new()),
        )
        .with_order_sink(router);
        if let Some(rates) = self.config.fees_override {
            info!(maker = %rates.maker, taker = %rates.taker, "Using fee override");
            consumer = consumer.with_fees(FeeSchedule::uniform(rates));
        }
        let consumer = Arc::new(consumer);

        let shutdown = self.shutdown.clone();
        let quoting = shutdown.child_token();
        let mut quote_handles = Vec::new();
        let mut handles = Vec::new();

        if let Some(port) = self.config.metrics_port {
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            let token = shutdown.clone();
            handles.push(tokio::spawn(async move {
                if let Err(e) = extmm_telemetry::serve_metrics(addr, token).await {
                    error!(error = %e, "Metrics server failed");
                }
            }));
        }

        for runtime in &runtimes {
            handles.extend(self.spawn_book_stream(runtime.clone(), shutdown.clone()));
            quote_handles.push(self.spawn_quote_loop(runtime.clone(), consumer.clone(), quoting.clone()));
        }
        handles.extend(self.spawn_account_stream(consumer.clone(), venue.clone(), shutdown.clone()));
        handles.extend(self.spawn_market_refresh(&runtimes, venue.clone(), rules_cache, shutdown.clone()));
        handles.extend(self.spawn_dead_mans_switch(venue.clone(), shutdown.clone()).await);
        handles.extend(self.spawn_pnl_report(consumer.clone(), shutdown.clone()));

        info!(markets = runtimes.len(), "Entering main loop");
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!(error = %e, "Failed to listen for shutdown signal");
                }
                info!("Shutdown signal received");
            }
            _ = shutdown.cancelled() => info!("Shutdown requested"),
        }

        quoting.cancel();
        join_all(quote_handles).await;

        let mut cancelled = 0;
        for runtime in &runtimes {
            cancelled += runtime.execution().cancel_all().await;
        }
        info!(cancelled, "Cancelled live orders");

        shutdown.cancel();
        join_all(handles).await;
        report_pnl(&consumer);
        info!("Shutdown complete");
        Ok(())
    }

    fn spawn_book_stream(&self, runtime: Arc<MarketRuntime>, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        let market = runtime.market().clone();
        let stream_config = StreamConfig::new(
            format!("orderbook:{market}"),
            vec![self.endpoints.orderbook_url(&market)],
        );
        let client = StreamClient::new(stream_config, shutdown);
        let (tx, mut rx) = mpsc::channel::<String>(STREAM_CHANNEL_SIZE);

        let stream = tokio::spawn(async move {
            if let Err(e) = client.run(tx).await {
                error!(stream = client.name(), error = %e, "Order book stream stopped");
            }
        });

        let ingest = tokio::spawn(async move {
            let parser = BookMessageParser::new();
            while let Some(text) = rx.recv().await {
                Metrics::stream_frame("orderbook");
                match parser.parse(&market, &text) {
                    Ok(Some(update)) => {
                        runtime.apply_book(&update);
                    }
                    Ok(None) => {}
                    Err(e) => debug!(market = %market, error = %e, "Unparseable order book frame"),
                }
            }
            debug!(market = %market, parsed = parser.parsed_count(), "Order book ingestion ended");
        });

        vec![stream, ingest]
    }

    fn spawn_quote_loop(
        &self,
        runtime: Arc<MarketRuntime>,
        consumer: Arc<AccountEventConsumer>,
        quoting: CancellationToken,
    ) -> JoinHandle<()> {
        let interval = self.config.quote_interval();
        let risk = self.config.risk.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = quoting.cancelled() => break,
                    _ = ticker.tick() => {
                        runtime.quote_tick(&consumer, &risk, Utc::now()).await;
                    }
                }
            }
            debug!(market = %runtime.market(), "Quote loop stopped");
        })
    }

    fn spawn_account_stream(
        &self,
        consumer: Arc<AccountEventConsumer>,
        venue: Arc<VenueClient>,
        shutdown: CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        let client = StreamClient::new(self.account_stream_config(), shutdown);
        let (tx, mut rx) = mpsc::channel::<String>(STREAM_CHANNEL_SIZE);
        let fees_override = self.config.fees_override.is_some();

        let stream = tokio::spawn(async move {
            if let Err(e) = client.run(tx).await {
                error!(stream = client.name(), error = %e, "Account stream stopped");
            }
        });

        let ingest = tokio::spawn(async move {
            if !fees_override {
                match venue.fees().await {
                    Ok(fees) => consumer.handle(AccountEvent::Config { fees }),
                    Err(e) => warn!(error = %e, "Fee schedule unavailable"),
                }
            }
            while let Some(text) = rx.recv().await {
                Metrics::stream_frame("account");
                let event = match AccountEvent::from_json(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "Unparseable account frame");
                        continue;
                    }
                };
                if fees_override && matches!(event, AccountEvent::Config { .. }) {
                    debug!("Fee override active, ignoring CONFIG event");
                    continue;
                }
                if let AccountEvent::Trade { trades } = &event {
                    for trade in trades {
                        Metrics::fill(trade.market.as_str(), &trade.side.to_string());
                    }
                }
                consumer.handle(event);
            }
            debug!("Account ingestion ended");
        });

        vec![stream, ingest]
    }

    /// Funding rate and market rules, every `funding_refresh_secs`.
    fn spawn_market_refresh(
        &self,
        runtimes: &[Arc<MarketRuntime>],
        venue: Arc<VenueClient>,
        rules_cache: Arc<RulesCache>,
        shutdown: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        if self.config.funding_refresh_secs == 0 {
            return None;
        }
        let period = Duration::from_secs(self.config.funding_refresh_secs);
        let runtimes = runtimes.to_vec();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        for runtime in &runtimes {
                            refresh_market(runtime, &venue, &rules_cache).await;
                        }
                    }
                }
            }
        }))
    }

    /// Arm once now, then re-arm every half countdown.
    async fn spawn_dead_mans_switch(
        &self,
        venue: Arc<VenueClient>,
        shutdown: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        let countdown = self.config.dead_mans_switch_sec;
        if countdown == 0 {
            info!("Dead man's switch disabled");
            return None;
        }
        arm_dead_mans_switch(&venue, countdown).await;

        let period = Duration::from_secs((countdown / 2).max(1));
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => arm_dead_mans_switch(&venue, countdown).await,
                }
            }
        }))
    }

    fn spawn_pnl_report(
        &self,
        consumer: Arc<AccountEventConsumer>,
        shutdown: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        if self.config.pnl_report_secs == 0 {
            return None;
        }
        let period = Duration::from_secs(self.config.pnl_report_secs);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => report_pnl(&consumer),
                }
            }
        }))
    }
}

async fn refresh_market(runtime: &MarketRuntime, venue: &VenueClient, rules_cache: &RulesCache) {
    let market = runtime.market();
    match venue.funding_rate(market).await {
        Ok(rate) => runtime.set_funding_rate(rate),
        Err(e) => warn!(market = %market, error = %e, "Funding refresh failed"),
    }
    let Some(current) = rules_cache.get(market) else {
        return;
    };
    match venue.market_rules(market, &current).await {
        Ok(rules) => {
            if rules_cache.update(market, rules.clone()) {
                info!(market = %market, version = rules_cache.version(market), "Applying new market rules");
                runtime.set_rules(rules);
            }
        }
        Err(e) => warn!(market = %market, error = %e, "Rule refresh failed"),
    }
}

async fn arm_dead_mans_switch(venue: &VenueClient, countdown: u64) {
    if let Err(e) = venue.arm_dead_mans_switch(countdown).await {
        warn!(error = %e, countdown, "Failed to arm dead man's switch");
    }
}

fn report_pnl(consumer: &AccountEventConsumer) {
    let f = |d: rust_decimal::Decimal| d.to_f64().unwrap_or(0.0);
    for (market, pnl) in consumer.pnl().per_market() {
        Metrics::pnl(market.as_str(), f(pnl.spread_pnl), f(pnl.inventory_pnl), f(pnl.fees), f(pnl.funding));
        info!(
            market = %market,
            spread = %pnl.spread_pnl,
            inventory = %pnl.inventory_pnl,
            fees = %pnl.fees,
            funding = %pnl.funding,
            net = %pnl.net(),
            "PnL"
        );
    }
    let total = consumer.pnl().total();
    info!(net = %total.net(), spread = %total.spread_pnl, fees = %total.fees, "PnL total");
}

async fn join_all(handles: Vec<JoinHandle<()>>) {
    let joined = tokio::time::timeout(SHUTDOWN_GRACE, async {
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Task ended abnormally");
            }
        }
    })
    .await;
    if joined.is_err() {
        warn!("Tasks still running after shutdown grace period");
    }
}
