//! Trading Loop
//!
//! One sequential loop per token: sample price → read balance → decide →
//! execute → emit event → sleep. The loop is RUNNING until a permanent error
//! or cancellation moves it to STOPPED. Cancellation is only observed while
//! sleeping between ticks, never in the middle of a trade.

pub mod events;

pub use events::{
    ConsoleSink, EventAction, EventSink, FanoutSink, JsonlFileSink, TracingSink, TradeEvent,
};

use alloy_primitives::U256;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::brain::{DecisionEngine, TradeAction};
use crate::cartographer::{PricePoint, PriceSource};
use crate::error::EngineError;
use crate::executor::TradeExecutor;
use crate::price_feed::{token_usd, FiatPriceFeed};
use crate::tokens::TokenAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    TickLimit,
    Fatal(String),
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Cancelled => write!(f, "cancelled"),
            StopReason::TickLimit => write!(f, "tick limit reached"),
            StopReason::Fatal(reason) => write!(f, "fatal: {reason}"),
        }
    }
}

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub trades: u64,
    pub holds: u64,
    pub errors: u64,
    pub skipped: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopReport {
    pub stats: LoopStats,
    pub reason: StopReason,
}

pub struct TradingLoop {
    token: TokenAddress,
    prices: Arc<dyn PriceSource>,
    executor: Arc<dyn TradeExecutor>,
    decisions: DecisionEngine,
    sink: Arc<dyn EventSink>,
    fiat: Option<Arc<FiatPriceFeed>>,
    interval: Duration,
    max_ticks: Option<u64>,
    initial_price: Option<U256>,
    state: LoopState,
    stats: LoopStats,
}

impl TradingLoop {
    pub fn new(
        token: TokenAddress,
        prices: Arc<dyn PriceSource>,
        executor: Arc<dyn TradeExecutor>,
        decisions: DecisionEngine,
        sink: Arc<dyn EventSink>,
        interval: Duration,
    ) -> Self {
        Self {
            token,
            prices,
            executor,
            decisions,
            sink,
            fiat: None,
            interval,
            max_ticks: None,
            initial_price: None,
            state: LoopState::Running,
            stats: LoopStats::default(),
        }
    }

    /// Anchor decisions on this price instead of the first sample
    pub fn with_initial_price(mut self, price: Option<U256>) -> Self {
        self.initial_price = price;
        self
    }

    pub fn with_max_ticks(mut self, max_ticks: Option<u64>) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    pub fn with_fiat_feed(mut self, feed: Option<Arc<FiatPriceFeed>>) -> Self {
        self.fiat = feed;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn initial_price(&self) -> Option<U256> {
        self.initial_price
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Run until stopped. Cancellation is checked only while sleeping
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> LoopReport {
        info!(
            "🍋 Trading loop started for {} ({} strategy, every {:?})",
            self.token,
            self.decisions.strategy(),
            self.interval
        );

        let reason = loop {
            if *shutdown.borrow() {
                break StopReason::Cancelled;
            }

            if let Some(reason) = self.tick().await {
                break reason;
            }

            if self.max_ticks.is_some_and(|max| self.stats.ticks >= max) {
                break StopReason::TickLimit;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = cancelled(&mut shutdown) => break StopReason::Cancelled,
            }
        };

        self.state = LoopState::Stopped;
        info!(
            "Trading loop for {} stopped ({}): {:?}",
            self.token, reason, self.stats
        );

        LoopReport {
            stats: self.stats,
            reason,
        }
    }

    /// One iteration. Returns the stop reason when the loop must end
    pub async fn tick(&mut self) -> Option<StopReason> {
        if self.state == LoopState::Stopped {
            return Some(StopReason::Fatal("loop already stopped".into()));
        }
        self.stats.ticks += 1;

        let point = match self.prices.spot_price(self.token).await {
            Ok(point) => point,
            Err(e) => return self.on_sampling_error(e, None),
        };

        let initial = *self.initial_price.get_or_insert_with(|| {
            info!("Anchor price for {}: {} wei", self.token, point.price);
            point.price
        });

        let balance = match self.executor.token_balance(self.token.address()).await {
            Ok(balance) => balance,
            Err(e) => return self.on_sampling_error(e, Some((&point, initial))),
        };

        let action = self.decisions.decide(point.price, initial, balance);
        let price_usd = self.usd_price(&point).await;
        debug!("Tick {}: {} (balance {})", self.stats.ticks, action, balance);

        let event = TradeEvent::new(self.token, (&action).into())
            .with_price(&point, Some(initial))
            .with_action(&action)
            .with_usd(price_usd);

        if action.is_hold() {
            self.stats.holds += 1;
            self.sink.emit(&event);
            return None;
        }

        match self
            .executor
            .execute_action(self.token.address(), &action, &point)
            .await
        {
            Ok(outcome) => {
                self.stats.trades += 1;
                self.sink.emit(&event.with_outcome(&outcome));
            }
            Err(e) => {
                // Execution failures never stop the loop; the next tick decides afresh
                self.stats.errors += 1;
                warn!("{} for {} failed: {}", action_label(&action), self.token, e);
                let mut failed = event.with_error(&e);
                failed.action = EventAction::Error;
                self.sink.emit(&failed);
            }
        }

        None
    }

    fn on_sampling_error(
        &mut self,
        err: EngineError,
        sampled: Option<(&PricePoint, U256)>,
    ) -> Option<StopReason> {
        let action = if err.is_fatal() {
            EventAction::Stopped
        } else {
            EventAction::Skipped
        };

        let mut event = TradeEvent::new(self.token, action);
        if let Some((point, initial)) = sampled {
            event = event.with_price(point, Some(initial));
        }
        self.sink.emit(&event.with_error(&err));

        if err.is_fatal() {
            self.state = LoopState::Stopped;
            Some(StopReason::Fatal(err.to_string()))
        } else {
            self.stats.skipped += 1;
            None
        }
    }

    async fn usd_price(&self, point: &PricePoint) -> Option<f64> {
        let feed = self.fiat.as_ref()?;
        let base_usd = feed.base_asset_usd().await?;
        let wei = u128::try_from(point.price).ok()?;
        Some(token_usd(wei as f64 / 1e18, base_usd))
    }
}

fn action_label(action: &TradeAction) -> &'static str {
    match action {
        TradeAction::Hold => "HOLD",
        TradeAction::Buy { .. } => "BUY",
        TradeAction::Sell { .. } => "SELL",
    }
}

/// Resolves once cancellation is requested; never if the sender is gone
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

// ============================================
// SHUTDOWN SIGNALS
// ============================================

/// Flip `tx` to true on Ctrl-C or SIGTERM. The loop then stops at its next
/// sleep, so a trade already in flight still runs to completion
pub fn spawn_shutdown_listener(tx: watch::Sender<bool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(forward_shutdown(termination_signal(), tx))
}

/// Wait for `signal`, then request shutdown
pub async fn forward_shutdown<F>(signal: F, tx: watch::Sender<bool>)
where
    F: Future<Output = &'static str>,
{
    let name = signal.await;
    info!("{} received - stopping after the current tick", name);
    let _ = tx.send(true);
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Ctrl-C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn termination_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("SIGTERM handler unavailable: {}", e);
            interrupt().await;
            return "Ctrl-C";
        }
    };

    tokio::select! {
        _ = interrupt() => "Ctrl-C",
        Some(()) = sigterm.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn termination_signal() -> &'static str {
    interrupt().await;
    "Ctrl-C"
}

// ============================================
// TESTS
// ============================================
