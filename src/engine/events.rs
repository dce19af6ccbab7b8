//! Trade events - one per tick
//!
//! Every tick produces exactly one [`TradeEvent`], fanned out to the
//! configured sinks (tracing, console, JSONL file). A failing sink only logs.

use alloy_primitives::{utils::format_ether, U256};
use chrono::{DateTime, Utc};
use console::style;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::brain::{change_percent, TradeAction};
use crate::cartographer::PricePoint;
use crate::error::{EngineError, ErrorClass, Stage};
use crate::executor::TradeOutcome;
use crate::tokens::TokenAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventAction {
    Buy,
    Sell,
    Hold,
    /// Trade attempted and failed
    Error,
    /// Tick skipped on a transient error
    Skipped,
    /// Terminal: the loop stopped
    Stopped,
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            EventAction::Buy => "BUY",
            EventAction::Sell => "SELL",
            EventAction::Hold => "HOLD",
            EventAction::Error => "ERROR",
            EventAction::Skipped => "SKIPPED",
            EventAction::Stopped => "STOPPED",
        };
        write!(f, "{label}")
    }
}

impl From<&TradeAction> for EventAction {
    fn from(action: &TradeAction) -> Self {
        match action {
            TradeAction::Hold => EventAction::Hold,
            TradeAction::Buy { .. } => EventAction::Buy,
            TradeAction::Sell { .. } => EventAction::Sell,
        }
    }
}

/// Structured outcome of one tick
#[derive(Debug, Clone, Serialize)]
pub struct TradeEvent {
    pub timestamp: DateTime<Utc>,
    pub token: String,
    pub action: EventAction,

    /// Sell reason or other qualifier
    pub detail: Option<String>,
    pub amount_in: Option<String>,

    /// Base-asset wei per whole token
    pub price_wei: Option<String>,
    pub price_eth: Option<String>,
    pub price_usd: Option<f64>,

    /// Percent change vs. the anchor price
    pub change_pct: Option<f64>,
    pub liquidity_wei: Option<String>,

    pub tx_hash: Option<String>,
    pub error: Option<String>,
    pub error_class: Option<ErrorClass>,
    pub stage: Option<Stage>,
}

impl TradeEvent {
    pub fn new(token: TokenAddress, action: EventAction) -> Self {
        Self {
            timestamp: Utc::now(),
            token: token.to_string(),
            action,
            detail: None,
            amount_in: None,
            price_wei: None,
            price_eth: None,
            price_usd: None,
            change_pct: None,
            liquidity_wei: None,
            tx_hash: None,
            error: None,
            error_class: None,
            stage: None,
        }
    }

    pub fn with_price(mut self, point: &PricePoint, initial: Option<U256>) -> Self {
        self.timestamp = point.sampled_at;
        self.price_wei = Some(point.price.to_string());
        self.price_eth = Some(format_ether(point.price));
        self.liquidity_wei = Some(point.liquidity.to_string());
        self.change_pct = initial.and_then(|anchor| change_percent(point.price, anchor));
        self
    }

    pub fn with_action(mut self, action: &TradeAction) -> Self {
        match action {
            TradeAction::Hold => {}
            TradeAction::Buy { amount_in } => self.amount_in = Some(amount_in.to_string()),
            TradeAction::Sell { amount_in, reason } => {
                self.amount_in = Some(amount_in.to_string());
                self.detail = Some(reason.to_string());
            }
        }
        self
    }

    pub fn with_outcome(mut self, outcome: &TradeOutcome) -> Self {
        self.tx_hash = outcome.tx_hash.map(|h| format!("{h:?}"));
        self
    }

    pub fn with_error(mut self, err: &EngineError) -> Self {
        self.error = Some(err.to_string());
        self.error_class = Some(err.class());
        self.stage = err.stage();
        if self.tx_hash.is_none() {
            self.tx_hash = err.tx_hash().map(|h| format!("{h:?}"));
        }
        self
    }

    pub fn with_usd(mut self, price_usd: Option<f64>) -> Self {
        self.price_usd = price_usd;
        self
    }
}

// ============================================
// SINKS
// ============================================

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &TradeEvent);
}

/// Structured log line per event
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &TradeEvent) {
        let price = event.price_eth.as_deref().unwrap_or("-");
        let change = event.change_pct.unwrap_or_default();
        let tx = event.tx_hash.as_deref().unwrap_or("-");

        match event.action {
            EventAction::Error | EventAction::Stopped => error!(
                token = %event.token,
                action = %event.action,
                price_eth = price,
                change_pct = change,
                tx_hash = tx,
                error = event.error.as_deref().unwrap_or("-"),
                stage = ?event.stage,
                "trade event"
            ),
            EventAction::Skipped => warn!(
                token = %event.token,
                action = %event.action,
                error = event.error.as_deref().unwrap_or("-"),
                "trade event"
            ),
            _ => info!(
                token = %event.token,
                action = %event.action,
                price_eth = price,
                change_pct = change,
                liquidity_wei = event.liquidity_wei.as_deref().unwrap_or("-"),
                tx_hash = tx,
                "trade event"
            ),
        }
    }
}

/// Colored one-line market summary
pub struct ConsoleSink;

impl ConsoleSink {
    fn format(event: &TradeEvent) -> String {
        let action = match event.action {
            EventAction::Buy => style(format!("{:<8}", event.action)).green().bold(),
            EventAction::Sell => style(format!("{:<8}", event.action)).magenta().bold(),
            EventAction::Hold => style(format!("{:<8}", event.action)).dim(),
            EventAction::Skipped => style(format!("{:<8}", event.action)).yellow(),
            EventAction::Error | EventAction::Stopped => {
                style(format!("{:<8}", event.action)).red().bold()
            }
        };

        let mut line = format!(
            "[{}] {} {}",
            event.timestamp.format("%H:%M:%S"),
            action,
            event.token
        );

        if let Some(price) = &event.price_eth {
            line.push_str(&format!(" | price {price} ETH"));
        }
        if let Some(change) = event.change_pct {
            line.push_str(&format!(" ({change:+.2}%)"));
        }
        if let Some(usd) = event.price_usd {
            line.push_str(&format!(" ≈ ${usd:.8}"));
        }
        if let Some(detail) = &event.detail {
            line.push_str(&format!(" | {detail}"));
        }
        if let Some(tx) = &event.tx_hash {
            line.push_str(&format!(" | tx {tx}"));
        }
        if let Some(err) = &event.error {
            line.push_str(&format!(" | {}", style(err).red()));
        }
        line
    }
}

impl EventSink for ConsoleSink {
    fn emit(&self, event: &TradeEvent) {
        println!("{}", Self::format(event));
    }
}

/// Appends each event as one JSON line
pub struct JsonlFileSink {
    path: PathBuf,
}

impl JsonlFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append this event to the file
    pub fn append(&self, event: &TradeEvent) -> eyre::Result<()> {
        // Create parent directories if needed
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(event)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }
}

impl EventSink for JsonlFileSink {
    fn emit(&self, event: &TradeEvent) {
        if let Err(e) = self.append(event) {
            warn!("Failed to write trade event to {}: {}", self.path.display(), e);
        }
    }
}

/// Sends every event to each inner sink
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: &TradeEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

// ============================================
// TESTS
// ============================================
