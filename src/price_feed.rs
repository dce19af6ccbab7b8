//! Fiat Price Feed - CoinGecko API Integration
//!
//! Optional USD reference price for the base asset, shown next to on-chain
//! prices in trade events. Cached to stay under the public rate limit.
//!
//! API: https://api.coingecko.com/api/v3/simple/price?ids=ethereum&vs_currencies=usd

use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

use crate::error::{EngineError, Result};

/// Cache duration for the USD price
const CACHE_DURATION_SECS: u64 = 60;

/// Timeout for API calls
const API_TIMEOUT_SECS: u64 = 5;

/// CoinGecko id of the base asset
const BASE_ASSET_ID: &str = "ethereum";

/// Why a USD quote could not be obtained
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FiatFeedError {
    #[error("fiat price request failed: {0}")]
    Request(String),

    #[error("no usable '{0}' quote in response")]
    MissingQuote(&'static str),
}

impl From<reqwest::Error> for FiatFeedError {
    fn from(e: reqwest::Error) -> Self {
        FiatFeedError::Request(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct Quote {
    usd: f64,
}

#[derive(Debug, Clone, Copy)]
struct CachedPrice {
    usd: f64,
    fetched_at: Instant,
}

impl CachedPrice {
    fn is_stale(&self) -> bool {
        self.fetched_at.elapsed() > Duration::from_secs(CACHE_DURATION_SECS)
    }
}

pub struct FiatPriceFeed {
    http_client: Client,
    url: String,
    cache: RwLock<Option<CachedPrice>>,
}

impl FiatPriceFeed {
    pub fn new(url: String) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .build()
            .map_err(|e| EngineError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            url,
            cache: RwLock::new(None),
        })
    }

    /// USD price of the base asset (with caching); `None` when unavailable
    pub async fn base_asset_usd(&self) -> Option<f64> {
        if let Some(cached) = *self.cache.read().await {
            if !cached.is_stale() {
                trace!("Using cached fiat price: ${:.2}", cached.usd);
                return Some(cached.usd);
            }
        }

        match self.fetch().await {
            Ok(usd) => {
                debug!("💵 Base asset: ${:.2}", usd);
                *self.cache.write().await = Some(CachedPrice {
                    usd,
                    fetched_at: Instant::now(),
                });
                Some(usd)
            }
            Err(e) => {
                warn!("Fiat price fetch failed: {}", e);
                // A stale price is better than none for display
                self.cache.read().await.map(|c| c.usd)
            }
        }
    }

    async fn fetch(&self) -> std::result::Result<f64, FiatFeedError> {
        let body: HashMap<String, Quote> = self
            .http_client
            .get(&self.url)
            .query(&[("ids", BASE_ASSET_ID), ("vs_currencies", "usd")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_quote(&body)
    }
}

fn parse_quote(body: &HashMap<String, Quote>) -> std::result::Result<f64, FiatFeedError> {
    body.get(BASE_ASSET_ID)
        .map(|q| q.usd)
        .filter(|usd| usd.is_finite() && *usd > 0.0)
        .ok_or(FiatFeedError::MissingQuote(BASE_ASSET_ID))
}

/// USD value of one whole token given its price in base-asset ETH
pub fn token_usd(price_eth: f64, base_usd: f64) -> f64 {
    price_eth * base_usd
}
