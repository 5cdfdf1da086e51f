pub mod fixture;
pub mod yahoo;

use crate::config::Settings;
use crate::domain::contract::RawContract;
use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyClose {
    pub date: NaiveDate,
    pub close: f64,
}

#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Calls and puts for the `nearest_expirations` soonest expiration dates.
    async fn option_chain(&self, ticker: &str, nearest_expirations: usize)
        -> Result<Vec<RawContract>>;

    /// Up to `sessions` daily closes, oldest first. May be empty.
    async fn recent_closes(&self, ticker: &str, sessions: usize) -> Result<Vec<DailyClose>>;

    async fn latest_price(&self, ticker: &str) -> Result<f64>;
}

/// Fixture directory when `PREMIA_FIXTURE_DIR` is set, Yahoo Finance otherwise.
pub fn from_settings(settings: &Settings) -> Result<Box<dyn MarketDataProvider>> {
    if let Some(dir) = settings.fixture_dir.as_deref() {
        tracing::info!(dir, "using fixture market data");
        return Ok(Box::new(fixture::FixtureProvider::from_dir(dir)));
    }
    Ok(Box::new(yahoo::YahooFinanceProvider::from_settings(settings)?))
}
