use crate::domain::contract::RawContract;
use crate::market::{DailyClose, MarketDataProvider};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub ticker: String,
    pub latest_price: f64,
    #[serde(default)]
    pub closes: Vec<DailyClose>,
    #[serde(default)]
    pub contracts: Vec<RawContract>,
}

#[derive(Debug, Clone)]
enum Source {
    Dir(PathBuf),
    Memory(BTreeMap<String, MarketSnapshot>),
}

/// Offline market data from `<DIR>/<TICKER>.json` snapshots, or snapshots handed in directly.
#[derive(Debug, Clone)]
pub struct FixtureProvider {
    source: Source,
}

impl FixtureProvider {
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            source: Source::Dir(dir.into()),
        }
    }

    pub fn from_snapshots(snapshots: impl IntoIterator<Item = MarketSnapshot>) -> Self {
        let map = snapshots
            .into_iter()
            .map(|s| (s.ticker.to_ascii_uppercase(), s))
            .collect();
        Self {
            source: Source::Memory(map),
        }
    }

    async fn snapshot(&self, ticker: &str) -> Result<MarketSnapshot> {
        let key = ticker.to_ascii_uppercase();
        match &self.source {
            Source::Memory(map) => map
                .get(&key)
                .cloned()
                .with_context(|| format!("no fixture for {key}")),
            Source::Dir(dir) => {
                let path = dir.join(format!("{key}.json"));
                let text = tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("failed to read fixture {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("fixture {} is not a market snapshot", path.display()))
            }
        }
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for FixtureProvider {
    fn provider_name(&self) -> &'static str {
        "fixture"
    }

    async fn option_chain(
        &self,
        ticker: &str,
        nearest_expirations: usize,
    ) -> Result<Vec<RawContract>> {
        let snapshot = self.snapshot(ticker).await?;
        let keep: BTreeSet<NaiveDate> = snapshot
            .contracts
            .iter()
            .map(|c| c.expiration)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .take(nearest_expirations)
            .collect();

        Ok(snapshot
            .contracts
            .into_iter()
            .filter(|c| keep.contains(&c.expiration))
            .filter(|c| match c.validate() {
                Ok(()) => true,
                Err(err) => {
                    tracing::debug!(ticker, error = %err, strike = c.strike, "skipping malformed fixture contract");
                    false
                }
            })
            .collect())
    }

    async fn recent_closes(&self, ticker: &str, sessions: usize) -> Result<Vec<DailyClose>> {
        let mut closes = self.snapshot(ticker).await?.closes;
        closes.sort_by_key(|c| c.date);
        if closes.len() > sessions {
            closes.drain(..closes.len() - sessions);
        }
        Ok(closes)
    }

    async fn latest_price(&self, ticker: &str) -> Result<f64> {
        Ok(self.snapshot(ticker).await?.latest_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contract::ContractType;
    use serde_json::json;

    fn snapshot() -> MarketSnapshot {
        serde_json::from_value(json!({
            "ticker": "msft",
            "latest_price": 410.5,
            "closes": [
                {"date": "2026-10-16", "close": 409.0},
                {"date": "2026-10-14", "close": 405.0},
                {"date": "2026-10-15", "close": 407.0}
            ],
            "contracts": [
                {"contract_type": "Call", "strike": 420.0, "expiration": "2026-11-20", "implied_volatility": 0.3, "bid": 4.0, "ask": 4.2},
                {"contract_type": "Put", "strike": 400.0, "expiration": "2026-10-23", "implied_volatility": 0.3, "bid": 2.0, "ask": 2.1},
                {"contract_type": "Put", "strike": 390.0, "expiration": "2026-12-18", "implied_volatility": null, "bid": 6.0, "ask": 6.3}
            ]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn option_chain_keeps_nearest_expirations() {
        let provider = FixtureProvider::from_snapshots([snapshot()]);
        let chain = provider.option_chain("MSFT", 2).await.unwrap();
        assert_eq!(chain.len(), 2);
        assert!(chain
            .iter()
            .all(|c| c.expiration < NaiveDate::from_ymd_opt(2026, 12, 1).unwrap()));
        assert_eq!(chain[0].contract_type, ContractType::Call);
    }

    #[tokio::test]
    async fn closes_are_sorted_and_truncated() {
        let provider = FixtureProvider::from_snapshots([snapshot()]);
        let closes = provider.recent_closes("msft", 2).await.unwrap();
        assert_eq!(
            closes.iter().map(|c| c.close).collect::<Vec<_>>(),
            vec![407.0, 409.0]
        );
        assert_eq!(provider.latest_price("MSFT").await.unwrap(), 410.5);
    }

    #[tokio::test]
    async fn malformed_contracts_are_dropped() {
        let mut snap = snapshot();
        snap.contracts.extend(
            serde_json::from_value::<Vec<RawContract>>(json!([
                {"contract_type": "Put", "strike": -5.0, "expiration": "2026-11-20", "implied_volatility": -0.3, "bid": 2.0, "ask": 1.0},
                {"contract_type": "Call", "strike": 425.0, "expiration": "2026-11-20", "implied_volatility": 0.3, "bid": 3.0, "ask": 2.5}
            ]))
            .unwrap(),
        );

        let provider = FixtureProvider::from_snapshots([snap]);
        let chain = provider.option_chain("MSFT", 3).await.unwrap();
        assert_eq!(chain.len(), 3);
        assert!(chain.iter().all(|c| c.bid <= c.ask && c.strike > 0.0));
    }

    #[tokio::test]
    async fn unknown_ticker_is_an_error() {
        let provider = FixtureProvider::from_snapshots([snapshot()]);
        assert!(provider.option_chain("TSLA", 3).await.is_err());
    }

    #[tokio::test]
    async fn reads_snapshot_files_from_dir() {
        let dir = std::env::temp_dir().join(format!("premia-fixture-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("MSFT.json"),
            serde_json::to_string(&snapshot()).unwrap(),
        )
        .unwrap();

        let provider = FixtureProvider::from_dir(dir.clone());
        assert_eq!(provider.option_chain("msft", 3).await.unwrap().len(), 3);
        assert!(provider.latest_price("AAPL").await.is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
