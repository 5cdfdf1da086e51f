pub mod enrich;
pub mod filter;
pub mod select;

use crate::config::AnalysisConfig;
use crate::domain::contract::RawContract;
use crate::domain::recommendation::Recommendation;
use crate::error::AnalysisError;
use crate::market::MarketDataProvider;
use crate::trend::score_trend;
use crate::volatility::VolatilityMetricsProvider;
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use filter::CriterionCount;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStage {
    Idle,
    FetchingData,
    Enriching,
    Filtering,
    Selecting,
    Built,
    NoCandidate,
    Failed,
}

/// Why no contract survived: total contract count followed by per-criterion pass counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterDiagnostics {
    pub criteria: Vec<CriterionCount>,
}

impl FilterDiagnostics {
    pub fn total(&self) -> usize {
        self.criteria.first().map(|c| c.value).unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisResult {
    Recommendation(Recommendation),
    NoCandidate(FilterDiagnostics),
    Failed { error: AnalysisError },
}

impl AnalysisResult {
    pub fn recommendation(&self) -> Option<&Recommendation> {
        match self {
            Self::Recommendation(r) => Some(r),
            _ => None,
        }
    }

    pub fn stage(&self) -> AnalysisStage {
        match self {
            Self::Recommendation(_) => AnalysisStage::Built,
            Self::NoCandidate(_) => AnalysisStage::NoCandidate,
            Self::Failed { .. } => AnalysisStage::Failed,
        }
    }
}

/// One delivered analysis, as handed to the API and the worker output.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub ticker: String,
    pub as_of_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub result: AnalysisResult,
}

struct MarketData {
    chain: Vec<RawContract>,
    spot: f64,
    closes: Vec<f64>,
}

/// Runs fetch, enrich, filter, select and build in order. Holds no per-run state.
pub struct Analyzer {
    provider: Box<dyn MarketDataProvider>,
    metrics: Box<dyn VolatilityMetricsProvider>,
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(
        provider: Box<dyn MarketDataProvider>,
        metrics: Box<dyn VolatilityMetricsProvider>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            provider,
            metrics,
            config,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub async fn analyze(&self, ticker: &str) -> AnalysisResult {
        self.analyze_as_of(ticker, Utc::now().date_naive()).await
    }

    pub async fn report(&self, ticker: &str, as_of_date: NaiveDate) -> AnalysisReport {
        let run_id = Uuid::new_v4();
        let result = self.analyze_as_of(ticker, as_of_date).await;
        AnalysisReport {
            run_id,
            ticker: ticker.to_string(),
            as_of_date,
            generated_at: Utc::now(),
            result,
        }
    }

    pub async fn analyze_as_of(&self, ticker: &str, as_of: NaiveDate) -> AnalysisResult {
        let mut run = Run::new(ticker);

        run.enter(AnalysisStage::FetchingData);
        let market = match self.fetch(ticker).await {
            Ok(m) => m,
            Err(error) => return run.fail(error),
        };
        if !(market.spot.is_finite() && market.spot > 0.0) {
            let err = anyhow::anyhow!("invalid latest price {} for {ticker}", market.spot);
            return run.fail(AnalysisError::unexpected(&err));
        }

        run.enter(AnalysisStage::Enriching);
        let contracts = enrich::enrich(
            &market.chain,
            market.spot,
            as_of,
            self.config.risk_free_rate,
            self.metrics.as_ref(),
            &market.closes,
        );

        run.enter(AnalysisStage::Filtering);
        let outcome = filter::filter(contracts);
        if outcome.survivors.is_empty() {
            run.enter(AnalysisStage::NoCandidate);
            tracing::info!(ticker, total = market.chain.len(), "no matching options");
            return AnalysisResult::NoCandidate(FilterDiagnostics {
                criteria: outcome.report,
            });
        }

        run.enter(AnalysisStage::Selecting);
        let trend = score_trend(&market.closes);
        let survivors = outcome.survivors.len();
        let Some(best) = select::select(outcome.survivors, trend.signal) else {
            let err = anyhow::anyhow!("no contract selected from {survivors} survivors");
            return run.fail(AnalysisError::unexpected(&err));
        };
        let Some(recommendation) = Recommendation::build(&best) else {
            let err = anyhow::anyhow!("selected contract is missing metrics: {best:?}");
            return run.fail(AnalysisError::unexpected(&err));
        };

        run.enter(AnalysisStage::Built);
        tracing::info!(
            ticker,
            survivors,
            trend_score = trend.score,
            signal = ?trend.signal,
            contract_type = %recommendation.contract_type,
            strike = recommendation.strike,
            expiration = %recommendation.expiration,
            "built recommendation"
        );
        AnalysisResult::Recommendation(recommendation)
    }

    async fn fetch(&self, ticker: &str) -> Result<MarketData, AnalysisError> {
        let provider = self.provider.provider_name();

        let chain = self
            .provider
            .option_chain(ticker, self.config.expirations)
            .await
            .and_then(|chain| {
                anyhow::ensure!(!chain.is_empty(), "empty option chain for {ticker}");
                Ok(chain)
            })
            .with_context(|| format!("{provider}: option chain"))
            .map_err(|e| AnalysisError::data_unavailable("option_chain", &e))?;

        let spot = self
            .provider
            .latest_price(ticker)
            .await
            .with_context(|| format!("{provider}: latest price"))
            .map_err(|e| AnalysisError::data_unavailable("latest_price", &e))?;

        let closes = self
            .provider
            .recent_closes(ticker, self.config.history_sessions)
            .await
            .with_context(|| format!("{provider}: recent closes"))
            .map_err(|e| AnalysisError::data_unavailable("recent_closes", &e))?;

        tracing::info!(
            ticker,
            provider,
            contracts = chain.len(),
            spot,
            sessions = closes.len(),
            "fetched market data"
        );

        Ok(MarketData {
            chain,
            spot,
            closes: closes.into_iter().map(|c| c.close).collect(),
        })
    }
}

/// Tracks the current stage of one `analyze` call for logging.
struct Run<'a> {
    ticker: &'a str,
    stage: AnalysisStage,
}

impl<'a> Run<'a> {
    fn new(ticker: &'a str) -> Self {
        Self {
            ticker,
            stage: AnalysisStage::Idle,
        }
    }

    fn enter(&mut self, next: AnalysisStage) {
        tracing::debug!(ticker = self.ticker, from = ?self.stage, to = ?next, "analysis stage");
        self.stage = next;
    }

    fn fail(mut self, error: AnalysisError) -> AnalysisResult {
        let failed_in = self.stage;
        self.enter(AnalysisStage::Failed);
        tracing::warn!(ticker = self.ticker, stage = ?failed_in, error = %error, "analysis failed");
        AnalysisResult::Failed { error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contract::{ContractType, OptionContract};
    use crate::market::fixture::{FixtureProvider, MarketSnapshot};
    use crate::market::DailyClose;
    use crate::volatility::VolatilityMetrics;

    /// Rank/ratio looked up by strike; unknown strikes get no metrics.
    struct ByStrike(Vec<(f64, f64, f64)>);

    impl VolatilityMetricsProvider for ByStrike {
        fn name(&self) -> &'static str {
            "by_strike"
        }

        fn assess(&self, contracts: &[OptionContract], _closes: &[f64]) -> Vec<Option<VolatilityMetrics>> {
            contracts
                .iter()
                .map(|c| {
                    self.0
                        .iter()
                        .find(|(strike, _, _)| *strike == c.strike)
                        .map(|&(_, rank, ratio)| VolatilityMetrics { rank, ratio })
                })
                .collect()
        }
    }

    struct Unreachable;

    #[async_trait::async_trait]
    impl MarketDataProvider for Unreachable {
        fn provider_name(&self) -> &'static str {
            "unreachable"
        }

        async fn option_chain(&self, _ticker: &str, _n: usize) -> anyhow::Result<Vec<RawContract>> {
            anyhow::bail!("connection refused")
        }

        async fn recent_closes(&self, _ticker: &str, _n: usize) -> anyhow::Result<Vec<DailyClose>> {
            anyhow::bail!("connection refused")
        }

        async fn latest_price(&self, _ticker: &str) -> anyhow::Result<f64> {
            anyhow::bail!("connection refused")
        }
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    /// Alternating +3 / -1 sessions: MA stack up and RSI 75, so calls are favored.
    fn uptrend_closes() -> Vec<DailyClose> {
        (0..60)
            .map(|i| DailyClose {
                date: as_of() - chrono::Duration::days(60 - i),
                close: 100.0 + i as f64 + if i % 2 == 1 { 2.0 } else { 0.0 },
            })
            .collect()
    }

    fn downtrend_closes() -> Vec<DailyClose> {
        uptrend_closes()
            .into_iter()
            .map(|c| DailyClose {
                close: 300.0 - c.close,
                ..c
            })
            .collect()
    }

    fn raw(contract_type: ContractType, strike: f64, expiration: NaiveDate, bid: f64, ask: f64) -> RawContract {
        RawContract {
            contract_type,
            strike,
            expiration,
            implied_volatility: Some(0.30),
            bid,
            ask,
        }
    }

    fn chain() -> Vec<RawContract> {
        let nov = NaiveDate::from_ymd_opt(2026, 11, 20).unwrap();
        let oct = NaiveDate::from_ymd_opt(2026, 10, 23).unwrap();
        vec![
            // Deltas at spot 100, 32 days, 30% IV: call 107 ~ 0.25, call 106 ~ 0.28,
            // put 95 ~ -0.26, call 100 ~ 0.53.
            raw(ContractType::Call, 107.0, nov, 0.50, 0.75),
            raw(ContractType::Call, 106.0, nov, 0.80, 0.90),
            raw(ContractType::Put, 95.0, nov, 1.00, 1.10),
            raw(ContractType::Call, 100.0, nov, 3.40, 3.60),
            raw(ContractType::Put, 95.0, oct, 0.10, 0.12),
        ]
    }

    fn rich_metrics() -> ByStrike {
        ByStrike(vec![
            (107.0, 80.0, 1.5),
            (106.0, 60.0, 1.5),
            (95.0, 90.0, 1.5),
            (100.0, 95.0, 1.5),
        ])
    }

    fn analyzer(closes: Vec<DailyClose>, contracts: Vec<RawContract>, metrics: ByStrike) -> Analyzer {
        let provider = FixtureProvider::from_snapshots([MarketSnapshot {
            ticker: "TEST".to_string(),
            latest_price: 100.0,
            closes,
            contracts,
        }]);
        Analyzer::new(Box::new(provider), Box::new(metrics), AnalysisConfig::default())
    }

    #[tokio::test]
    async fn uptrend_recommends_richest_call() {
        let a = analyzer(uptrend_closes(), chain(), rich_metrics());
        let result = a.analyze_as_of("TEST", as_of()).await;

        let rec = result.recommendation().expect("recommendation");
        assert_eq!(rec.contract_type, ContractType::Call);
        assert_eq!(rec.strike, 107.0);
        assert_eq!(rec.premium, 0.625);
        assert_eq!(rec.take_profit, 0.31);
        assert_eq!(rec.stop_loss, 1.25);
        assert_eq!(rec.volatility_rank, 80.0);
        assert_eq!(rec.implied_volatility, 30.0);
        assert!(rec.win_rate > 70.0 && rec.win_rate < 80.0);
        assert_eq!(result.stage(), AnalysisStage::Built);
    }

    #[tokio::test]
    async fn downtrend_recommends_put() {
        let a = analyzer(downtrend_closes(), chain(), rich_metrics());
        let result = a.analyze_as_of("TEST", as_of()).await;

        let rec = result.recommendation().expect("recommendation");
        assert_eq!(rec.contract_type, ContractType::Put);
        assert_eq!(rec.strike, 95.0);
        assert_eq!(rec.expiration, NaiveDate::from_ymd_opt(2026, 11, 20).unwrap());
        assert!(rec.delta < 0.0);
    }

    #[tokio::test]
    async fn empty_history_still_recommends() {
        let a = analyzer(Vec::new(), chain(), rich_metrics());
        let rec = a
            .analyze_as_of("TEST", as_of())
            .await
            .recommendation()
            .cloned()
            .expect("recommendation");
        // Defaults to the call side.
        assert_eq!(rec.strike, 107.0);
    }

    #[tokio::test]
    async fn no_survivors_yield_diagnostics() {
        let dull = ByStrike(vec![(107.0, 40.0, 1.5), (106.0, 40.0, 1.5), (95.0, 40.0, 1.1), (100.0, 45.0, 1.0)]);
        let a = analyzer(uptrend_closes(), chain(), dull);
        let result = a.analyze_as_of("TEST", as_of()).await;

        let AnalysisResult::NoCandidate(diag) = &result else {
            panic!("expected diagnostics, got {result:?}");
        };
        assert_eq!(diag.total(), 5);
        assert_eq!(diag.criteria[0].value, 5);
        assert_eq!(diag.criteria[1].value, 0);
        assert!(result.recommendation().is_none());
    }

    #[tokio::test]
    async fn provider_failure_is_data_unavailable() {
        let a = Analyzer::new(
            Box::new(Unreachable),
            Box::new(rich_metrics()),
            AnalysisConfig::default(),
        );
        let result = a.analyze_as_of("TEST", as_of()).await;
        match result {
            AnalysisResult::Failed {
                error: AnalysisError::DataUnavailable { stage, detail },
            } => {
                assert_eq!(stage, "option_chain");
                assert!(detail.contains("connection refused"));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_chain_is_data_unavailable() {
        let a = analyzer(uptrend_closes(), Vec::new(), rich_metrics());
        let result = a.analyze_as_of("TEST", as_of()).await;
        assert!(matches!(
            result,
            AnalysisResult::Failed {
                error: AnalysisError::DataUnavailable { .. }
            }
        ));
    }

    #[tokio::test]
    async fn report_serializes_with_status_tag() {
        let a = analyzer(uptrend_closes(), chain(), rich_metrics());
        let report = a.report("TEST", as_of()).await;
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["ticker"], "TEST");
        assert_eq!(v["as_of_date"], "2026-10-19");
        assert_eq!(v["result"]["status"], "recommendation");
        assert_eq!(v["result"]["contract_type"], "Call");
    }

    #[test]
    fn recommendation_accessor_only_for_success() {
        let diag = AnalysisResult::NoCandidate(FilterDiagnostics { criteria: Vec::new() });
        assert!(diag.recommendation().is_none());
        assert_eq!(diag.stage(), AnalysisStage::NoCandidate);
    }
}
