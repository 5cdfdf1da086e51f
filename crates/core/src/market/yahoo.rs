use crate::config::Settings;
use crate::domain::contract::{ContractType, RawContract};
use crate::market::{DailyClose, MarketDataProvider};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const COOKIE_URL: &str = "https://fc.yahoo.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 3;
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Debug, Clone)]
pub struct YahooFinanceProvider {
    http: reqwest::Client,
    base_url: String,
    retries: u32,
    crumb: tokio::sync::OnceCell<String>,
}

impl YahooFinanceProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .data_provider_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout_secs = settings
            .data_provider_timeout_secs
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let retries = settings.data_provider_retries.unwrap_or(DEFAULT_RETRIES).max(1);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .cookie_store(true)
            .build()
            .context("failed to build market data http client")?;

        Ok(Self {
            http,
            base_url,
            retries,
            crumb: tokio::sync::OnceCell::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers
    }

    /// Session crumb the options endpoint expects. `None` when the handshake fails; the request
    /// then goes out without one.
    // TODO: refresh the crumb when the options endpoint answers 401 after it expires.
    async fn crumb(&self) -> Option<String> {
        match self.crumb.get_or_try_init(|| self.fetch_crumb()).await {
            Ok(crumb) => Some(crumb.clone()),
            Err(err) => {
                tracing::warn!(error = %err, "yahoo crumb handshake failed; requesting without crumb");
                None
            }
        }
    }

    async fn fetch_crumb(&self) -> Result<String> {
        // Only the session cookie matters here; the status is usually 404.
        self.http
            .get(COOKIE_URL)
            .headers(Self::headers())
            .send()
            .await
            .context("yahoo cookie request failed")?;

        let res = self
            .http
            .get(self.url("/v1/test/getcrumb"))
            .headers(Self::headers())
            .send()
            .await
            .context("yahoo crumb request failed")?;
        let status = res.status();
        let body = res.text().await.context("failed to read yahoo crumb")?;
        anyhow::ensure!(status.is_success(), "yahoo crumb HTTP {status}: {body}");
        parse_crumb(&body)
    }

    async fn fetch_once<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let res = self
            .http
            .get(self.url(path))
            .headers(Self::headers())
            .query(query)
            .send()
            .await
            .context("market data request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read market data response")?;
        let raw_json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("market data response is not valid JSON: {text}"))?;

        if !status.is_success() {
            anyhow::bail!("market data HTTP {status}: {raw_json}");
        }

        serde_json::from_value::<T>(raw_json).with_context(|| format!("unexpected shape for {path}"))
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once(path, query).await {
                Ok(parsed) => return Ok(parsed),
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(attempt, path, ?backoff, error = %err, "market data fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    async fn options_result(&self, ticker: &str, date: Option<i64>) -> Result<OptionChainResult> {
        let crumb = self.crumb().await;
        let query = options_query(date, crumb.as_deref());
        let envelope: OptionsEnvelope = self
            .fetch_json(&format!("/v7/finance/options/{ticker}"), &query)
            .await?;
        envelope
            .option_chain
            .result
            .into_iter()
            .next()
            .with_context(|| format!("no option chain returned for {ticker}"))
    }

    async fn chart_result(&self, ticker: &str, sessions: usize) -> Result<ChartResult> {
        let query = [
            ("range", chart_range(sessions).to_string()),
            ("interval", "1d".to_string()),
        ];
        let envelope: ChartEnvelope = self
            .fetch_json(&format!("/v8/finance/chart/{ticker}"), &query)
            .await?;
        envelope
            .chart
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .with_context(|| format!("no price history returned for {ticker}"))
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for YahooFinanceProvider {
    fn provider_name(&self) -> &'static str {
        "yahoo_finance"
    }

    async fn option_chain(
        &self,
        ticker: &str,
        nearest_expirations: usize,
    ) -> Result<Vec<RawContract>> {
        let listing = self.options_result(ticker, None).await?;

        let mut out = Vec::new();
        for &ts in listing.expiration_dates.iter().take(nearest_expirations) {
            let result = self.options_result(ticker, Some(ts)).await?;
            for set in &result.options {
                out.extend(contracts_from_option_set(set));
            }
        }

        tracing::debug!(ticker, contracts = out.len(), "fetched option chain");
        Ok(out)
    }

    async fn recent_closes(&self, ticker: &str, sessions: usize) -> Result<Vec<DailyClose>> {
        let chart = self.chart_result(ticker, sessions).await?;
        let mut closes = closes_from_chart(&chart);
        if closes.len() > sessions {
            closes.drain(..closes.len() - sessions);
        }
        Ok(closes)
    }

    async fn latest_price(&self, ticker: &str) -> Result<f64> {
        let chart = self.chart_result(ticker, 1).await?;
        chart
            .meta
            .regular_market_price
            .or_else(|| closes_from_chart(&chart).last().map(|c| c.close))
            .with_context(|| format!("no latest price for {ticker}"))
    }
}

fn options_query(date: Option<i64>, crumb: Option<&str>) -> Vec<(&'static str, String)> {
    let mut query = Vec::with_capacity(2);
    if let Some(d) = date {
        query.push(("date", d.to_string()));
    }
    if let Some(c) = crumb {
        query.push(("crumb", c.to_string()));
    }
    query
}

fn parse_crumb(body: &str) -> Result<String> {
    let crumb = body.trim();
    anyhow::ensure!(
        !crumb.is_empty() && !crumb.contains(char::is_whitespace) && !crumb.contains('<'),
        "unexpected yahoo crumb body: {crumb}"
    );
    Ok(crumb.to_string())
}

/// Smallest chart range that covers `sessions` trading days.
fn chart_range(sessions: usize) -> &'static str {
    match sessions {
        0..=5 => "5d",
        6..=18 => "1mo",
        19..=55 => "3mo",
        56..=115 => "6mo",
        116..=240 => "1y",
        _ => "2y",
    }
}

fn timestamp_to_date(ts: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive())
}

fn contracts_from_option_set(set: &OptionSet) -> Vec<RawContract> {
    let sides = [
        (ContractType::Call, &set.calls),
        (ContractType::Put, &set.puts),
    ];

    let mut out = Vec::with_capacity(set.calls.len() + set.puts.len());
    for (contract_type, quotes) in sides {
        for q in quotes.iter() {
            let Some(strike) = q.strike else {
                continue;
            };
            let Some(expiration) = q.expiration.or(set.expiration_date).and_then(timestamp_to_date)
            else {
                continue;
            };

            let raw = RawContract {
                contract_type,
                strike,
                expiration,
                implied_volatility: q.implied_volatility,
                bid: q.bid.unwrap_or(0.0),
                ask: q.ask.unwrap_or(0.0),
            };
            match raw.validate() {
                Ok(()) => out.push(raw),
                Err(err) => tracing::debug!(error = %err, strike, "skipping malformed quote"),
            }
        }
    }
    out
}

fn closes_from_chart(chart: &ChartResult) -> Vec<DailyClose> {
    let Some(quote) = chart.indicators.quote.first() else {
        return Vec::new();
    };

    chart
        .timestamp
        .iter()
        .zip(quote.close.iter())
        .filter_map(|(&ts, close)| {
            let close = (*close)?;
            Some(DailyClose {
                date: timestamp_to_date(ts)?,
                close,
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionsEnvelope {
    option_chain: OptionChainBody,
}

#[derive(Debug, Deserialize)]
struct OptionChainBody {
    #[serde(default)]
    result: Vec<OptionChainResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionChainResult {
    #[serde(default)]
    expiration_dates: Vec<i64>,
    #[serde(default)]
    options: Vec<OptionSet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionSet {
    #[serde(default)]
    expiration_date: Option<i64>,
    #[serde(default)]
    calls: Vec<YahooOptionQuote>,
    #[serde(default)]
    puts: Vec<YahooOptionQuote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YahooOptionQuote {
    #[serde(default)]
    strike: Option<f64>,
    #[serde(default)]
    expiration: Option<i64>,
    #[serde(default)]
    bid: Option<f64>,
    #[serde(default)]
    ask: Option<f64>,
    #[serde(default)]
    implied_volatility: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}
