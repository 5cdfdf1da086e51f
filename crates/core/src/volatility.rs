use crate::config::{AnalysisConfig, VolatilityMetricsKind};
use crate::domain::contract::OptionContract;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
pub const HV_WINDOW: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolatilityMetrics {
    /// Percentile-like position of the contract's IV, 0..=100.
    pub rank: f64,
    /// Implied over historical volatility.
    pub ratio: f64,
}

pub trait VolatilityMetricsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// One entry per contract, in order. `None` leaves the contract without metrics.
    fn assess(&self, contracts: &[OptionContract], closes: &[f64]) -> Vec<Option<VolatilityMetrics>>;
}

pub fn from_config(cfg: &AnalysisConfig) -> Box<dyn VolatilityMetricsProvider> {
    match cfg.volatility_metrics {
        VolatilityMetricsKind::Placeholder => Box::new(PlaceholderVolatilityMetrics {
            seed: cfg.volatility_seed,
        }),
        VolatilityMetricsKind::Historical => Box::new(HistoricalVolatilityMetrics),
    }
}

/// Uniform draws standing in for a real IV history: rank in [30, 90), ratio in [1.1, 1.8).
#[derive(Debug, Clone, Default)]
pub struct PlaceholderVolatilityMetrics {
    pub seed: Option<u64>,
}

impl VolatilityMetricsProvider for PlaceholderVolatilityMetrics {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    fn assess(&self, contracts: &[OptionContract], _closes: &[f64]) -> Vec<Option<VolatilityMetrics>> {
        let mut rng = match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        contracts
            .iter()
            .map(|_| {
                Some(VolatilityMetrics {
                    rank: rng.gen_range(30.0..90.0),
                    ratio: rng.gen_range(1.1..1.8),
                })
            })
            .collect()
    }
}

/// Metrics derived from the underlying's realized volatility.
///
/// The ratio divides the contract IV by the latest 20-session realized volatility. The rank
/// places the contract IV inside the min..max range that the rolling realized volatility
/// covered over the price window.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoricalVolatilityMetrics;

impl VolatilityMetricsProvider for HistoricalVolatilityMetrics {
    fn name(&self) -> &'static str {
        "historical"
    }

    fn assess(&self, contracts: &[OptionContract], closes: &[f64]) -> Vec<Option<VolatilityMetrics>> {
        let returns = log_returns(closes);
        let series = rolling_realized_volatility(&returns, HV_WINDOW);

        let Some(&current) = series.last() else {
            tracing::warn!(closes = closes.len(), "not enough history for realized volatility");
            return vec![None; contracts.len()];
        };
        let low = series.iter().copied().fold(f64::INFINITY, f64::min);
        let high = series.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        contracts
            .iter()
            .map(|c| {
                let iv = c.implied_volatility.filter(|v| v.is_finite() && *v > 0.0)?;
                if current <= 0.0 {
                    return None;
                }
                Some(VolatilityMetrics {
                    rank: range_position(iv, low, high),
                    ratio: iv / current,
                })
            })
            .collect()
    }
}

pub fn log_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .collect()
}

/// Annualized sample standard deviation of `returns`.
pub fn realized_volatility(returns: &[f64]) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(var.sqrt() * TRADING_DAYS_PER_YEAR.sqrt())
}

fn rolling_realized_volatility(returns: &[f64], window: usize) -> Vec<f64> {
    if returns.len() < window {
        return Vec::new();
    }
    returns
        .windows(window)
        .filter_map(realized_volatility)
        .collect()
}

fn range_position(value: f64, low: f64, high: f64) -> f64 {
    if high > low {
        ((value - low) / (high - low) * 100.0).clamp(0.0, 100.0)
    } else if value > high {
        100.0
    } else if value < low {
        0.0
    } else {
        50.0
    }
}
