use serde::{Deserialize, Serialize};

pub const MA_SHORT: usize = 10;
pub const MA_MEDIUM: usize = 20;
pub const MA_LONG: usize = 50;
pub const RSI_PERIOD: usize = 14;
pub const BAND_PERIOD: usize = 20;
pub const BAND_WIDTH: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendSignal {
    FavorCalls,
    FavorPuts,
    Neutral,
}

impl TrendSignal {
    pub fn from_score(score: i32) -> Self {
        if score >= 2 {
            Self::FavorCalls
        } else if score <= -2 {
            Self::FavorPuts
        } else {
            Self::Neutral
        }
    }
}

/// Indicator values on the last session. `None` means not enough history for that indicator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendIndicators {
    pub price: f64,
    pub ma10: Option<f64>,
    pub ma20: Option<f64>,
    pub ma50: Option<f64>,
    pub rsi: Option<f64>,
    pub upper_band: Option<f64>,
    pub lower_band: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAssessment {
    pub signal: TrendSignal,
    pub score: i32,
    pub indicators: Option<TrendIndicators>,
}

pub fn score_trend(closes: &[f64]) -> TrendAssessment {
    let Some(indicators) = TrendIndicators::from_closes(closes) else {
        // No history: keep selling calls, same as an uptrend.
        return TrendAssessment {
            signal: TrendSignal::FavorCalls,
            score: 0,
            indicators: None,
        };
    };

    let score = indicators.score();
    let signal = TrendSignal::from_score(score);
    tracing::debug!(score, ?signal, ?indicators, "technical trend score");

    TrendAssessment {
        signal,
        score,
        indicators: Some(indicators),
    }
}

impl TrendIndicators {
    pub fn from_closes(closes: &[f64]) -> Option<Self> {
        let price = *closes.last()?;
        let (upper_band, lower_band) = match bollinger(closes, BAND_PERIOD, BAND_WIDTH) {
            Some((upper, lower)) => (Some(upper), Some(lower)),
            None => (None, None),
        };

        Some(Self {
            price,
            ma10: sma(closes, MA_SHORT),
            ma20: sma(closes, MA_MEDIUM),
            ma50: sma(closes, MA_LONG),
            rsi: rsi(closes, RSI_PERIOD),
            upper_band,
            lower_band,
        })
    }

    pub fn score(&self) -> i32 {
        self.moving_average_score() + self.rsi_score() + self.band_score()
    }

    fn moving_average_score(&self) -> i32 {
        let p = self.price;
        let (Some(ma10), Some(ma20), Some(ma50)) = (self.ma10, self.ma20, self.ma50) else {
            return 0;
        };

        if p > ma10 && ma10 > ma20 && ma20 > ma50 {
            2
        } else if p > ma20 && p > ma50 {
            1
        } else if p < ma10 && ma10 < ma20 && ma20 < ma50 {
            -2
        } else if p < ma20 && p < ma50 {
            -1
        } else {
            0
        }
    }

    fn rsi_score(&self) -> i32 {
        match self.rsi {
            Some(r) if r > 70.0 => 2,
            Some(r) if r > 60.0 => 1,
            Some(r) if r < 30.0 => -2,
            Some(r) if r < 40.0 => -1,
            _ => 0,
        }
    }

    fn band_score(&self) -> i32 {
        match (self.upper_band, self.lower_band) {
            (Some(upper), _) if self.price > upper => 2,
            (_, Some(lower)) if self.price < lower => -2,
            _ => 0,
        }
    }
}

/// Simple moving average of the last `window` values.
pub fn sma(values: &[f64], window: usize) -> Option<f64> {
    if window == 0 || values.len() < window {
        return None;
    }
    let tail = &values[values.len() - window..];
    Some(tail.iter().sum::<f64>() / window as f64)
}

/// RSI over the last `period` differences, using plain means of gains and losses.
/// Undefined when there are no losses in the window.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let tail = &closes[closes.len() - (period + 1)..];
    let (mut gains, mut losses) = (0.0, 0.0);
    for pair in tail.windows(2) {
        let diff = pair[1] - pair[0];
        if diff > 0.0 {
            gains += diff;
        } else {
            losses -= diff;
        }
    }

    let mean_gain = gains / period as f64;
    let mean_loss = losses / period as f64;
    if mean_loss <= 0.0 {
        return None;
    }
    Some(100.0 - 100.0 / (1.0 + mean_gain / mean_loss))
}

/// Sample standard deviation (n - 1) of the last `window` values.
pub fn rolling_std(values: &[f64], window: usize) -> Option<f64> {
    if window < 2 || values.len() < window {
        return None;
    }
    let tail = &values[values.len() - window..];
    let mean = tail.iter().sum::<f64>() / window as f64;
    let var = tail.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (window - 1) as f64;
    Some(var.sqrt())
}

/// `(upper, lower)` Bollinger bands around the `window` moving average.
pub fn bollinger(values: &[f64], window: usize, width: f64) -> Option<(f64, f64)> {
    let middle = sma(values, window)?;
    let std = rolling_std(values, window)?;
    Some((middle + width * std, middle - width * std))
}
