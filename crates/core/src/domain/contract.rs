use anyhow::ensure;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractType {
    #[serde(alias = "call", alias = "CALL", alias = "C")]
    Call,
    #[serde(alias = "put", alias = "PUT", alias = "P")]
    Put,
}

impl ContractType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "Call",
            Self::Put => "Put",
        }
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One option contract as delivered by a market-data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawContract {
    pub contract_type: ContractType,
    pub strike: f64,
    pub expiration: NaiveDate,
    pub implied_volatility: Option<f64>,
    pub bid: f64,
    pub ask: f64,
}

impl RawContract {
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.strike.is_finite() && self.strike > 0.0,
            "strike must be positive (got {})",
            self.strike
        );
        ensure!(
            self.bid.is_finite() && self.bid >= 0.0,
            "bid must be non-negative (got {})",
            self.bid
        );
        ensure!(
            self.ask.is_finite() && self.ask >= 0.0,
            "ask must be non-negative (got {})",
            self.ask
        );
        ensure!(
            self.bid <= self.ask,
            "bid {} exceeds ask {}",
            self.bid,
            self.ask
        );
        if let Some(iv) = self.implied_volatility {
            ensure!(iv >= 0.0, "implied volatility must be non-negative (got {iv})");
        }
        Ok(())
    }
}

/// A contract inside one analysis run: provider fields plus the derived metrics.
///
/// `None` in a derived field means the value could not be computed; such a contract never
/// passes the criterion that reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub contract_type: ContractType,
    pub strike: f64,
    pub expiration: NaiveDate,
    pub implied_volatility: Option<f64>,
    pub bid: f64,
    pub ask: f64,
    pub mid: f64,
    pub days_to_expiry: i64,
    pub delta: Option<f64>,
    pub delta_abs: Option<f64>,
    pub volatility_rank: Option<f64>,
    pub volatility_ratio: Option<f64>,
}

impl OptionContract {
    pub fn from_raw(raw: &RawContract, as_of: NaiveDate) -> Self {
        Self {
            contract_type: raw.contract_type,
            strike: raw.strike,
            expiration: raw.expiration,
            implied_volatility: raw.implied_volatility,
            bid: raw.bid,
            ask: raw.ask,
            mid: raw.mid(),
            days_to_expiry: (raw.expiration - as_of).num_days(),
            delta: None,
            delta_abs: None,
            volatility_rank: None,
            volatility_ratio: None,
        }
    }
}
