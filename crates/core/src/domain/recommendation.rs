use crate::domain::contract::{ContractType, OptionContract};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

const TAKE_PROFIT_FRACTION: f64 = 0.5;
const STOP_LOSS_MULTIPLE: f64 = 2.0;

/// The contract to sell plus its risk guidance. Percent fields are already scaled to 0..100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub contract_type: ContractType,
    pub strike: f64,
    pub expiration: NaiveDate,
    pub implied_volatility: f64,
    pub volatility_rank: f64,
    pub volatility_ratio: f64,
    pub delta: f64,
    pub win_rate: f64,
    pub take_profit: f64,
    pub stop_loss: f64,
    pub premium: f64,
}

impl Recommendation {
    /// Returns `None` when the contract is missing one of the metrics a recommendation reports.
    pub fn build(contract: &OptionContract) -> Option<Self> {
        let delta = contract.delta?;
        let premium = contract.mid;

        Some(Self {
            contract_type: contract.contract_type,
            strike: contract.strike,
            expiration: contract.expiration,
            implied_volatility: round2(contract.implied_volatility? * 100.0),
            volatility_rank: round2(contract.volatility_rank?),
            volatility_ratio: round2(contract.volatility_ratio?),
            delta: round2(delta),
            win_rate: round2((1.0 - delta.abs()) * 100.0),
            take_profit: round2(premium * TAKE_PROFIT_FRACTION),
            stop_loss: round2(premium * STOP_LOSS_MULTIPLE),
            premium,
        })
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sell {} ${:.2} @ {}", self.contract_type, self.strike, self.expiration)?;
        writeln!(f, "  Premium:            ${:.2}", self.premium)?;
        writeln!(f, "  Delta:              {:.2}", self.delta)?;
        writeln!(f, "  Implied volatility: {:.2}%", self.implied_volatility)?;
        writeln!(f, "  IV rank:            {:.2}%", self.volatility_rank)?;
        writeln!(f, "  IV/HV ratio:        {:.2}", self.volatility_ratio)?;
        writeln!(f, "  Win rate:           {:.2}%", self.win_rate)?;
        writeln!(f, "  Take profit:        ${:.2}", self.take_profit)?;
        write!(f, "  Stop loss:          ${:.2}", self.stop_loss)
    }
}

/// Two decimals, ties to even on the exact binary value (0.125 -> 0.12, 0.625 -> 0.62).
pub(crate) fn round2(x: f64) -> f64 {
    format!("{x:.2}").parse().unwrap_or(x)
}
