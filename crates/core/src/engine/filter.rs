use crate::domain::contract::OptionContract;
use serde::{Deserialize, Serialize};

pub const MIN_VOLATILITY_RANK: f64 = 50.0;
pub const MIN_VOLATILITY_RATIO: f64 = 1.2;
pub const DELTA_FLOOR: f64 = 0.2;
pub const DELTA_CEILING: f64 = 0.3;
pub const MIN_DAYS_TO_EXPIRY: i64 = 7;
pub const MAX_DAYS_TO_EXPIRY: i64 = 45;

pub const TOTAL_LABEL: &str = "Total Options";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    VolatilityRank,
    VolatilityRatio,
    Delta,
    DaysToExpiry,
}

impl Criterion {
    pub const ALL: [Criterion; 4] = [
        Criterion::VolatilityRank,
        Criterion::VolatilityRatio,
        Criterion::Delta,
        Criterion::DaysToExpiry,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::VolatilityRank => "IV Rank > 50",
            Self::VolatilityRatio => "IV/HV Ratio > 1.2",
            Self::Delta => "Delta in [0.2, 0.3]",
            Self::DaysToExpiry => "Expiration in 7-45 days",
        }
    }

    /// Undefined metrics never pass.
    pub fn passes(&self, c: &OptionContract) -> bool {
        match self {
            Self::VolatilityRank => c.volatility_rank.is_some_and(|r| r > MIN_VOLATILITY_RANK),
            Self::VolatilityRatio => c.volatility_ratio.is_some_and(|r| r > MIN_VOLATILITY_RATIO),
            Self::Delta => c
                .delta_abs
                .is_some_and(|d| d > DELTA_FLOOR && d < DELTA_CEILING),
            Self::DaysToExpiry => {
                (MIN_DAYS_TO_EXPIRY..=MAX_DAYS_TO_EXPIRY).contains(&c.days_to_expiry)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionCount {
    pub label: String,
    pub value: usize,
}

#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub survivors: Vec<OptionContract>,
    /// Total first, then one independent pass count per criterion.
    pub report: Vec<CriterionCount>,
}

pub fn filter(contracts: Vec<OptionContract>) -> FilterOutcome {
    let mut counts = [0usize; Criterion::ALL.len()];
    let total = contracts.len();
    let mut survivors = Vec::new();

    for c in contracts {
        let mut all = true;
        for (i, criterion) in Criterion::ALL.iter().enumerate() {
            if criterion.passes(&c) {
                counts[i] += 1;
            } else {
                all = false;
            }
        }
        if all {
            survivors.push(c);
        }
    }

    let mut report = Vec::with_capacity(counts.len() + 1);
    report.push(CriterionCount {
        label: TOTAL_LABEL.to_string(),
        value: total,
    });
    for (criterion, value) in Criterion::ALL.iter().zip(counts) {
        report.push(CriterionCount {
            label: criterion.label().to_string(),
            value,
        });
    }

    tracing::debug!(total, survivors = survivors.len(), ?counts, "filtered option contracts");
    FilterOutcome { survivors, report }
}
