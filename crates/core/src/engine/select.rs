use crate::domain::contract::{ContractType, OptionContract};
use crate::trend::TrendSignal;
use std::cmp::Ordering;

/// Picks the contract to sell: trend side first (when it has candidates), then the richest IV
/// rank, then the larger premium.
pub fn select(survivors: Vec<OptionContract>, signal: TrendSignal) -> Option<OptionContract> {
    let preferred = match signal {
        TrendSignal::FavorCalls => Some(ContractType::Call),
        TrendSignal::FavorPuts => Some(ContractType::Put),
        TrendSignal::Neutral => None,
    };

    let mut pool = survivors;
    if let Some(side) = preferred {
        let biased: Vec<OptionContract> = pool
            .iter()
            .filter(|c| c.contract_type == side)
            .cloned()
            .collect();
        if biased.is_empty() {
            tracing::debug!(?side, "no survivors on the trend side; keeping both sides");
        } else {
            pool = biased;
        }
    }

    // Stable sort, so equal keys keep provider order.
    pool.sort_by(rank_descending);
    pool.into_iter().next()
}

fn rank_descending(a: &OptionContract, b: &OptionContract) -> Ordering {
    let rank = |c: &OptionContract| c.volatility_rank.unwrap_or(f64::NEG_INFINITY);
    rank(b)
        .total_cmp(&rank(a))
        .then_with(|| b.mid.total_cmp(&a.mid))
}
