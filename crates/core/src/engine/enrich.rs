use crate::domain::contract::{OptionContract, RawContract};
use crate::pricing::compute_delta;
use crate::volatility::VolatilityMetricsProvider;
use chrono::NaiveDate;

/// Turns provider records into contracts carrying delta and volatility metrics.
///
/// Contracts whose delta cannot be computed keep `delta = None`; nothing is dropped here.
pub fn enrich(
    raw: &[RawContract],
    spot: f64,
    as_of: NaiveDate,
    risk_free_rate: f64,
    metrics: &dyn VolatilityMetricsProvider,
    closes: &[f64],
) -> Vec<OptionContract> {
    let mut contracts: Vec<OptionContract> = raw
        .iter()
        .map(|r| {
            let mut c = OptionContract::from_raw(r, as_of);
            c.delta = compute_delta(
                spot,
                c.strike,
                c.implied_volatility,
                c.days_to_expiry as f64,
                risk_free_rate,
                c.contract_type,
            );
            c.delta_abs = c.delta.map(f64::abs);
            c
        })
        .collect();

    let assessed = metrics.assess(&contracts, closes);
    debug_assert_eq!(assessed.len(), contracts.len());
    for (c, m) in contracts.iter_mut().zip(assessed) {
        if let Some(m) = m {
            c.volatility_rank = Some(m.rank);
            c.volatility_ratio = Some(m.ratio);
        }
    }

    let priced = contracts.iter().filter(|c| c.delta.is_some()).count();
    tracing::debug!(
        contracts = contracts.len(),
        priced,
        metrics = metrics.name(),
        "enriched option contracts"
    );
    contracts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contract::ContractType;
    use crate::volatility::PlaceholderVolatilityMetrics;

    fn raw(contract_type: ContractType, strike: f64, expiration: NaiveDate, iv: Option<f64>) -> RawContract {
        RawContract {
            contract_type,
            strike,
            expiration,
            implied_volatility: iv,
            bid: 1.0,
            ask: 1.2,
        }
    }

    #[test]
    fn sets_delta_and_metrics_per_contract() {
        let as_of = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let nov = NaiveDate::from_ymd_opt(2026, 11, 18).unwrap();
        let input = vec![
            raw(ContractType::Call, 100.0, nov, Some(0.30)),
            raw(ContractType::Put, 100.0, nov, Some(0.30)),
        ];

        let out = enrich(&input, 100.0, as_of, 0.03, &PlaceholderVolatilityMetrics { seed: Some(1) }, &[]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].days_to_expiry, 30);
        assert!((out[0].delta.unwrap() - 0.5286).abs() < 0.001);
        assert!((out[1].delta.unwrap() + 0.4714).abs() < 0.001);
        assert_eq!(out[1].delta_abs, out[1].delta.map(f64::abs));
        assert!(out.iter().all(|c| c.volatility_rank.is_some() && c.volatility_ratio.is_some()));
    }

    #[test]
    fn keeps_unpriceable_contracts_with_undefined_delta() {
        let as_of = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let input = vec![
            // Expires today.
            raw(ContractType::Call, 100.0, as_of, Some(0.30)),
            raw(ContractType::Call, 100.0, NaiveDate::from_ymd_opt(2026, 11, 20).unwrap(), None),
            raw(ContractType::Put, 100.0, NaiveDate::from_ymd_opt(2026, 11, 20).unwrap(), Some(0.0)),
        ];

        let out = enrich(&input, 100.0, as_of, 0.03, &PlaceholderVolatilityMetrics::default(), &[]);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|c| c.delta.is_none() && c.delta_abs.is_none()));
    }
}
