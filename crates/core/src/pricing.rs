use crate::domain::contract::ContractType;

pub const DAYS_PER_YEAR: f64 = 365.0;

/// Standard normal cumulative distribution function.
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * (1.0 + libm::erf(x / std::f64::consts::SQRT_2))
}

/// Delta of a European option, or `None` when the inputs admit no meaningful value
/// (expired contract, missing or non-positive volatility, non-positive prices).
pub fn compute_delta(
    spot: f64,
    strike: f64,
    implied_vol: Option<f64>,
    days_to_expiry: f64,
    risk_free_rate: f64,
    contract_type: ContractType,
) -> Option<f64> {
    let t = days_to_expiry / DAYS_PER_YEAR;
    let sigma = implied_vol.filter(|v| v.is_finite() && *v > 0.0)?;
    if !(t > 0.0) || !(spot > 0.0) || !(strike > 0.0) {
        return None;
    }

    let d1 = ((spot / strike).ln() + (risk_free_rate + 0.5 * sigma * sigma) * t)
        / (sigma * t.sqrt());
    let call_delta = norm_cdf(d1);

    Some(match contract_type {
        ContractType::Call => call_delta,
        ContractType::Put => call_delta - 1.0,
    })
}
