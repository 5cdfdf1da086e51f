pub mod contract;
pub mod recommendation;

use anyhow::ensure;

const MAX_TICKER_LEN: usize = 16;

/// Trims and upper-cases a ticker, rejecting anything that could not be a listed symbol.
pub fn normalize_ticker(raw: &str) -> anyhow::Result<String> {
    let ticker = raw.trim().to_ascii_uppercase();
    ensure!(!ticker.is_empty(), "ticker must be non-empty");
    ensure!(
        ticker.len() <= MAX_TICKER_LEN,
        "ticker too long ({} chars)",
        ticker.len()
    );
    ensure!(
        ticker
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '=')),
        "ticker contains invalid characters: {ticker}"
    );
    Ok(ticker)
}
