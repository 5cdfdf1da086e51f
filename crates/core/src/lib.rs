pub mod domain;
pub mod engine;
pub mod error;
pub mod market;
pub mod pricing;
pub mod trend;
pub mod volatility;

pub mod config {
    use anyhow::Context;
    use std::str::FromStr;

    pub const DEFAULT_RISK_FREE_RATE: f64 = 0.03;
    pub const DEFAULT_EXPIRATIONS: usize = 3;
    pub const DEFAULT_HISTORY_SESSIONS: usize = 60;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum VolatilityMetricsKind {
        Placeholder,
        Historical,
    }

    impl FromStr for VolatilityMetricsKind {
        type Err = anyhow::Error;

        fn from_str(s: &str) -> anyhow::Result<Self> {
            match s.trim().to_ascii_lowercase().as_str() {
                "placeholder" | "random" => Ok(Self::Placeholder),
                "historical" | "hv" => Ok(Self::Historical),
                other => anyhow::bail!("unknown volatility metrics kind: {other}"),
            }
        }
    }

    /// Immutable knobs of a single analysis run.
    #[derive(Debug, Clone)]
    pub struct AnalysisConfig {
        pub risk_free_rate: f64,
        pub expirations: usize,
        pub history_sessions: usize,
        pub volatility_metrics: VolatilityMetricsKind,
        pub volatility_seed: Option<u64>,
    }

    impl Default for AnalysisConfig {
        fn default() -> Self {
            Self {
                risk_free_rate: DEFAULT_RISK_FREE_RATE,
                expirations: DEFAULT_EXPIRATIONS,
                history_sessions: DEFAULT_HISTORY_SESSIONS,
                volatility_metrics: VolatilityMetricsKind::Placeholder,
                volatility_seed: None,
            }
        }
    }

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub sentry_dsn: Option<String>,
        pub data_provider_base_url: Option<String>,
        pub data_provider_timeout_secs: Option<u64>,
        pub data_provider_retries: Option<u32>,
        pub fixture_dir: Option<String>,
        pub watchlist: Option<String>,
        pub risk_free_rate: Option<f64>,
        pub expirations: Option<usize>,
        pub history_sessions: Option<usize>,
        pub volatility_metrics: Option<VolatilityMetricsKind>,
        pub volatility_seed: Option<u64>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                sentry_dsn: env_string("SENTRY_DSN"),
                data_provider_base_url: env_string("DATA_PROVIDER_BASE_URL"),
                data_provider_timeout_secs: env_parse("DATA_PROVIDER_TIMEOUT_SECS")?,
                data_provider_retries: env_parse("DATA_PROVIDER_RETRIES")?,
                fixture_dir: env_string("PREMIA_FIXTURE_DIR"),
                watchlist: env_string("PREMIA_WATCHLIST"),
                risk_free_rate: env_parse("PREMIA_RISK_FREE_RATE")?,
                expirations: env_parse("PREMIA_EXPIRATIONS")?,
                history_sessions: env_parse("PREMIA_HISTORY_SESSIONS")?,
                volatility_metrics: env_parse("PREMIA_VOL_METRICS")?,
                volatility_seed: env_parse("PREMIA_VOL_SEED")?,
            })
        }

        pub fn analysis_config(&self) -> anyhow::Result<AnalysisConfig> {
            let defaults = AnalysisConfig::default();
            let cfg = AnalysisConfig {
                risk_free_rate: self.risk_free_rate.unwrap_or(defaults.risk_free_rate),
                expirations: self.expirations.unwrap_or(defaults.expirations),
                history_sessions: self.history_sessions.unwrap_or(defaults.history_sessions),
                volatility_metrics: self
                    .volatility_metrics
                    .unwrap_or(defaults.volatility_metrics),
                volatility_seed: self.volatility_seed,
            };

            anyhow::ensure!(
                cfg.risk_free_rate.is_finite(),
                "PREMIA_RISK_FREE_RATE must be finite"
            );
            anyhow::ensure!(cfg.expirations >= 1, "PREMIA_EXPIRATIONS must be >= 1");
            anyhow::ensure!(
                cfg.history_sessions >= 1,
                "PREMIA_HISTORY_SESSIONS must be >= 1"
            );
            Ok(cfg)
        }

        /// Tickers from `PREMIA_WATCHLIST` (comma separated).
        pub fn watchlist(&self) -> Vec<String> {
            self.watchlist
                .as_deref()
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        }
    }

    fn env_string(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|s| !s.trim().is_empty())
    }

    fn env_parse<T>(key: &str) -> anyhow::Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let Some(raw) = env_string(key) else {
            return Ok(None);
        };
        raw.trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("invalid {key}: {raw}"))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn empty_settings() -> Settings {
            Settings {
                sentry_dsn: None,
                data_provider_base_url: None,
                data_provider_timeout_secs: None,
                data_provider_retries: None,
                fixture_dir: None,
                watchlist: None,
                risk_free_rate: None,
                expirations: None,
                history_sessions: None,
                volatility_metrics: None,
                volatility_seed: None,
            }
        }

        #[test]
        fn analysis_config_falls_back_to_defaults() {
            let cfg = empty_settings().analysis_config().unwrap();
            assert_eq!(cfg.risk_free_rate, DEFAULT_RISK_FREE_RATE);
            assert_eq!(cfg.expirations, 3);
            assert_eq!(cfg.history_sessions, 60);
            assert_eq!(cfg.volatility_metrics, VolatilityMetricsKind::Placeholder);
        }

        #[test]
        fn analysis_config_rejects_zero_expirations() {
            let mut settings = empty_settings();
            settings.expirations = Some(0);
            assert!(settings.analysis_config().is_err());
        }

        #[test]
        fn watchlist_splits_and_trims() {
            let mut settings = empty_settings();
            settings.watchlist = Some(" TSLA, MSFT,,META ".to_string());
            assert_eq!(settings.watchlist(), vec!["TSLA", "MSFT", "META"]);
        }

        #[test]
        fn parses_volatility_metrics_kind() {
            assert_eq!(
                "Historical".parse::<VolatilityMetricsKind>().unwrap(),
                VolatilityMetricsKind::Historical
            );
            assert!("nope".parse::<VolatilityMetricsKind>().is_err());
        }
    }
}
