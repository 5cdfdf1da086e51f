use anyhow::Context;
use clap::Parser;
use premia_core::engine::{AnalysisReport, AnalysisResult, Analyzer};
use std::fmt::Write as _;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "premia_worker")]
struct Args {
    /// Tickers to analyze. Defaults to PREMIA_WATCHLIST.
    tickers: Vec<String>,

    /// Read market data from `<DIR>/<TICKER>.json` snapshots instead of the network.
    #[arg(long)]
    fixture_dir: Option<String>,

    /// Analysis date (YYYY-MM-DD) used for days-to-expiry. Defaults to today (UTC).
    #[arg(long)]
    as_of_date: Option<String>,

    /// Print one JSON report per line instead of text.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut settings = premia_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    if args.fixture_dir.is_some() {
        settings.fixture_dir = args.fixture_dir.clone();
    }

    let as_of_date = resolve_as_of_date(args.as_of_date.as_deref())?;
    let tickers = resolve_tickers(&args.tickers, settings.watchlist())?;

    let config = settings.analysis_config()?;
    let provider = premia_core::market::from_settings(&settings)?;
    let metrics = premia_core::volatility::from_config(&config);
    let analyzer = Analyzer::new(provider, metrics, config);

    let mut recommended = 0usize;
    for ticker in &tickers {
        let report = analyzer.report(ticker, as_of_date).await;

        match &report.result {
            AnalysisResult::Recommendation(_) => recommended += 1,
            AnalysisResult::NoCandidate(_) => {}
            AnalysisResult::Failed { error } => {
                sentry_anyhow::capture_anyhow(&anyhow::Error::new(error.clone()));
                tracing::error!(%ticker, run_id = %report.run_id, error = %error, "analysis run failed");
            }
        }

        if args.json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            println!("{}", render_text(&report));
        }
    }

    tracing::info!(%as_of_date, tickers = tickers.len(), recommended, "worker run finished");
    Ok(())
}

fn resolve_tickers(args: &[String], watchlist: Vec<String>) -> anyhow::Result<Vec<String>> {
    let raw = if args.is_empty() { watchlist } else { args.to_vec() };
    anyhow::ensure!(
        !raw.is_empty(),
        "no tickers given (pass them as arguments or set PREMIA_WATCHLIST)"
    );
    raw.iter()
        .map(|t| premia_core::domain::normalize_ticker(t))
        .collect()
}

fn resolve_as_of_date(as_of_date_arg: Option<&str>) -> anyhow::Result<chrono::NaiveDate> {
    if let Some(s) = as_of_date_arg {
        return chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid --as-of-date: {s}"));
    }
    Ok(chrono::Utc::now().date_naive())
}

fn render_text(report: &AnalysisReport) -> String {
    let mut out = format!("== {} ({})\n", report.ticker, report.as_of_date);
    match &report.result {
        AnalysisResult::Recommendation(rec) => {
            let _ = write!(out, "{rec}");
        }
        AnalysisResult::NoCandidate(diag) => {
            out.push_str("No matching options");
            for c in &diag.criteria {
                let _ = write!(out, "\n  {:<26}{:>6}", c.label, c.value);
            }
        }
        AnalysisResult::Failed { error } => {
            let _ = write!(out, "No recommendation: {error}");
        }
    }
    out
}

fn init_sentry(settings: &premia_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
