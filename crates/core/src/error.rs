use serde::Serialize;
use std::fmt;

/// Why an analysis produced no recommendation and no diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisError {
    /// The market-data provider failed or returned nothing to analyze.
    DataUnavailable { stage: &'static str, detail: String },
    UnexpectedFailure { detail: String },
}

impl AnalysisError {
    pub fn data_unavailable(stage: &'static str, err: &anyhow::Error) -> Self {
        Self::DataUnavailable {
            stage,
            detail: format!("{err:#}"),
        }
    }

    pub fn unexpected(err: &anyhow::Error) -> Self {
        Self::UnexpectedFailure {
            detail: format!("{err:#}"),
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataUnavailable { stage, detail } => {
                write!(f, "market data unavailable (stage={stage}): {detail}")
            }
            Self::UnexpectedFailure { detail } => write!(f, "analysis failed: {detail}"),
        }
    }
}

impl std::error::Error for AnalysisError {}
