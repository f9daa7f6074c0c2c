use thiserror::Error;

pub mod fundamentus_client;
pub use fundamentus_client::FundamentusClient;

/// What went wrong fetching one ticker.
///
/// Not-found and layout drift are deliberately distinct: a renamed page
/// section should be diagnosable without re-running with a debugger.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("ticker not found: {ticker}")]
    NotFound { ticker: String },

    #[error("page layout mismatch for {ticker}: {reason}")]
    LayoutMismatch { ticker: String, reason: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl FetchError {
    pub fn layout(ticker: &str, reason: impl Into<String>) -> Self {
        FetchError::LayoutMismatch {
            ticker: ticker.to_string(),
            reason: reason.into(),
        }
    }
}

/// Per-ticker result of a batch fetch. Failures stay visible to the caller
/// instead of being silently dropped.
#[derive(Debug)]
pub struct TickerOutcome {
    pub ticker: String,
    pub result: Result<crate::models::Record, FetchError>,
}

/// Tallies of a batch run, for the status bar and logs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub not_found: usize,
    pub layout_mismatch: usize,
    pub network_errors: usize,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[TickerOutcome]) -> Self {
        let mut summary = BatchSummary::default();
        for outcome in outcomes {
            match &outcome.result {
                Ok(_) => summary.succeeded += 1,
                Err(FetchError::NotFound { .. }) => summary.not_found += 1,
                Err(FetchError::LayoutMismatch { .. }) => summary.layout_mismatch += 1,
                Err(FetchError::Network(_)) => summary.network_errors += 1,
            }
        }
        summary
    }

    pub fn failed(&self) -> usize {
        self.not_found + self.layout_mismatch + self.network_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;

    #[test]
    fn test_batch_summary_counts() {
        let outcomes = vec![
            TickerOutcome {
                ticker: "AAAA3".into(),
                result: Ok(Record::new()),
            },
            TickerOutcome {
                ticker: "XXXX9".into(),
                result: Err(FetchError::NotFound {
                    ticker: "XXXX9".into(),
                }),
            },
            TickerOutcome {
                ticker: "BBBB4".into(),
                result: Err(FetchError::layout("BBBB4", "expected 5 tables, found 2")),
            },
        ];

        let summary = BatchSummary::from_outcomes(&outcomes);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.not_found, 1);
        assert_eq!(summary.layout_mismatch, 1);
        assert_eq!(summary.failed(), 2);
    }
}
