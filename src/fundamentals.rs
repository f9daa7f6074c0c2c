//! Fundamentals fetching: one detail page per ticker, fanned out with a
//! bounded concurrency cap, merged into a per-universe table.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::api::{BatchSummary, FetchError, FundamentusClient, TickerOutcome};
use crate::detail::{self, EQUITY_KEY_LABEL, FII_KEY_LABEL};
use crate::models::{Config, DataTable, Record};

/// Which detail-page layout to expect for a ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityKind {
    Equity,
    Fii,
}

impl SecurityKind {
    /// Label under which the page states its own ticker; doubles as the row
    /// key when records are merged.
    fn key_label(&self) -> &'static str {
        match self {
            SecurityKind::Equity => EQUITY_KEY_LABEL,
            SecurityKind::Fii => FII_KEY_LABEL,
        }
    }
}

/// Result of a batch run: the merged table plus every per-ticker outcome.
#[derive(Debug)]
pub struct BatchResult {
    pub table: DataTable,
    pub outcomes: Vec<TickerOutcome>,
    pub summary: BatchSummary,
}

/// Fetches and normalizes fundamentals detail pages.
pub struct FundamentalsFetcher {
    client: Arc<FundamentusClient>,
    semaphore: Arc<Semaphore>,
    max_concurrency: usize,
}

impl FundamentalsFetcher {
    pub fn new(client: FundamentusClient, config: &Config) -> Self {
        let max_concurrency = config.max_concurrency.max(1);
        Self {
            client: Arc::new(client),
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
        }
    }

    /// Fetch and normalize one detail page.
    pub async fn fetch_detail(
        &self,
        kind: SecurityKind,
        ticker: &str,
    ) -> Result<Record, FetchError> {
        Self::fetch_detail_ref(&self.client, kind, ticker).await
    }

    async fn fetch_detail_ref(
        client: &FundamentusClient,
        kind: SecurityKind,
        ticker: &str,
    ) -> Result<Record, FetchError> {
        let ticker = ticker.to_uppercase();
        debug!("Fetching detail page for {}", ticker);

        let html = client.get_detail_page(&ticker).await?;
        let record = match kind {
            SecurityKind::Equity => detail::equity_record(&html, &ticker)?,
            SecurityKind::Fii => detail::fii_record(&html, &ticker)?,
        };

        if record.get(kind.key_label()).is_none() {
            return Err(FetchError::layout(
                &ticker,
                format!("record is missing its {:?} key field", kind.key_label()),
            ));
        }
        Ok(record)
    }

    /// Fetch a list of tickers concurrently (bounded) and merge the
    /// successful records into one table keyed by ticker.
    ///
    /// Failures are kept as typed outcomes rather than silently skipped;
    /// rows left with missing values after the column-union merge are
    /// dropped from the table.
    pub async fn fetch_batch(&self, kind: SecurityKind, tickers: &[String]) -> BatchResult {
        let mut indexed: Vec<(usize, TickerOutcome)> =
            stream::iter(tickers.iter().cloned().enumerate())
                .map(|(index, ticker)| {
                    let client = self.client.clone();
                    let semaphore = self.semaphore.clone();
                    let ticker = ticker.to_uppercase();
                    async move {
                        let _permit = semaphore.acquire().await.unwrap();
                        let result = Self::fetch_detail_ref(&client, kind, &ticker).await;
                        (index, TickerOutcome { ticker, result })
                    }
                })
                .buffer_unordered(self.max_concurrency)
                .collect()
                .await;

        // Completion order is arbitrary; restore input order.
        indexed.sort_by_key(|(index, _)| *index);
        let outcomes: Vec<TickerOutcome> = indexed.into_iter().map(|(_, o)| o).collect();

        let key_label = kind.key_label();
        let mut records = Vec::new();
        for outcome in &outcomes {
            match &outcome.result {
                Ok(record) => {
                    let mut record = record.clone();
                    if let Some(key) = record.remove(key_label) {
                        records.push((key, record));
                    }
                }
                Err(err) => {
                    warn!("Skipping {} in merged table: {}", outcome.ticker, err);
                }
            }
        }

        let summary = BatchSummary::from_outcomes(&outcomes);
        BatchResult {
            table: DataTable::from_records(records),
            outcomes,
            summary,
        }
    }
}
