use serde::{Deserialize, Serialize};
use std::fmt;

/// B3 indices we know how to fetch a theoretical portfolio for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexId {
    /// Ibovespa, the broad-market index
    Ibov,
    /// Small Cap index
    Smll,
    /// Real-estate fund (FII) index
    Ifix,
}

impl IndexId {
    pub const ALL: [IndexId; 3] = [IndexId::Ibov, IndexId::Smll, IndexId::Ifix];

    /// Ticker-style code used in URLs and downloaded file names
    pub fn code(&self) -> &'static str {
        match self {
            IndexId::Ibov => "IBOV",
            IndexId::Smll => "SMLL",
            IndexId::Ifix => "IFIX",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "IBOV" => Some(IndexId::Ibov),
            "SMLL" => Some(IndexId::Smll),
            "IFIX" => Some(IndexId::Ifix),
            _ => None,
        }
    }
}

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One security in an index's theoretical portfolio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constituent {
    pub ticker: String,
    pub company_name: String,
    pub asset_type: String,
    pub sector: String,
    pub subsector: String,
    pub theoretical_qty: Option<f64>,
    pub weight_pct: Option<f64>,
}

/// Flat label -> value record for one security's detail page.
///
/// Labels are unique and insertion order is preserved so that columns come
/// out in page order when records are merged into a table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a label/value pair. A repeated label overwrites the earlier
    /// value, keeping its original position.
    pub fn insert(&mut self, label: impl Into<String>, value: impl Into<String>) {
        let label = label.into();
        let value = value.into();
        if let Some(slot) = self.entries.iter_mut().find(|(l, _)| *l == label) {
            slot.1 = value;
        } else {
            self.entries.push((label, value));
        }
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    /// Remove a label and return its value, if present.
    pub fn remove(&mut self, label: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(l, _)| l == label)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(l, _)| l.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Merged table of records, one row per ticker.
///
/// Columns are the union of all record labels in first-seen order. Rows that
/// end up missing a value for any column are dropped, so the table only ever
/// holds complete rows. Tickers whose page schema disagrees with the rest of
/// the universe fall out here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    columns: Vec<String>,
    rows: Vec<(String, Vec<String>)>,
}

impl DataTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from (ticker, record) pairs. Input order is preserved.
    pub fn from_records(records: Vec<(String, Record)>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for (_, record) in &records {
            for label in record.labels() {
                if !columns.iter().any(|c| c == label) {
                    columns.push(label.to_string());
                }
            }
        }

        let mut rows = Vec::new();
        'records: for (ticker, record) in records {
            let mut cells = Vec::with_capacity(columns.len());
            for column in &columns {
                match record.get(column) {
                    Some(value) if !value.is_empty() => cells.push(value.to_string()),
                    _ => continue 'records,
                }
            }
            rows.push((ticker, cells));
        }

        Self { columns, rows }
    }

    /// Build directly from a header and pre-shaped rows (screener pages).
    pub fn from_rows(columns: Vec<String>, rows: Vec<(String, Vec<String>)>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .filter(|(_, cells)| cells.len() == width)
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.rows.iter().map(|(t, cells)| (t.as_str(), cells.as_slice()))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, ticker: &str, column: &str) -> Option<&str> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows
            .iter()
            .find(|(t, _)| t == ticker)
            .map(|(_, cells)| cells[col].as_str())
    }

    /// Apply a cell transform to one column, if present. Cells the transform
    /// rejects are left untouched.
    pub fn map_column<F>(&mut self, column: &str, f: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(col) = self.columns.iter().position(|c| c == column) else {
            return;
        };
        for (_, cells) in &mut self.rows {
            if let Some(new) = f(&cells[col]) {
                cells[col] = new;
            }
        }
    }
}

/// Configuration for the application
#[derive(Debug, Clone)]
pub struct Config {
    pub fundamentus_base_url: String,
    pub b3_base_url: String,
    pub download_dir: String,
    pub download_timeout_secs: u64,
    pub download_poll_ms: u64,
    pub max_concurrency: usize,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub browser_cmd: Option<String>,
}

impl Config {
    /// Load configuration from environment variables, with defaults for
    /// everything. `.env` is honored when present.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Ok(Config {
            fundamentus_base_url: std::env::var("FDASH_FUNDAMENTUS_URL")
                .unwrap_or_else(|_| "https://www.fundamentus.com.br".to_string()),
            b3_base_url: std::env::var("FDASH_B3_URL")
                .unwrap_or_else(|_| "https://sistemaswebb3-listados.b3.com.br".to_string()),
            download_dir: std::env::var("FDASH_DOWNLOAD_DIR")
                .unwrap_or_else(|_| ".".to_string()),
            download_timeout_secs: std::env::var("FDASH_DOWNLOAD_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            download_poll_ms: std::env::var("FDASH_DOWNLOAD_POLL_MS")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .unwrap_or(500),
            max_concurrency: std::env::var("FDASH_MAX_CONCURRENCY")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .unwrap_or(4),
            http_timeout_secs: std::env::var("FDASH_HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            user_agent: std::env::var("FDASH_USER_AGENT").unwrap_or_else(|_| {
                "Mozilla/5.0 (Windows; U; Windows NT 6.1; rv:2.2) Gecko/20110201".to_string()
            }),
            browser_cmd: std::env::var("FDASH_BROWSER_CMD").ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_id_roundtrip() {
        for idx in IndexId::ALL {
            assert_eq!(IndexId::parse(idx.code()), Some(idx));
        }
        assert_eq!(IndexId::parse("ibov"), Some(IndexId::Ibov));
        assert_eq!(IndexId::parse("IBXX"), None);
    }

    #[test]
    fn test_record_insert_overwrites_in_place() {
        let mut r = Record::new();
        r.insert("P/L", "10,0");
        r.insert("ROE", "15%");
        r.insert("P/L", "12,0");

        assert_eq!(r.len(), 2);
        assert_eq!(r.get("P/L"), Some("12,0"));
        assert_eq!(r.labels().next(), Some("P/L"));
    }

    #[test]
    fn test_from_records_drops_incomplete_rows() {
        let mut a = Record::new();
        a.insert("Cotação", "10,00");
        a.insert("P/L", "8,5");

        let mut b = Record::new();
        b.insert("Cotação", "22,10");
        b.insert("P/L", "14,2");

        // Third record is missing P/L and must be dropped post-merge.
        let mut c = Record::new();
        c.insert("Cotação", "5,43");

        let table = DataTable::from_records(vec![
            ("AAAA3".into(), a),
            ("BBBB4".into(), b),
            ("CCCC11".into(), c),
        ]);

        assert_eq!(table.columns(), &["Cotação".to_string(), "P/L".to_string()]);
        assert_eq!(table.row_count(), 2);
        assert!(table.get("CCCC11", "Cotação").is_none());
        assert_eq!(table.get("BBBB4", "P/L"), Some("14,2"));
    }

    #[test]
    fn test_from_records_empty_input_is_empty_table() {
        let table = DataTable::from_records(Vec::new());
        assert!(table.is_empty());
        assert!(table.columns().is_empty());
    }

    #[test]
    fn test_map_column() {
        let mut table = DataTable::from_rows(
            vec!["DY".into()],
            vec![("AAAA3".into(), vec!["5,00%".into()])],
        );
        table.map_column("DY", |v| Some(v.replace('%', "")));
        assert_eq!(table.get("AAAA3", "DY"), Some("5,00"));
    }
}
