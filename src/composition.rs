//! Index composition fetching.
//!
//! B3 publishes the theoretical portfolio of an index as a downloadable CSV
//! (semicolon-separated, ISO-8859-1, title banner on line one and a two-line
//! totals footer). The download itself goes through a pluggable
//! [`DownloadAgent`]; this module finds the file, waits for it to appear
//! with a bounded timeout, and parses it into [`Constituent`] records.
//!
//! Downloaded files are deliberately left in place and act as a single-slot
//! cache keyed by file-name prefix; delete the file to force a re-download.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::download::DownloadAgent;
use crate::models::{Config, Constituent, IndexId};
use crate::utils::{parse_br_number, perc_to_float};

pub struct CompositionFetcher {
    download_dir: PathBuf,
    agent: Box<dyn DownloadAgent>,
    download_timeout: Duration,
    poll_interval: Duration,
}

impl CompositionFetcher {
    pub fn new(config: &Config, agent: Box<dyn DownloadAgent>) -> Self {
        Self {
            download_dir: PathBuf::from(&config.download_dir),
            agent,
            download_timeout: Duration::from_secs(config.download_timeout_secs),
            poll_interval: Duration::from_millis(config.download_poll_ms),
        }
    }

    /// Fetch the theoretical portfolio for one index.
    ///
    /// Returns `Ok(None)` when no portfolio file could be located even after
    /// asking the download agent; absence is reported, not raised.
    pub async fn fetch(&self, index: IndexId) -> Result<Option<Vec<Constituent>>> {
        let file = match self.locate_file(index) {
            Some(file) => file,
            None => {
                info!("No local {} portfolio file, requesting download", index);
                self.agent.request_download(index).await?;
                match self.wait_for_file(index).await {
                    Some(file) => file,
                    None => {
                        warn!(
                            "No {} portfolio CSV appeared in {:?} within {:?}",
                            index, self.download_dir, self.download_timeout
                        );
                        return Ok(None);
                    }
                }
            }
        };

        if let Ok(meta) = std::fs::metadata(&file) {
            if let Ok(modified) = meta.modified() {
                let modified: DateTime<Utc> = modified.into();
                info!(
                    "Using portfolio file {:?} (modified {})",
                    file.file_name().unwrap_or_default(),
                    modified.format("%Y-%m-%d %H:%M")
                );
            }
        }

        let bytes = std::fs::read(&file)
            .with_context(|| format!("reading portfolio file {file:?}"))?;
        let text = encoding_rs::mem::decode_latin1(&bytes);
        let constituents = parse_portfolio_csv(&text)
            .with_context(|| format!("parsing portfolio file {file:?}"))?;
        Ok(Some(constituents))
    }

    /// First file in the download directory named `<INDEX>…csv`.
    fn locate_file(&self, index: IndexId) -> Option<PathBuf> {
        find_portfolio_file(&self.download_dir, index)
    }

    /// Poll for the downloaded file instead of sleeping a guessed duration;
    /// gives a definite outcome within the configured timeout.
    async fn wait_for_file(&self, index: IndexId) -> Option<PathBuf> {
        let deadline = Instant::now() + self.download_timeout;
        loop {
            if let Some(file) = self.locate_file(index) {
                return Some(file);
            }
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

pub fn find_portfolio_file(dir: &Path, index: IndexId) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with(index.code()) && name.to_lowercase().ends_with(".csv") {
            return Some(entry.path());
        }
    }
    None
}

/// Parse a decoded B3 portfolio CSV.
///
/// Line 1 is a title banner, line 2 the header, and the last two non-empty
/// lines are the theoretical-quantity total and reductor footer.
pub fn parse_portfolio_csv(text: &str) -> Result<Vec<Constituent>> {
    let mut lines: Vec<&str> = text.lines().collect();
    while matches!(lines.last(), Some(l) if l.trim().is_empty()) {
        lines.pop();
    }
    if lines.len() < 4 {
        anyhow::bail!("portfolio CSV too short: {} lines", lines.len());
    }
    // Drop title banner and totals footer.
    let body = lines[1..lines.len() - 2].join("\n");

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers = reader.headers().context("portfolio CSV header")?.clone();
    let sector_col = find_col(&headers, "Setor")?;
    let ticker_col = find_col(&headers, "Código")?;
    let name_col = find_col(&headers, "Ação").or_else(|_| find_col(&headers, "Fundo"));
    let type_col = find_col(&headers, "Tipo");
    let qty_col = find_col(&headers, "Qtde");
    let weight_col = find_col(&headers, "Part");

    let mut constituents = Vec::new();
    for result in reader.records() {
        let record = result.context("portfolio CSV row")?;
        let Some(ticker) = record.get(ticker_col).map(str::trim) else {
            continue;
        };
        if ticker.is_empty() {
            continue;
        }

        let sector_raw = record.get(sector_col).unwrap_or("").trim();
        let (sector, subsector) = split_sector(sector_raw);

        constituents.push(Constituent {
            ticker: ticker.to_string(),
            company_name: field(&record, &name_col),
            asset_type: field(&record, &type_col),
            sector: fix_sector(&sector).to_string(),
            subsector,
            theoretical_qty: numeric_field(&record, &qty_col, parse_br_number),
            weight_pct: numeric_field(&record, &weight_col, |s| {
                perc_to_float(s).or_else(|_| parse_br_number(s))
            }),
        });
    }

    Ok(constituents)
}

fn find_col(headers: &csv::StringRecord, prefix: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim().starts_with(prefix))
        .with_context(|| format!("portfolio CSV has no {prefix:?} column"))
}

fn field(record: &csv::StringRecord, col: &Result<usize>) -> String {
    col.as_ref()
        .ok()
        .and_then(|&c| record.get(c))
        .unwrap_or("")
        .trim()
        .to_string()
}

fn numeric_field<F>(record: &csv::StringRecord, col: &Result<usize>, parse: F) -> Option<f64>
where
    F: Fn(&str) -> Result<f64, crate::utils::NumberFormatError>,
{
    let raw = col.as_ref().ok().and_then(|&c| record.get(c))?.trim();
    parse(raw).ok()
}

/// Split the combined "Setor / Subsetor" field on its last '/'. The sector
/// part may itself contain slashes; only the rightmost one separates the
/// subsector. Without any '/', both halves are the whole trimmed string.
pub fn split_sector(raw: &str) -> (String, String) {
    match raw.rfind('/') {
        Some(pos) => (
            raw[..pos].trim().to_string(),
            raw[pos + 1..].trim().to_string(),
        ),
        None => (raw.trim().to_string(), raw.trim().to_string()),
    }
}

/// Shape constituents into a table for the presentation layer.
pub fn composition_table(constituents: &[Constituent]) -> crate::models::DataTable {
    let columns = vec![
        "Ação".to_string(),
        "Tipo".to_string(),
        "Setor".to_string(),
        "Subsetor".to_string(),
        "Qtde. Teórica".to_string(),
        "Part. (%)".to_string(),
    ];
    let rows = constituents
        .iter()
        .map(|c| {
            (
                c.ticker.clone(),
                vec![
                    c.company_name.clone(),
                    c.asset_type.clone(),
                    c.sector.clone(),
                    c.subsector.clone(),
                    c.theoretical_qty.map(|q| q.to_string()).unwrap_or_default(),
                    c.weight_pct.map(|w| w.to_string()).unwrap_or_default(),
                ],
            )
        })
        .collect();
    crate::models::DataTable::from_rows(columns, rows)
}

/// Corrections for known-bad sector labels in the upstream files.
pub fn fix_sector(sector: &str) -> &str {
    match sector {
        "Cons N  Básico" | "Cons N Ciclico" => "Consumo Não-Cíclico",
        "Financ e Outros" | "Financeiro e Outros" => "Financeiro",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CSV: &str = "\
IBOV - Carteira do Dia 20/08/26
Setor;Código;Ação;Tipo;Qtde. Teórica;Part. (%)
Financ e Outros / Bancos;AAAA3;BANCO AAAA;ON;1.234.567;10,500
Petróleo, Gás e Bio / Petróleo;BBBB4;PETRO BBBB;PN N1;987.654;8,250
Cons N Ciclico / Alimentos;CCCC3;ALIM CCCC;ON NM;500.000;1,020
Quantidade Teórica Total;;;;2.722.221;
Redutor;;;;1,23456;
";

    #[test]
    fn test_parse_portfolio_csv() {
        let constituents = parse_portfolio_csv(SAMPLE_CSV).unwrap();
        assert_eq!(constituents.len(), 3);

        let first = &constituents[0];
        assert_eq!(first.ticker, "AAAA3");
        assert_eq!(first.company_name, "BANCO AAAA");
        assert_eq!(first.asset_type, "ON");
        assert_eq!(first.sector, "Financeiro"); // corrected label
        assert_eq!(first.subsector, "Bancos");
        assert_eq!(first.theoretical_qty, Some(1_234_567.0));
        assert_eq!(first.weight_pct, Some(10.5));

        // Sector part containing a comma and spaces survives intact.
        let second = &constituents[1];
        assert_eq!(second.sector, "Petróleo, Gás e Bio");
        assert_eq!(second.subsector, "Petróleo");

        let third = &constituents[2];
        assert_eq!(third.sector, "Consumo Não-Cíclico");
    }

    #[test]
    fn test_parse_portfolio_csv_too_short() {
        assert!(parse_portfolio_csv("just a title\n").is_err());
    }

    #[test]
    fn test_split_sector_last_slash_wins() {
        let (sector, sub) = split_sector("Mats Básicos / Sid / Metalurgia");
        assert_eq!(sector, "Mats Básicos / Sid");
        assert_eq!(sub, "Metalurgia");
    }

    #[test]
    fn test_split_sector_no_slash() {
        let (sector, sub) = split_sector("  Utilidade Públ  ");
        assert_eq!(sector, "Utilidade Públ");
        assert_eq!(sub, "Utilidade Públ");
    }

    #[test]
    fn test_fix_sector_corrections() {
        assert_eq!(fix_sector("Cons N  Básico"), "Consumo Não-Cíclico");
        assert_eq!(fix_sector("Cons N Ciclico"), "Consumo Não-Cíclico");
        assert_eq!(fix_sector("Financ e Outros"), "Financeiro");
        assert_eq!(fix_sector("Financeiro e Outros"), "Financeiro");
        assert_eq!(fix_sector("Saúde"), "Saúde");
    }

    #[test]
    fn test_find_portfolio_file_prefix_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("IBOVDia_20-08-26.csv"), "x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let found = find_portfolio_file(dir.path(), IndexId::Ibov).unwrap();
        assert_eq!(found.file_name().unwrap(), "IBOVDia_20-08-26.csv");
        assert!(find_portfolio_file(dir.path(), IndexId::Ifix).is_none());
    }
}
