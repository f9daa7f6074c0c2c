//! Bulk listing pages: the sector directory and the equity/FII screener
//! tables. Pure extraction, no per-ticker detail logic.

use anyhow::{Context, Result};
use scraper::{Html, Selector};
use std::sync::Arc;
use tracing::info;

use crate::api::FundamentusClient;
use crate::htmltable::extract_tables;
use crate::models::DataTable;
use crate::utils::perc_to_float;

/// Screener columns carrying percentage strings, per universe.
const EQUITY_PERCENT_COLUMNS: [&str; 6] = [
    "Div.Yield",
    "Mrg Ebit",
    "Mrg. Líq.",
    "ROIC",
    "ROE",
    "Cresc. Rec.5a",
];
const FII_PERCENT_COLUMNS: [&str; 4] =
    ["Dividend Yield", "FFO Yield", "Cap Rate", "Vacância Média"];

/// One entry of the sector `<select>` control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sector {
    pub id: String,
    pub name: String,
}

pub struct ListingFetcher {
    client: Arc<FundamentusClient>,
}

impl ListingFetcher {
    pub fn new(client: Arc<FundamentusClient>) -> Self {
        Self { client }
    }

    /// Sector ids and names from the advanced-search page.
    pub async fn list_sectors(&self) -> Result<Vec<Sector>> {
        let html = self.client.get_advanced_search_page().await?;
        let sectors = parse_sector_options(&html);
        info!("Found {} sectors", sectors.len());
        Ok(sectors)
    }

    /// Tickers listed for one sector id.
    pub async fn list_tickers_for_sector(&self, sector_id: &str) -> Result<Vec<String>> {
        let html = self.client.get_equity_listing_page(Some(sector_id)).await?;
        let table = parse_screener_table(&html, "table#resultado")
            .with_context(|| format!("screener table for sector {sector_id}"))?;
        Ok(table.rows().map(|(ticker, _)| ticker.to_string()).collect())
    }

    /// Full equity screener with percentage columns converted to floats.
    pub async fn fetch_equity_screener(&self) -> Result<DataTable> {
        let html = self.client.get_equity_listing_page(None).await?;
        let mut table =
            parse_screener_table(&html, "table#resultado").context("equity screener table")?;
        convert_percent_columns(&mut table, &EQUITY_PERCENT_COLUMNS);
        Ok(table)
    }

    /// Full FII screener with percentage columns converted to floats.
    pub async fn fetch_fii_screener(&self) -> Result<DataTable> {
        let html = self.client.get_fii_listing_page().await?;
        let mut table = parse_screener_table(&html, "table#tabelaResultado")
            .context("FII screener table")?;
        convert_percent_columns(&mut table, &FII_PERCENT_COLUMNS);
        Ok(table)
    }
}

/// Extract `<option>` entries of the sector select control.
pub fn parse_sector_options(html: &str) -> Vec<Sector> {
    let document = Html::parse_document(html);
    let option_sel =
        Selector::parse(r#"select[name="setor"] option"#).expect("static selector");

    document
        .select(&option_sel)
        .filter_map(|option| {
            let id = option.value().attr("value")?.trim().to_string();
            let name = option.text().collect::<String>().trim().to_string();
            if id.is_empty() || name.is_empty() {
                return None;
            }
            Some(Sector { id, name })
        })
        .collect()
}

/// Parse a screener results table: header row of labels, one row per
/// security with the ticker in the first column.
pub fn parse_screener_table(html: &str, css: &str) -> Result<DataTable> {
    let mut tables = extract_tables(html, css);
    if tables.is_empty() {
        anyhow::bail!("no table matching {css:?} on page");
    }
    let grid = tables.remove(0);
    let mut rows_iter = grid.into_iter();
    let header = rows_iter.next().context("screener table has no header")?;
    if header.len() < 2 {
        anyhow::bail!("screener header too narrow: {} columns", header.len());
    }

    let columns: Vec<String> = header[1..].to_vec();
    let rows = rows_iter
        .filter(|row| row.len() == columns.len() + 1 && !row[0].is_empty())
        .map(|mut row| {
            let ticker = row.remove(0);
            (ticker, row)
        })
        .collect();

    Ok(DataTable::from_rows(columns, rows))
}

/// Convert "12,34%"-style cells to plain floats in the given columns.
/// Cells that do not carry a '%' are left as-is.
fn convert_percent_columns(table: &mut DataTable, columns: &[&str]) {
    for column in columns {
        table.map_column(column, |cell| {
            perc_to_float(cell).ok().map(|v| v.to_string())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sector_options() {
        let html = r#"
            <form>
            <select name="setor">
                <option value="">Todos</option>
                <option value="35">Tecnologia da Informação</option>
                <option value="20">Financeiro e Outros</option>
            </select>
            <select name="segmento"><option value="9">ignored</option></select>
            </form>
        "#;
        let sectors = parse_sector_options(html);
        assert_eq!(
            sectors,
            vec![
                Sector {
                    id: "35".into(),
                    name: "Tecnologia da Informação".into()
                },
                Sector {
                    id: "20".into(),
                    name: "Financeiro e Outros".into()
                },
            ]
        );
    }

    const SCREENER: &str = r#"
        <table id="resultado">
            <thead><tr><th>Papel</th><th>Cotação</th><th>Div.Yield</th></tr></thead>
            <tbody>
                <tr><td>AAAA3</td><td>25,10</td><td>5,20%</td></tr>
                <tr><td>BBBB4</td><td>10,00</td><td>0,00%</td></tr>
            </tbody>
        </table>
    "#;

    #[test]
    fn test_parse_screener_table() {
        let table = parse_screener_table(SCREENER, "table#resultado").unwrap();
        assert_eq!(table.columns(), &["Cotação".to_string(), "Div.Yield".to_string()]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.get("AAAA3", "Cotação"), Some("25,10"));
    }

    #[test]
    fn test_convert_percent_columns() {
        let mut table = parse_screener_table(SCREENER, "table#resultado").unwrap();
        convert_percent_columns(&mut table, &EQUITY_PERCENT_COLUMNS);
        assert_eq!(table.get("AAAA3", "Div.Yield"), Some("5.2"));
        assert_eq!(table.get("BBBB4", "Div.Yield"), Some("0"));
        // Non-percent column untouched.
        assert_eq!(table.get("AAAA3", "Cotação"), Some("25,10"));
    }

    #[test]
    fn test_missing_screener_table_is_error() {
        assert!(parse_screener_table("<html></html>", "table#resultado").is_err());
    }
}
