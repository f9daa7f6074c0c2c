//! Detail-page normalization.
//!
//! A fundamentus detail page is a stack of irregular tables whose rows hold
//! repeating (label, value) column pairs, some bands qualified by a section
//! context. This module flattens one page into a single [`Record`].
//!
//! Tables are located by their page class and validated for shape before any
//! slicing, so layout drift surfaces as [`FetchError::LayoutMismatch`] with a
//! reason instead of an out-of-bounds panic.

use crate::api::FetchError;
use crate::htmltable::{collect_pairs, extract_tables, Grid};
use crate::models::Record;

/// CSS class carried by every data table on a detail page.
const DETAIL_TABLE_SELECTOR: &str = "table.w728";

/// Label under which an equity page carries its own ticker.
pub const EQUITY_KEY_LABEL: &str = "Papel";
/// Label under which a FII page carries its own ticker.
pub const FII_KEY_LABEL: &str = "FII";

/// Normalize an equity detail page into a flat record.
///
/// Expects five tables: identification, market value, quotes/oscillations
/// (three column pairs), balance sheet, and income statements (labels
/// qualified with "Últimos 12 meses " / "Últimos 3 meses ").
pub fn equity_record(html: &str, ticker: &str) -> Result<Record, FetchError> {
    let tables = detail_tables(html, ticker, 5)?;

    require_width(&tables[0], 4, ticker, "identification table")?;
    require_width(&tables[1], 4, ticker, "market value table")?;
    require_width(&tables[2], 6, ticker, "oscillations table")?;
    require_width(&tables[3], 4, ticker, "balance sheet table")?;
    require_width(&tables[4], 4, ticker, "income statement table")?;

    let mut pairs = Vec::new();
    pairs.extend(collect_pairs(&tables[0], (0, None), 0, 1, None));
    pairs.extend(collect_pairs(&tables[0], (0, None), 2, 3, None));
    pairs.extend(collect_pairs(&tables[1], (0, None), 0, 1, None));
    pairs.extend(collect_pairs(&tables[1], (0, None), 2, 3, None));
    pairs.extend(collect_pairs(&tables[2], (1, None), 0, 1, Some("Oscilações ")));
    pairs.extend(collect_pairs(&tables[2], (1, None), 2, 3, None));
    pairs.extend(collect_pairs(&tables[2], (1, None), 4, 5, None));
    pairs.extend(collect_pairs(&tables[3], (1, None), 0, 1, None));
    pairs.extend(collect_pairs(&tables[3], (1, None), 2, 3, None));
    pairs.extend(collect_pairs(&tables[4], (1, None), 0, 1, Some("Últimos 12 meses ")));
    pairs.extend(collect_pairs(&tables[4], (1, None), 2, 3, Some("Últimos 3 meses ")));

    Ok(build_record(pairs))
}

/// Normalize a FII detail page into a flat record.
///
/// FII pages pack oscillations, twelve/three-month results and balance data
/// into one six-column composite table, addressed by fixed row bands; the
/// fourth table on the page is decorative and skipped.
pub fn fii_record(html: &str, ticker: &str) -> Result<Record, FetchError> {
    let tables = detail_tables(html, ticker, 5)?;

    require_width(&tables[0], 4, ticker, "identification table")?;
    require_width(&tables[1], 4, ticker, "market value table")?;
    require_width(&tables[2], 6, ticker, "composite results table")?;
    require_width(&tables[4], 4, ticker, "portfolio table")?;
    require_rows(&tables[2], 12, ticker, "composite results table")?;

    let composite = &tables[2];
    let mut pairs = Vec::new();
    pairs.extend(collect_pairs(&tables[0], (0, None), 0, 1, None));
    pairs.extend(collect_pairs(&tables[0], (0, None), 2, 3, None));
    pairs.extend(collect_pairs(&tables[1], (0, None), 0, 1, None));
    pairs.extend(collect_pairs(&tables[1], (0, None), 2, 3, None));
    pairs.extend(collect_pairs(composite, (1, None), 0, 1, Some("Oscilações ")));
    pairs.extend(collect_pairs(composite, (1, Some(4)), 2, 3, None));
    pairs.extend(collect_pairs(composite, (1, Some(4)), 4, 5, None));
    pairs.extend(collect_pairs(composite, (6, Some(9)), 2, 3, Some("Últimos 12 meses ")));
    pairs.extend(collect_pairs(composite, (6, Some(9)), 4, 5, Some("Últimos 3 meses ")));
    pairs.extend(collect_pairs(composite, (11, None), 2, 3, None));
    pairs.extend(collect_pairs(composite, (11, None), 4, 5, None));
    pairs.extend(collect_pairs(&tables[4], (1, None), 0, 1, None));
    pairs.extend(collect_pairs(&tables[4], (1, None), 2, 3, None));

    Ok(build_record(pairs))
}

/// Pull the detail tables off the page and check there are enough of them.
/// A page with no detail tables at all is how the site answers an unknown
/// ticker, so that case maps to `NotFound`.
fn detail_tables(html: &str, ticker: &str, expected: usize) -> Result<Vec<Grid>, FetchError> {
    let tables = extract_tables(html, DETAIL_TABLE_SELECTOR);
    if tables.is_empty() {
        return Err(FetchError::NotFound {
            ticker: ticker.to_string(),
        });
    }
    if tables.len() < expected {
        return Err(FetchError::layout(
            ticker,
            format!("expected {} detail tables, found {}", expected, tables.len()),
        ));
    }
    Ok(tables)
}

fn require_width(grid: &Grid, cols: usize, ticker: &str, what: &str) -> Result<(), FetchError> {
    let widest = grid.iter().map(Vec::len).max().unwrap_or(0);
    if widest < cols {
        return Err(FetchError::layout(
            ticker,
            format!("{what}: expected {cols} columns, found {widest}"),
        ));
    }
    Ok(())
}

fn require_rows(grid: &Grid, rows: usize, ticker: &str, what: &str) -> Result<(), FetchError> {
    if grid.len() < rows {
        return Err(FetchError::layout(
            ticker,
            format!("{what}: expected at least {rows} rows, found {}", grid.len()),
        ));
    }
    Ok(())
}

/// Stack pairs into a record, stripping the stray help-marker '?' the site
/// appends to labels.
fn build_record(pairs: Vec<(String, String)>) -> Record {
    let mut record = Record::new();
    for (label, value) in pairs {
        let label = label.replace('?', "");
        let label = label.trim();
        if label.is_empty() {
            continue;
        }
        record.insert(label, value);
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(class: &str, rows: &[&[&str]]) -> String {
        let mut html = format!("<table class=\"{class}\">");
        for row in rows {
            html.push_str("<tr>");
            for cell in *row {
                html.push_str(&format!("<td>{cell}</td>"));
            }
            html.push_str("</tr>");
        }
        html.push_str("</table>");
        html
    }

    fn equity_page() -> String {
        let t0 = table(
            "w728",
            &[
                &["?Papel", "AAAA3", "Cotação", "25,10"],
                &["Tipo", "ON", "Data últ cot", "20/08/2026"],
            ],
        );
        let t1 = table(
            "w728",
            &[&["Valor de mercado", "1.000", "Últ balanço processado", "30/06/2026"]],
        );
        let t2 = table(
            "w728",
            &[
                &["Oscilações", "", "Indicadores", "", "Indicadores", ""],
                &["Dia", "1,20%", "?P/L", "8,5", "LPA", "2,95"],
                &["Mês", "-0,50%", "P/VP", "1,4", "VPA", "17,93"],
            ],
        );
        let t3 = table(
            "w728",
            &[
                &["Dados Balanço", "", "Dados Balanço", ""],
                &["Ativo", "5.000", "Dív. Bruta", "1.200"],
            ],
        );
        let t4 = table(
            "w728",
            &[
                &["Demonstrativos", "", "Demonstrativos", ""],
                &["Receita Líquida", "900", "Receita Líquida", "250"],
                &["EBIT", "300", "EBIT", "80"],
            ],
        );
        format!("<html><body>{t0}{t1}{t2}{t3}{t4}</body></html>")
    }

    fn fii_page() -> String {
        let t0 = table(
            "w728",
            &[&["?FII", "FFFF11", "Cotação", "101,00"]],
        );
        let t1 = table(
            "w728",
            &[&["Valor de mercado", "2.000", "Nro. Cotas", "100"]],
        );
        // Composite table: oscillations in (0,1); indicator bands in (2,3)/(4,5).
        let rows: Vec<Vec<&str>> = vec![
            vec!["Oscilações", "", "Indicadores", "", "Indicadores", ""],
            vec!["Dia", "0,10%", "FFO Yield", "7,5%", "FFO/Cota", "8,00"],
            vec!["Mês", "1,00%", "Div. Yield", "9,1%", "Dividendo/cota", "9,20"],
            vec!["30 dias", "2,00%", "P/VP", "0,95", "VP/Cota", "106,00"],
            vec!["12 meses", "10,00%", "", "", "", ""],
            vec!["2026", "4,00%", "Resultado", "", "Resultado", ""],
            vec!["2025", "8,00%", "Receita", "500", "Receita", "120"],
            vec!["2024", "6,00%", "Venda de ativos", "0", "Venda de ativos", "0"],
            vec!["2023", "3,00%", "FFO", "380", "FFO", "95"],
            vec!["", "", "", "", "", ""],
            vec!["", "", "Balanço", "", "Balanço", ""],
            vec!["", "", "Ativos", "4.000", "Patrim Líquido", "3.500"],
            vec!["", "", "Qtd imóveis", "12", "Imóveis/PL do FII", "85,00%"],
        ];
        let rows_ref: Vec<&[&str]> = rows.iter().map(|r| r.as_slice()).collect();
        let t2 = table("w728", &rows_ref);
        let t3 = table("w728", &[&["Abertura", "fechamento"]]);
        let t4 = table(
            "w728",
            &[
                &["Imóveis", "", "Imóveis", ""],
                &["Área bruta", "120.000", "Vacância", "4,00%"],
            ],
        );
        format!("<html><body>{t0}{t1}{t2}{t3}{t4}</body></html>")
    }

    #[test]
    fn test_equity_record_flattens_all_sections() {
        let record = equity_record(&equity_page(), "AAAA3").unwrap();

        assert_eq!(record.get("Papel"), Some("AAAA3"));
        assert_eq!(record.get("Cotação"), Some("25,10"));
        assert_eq!(record.get("Oscilações Dia"), Some("1,20%"));
        assert_eq!(record.get("P/L"), Some("8,5"));
        assert_eq!(record.get("Últimos 12 meses Receita Líquida"), Some("900"));
        assert_eq!(record.get("Últimos 3 meses EBIT"), Some("80"));
        // Section header rows carry no values and must not leak in.
        assert_eq!(record.get("Oscilações Oscilações"), None);
        assert_eq!(record.get("Indicadores"), None);
    }

    #[test]
    fn test_equity_record_strips_help_markers() {
        let record = equity_record(&equity_page(), "AAAA3").unwrap();
        // "?Papel" and "?P/L" on the page, clean labels in the record.
        assert!(record.get("?Papel").is_none());
        assert_eq!(record.get("Papel"), Some("AAAA3"));
        assert_eq!(record.get("P/L"), Some("8,5"));
    }

    #[test]
    fn test_equity_record_is_idempotent() {
        let page = equity_page();
        let first = equity_record(&page, "AAAA3").unwrap();
        let second = equity_record(&page, "AAAA3").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_tables_is_not_found() {
        let err = equity_record("<html><body><p>Nenhum papel encontrado</p></body></html>", "XXXX9")
            .unwrap_err();
        assert!(matches!(err, FetchError::NotFound { .. }));
    }

    #[test]
    fn test_too_few_tables_is_layout_mismatch() {
        let page = format!(
            "<html><body>{}</body></html>",
            table("w728", &[&["Papel", "AAAA3"]])
        );
        let err = equity_record(&page, "AAAA3").unwrap_err();
        match err {
            FetchError::LayoutMismatch { reason, .. } => {
                assert!(reason.contains("expected 5"), "reason: {reason}");
            }
            other => panic!("expected LayoutMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_narrow_oscillations_table_is_layout_mismatch() {
        // Five tables, but the third lacks the six-column band layout.
        let narrow = table("w728", &[&["Dia", "1,20%"]]);
        let filler = table("w728", &[&["A", "1", "B", "2"]]);
        let page = format!(
            "<html><body>{filler}{filler}{narrow}{filler}{filler}</body></html>",
        );
        let err = equity_record(&page, "AAAA3").unwrap_err();
        assert!(matches!(err, FetchError::LayoutMismatch { .. }));
    }

    #[test]
    fn test_fii_record_row_bands() {
        let record = fii_record(&fii_page(), "FFFF11").unwrap();

        assert_eq!(record.get("FII"), Some("FFFF11"));
        assert_eq!(record.get("Oscilações Dia"), Some("0,10%"));
        assert_eq!(record.get("FFO Yield"), Some("7,5%"));
        // Band 6..9 carries the period qualifiers.
        assert_eq!(record.get("Últimos 12 meses Receita"), Some("500"));
        assert_eq!(record.get("Últimos 3 meses FFO"), Some("95"));
        // Band 11.. is unqualified balance data.
        assert_eq!(record.get("Ativos"), Some("4.000"));
        assert_eq!(record.get("Imóveis/PL do FII"), Some("85,00%"));
        // Rows 5 and 10 are in-band section headers, not data.
        assert_eq!(record.get("Resultado"), None);
        assert_eq!(record.get("Balanço"), None);
        // Skipped fourth table never contributes.
        assert_eq!(record.get("Abertura"), None);
        // Fifth table does.
        assert_eq!(record.get("Vacância"), Some("4,00%"));
    }

    #[test]
    fn test_fii_record_short_composite_is_layout_mismatch() {
        let t = table("w728", &[&["A", "1", "B", "2", "C", "3"]]);
        let filler = table("w728", &[&["A", "1", "B", "2"]]);
        let page = format!("<html><body>{filler}{filler}{t}{filler}{filler}</body></html>");
        let err = fii_record(&page, "FFFF11").unwrap_err();
        match err {
            FetchError::LayoutMismatch { reason, .. } => {
                assert!(reason.contains("rows"), "reason: {reason}");
            }
            other => panic!("expected LayoutMismatch, got {other:?}"),
        }
    }
}
