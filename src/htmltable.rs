//! HTML table extraction.
//!
//! The detail and screener pages are scraped into plain grids of trimmed
//! cell text first; all normalization logic downstream works on grids, not
//! on DOM nodes.

use scraper::{ElementRef, Html, Selector};

/// A table as rows of cell strings. Rows may be ragged.
pub type Grid = Vec<Vec<String>>;

fn selector(src: &str) -> Selector {
    // Selectors are compile-time literals throughout.
    Selector::parse(src).expect("static selector")
}

/// Extract every table matching `css` into a grid, in document order.
pub fn extract_tables(html: &str, css: &str) -> Vec<Grid> {
    let document = Html::parse_document(html);
    let table_sel = selector(css);
    let row_sel = selector("tr");
    let cell_sel = selector("td, th");

    document
        .select(&table_sel)
        .map(|table| {
            table
                .select(&row_sel)
                .map(|row| row.select(&cell_sel).map(cell_text).collect())
                .collect()
        })
        .collect()
}

/// Visible text of one cell, whitespace-collapsed.
fn cell_text(cell: ElementRef) -> String {
    let raw: String = cell.text().collect();
    // split_whitespace also folds non-breaking spaces.
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collect (label, value) pairs from one column pair of a grid.
///
/// `rows` selects the row band (end-exclusive, `None` = to the end), matching
/// how the source pages group repeated field pairs into bands. Rows where
/// either cell is missing or empty are skipped. `prefix` is prepended to each
/// label, carrying section context ("Oscilações ", "Últimos 12 meses ", ...)
/// into the flat record.
pub fn collect_pairs(
    grid: &Grid,
    rows: (usize, Option<usize>),
    label_col: usize,
    value_col: usize,
    prefix: Option<&str>,
) -> Vec<(String, String)> {
    let (start, end) = rows;
    let end = end.unwrap_or(grid.len()).min(grid.len());
    let mut pairs = Vec::new();

    for row in grid.iter().take(end).skip(start) {
        let label = row.get(label_col).map(String::as_str).unwrap_or("");
        let value = row.get(value_col).map(String::as_str).unwrap_or("");
        if label.is_empty() || value.is_empty() {
            continue;
        }
        let label = match prefix {
            Some(p) => format!("{p}{label}"),
            None => label.to_string(),
        };
        pairs.push((label, value.to_string()));
    }

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <html><body>
        <table class="w728">
            <tr><td>A</td><td>1</td><td>B</td><td>2</td></tr>
            <tr><td>C</td><td>3</td><td>D</td><td></td></tr>
        </table>
        <table class="other"><tr><td>skip</td></tr></table>
        <table class="w728">
            <tr><td>E</td><td>5</td></tr>
        </table>
        </body></html>
    "#;

    #[test]
    fn test_extract_tables_by_class() {
        let tables = extract_tables(SAMPLE, "table.w728");
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].len(), 2);
        assert_eq!(tables[0][0], vec!["A", "1", "B", "2"]);
        assert_eq!(tables[1][0], vec!["E", "5"]);
    }

    #[test]
    fn test_cell_text_collapses_whitespace() {
        let tables = extract_tables(
            "<table><tr><td>  Últimos \n 12&nbsp;meses </td></tr></table>",
            "table",
        );
        assert_eq!(tables[0][0][0], "Últimos 12 meses");
    }

    #[test]
    fn test_collect_pairs_skips_empty_values() {
        let tables = extract_tables(SAMPLE, "table.w728");
        let pairs = collect_pairs(&tables[0], (0, None), 2, 3, None);
        // Row with empty value for D is dropped.
        assert_eq!(pairs, vec![("B".to_string(), "2".to_string())]);
    }

    #[test]
    fn test_collect_pairs_prefix_and_band() {
        let tables = extract_tables(SAMPLE, "table.w728");
        let pairs = collect_pairs(&tables[0], (1, Some(2)), 0, 1, Some("Oscilações "));
        assert_eq!(pairs, vec![("Oscilações C".to_string(), "3".to_string())]);
    }
}
