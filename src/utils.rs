use thiserror::Error;

/// Failure converting a Brazilian-formatted numeric string
#[derive(Debug, Error, PartialEq)]
pub enum NumberFormatError {
    #[error("not a percentage string (missing '%'): {0:?}")]
    MissingPercentSign(String),
    #[error("unparseable number: {0:?}")]
    Unparseable(String),
}

/// Convert a Brazilian percentage string to a float, keeping the scale of
/// the source text: "12,34%" -> 12.34, never 0.1234.
///
/// Strings without a '%' are a format error for the caller to handle.
pub fn perc_to_float(s: &str) -> Result<f64, NumberFormatError> {
    let trimmed = s.trim();
    let Some(stripped) = trimmed.strip_suffix('%') else {
        return Err(NumberFormatError::MissingPercentSign(s.to_string()));
    };
    parse_br_number(stripped)
}

/// Parse a number using the Brazilian convention: '.' for thousands,
/// ',' for decimals.
pub fn parse_br_number(s: &str) -> Result<f64, NumberFormatError> {
    let normalized: String = s
        .trim()
        .chars()
        .filter(|c| *c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    normalized
        .parse::<f64>()
        .map_err(|_| NumberFormatError::Unparseable(s.to_string()))
}
