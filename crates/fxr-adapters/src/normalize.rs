//! Value corrections shared by every extractor.

/// Parse a rate cell. Blank and `-` mean "no quote" and become zero, as does
/// anything that is not a finite number once separators are removed.
pub fn parse_rate_text(input: &str) -> f64 {
    try_parse_rate_text(input).unwrap_or(0.0)
}

/// Like [`parse_rate_text`], but text that is neither a quote placeholder nor
/// a finite number is `None`.
pub fn try_parse_rate_text(input: &str) -> Option<f64> {
    let cleaned: String = input
        .trim()
        .replace("&nbsp;", "")
        .chars()
        .filter(|c| *c != ',' && *c != '\u{a0}')
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "-" {
        return Some(0.0);
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Round to six decimals, halves away from zero.
pub fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// Bank pages quote per 100 units of foreign currency.
pub fn percent_to_fraction(value: f64) -> f64 {
    round6(value / 100.0)
}

/// Collapse a header cell so vocabulary matching ignores spacing.
pub(crate) fn compact_header(text: &str) -> String {
    text.replace("&nbsp;", "")
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{3000}' | '\u{a0}'))
        .collect()
}

/// Visible text of a cell: trimmed, with non-breaking spaces dropped.
pub(crate) fn clean_label(text: &str) -> String {
    text.replace("&nbsp;", "")
        .replace('\u{a0}', "")
        .trim()
        .to_string()
}
