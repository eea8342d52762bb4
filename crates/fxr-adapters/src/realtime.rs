use serde::Deserialize;

use crate::normalize::try_parse_rate_text;
use crate::ExtractError;

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(rename = "Result", default)]
    result: QuoteResult,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteResult {
    #[serde(rename = "revCode", default)]
    rev_code: Vec<QuotePoint>,
}

#[derive(Debug, Deserialize)]
struct QuotePoint {
    #[serde(default)]
    price: String,
}

/// Latest price from a real-time quote document
/// (`{"Result":{"revCode":[{"price":"..."}]}}`).
pub fn extract_realtime_price(body: &str, code: &str) -> Result<f64, ExtractError> {
    let resp: QuoteResponse = serde_json::from_str(body)?;
    let point = resp
        .result
        .rev_code
        .first()
        .ok_or_else(|| ExtractError::NoRows(code.to_string()))?;
    try_parse_rate_text(&point.price).ok_or_else(|| ExtractError::InvalidNumber(point.price.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_first_price() {
        let body = r#"{"ResultCode":0,"Result":{"revCode":[{"price":"0.1406","ratio":"+0.01%"},{"price":"9"}]}}"#;
        assert_eq!(extract_realtime_price(body, "USD").unwrap(), 0.1406);
    }

    #[test]
    fn price_goes_through_rate_normalization() {
        let grouped = r#"{"Result":{"revCode":[{"price":"2,350.12"}]}}"#;
        assert_eq!(extract_realtime_price(grouped, "IDR").unwrap(), 2350.12);
        let missing = r#"{"Result":{"revCode":[{"price":"-"}]}}"#;
        assert_eq!(extract_realtime_price(missing, "IDR").unwrap(), 0.0);
        let nan = r#"{"Result":{"revCode":[{"price":"NaN"}]}}"#;
        assert!(matches!(
            extract_realtime_price(nan, "IDR"),
            Err(ExtractError::InvalidNumber(_))
        ));
    }

    #[test]
    fn empty_or_malformed_documents_fail() {
        assert!(matches!(
            extract_realtime_price(r#"{"Result":{"revCode":[]}}"#, "EUR"),
            Err(ExtractError::NoRows(ref c)) if c == "EUR"
        ));
        assert!(matches!(
            extract_realtime_price(r#"{"Result":{"revCode":[{"price":"--"}]}}"#, "EUR"),
            Err(ExtractError::InvalidNumber(_))
        ));
        assert!(matches!(
            extract_realtime_price("<html>", "EUR"),
            Err(ExtractError::InvalidJson(_))
        ));
    }
}
