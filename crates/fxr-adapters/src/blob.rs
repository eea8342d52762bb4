use fxr_core::MetalQuote;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::normalize::parse_rate_text;
use crate::ExtractError;

/// Positions of the quote fields inside a comma-separated blob payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobOffsets {
    pub price: usize,
    pub high: usize,
    pub low: usize,
    pub open: usize,
    pub prev_close: usize,
}

impl Default for BlobOffsets {
    fn default() -> Self {
        Self {
            price: 0,
            high: 4,
            low: 5,
            open: 8,
            prev_close: 7,
        }
    }
}

impl BlobOffsets {
    fn highest(&self) -> usize {
        [self.price, self.high, self.low, self.open, self.prev_close]
            .into_iter()
            .max()
            .unwrap_or(0)
    }
}

/// Read one quote out of a JS document holding `var name="v1,v2,..."`
/// assignments. Other variables in the same document are left untouched, so
/// a caller can pull several symbols from one fetch.
pub fn extract_blob_quote(
    content: &str,
    variable: &str,
    offsets: BlobOffsets,
) -> Result<MetalQuote, ExtractError> {
    let pattern = format!(r#"{}="([^"]+)""#, regex::escape(variable));
    let re = Regex::new(&pattern)?;

    let payload = re
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| ExtractError::VariableMissing(variable.to_string()))?;

    let parts: Vec<&str> = payload.split(',').collect();
    let need = offsets.highest() + 1;
    if parts.len() < need {
        return Err(ExtractError::InsufficientFields {
            variable: variable.to_string(),
            need,
            got: parts.len(),
        });
    }

    Ok(MetalQuote {
        price: parse_rate_text(parts[offsets.price]),
        high: parse_rate_text(parts[offsets.high]),
        low: parse_rate_text(parts[offsets.low]),
        open: parse_rate_text(parts[offsets.open]),
        prev_close: parse_rate_text(parts[offsets.prev_close]),
    })
}
