use fxr_core::ScrapedRate;
use scraper::Html;

use crate::markup::{element_text, table_rows};
use crate::normalize::{clean_label, parse_rate_text};
use crate::{ExtractError, RateExtractor};

const MIN_CELLS: usize = 6;

/// Fixed-order rate table: currency, buy transfer, buy cash, sell transfer,
/// sell cash, update time. The mid rate is the average of the transfer pair.
#[derive(Debug, Clone)]
pub struct SimpleTableExtractor {
    source_id: String,
}

impl SimpleTableExtractor {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
        }
    }
}

impl RateExtractor for SimpleTableExtractor {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn extract(&self, body: &str) -> Result<Vec<ScrapedRate>, ExtractError> {
        let document = Html::parse_document(body);
        let mut out = Vec::new();

        for cells in table_rows(&document, "td")? {
            if cells.len() < MIN_CELLS {
                continue;
            }
            let texts: Vec<String> = cells.iter().map(|c| element_text(*c)).collect();
            let name = clean_label(&texts[0]);
            if name.is_empty() || name == "币种" {
                continue;
            }

            let mut rate = ScrapedRate::new(name);
            rate.hui_in = parse_rate_text(&texts[1]);
            rate.chao_in = parse_rate_text(&texts[2]);
            rate.hui_out = parse_rate_text(&texts[3]);
            rate.chao_out = parse_rate_text(&texts[4]);

            if rate.chao_in == 0.0 {
                rate.chao_in = rate.hui_in;
                rate.cash_estimated = true;
            }
            if rate.chao_out == 0.0 {
                rate.chao_out = rate.hui_out;
                rate.cash_estimated = true;
            }
            rate.zhesuan = (rate.hui_in + rate.hui_out) / 2.0;
            out.push(rate);
        }

        if out.is_empty() {
            return Err(ExtractError::NoRows(self.source_id.clone()));
        }
        Ok(out)
    }
}
