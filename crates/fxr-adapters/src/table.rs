//! Bank rate tables whose column order is discovered from the header row.
//!
//! Discovery is an ordered list of [`ColumnStrategy`] values tried against
//! the first row that any of them can classify. Once a layout is found every
//! later row is data.

use std::sync::LazyLock;

use fxr_core::ScrapedRate;
use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::debug;

use crate::markup::{element_text, selector, table_rows};
use crate::normalize::{clean_label, compact_header, parse_rate_text};
use crate::{ExtractError, RateExtractor};

static CURRENCY_HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/([A-Za-z]+)/$").expect("valid currency href pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Currency,
    HuiIn,
    ChaoIn,
    HuiOut,
    ChaoOut,
    Zhesuan,
}

/// First role whose synonym appears in the cell wins.
const HEADER_VOCABULARY: &[(Role, &[&str])] = &[
    (Role::Currency, &["币种", "货币"]),
    (Role::HuiIn, &["现汇买入", "汇买价", "结汇价", "结汇"]),
    (Role::ChaoIn, &["现钞买入", "钞买价"]),
    (Role::HuiOut, &["现汇卖出", "汇卖价", "购汇价", "购汇"]),
    (Role::ChaoOut, &["现钞卖出", "钞卖价"]),
    (Role::Zhesuan, &["折算价", "中间价", "基准价"]),
];

/// Sources whose pages do not carry a usable header row.
const SOURCE_LAYOUTS: &[(&str, ColumnLayout)] = &[
    (
        "PSBC",
        ColumnLayout {
            currency: 0,
            hui_in: Some(1),
            chao_in: Some(2),
            hui_out: Some(3),
            chao_out: Some(4),
            zhesuan: None,
        },
    ),
    (
        "ECITIC",
        ColumnLayout {
            currency: 0,
            hui_in: Some(1),
            chao_in: None,
            hui_out: Some(2),
            chao_out: None,
            zhesuan: None,
        },
    ),
];

/// Sources quoting per single unit; their figures are lifted to per-100
/// unless the label already names a 100-unit lot.
const PER_UNIT_SOURCES: &[&str] = &["PSBC"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    pub currency: usize,
    pub hui_in: Option<usize>,
    pub chao_in: Option<usize>,
    pub hui_out: Option<usize>,
    pub chao_out: Option<usize>,
    pub zhesuan: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnStrategy {
    /// A column header names the currency.
    Vocabulary,
    /// Rate headers matched but the currency header is blank: column 0.
    FirstColumnCurrency,
    /// Fixed layout registered for the source.
    SourceOverride,
}

pub const COLUMN_STRATEGIES: [ColumnStrategy; 3] = [
    ColumnStrategy::Vocabulary,
    ColumnStrategy::FirstColumnCurrency,
    ColumnStrategy::SourceOverride,
];

#[derive(Debug, Default, Clone, Copy)]
struct HeaderMatches {
    currency: Option<usize>,
    hui_in: Option<usize>,
    chao_in: Option<usize>,
    hui_out: Option<usize>,
    chao_out: Option<usize>,
    zhesuan: Option<usize>,
}

impl HeaderMatches {
    fn classify(texts: &[String]) -> Self {
        let mut matches = Self::default();
        for (idx, text) in texts.iter().enumerate() {
            let compact = compact_header(text);
            let role = HEADER_VOCABULARY
                .iter()
                .find(|(_, synonyms)| synonyms.iter().any(|s| compact.contains(s)))
                .map(|(role, _)| *role);
            let slot = match role {
                Some(Role::Currency) => &mut matches.currency,
                Some(Role::HuiIn) => &mut matches.hui_in,
                Some(Role::ChaoIn) => &mut matches.chao_in,
                Some(Role::HuiOut) => &mut matches.hui_out,
                Some(Role::ChaoOut) => &mut matches.chao_out,
                Some(Role::Zhesuan) => &mut matches.zhesuan,
                None => continue,
            };
            *slot = Some(idx);
        }
        matches
    }

    fn any_rate(&self) -> bool {
        [self.hui_in, self.chao_in, self.hui_out, self.chao_out, self.zhesuan]
            .iter()
            .any(Option::is_some)
    }

    fn layout(&self, currency: usize) -> ColumnLayout {
        ColumnLayout {
            currency,
            hui_in: self.hui_in,
            chao_in: self.chao_in,
            hui_out: self.hui_out,
            chao_out: self.chao_out,
            zhesuan: self.zhesuan,
        }
    }
}

impl ColumnStrategy {
    fn resolve(self, matches: &HeaderMatches, source_id: &str) -> Option<ColumnLayout> {
        match self {
            ColumnStrategy::Vocabulary => matches.currency.map(|c| matches.layout(c)),
            ColumnStrategy::FirstColumnCurrency => {
                (matches.currency.is_none() && matches.any_rate()).then(|| matches.layout(0))
            }
            ColumnStrategy::SourceOverride => SOURCE_LAYOUTS
                .iter()
                .find(|(id, _)| *id == source_id)
                .map(|(_, layout)| *layout),
        }
    }
}

/// Classify a header row, trying each strategy in priority order.
pub fn discover_layout(texts: &[String], source_id: &str) -> Option<(ColumnStrategy, ColumnLayout)> {
    let matches = HeaderMatches::classify(texts);
    COLUMN_STRATEGIES
        .iter()
        .find_map(|strategy| strategy.resolve(&matches, source_id).map(|l| (*strategy, l)))
}

fn currency_code_from_link(cell: ElementRef<'_>) -> Result<Option<String>, ExtractError> {
    let link = selector("a[href]")?;
    Ok(cell
        .select(&link)
        .filter_map(|a| a.value().attr("href"))
        .find_map(|href| CURRENCY_HREF.captures(href))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_uppercase()))
}

fn read_cell(texts: &[String], idx: Option<usize>) -> Option<f64> {
    idx.and_then(|i| texts.get(i)).map(|t| parse_rate_text(t))
}

#[derive(Debug, Clone)]
pub struct HeaderTableExtractor {
    source_id: String,
}

impl HeaderTableExtractor {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
        }
    }

    fn data_row(
        &self,
        layout: &ColumnLayout,
        cells: &[ElementRef<'_>],
        texts: &[String],
    ) -> Result<Option<ScrapedRate>, ExtractError> {
        let Some(raw_name) = texts.get(layout.currency) else {
            return Ok(None);
        };
        let name = clean_label(raw_name);
        if name.is_empty() {
            return Ok(None);
        }

        let linked_code = match (layout.currency, cells.first()) {
            (0, Some(first)) => currency_code_from_link(*first)?,
            _ => None,
        };
        let mut rate = ScrapedRate::new(linked_code.unwrap_or_else(|| name.clone()));

        rate.hui_in = read_cell(texts, layout.hui_in).unwrap_or(0.0);
        rate.hui_out = read_cell(texts, layout.hui_out).unwrap_or(0.0);
        rate.zhesuan = read_cell(texts, layout.zhesuan).unwrap_or(0.0);

        match read_cell(texts, layout.chao_in) {
            Some(v) => rate.chao_in = v,
            None if layout.hui_in.is_some() => {
                rate.chao_in = rate.hui_in;
                rate.cash_estimated = true;
            }
            None => {}
        }
        match read_cell(texts, layout.chao_out) {
            Some(v) => rate.chao_out = v,
            None if layout.hui_out.is_some() => {
                rate.chao_out = rate.hui_out;
                rate.cash_estimated = true;
            }
            None => {}
        }

        if PER_UNIT_SOURCES.contains(&self.source_id.as_str()) && !name.contains("100") {
            rate.hui_in *= 100.0;
            rate.chao_in *= 100.0;
            rate.hui_out *= 100.0;
            rate.chao_out *= 100.0;
            rate.zhesuan *= 100.0;
        }

        Ok(Some(rate))
    }
}

impl RateExtractor for HeaderTableExtractor {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn extract(&self, body: &str) -> Result<Vec<ScrapedRate>, ExtractError> {
        let document = Html::parse_document(body);
        let rows = table_rows(&document, "td, th")?;
        debug!(source_id = %self.source_id, rows = rows.len(), "table rows");

        let mut layout: Option<ColumnLayout> = None;
        let mut out = Vec::new();
        for cells in rows {
            let texts: Vec<String> = cells.iter().map(|c| element_text(*c)).collect();
            match &layout {
                None => {
                    if let Some((strategy, found)) = discover_layout(&texts, &self.source_id) {
                        if strategy != ColumnStrategy::Vocabulary {
                            debug!(source_id = %self.source_id, ?strategy, ?found, "header fallback");
                        }
                        layout = Some(found);
                    }
                }
                Some(found) => {
                    if let Some(rate) = self.data_row(found, &cells, &texts)? {
                        out.push(rate);
                    }
                }
            }
        }

        if out.is_empty() {
            return Err(ExtractError::NoRows(self.source_id.clone()));
        }
        Ok(out)
    }
}
