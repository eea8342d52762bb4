//! Core domain model for FX and precious-metal rate ingestion.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "fxr-core";

/// Code of the currency every quote is expressed against.
pub const BASE_CURRENCY_CODE: &str = "CNY";
pub const BASE_CURRENCY_NAME: &str = "人民币";

pub type CurrencyId = i64;
pub type BankId = i64;

/// Canonical currency identity. `sort` is display precedence, lower first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyEntry {
    pub id: CurrencyId,
    pub code: String,
    pub name: String,
    pub sort: i32,
}

/// Canonical bank identity. `code` is unique and uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankEntry {
    pub id: BankId,
    pub code: String,
    pub name: String,
}

/// Loosely typed bank-rate row as read from a source page, before the
/// currency label is resolved and before unit correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedRate {
    pub currency_label: String,
    pub hui_in: f64,
    pub chao_in: f64,
    pub hui_out: f64,
    pub chao_out: f64,
    pub zhesuan: f64,
    /// At least one cash figure was copied from its transfer counterpart.
    pub cash_estimated: bool,
}

impl ScrapedRate {
    pub fn new(currency_label: impl Into<String>) -> Self {
        Self {
            currency_label: currency_label.into(),
            hui_in: 0.0,
            chao_in: 0.0,
            hui_out: 0.0,
            chao_out: 0.0,
            zhesuan: 0.0,
            cash_estimated: false,
        }
    }
}

/// Positional fields read out of a metal quote blob.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetalQuote {
    pub price: f64,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    pub prev_close: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub date: NaiveDate,
    pub currency_id: CurrencyId,
    pub base: String,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankRate {
    pub date: NaiveDate,
    pub bank_id: BankId,
    pub currency_id: CurrencyId,
    pub hui_in: f64,
    pub chao_in: f64,
    pub hui_out: f64,
    pub chao_out: f64,
    pub zhesuan: f64,
    pub cash_estimated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreciousMetal {
    pub date: NaiveDate,
    pub trading_venue: String,
    pub symbol: String,
    pub title: String,
    pub kind: String,
    pub price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub open_price: f64,
    pub prev_close: f64,
    pub unit: String,
    pub currency_id: CurrencyId,
}

/// One persisted rate row in any of its three forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RateRecord {
    Exchange(ExchangeRate),
    Bank(BankRate),
    Metal(PreciousMetal),
}

/// Identity of a rate row. At most one row exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NaturalKey {
    Exchange {
        date: NaiveDate,
        currency_id: CurrencyId,
    },
    Bank {
        date: NaiveDate,
        bank_id: BankId,
        currency_id: CurrencyId,
    },
    Metal {
        date: NaiveDate,
        trading_venue: String,
        symbol: String,
    },
}

impl NaturalKey {
    pub fn table(&self) -> &'static str {
        match self {
            NaturalKey::Exchange { .. } => "exchange_rates",
            NaturalKey::Bank { .. } => "bank_rates",
            NaturalKey::Metal { .. } => "precious_metals",
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            NaturalKey::Exchange { date, .. }
            | NaturalKey::Bank { date, .. }
            | NaturalKey::Metal { date, .. } => *date,
        }
    }
}

impl RateRecord {
    pub fn natural_key(&self) -> NaturalKey {
        match self {
            RateRecord::Exchange(r) => NaturalKey::Exchange {
                date: r.date,
                currency_id: r.currency_id,
            },
            RateRecord::Bank(r) => NaturalKey::Bank {
                date: r.date,
                bank_id: r.bank_id,
                currency_id: r.currency_id,
            },
            RateRecord::Metal(r) => NaturalKey::Metal {
                date: r.date,
                trading_venue: r.trading_venue.clone(),
                symbol: r.symbol.clone(),
            },
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            RateRecord::Exchange(_) => "exchange_rates",
            RateRecord::Bank(_) => "bank_rates",
            RateRecord::Metal(_) => "precious_metals",
        }
    }

    /// The figure whose zero value marks the record as noise.
    ///
    /// A bank row only counts as empty when none of its four buy/sell figures
    /// carries a quote, so currencies priced on the cash side alone survive.
    pub fn primary_price(&self) -> f64 {
        match self {
            RateRecord::Exchange(r) => r.rate,
            RateRecord::Bank(r) => [r.hui_in, r.chao_in, r.hui_out, r.chao_out]
                .into_iter()
                .find(|v| *v != 0.0)
                .unwrap_or(0.0),
            RateRecord::Metal(r) => r.price,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}
