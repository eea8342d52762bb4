//! Catalog resolution: free-text currency and bank labels to catalog rows.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use fxr_core::{BankEntry, CurrencyEntry, BASE_CURRENCY_CODE, BASE_CURRENCY_NAME};
use fxr_storage::{RateStore, StoreError};
use regex::Regex;
use strsim::jaro_winkler;
use tracing::{debug, info};

/// ISO code and display name of every currency the catalog knows by default.
pub const CURRENCY_NAMES: &[(&str, &str)] = &[
    ("USD", "美元"),
    ("EUR", "欧元"),
    ("HKD", "港元"),
    ("JPY", "日元"),
    ("GBP", "英镑"),
    ("AUD", "澳元"),
    ("CAD", "加元"),
    ("SGD", "新加坡元"),
    ("CHF", "瑞士法郎"),
    ("RUB", "俄罗斯卢布"),
    ("KRW", "韩元"),
    ("THB", "泰铢"),
    ("NZD", "新西兰元"),
    ("MOP", "澳门元"),
    ("TWD", "新台币"),
    ("PHP", "菲律宾比索"),
    ("MYR", "马来西亚林吉特"),
    ("DKK", "丹麦克朗"),
    ("SEK", "瑞典克朗"),
    ("NOK", "挪威克朗"),
    ("TRY", "土耳其里拉"),
    ("BRL", "巴西雷亚尔"),
    ("INR", "印度卢比"),
    ("IDR", "印度尼西亚盾"),
    ("ILS", "以色列新谢克尔"),
    ("ZAR", "南非兰特"),
    ("SAR", "沙特里亚尔"),
    ("AED", "阿联酋迪拉姆"),
    ("HUF", "匈牙利福林"),
    ("MXN", "墨西哥比索"),
    ("PLN", "波兰兹罗提"),
    ("BND", "文莱元"),
    ("KZT", "坚戈"),
    ("KHR", "柬埔寨瑞尔"),
];

/// Colloquial names seen on bank pages, applied over [`CURRENCY_NAMES`].
const CURRENCY_ALIASES: &[(&str, &str)] = &[
    ("阿联酋币", "AED"),
    ("巴西币", "BRL"),
    ("巴西里亚尔", "BRL"),
    ("加币", "CAD"),
    ("加拿大币", "CAD"),
    ("瑞郎", "CHF"),
    ("捷克克朗", "CZK"),
    ("匈牙利币", "HUF"),
    ("印尼盾", "IDR"),
    ("以色列币", "ILS"),
    ("柬埔寨币", "KHR"),
    ("新西兰币", "NZD"),
    ("马币", "MYR"),
    ("林吉特", "MYR"),
    ("菲律宾币", "PHP"),
    ("沙特币", "SAR"),
    ("土耳其币", "TRY"),
    ("美国美元", "USD"),
    ("港币", "HKD"),
    ("台币", "TWD"),
    ("韩国元", "KRW"),
    ("韩币", "KRW"),
    ("澳门币", "MOP"),
    ("卢布", "RUB"),
    ("新加坡币", "SGD"),
];

const CURRENCY_PRIORITY: &[(&str, i32)] = &[
    ("USD", 1),
    ("HKD", 2),
    ("JPY", 3),
    ("EUR", 4),
    ("GBP", 5),
    ("AUD", 6),
    ("CAD", 7),
    ("SGD", 8),
    ("CHF", 9),
    ("MOP", 10),
    ("RUB", 11),
    ("KRW", 12),
    ("THB", 13),
    ("TWD", 14),
];

pub const DEFAULT_CURRENCY_SORT: i32 = 100;

/// Directory labels that differ from the catalog's bank names.
const BANK_ALIASES: &[(&str, &str)] = &[
    ("工商银行", "中国工商银行"),
    ("农业银行", "中国农业银行"),
    ("建设银行", "中国建设银行"),
    ("邮储银行", "中国邮政储蓄银行"),
    ("浦发银行", "上海浦东发展银行"),
    ("光大银行", "中国光大银行"),
    ("民生银行", "中国民生银行"),
];

pub const SEED_BANKS: &[(&str, &str)] = &[
    ("ICBC", "工商银行"),
    ("BOC", "中国银行"),
    ("ABCHINA", "农业银行"),
    ("BANKCOMM", "交通银行"),
    ("CCB", "建设银行"),
    ("CMBCHINA", "招商银行"),
    ("CEBBANK", "中国光大银行"),
    ("SPDB", "上海浦东发展银行"),
    ("CIB", "兴业银行"),
    ("ECITIC", "中信银行"),
    ("PSBC", "邮政储蓄银行"),
    ("CMBC", "民生银行"),
];

const FUZZY_BANK_THRESHOLD: f64 = 0.92;

static BANK_CODE_IN_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"b-([a-zA-Z0-9]+)\.html$").expect("valid bank url pattern"));

pub fn currency_sort(code: &str) -> i32 {
    CURRENCY_PRIORITY
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, p)| *p)
        .unwrap_or(DEFAULT_CURRENCY_SORT)
}

/// Uppercase bank code from a `.../b-<code>.html` detail link.
pub fn derive_bank_code(url: &str) -> Option<String> {
    BANK_CODE_IN_URL
        .captures(url.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_uppercase())
}

/// Localized currency name to code. Built once, read-only afterwards.
#[derive(Debug, Clone)]
pub struct CurrencyAliasTable {
    by_label: HashMap<String, String>,
}

impl CurrencyAliasTable {
    pub fn standard() -> Self {
        Self::from_pairs(
            CURRENCY_NAMES
                .iter()
                .map(|(code, name)| (*name, *code))
                .chain(CURRENCY_ALIASES.iter().copied()),
        )
    }

    /// Later pairs override earlier ones for the same label.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let by_label = pairs
            .into_iter()
            .map(|(label, code)| (label.to_string(), code.to_string()))
            .collect();
        Self { by_label }
    }

    pub fn code_for(&self, label: &str) -> Option<&str> {
        self.by_label.get(label).map(String::as_str)
    }
}

/// Directory label to canonical bank display name.
#[derive(Debug, Clone)]
pub struct BankAliasTable {
    by_label: HashMap<String, String>,
}

impl BankAliasTable {
    pub fn standard() -> Self {
        Self {
            by_label: BANK_ALIASES
                .iter()
                .map(|(label, name)| (label.to_string(), name.to_string()))
                .collect(),
        }
    }

    pub fn canonical_name(&self, label: &str) -> Option<&str> {
        self.by_label.get(label).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BankResolution {
    Found(BankEntry),
    Created(BankEntry),
    /// No catalog match and no code could be derived from the link.
    Unresolved,
}

#[derive(Clone)]
pub struct CatalogResolver {
    store: Arc<dyn RateStore>,
    currencies: Arc<CurrencyAliasTable>,
    banks: Arc<BankAliasTable>,
}

impl CatalogResolver {
    pub fn new(
        store: Arc<dyn RateStore>,
        currencies: Arc<CurrencyAliasTable>,
        banks: Arc<BankAliasTable>,
    ) -> Self {
        Self {
            store,
            currencies,
            banks,
        }
    }

    pub fn standard(store: Arc<dyn RateStore>) -> Self {
        Self::new(
            store,
            Arc::new(CurrencyAliasTable::standard()),
            Arc::new(BankAliasTable::standard()),
        )
    }

    /// Code match, then alias table, then catalog display name.
    /// `Ok(None)` means the label is unknown.
    pub async fn resolve_currency(&self, label: &str) -> Result<Option<CurrencyEntry>, StoreError> {
        let label = label.trim();
        if label.is_empty() {
            return Ok(None);
        }
        if let Some(entry) = self.store.find_currency_by_code(label).await? {
            return Ok(Some(entry));
        }
        if let Some(code) = self.currencies.code_for(label) {
            if let Some(entry) = self.store.find_currency_by_code(code).await? {
                return Ok(Some(entry));
            }
        }
        let by_name = self
            .store
            .list_currencies()
            .await?
            .into_iter()
            .find(|c| c.name == label);
        if by_name.is_none() {
            debug!(label, "currency label not in catalog");
        }
        Ok(by_name)
    }

    /// The base currency, created on first use.
    pub async fn ensure_base_currency(&self) -> Result<CurrencyEntry, StoreError> {
        self.ensure_currency(BASE_CURRENCY_CODE, BASE_CURRENCY_NAME, 0)
            .await
    }

    async fn ensure_currency(
        &self,
        code: &str,
        name: &str,
        sort: i32,
    ) -> Result<CurrencyEntry, StoreError> {
        if let Some(entry) = self.store.find_currency_by_code(code).await? {
            return Ok(entry);
        }
        match self.store.create_currency(code, name, sort).await {
            Ok(entry) => {
                info!(code, name, "created currency");
                Ok(entry)
            }
            Err(StoreError::DuplicateCode { .. }) => self
                .store
                .find_currency_by_code(code)
                .await?
                .ok_or_else(|| StoreError::DuplicateCode {
                    table: "currencies",
                    code: code.to_string(),
                }),
            Err(e) => Err(e),
        }
    }

    /// Exact name, alias name, substring, then fuzzy match; on a miss the
    /// bank is created from the code in `source_url`.
    pub async fn resolve_or_create_bank(
        &self,
        label: &str,
        source_url: &str,
    ) -> Result<BankResolution, StoreError> {
        let label = label.trim();
        if let Some(bank) = self.find_bank(label).await? {
            return Ok(BankResolution::Found(bank));
        }

        let Some(code) = derive_bank_code(source_url) else {
            debug!(label, source_url, "bank not in catalog and no code in link");
            return Ok(BankResolution::Unresolved);
        };
        if let Some(bank) = self.store.find_bank_by_code(&code).await? {
            return Ok(BankResolution::Found(bank));
        }
        match self.store.create_bank(&code, label).await {
            Ok(bank) => {
                info!(code = %bank.code, name = %bank.name, "auto-created bank");
                Ok(BankResolution::Created(bank))
            }
            Err(StoreError::DuplicateCode { .. }) => Ok(self
                .store
                .find_bank_by_code(&code)
                .await?
                .map(BankResolution::Found)
                .unwrap_or(BankResolution::Unresolved)),
            Err(e) => Err(e),
        }
    }

    pub async fn find_bank(&self, label: &str) -> Result<Option<BankEntry>, StoreError> {
        if label.is_empty() {
            return Ok(None);
        }
        if let Some(bank) = self.store.find_bank_by_name(label).await? {
            return Ok(Some(bank));
        }
        if let Some(alias) = self.banks.canonical_name(label) {
            if let Some(bank) = self.store.find_bank_by_name(alias).await? {
                return Ok(Some(bank));
            }
        }

        let banks = self.store.list_banks().await?;
        if let Some(bank) = banks.iter().find(|b| b.name.contains(label)) {
            return Ok(Some(bank.clone()));
        }
        let best = banks
            .iter()
            .map(|b| (jaro_winkler(&b.name, label), b))
            .filter(|(score, _)| *score >= FUZZY_BANK_THRESHOLD)
            .max_by(|a, b| a.0.total_cmp(&b.0));
        Ok(best.map(|(_, b)| b.clone()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub banks_created: usize,
    pub currencies_created: usize,
}

/// Install the default banks and currencies. Existing codes are left as is.
pub async fn seed_catalog(store: &dyn RateStore) -> Result<SeedReport, StoreError> {
    let mut report = SeedReport::default();

    for (code, name) in SEED_BANKS {
        if store.find_bank_by_code(code).await?.is_some() {
            continue;
        }
        store.create_bank(code, name).await?;
        report.banks_created += 1;
    }

    let base = [(BASE_CURRENCY_CODE, BASE_CURRENCY_NAME)];
    for (code, name) in base.iter().chain(CURRENCY_NAMES.iter()) {
        if store.find_currency_by_code(code).await?.is_some() {
            continue;
        }
        let sort = if *code == BASE_CURRENCY_CODE {
            0
        } else {
            currency_sort(code)
        };
        store.create_currency(code, name, sort).await?;
        report.currencies_created += 1;
    }

    info!(
        banks_created = report.banks_created,
        currencies_created = report.currencies_created,
        "catalog seeded"
    );
    Ok(report)
}
