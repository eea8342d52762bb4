use async_trait::async_trait;
use fxr_core::{BankEntry, CurrencyEntry, NaturalKey, RateRecord};
use tokio::sync::Mutex;

use crate::store::{RateStore, StoreError};

/// In-process store with the same uniqueness rules as the SQL schema.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    currencies: Vec<CurrencyEntry>,
    banks: Vec<BankEntry>,
    rates: Vec<RateRecord>,
}

impl MemoryState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every rate row, in insertion order.
    pub async fn rate_rows(&self) -> Vec<RateRecord> {
        self.state.lock().await.rates.clone()
    }
}

#[async_trait]
impl RateStore for MemoryStore {
    async fn list_currencies(&self) -> Result<Vec<CurrencyEntry>, StoreError> {
        let mut currencies = self.state.lock().await.currencies.clone();
        currencies.sort_by(|a, b| a.sort.cmp(&b.sort).then_with(|| a.code.cmp(&b.code)));
        Ok(currencies)
    }

    async fn find_currency_by_code(&self, code: &str) -> Result<Option<CurrencyEntry>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.currencies.iter().find(|c| c.code == code).cloned())
    }

    async fn create_currency(
        &self,
        code: &str,
        name: &str,
        sort: i32,
    ) -> Result<CurrencyEntry, StoreError> {
        let mut state = self.state.lock().await;
        if state.currencies.iter().any(|c| c.code == code) {
            return Err(StoreError::DuplicateCode {
                table: "currencies",
                code: code.to_string(),
            });
        }
        let entry = CurrencyEntry {
            id: state.allocate_id(),
            code: code.to_string(),
            name: name.to_string(),
            sort,
        };
        state.currencies.push(entry.clone());
        Ok(entry)
    }

    async fn list_banks(&self) -> Result<Vec<BankEntry>, StoreError> {
        Ok(self.state.lock().await.banks.clone())
    }

    async fn find_bank_by_code(&self, code: &str) -> Result<Option<BankEntry>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.banks.iter().find(|b| b.code == code).cloned())
    }

    async fn find_bank_by_name(&self, name: &str) -> Result<Option<BankEntry>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.banks.iter().find(|b| b.name == name).cloned())
    }

    async fn create_bank(&self, code: &str, name: &str) -> Result<BankEntry, StoreError> {
        let mut state = self.state.lock().await;
        if state.banks.iter().any(|b| b.code == code) {
            return Err(StoreError::DuplicateCode {
                table: "banks",
                code: code.to_string(),
            });
        }
        let entry = BankEntry {
            id: state.allocate_id(),
            code: code.to_string(),
            name: name.to_string(),
        };
        state.banks.push(entry.clone());
        Ok(entry)
    }

    async fn count(&self, key: &NaturalKey) -> Result<u64, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .rates
            .iter()
            .filter(|r| &r.natural_key() == key)
            .count() as u64)
    }

    async fn find(&self, key: &NaturalKey) -> Result<Option<RateRecord>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .rates
            .iter()
            .find(|r| &r.natural_key() == key)
            .cloned())
    }

    async fn create(&self, record: &RateRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let key = record.natural_key();
        if state.rates.iter().any(|r| r.natural_key() == key) {
            return Err(StoreError::DuplicateKey {
                table: record.table(),
                key,
            });
        }
        state.rates.push(record.clone());
        Ok(())
    }

    async fn update(&self, key: &NaturalKey, record: &RateRecord) -> Result<(), StoreError> {
        if record.natural_key() != *key {
            return Err(StoreError::KeyMismatch {
                key_table: key.table(),
                record_table: record.table(),
            });
        }
        let mut state = self.state.lock().await;
        let mut touched = false;
        for row in state.rates.iter_mut().filter(|r| &r.natural_key() == key) {
            *row = record.clone();
            touched = true;
        }
        if !touched {
            return Err(StoreError::MissingRow {
                table: key.table(),
                key: key.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fxr_core::ExchangeRate;

    fn rate(currency_id: i64, value: f64) -> RateRecord {
        RateRecord::Exchange(ExchangeRate {
            date: NaiveDate::from_ymd_opt(2026, 1, 29).unwrap(),
            currency_id,
            base: "CNY".into(),
            rate: value,
        })
    }

    #[tokio::test]
    async fn create_rejects_duplicate_natural_key() {
        let store = MemoryStore::new();
        store.create(&rate(1, 7.1)).await.unwrap();
        let err = store.create(&rate(1, 7.2)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { table: "exchange_rates", .. }));
        store.create(&rate(2, 0.9)).await.unwrap();
        assert_eq!(store.rate_rows().await.len(), 2);
    }

    #[tokio::test]
    async fn update_overwrites_in_place() {
        let store = MemoryStore::new();
        let first = rate(1, 7.1);
        store.create(&first).await.unwrap();
        let key = first.natural_key();

        store.update(&key, &rate(1, 7.3)).await.unwrap();

        assert_eq!(store.count(&key).await.unwrap(), 1);
        assert_eq!(store.find(&key).await.unwrap(), Some(rate(1, 7.3)));
    }

    #[tokio::test]
    async fn update_requires_existing_row_and_matching_key() {
        let store = MemoryStore::new();
        let key = rate(1, 7.1).natural_key();
        assert!(matches!(
            store.update(&key, &rate(1, 7.1)).await,
            Err(StoreError::MissingRow { .. })
        ));
        assert!(matches!(
            store.update(&key, &rate(9, 7.1)).await,
            Err(StoreError::KeyMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn catalog_codes_are_unique() {
        let store = MemoryStore::new();
        let usd = store.create_currency("USD", "美元", 1).await.unwrap();
        assert!(matches!(
            store.create_currency("USD", "美金", 1).await,
            Err(StoreError::DuplicateCode { table: "currencies", .. })
        ));
        assert_eq!(store.find_currency_by_code("USD").await.unwrap(), Some(usd));

        let icbc = store.create_bank("ICBC", "工商银行").await.unwrap();
        assert!(store.create_bank("ICBC", "x").await.is_err());
        assert_eq!(store.find_bank_by_name("工商银行").await.unwrap(), Some(icbc.clone()));
        assert_eq!(store.find_bank_by_code("ICBC").await.unwrap(), Some(icbc));
    }

    #[tokio::test]
    async fn currencies_list_in_display_order() {
        let store = MemoryStore::new();
        store.create_currency("EUR", "欧元", 4).await.unwrap();
        store.create_currency("USD", "美元", 1).await.unwrap();
        store.create_currency("CNY", "人民币", 0).await.unwrap();
        let codes: Vec<_> = store
            .list_currencies()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.code)
            .collect();
        assert_eq!(codes, vec!["CNY", "USD", "EUR"]);
    }
}
