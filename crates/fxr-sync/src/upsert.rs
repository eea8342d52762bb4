use std::sync::Arc;

use fxr_core::{RateRecord, UpsertOutcome};
use fxr_storage::{RateStore, StoreError};
use tracing::{debug, error};

use crate::jobs::CycleReport;

/// Natural-key upsert: one row per key, rewritten in place on later runs.
#[derive(Clone)]
pub struct UpsertEngine {
    store: Arc<dyn RateStore>,
}

impl UpsertEngine {
    pub fn new(store: Arc<dyn RateStore>) -> Self {
        Self { store }
    }

    pub async fn upsert(&self, record: &RateRecord) -> Result<UpsertOutcome, StoreError> {
        let key = record.natural_key();
        if self.store.count(&key).await? > 0 {
            self.store.update(&key, record).await?;
            return Ok(UpsertOutcome::Updated);
        }
        match self.store.create(record).await {
            Ok(()) => Ok(UpsertOutcome::Inserted),
            // another writer inserted the key between count and create
            Err(StoreError::DuplicateKey { .. }) => {
                self.store.update(&key, record).await?;
                Ok(UpsertOutcome::Updated)
            }
            Err(e) => Err(e),
        }
    }

    /// Upsert one record and account for it in `report`. Zero-priced records
    /// are dropped; a store failure costs only this record.
    pub async fn persist(&self, record: RateRecord, report: &mut CycleReport) {
        if record.primary_price() == 0.0 {
            debug!(key = ?record.natural_key(), "zero price, skipped");
            report.skipped_zero += 1;
            return;
        }
        match self.upsert(&record).await {
            Ok(UpsertOutcome::Inserted) => report.inserted += 1,
            Ok(UpsertOutcome::Updated) => report.updated += 1,
            Err(err) => {
                error!(key = ?record.natural_key(), error = %err, "upsert failed");
                report.failures += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fxr_core::ExchangeRate;
    use fxr_storage::MemoryStore;

    fn usd(rate: f64) -> RateRecord {
        RateRecord::Exchange(ExchangeRate {
            date: NaiveDate::from_ymd_opt(2026, 1, 29).unwrap(),
            currency_id: 7,
            base: "CNY".into(),
            rate,
        })
    }

    #[tokio::test]
    async fn second_upsert_updates_in_place() {
        let store = Arc::new(MemoryStore::new());
        let engine = UpsertEngine::new(store.clone());

        assert_eq!(engine.upsert(&usd(0.1404)).await.unwrap(), UpsertOutcome::Inserted);
        assert_eq!(engine.upsert(&usd(0.1406)).await.unwrap(), UpsertOutcome::Updated);

        assert_eq!(store.rate_rows().await, vec![usd(0.1406)]);
    }

    #[tokio::test]
    async fn persist_drops_zero_prices() {
        let store = Arc::new(MemoryStore::new());
        let engine = UpsertEngine::new(store.clone());
        let mut report = CycleReport::default();

        engine.persist(usd(0.0), &mut report).await;
        engine.persist(usd(0.1406), &mut report).await;
        engine.persist(usd(0.1407), &mut report).await;

        assert_eq!(report.skipped_zero, 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(store.rate_rows().await, vec![usd(0.1407)]);
    }
}
