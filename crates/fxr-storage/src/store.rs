use async_trait::async_trait;
use fxr_core::{BankEntry, CurrencyEntry, NaturalKey, RateRecord};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{table} already contains code {code}")]
    DuplicateCode { table: &'static str, code: String },
    #[error("{table} already contains a row for {key:?}")]
    DuplicateKey { table: &'static str, key: NaturalKey },
    #[error("no {table} row for {key:?}")]
    MissingRow { table: &'static str, key: NaturalKey },
    #[error("record for {record_table} cannot be written under a {key_table} key")]
    KeyMismatch {
        key_table: &'static str,
        record_table: &'static str,
    },
    #[error(transparent)]
    Backend(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Indexed table store behind the ingestion engine.
///
/// Rate rows are only ever addressed through their [`NaturalKey`]; the
/// count/create/update triple is what the upsert engine builds on.
#[async_trait]
pub trait RateStore: Send + Sync {
    async fn list_currencies(&self) -> Result<Vec<CurrencyEntry>, StoreError>;

    async fn find_currency_by_code(&self, code: &str) -> Result<Option<CurrencyEntry>, StoreError>;

    async fn create_currency(
        &self,
        code: &str,
        name: &str,
        sort: i32,
    ) -> Result<CurrencyEntry, StoreError>;

    async fn list_banks(&self) -> Result<Vec<BankEntry>, StoreError>;

    async fn find_bank_by_code(&self, code: &str) -> Result<Option<BankEntry>, StoreError>;

    async fn find_bank_by_name(&self, name: &str) -> Result<Option<BankEntry>, StoreError>;

    async fn create_bank(&self, code: &str, name: &str) -> Result<BankEntry, StoreError>;

    async fn count(&self, key: &NaturalKey) -> Result<u64, StoreError>;

    async fn find(&self, key: &NaturalKey) -> Result<Option<RateRecord>, StoreError>;

    async fn create(&self, record: &RateRecord) -> Result<(), StoreError>;

    /// Overwrite every non-key field of the row identified by `key`.
    async fn update(&self, key: &NaturalKey, record: &RateRecord) -> Result<(), StoreError>;
}
