use async_trait::async_trait;
use fxr_core::{
    BankEntry, BankRate, CurrencyEntry, ExchangeRate, NaturalKey, PreciousMetal, RateRecord,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use crate::store::{RateStore, StoreError};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn currency_from_row(row: &PgRow) -> Result<CurrencyEntry, sqlx::Error> {
    Ok(CurrencyEntry {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        sort: row.try_get("sort")?,
    })
}

fn bank_from_row(row: &PgRow) -> Result<BankEntry, sqlx::Error> {
    Ok(BankEntry {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        name: row.try_get("name")?,
    })
}

#[async_trait]
impl RateStore for PgStore {
    async fn list_currencies(&self) -> Result<Vec<CurrencyEntry>, StoreError> {
        let rows = sqlx::query("SELECT id, code, name, sort FROM currencies ORDER BY sort, code")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(currency_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn find_currency_by_code(&self, code: &str) -> Result<Option<CurrencyEntry>, StoreError> {
        let row = sqlx::query("SELECT id, code, name, sort FROM currencies WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(currency_from_row).transpose()?)
    }

    async fn create_currency(
        &self,
        code: &str,
        name: &str,
        sort: i32,
    ) -> Result<CurrencyEntry, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO currencies (code, name, sort)
            VALUES ($1, $2, $3)
            RETURNING id, code, name, sort
            "#,
        )
        .bind(code)
        .bind(name)
        .bind(sort)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(currency_from_row(&row)?),
            Err(err) if is_unique_violation(&err) => Err(StoreError::DuplicateCode {
                table: "currencies",
                code: code.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    async fn list_banks(&self) -> Result<Vec<BankEntry>, StoreError> {
        let rows = sqlx::query("SELECT id, code, name FROM banks ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(bank_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn find_bank_by_code(&self, code: &str) -> Result<Option<BankEntry>, StoreError> {
        let row = sqlx::query("SELECT id, code, name FROM banks WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(bank_from_row).transpose()?)
    }

    async fn find_bank_by_name(&self, name: &str) -> Result<Option<BankEntry>, StoreError> {
        let row = sqlx::query("SELECT id, code, name FROM banks WHERE name = $1 ORDER BY id LIMIT 1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(bank_from_row).transpose()?)
    }

    async fn create_bank(&self, code: &str, name: &str) -> Result<BankEntry, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO banks (code, name)
            VALUES ($1, $2)
            RETURNING id, code, name
            "#,
        )
        .bind(code)
        .bind(name)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(bank_from_row(&row)?),
            Err(err) if is_unique_violation(&err) => Err(StoreError::DuplicateCode {
                table: "banks",
                code: code.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    async fn count(&self, key: &NaturalKey) -> Result<u64, StoreError> {
        let n: i64 = match key {
            NaturalKey::Exchange { date, currency_id } => {
                sqlx::query_scalar(
                    "SELECT COUNT(*) FROM exchange_rates WHERE date = $1 AND currency_id = $2",
                )
                .bind(date)
                .bind(currency_id)
                .fetch_one(&self.pool)
                .await?
            }
            NaturalKey::Bank {
                date,
                bank_id,
                currency_id,
            } => {
                sqlx::query_scalar(
                    "SELECT COUNT(*) FROM bank_rates WHERE date = $1 AND bank_id = $2 AND currency_id = $3",
                )
                .bind(date)
                .bind(bank_id)
                .bind(currency_id)
                .fetch_one(&self.pool)
                .await?
            }
            NaturalKey::Metal {
                date,
                trading_venue,
                symbol,
            } => {
                sqlx::query_scalar(
                    "SELECT COUNT(*) FROM precious_metals WHERE date = $1 AND trading_venue = $2 AND symbol = $3",
                )
                .bind(date)
                .bind(trading_venue)
                .bind(symbol)
                .fetch_one(&self.pool)
                .await?
            }
        };
        Ok(n.max(0) as u64)
    }

    async fn find(&self, key: &NaturalKey) -> Result<Option<RateRecord>, StoreError> {
        let record = match key {
            NaturalKey::Exchange { date, currency_id } => {
                let row = sqlx::query(
                    r#"
                    SELECT date, currency_id, base, rate
                      FROM exchange_rates
                     WHERE date = $1 AND currency_id = $2
                     LIMIT 1
                    "#,
                )
                .bind(date)
                .bind(currency_id)
                .fetch_optional(&self.pool)
                .await?;
                match row {
                    Some(row) => Some(RateRecord::Exchange(ExchangeRate {
                        date: row.try_get("date")?,
                        currency_id: row.try_get("currency_id")?,
                        base: row.try_get("base")?,
                        rate: row.try_get("rate")?,
                    })),
                    None => None,
                }
            }
            NaturalKey::Bank {
                date,
                bank_id,
                currency_id,
            } => {
                let row = sqlx::query(
                    r#"
                    SELECT date, bank_id, currency_id, hui_in, chao_in, hui_out, chao_out,
                           zhesuan, cash_estimated
                      FROM bank_rates
                     WHERE date = $1 AND bank_id = $2 AND currency_id = $3
                     LIMIT 1
                    "#,
                )
                .bind(date)
                .bind(bank_id)
                .bind(currency_id)
                .fetch_optional(&self.pool)
                .await?;
                match row {
                    Some(row) => Some(RateRecord::Bank(BankRate {
                        date: row.try_get("date")?,
                        bank_id: row.try_get("bank_id")?,
                        currency_id: row.try_get("currency_id")?,
                        hui_in: row.try_get("hui_in")?,
                        chao_in: row.try_get("chao_in")?,
                        hui_out: row.try_get("hui_out")?,
                        chao_out: row.try_get("chao_out")?,
                        zhesuan: row.try_get("zhesuan")?,
                        cash_estimated: row.try_get("cash_estimated")?,
                    })),
                    None => None,
                }
            }
            NaturalKey::Metal {
                date,
                trading_venue,
                symbol,
            } => {
                let row = sqlx::query(
                    r#"
                    SELECT date, trading_venue, symbol, title, type, price, min_price, max_price,
                           kp_price, prev_close, unit, currency_id
                      FROM precious_metals
                     WHERE date = $1 AND trading_venue = $2 AND symbol = $3
                     LIMIT 1
                    "#,
                )
                .bind(date)
                .bind(trading_venue)
                .bind(symbol)
                .fetch_optional(&self.pool)
                .await?;
                match row {
                    Some(row) => Some(RateRecord::Metal(PreciousMetal {
                        date: row.try_get("date")?,
                        trading_venue: row.try_get("trading_venue")?,
                        symbol: row.try_get("symbol")?,
                        title: row.try_get("title")?,
                        kind: row.try_get("type")?,
                        price: row.try_get("price")?,
                        min_price: row.try_get("min_price")?,
                        max_price: row.try_get("max_price")?,
                        open_price: row.try_get("kp_price")?,
                        prev_close: row.try_get("prev_close")?,
                        unit: row.try_get("unit")?,
                        currency_id: row.try_get("currency_id")?,
                    })),
                    None => None,
                }
            }
        };
        Ok(record)
    }

    async fn create(&self, record: &RateRecord) -> Result<(), StoreError> {
        let result = match record {
            RateRecord::Exchange(r) => {
                sqlx::query(
                    r#"
                    INSERT INTO exchange_rates (date, currency_id, base, rate)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(r.date)
                .bind(r.currency_id)
                .bind(&r.base)
                .bind(r.rate)
                .execute(&self.pool)
                .await
            }
            RateRecord::Bank(r) => {
                sqlx::query(
                    r#"
                    INSERT INTO bank_rates (date, bank_id, currency_id, hui_in, chao_in, hui_out,
                                            chao_out, zhesuan, cash_estimated)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    "#,
                )
                .bind(r.date)
                .bind(r.bank_id)
                .bind(r.currency_id)
                .bind(r.hui_in)
                .bind(r.chao_in)
                .bind(r.hui_out)
                .bind(r.chao_out)
                .bind(r.zhesuan)
                .bind(r.cash_estimated)
                .execute(&self.pool)
                .await
            }
            RateRecord::Metal(r) => {
                sqlx::query(
                    r#"
                    INSERT INTO precious_metals (date, trading_venue, symbol, title, type, price,
                                                 min_price, max_price, kp_price, prev_close, unit,
                                                 currency_id)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                    "#,
                )
                .bind(r.date)
                .bind(&r.trading_venue)
                .bind(&r.symbol)
                .bind(&r.title)
                .bind(&r.kind)
                .bind(r.price)
                .bind(r.min_price)
                .bind(r.max_price)
                .bind(r.open_price)
                .bind(r.prev_close)
                .bind(&r.unit)
                .bind(r.currency_id)
                .execute(&self.pool)
                .await
            }
        };

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(StoreError::DuplicateKey {
                table: record.table(),
                key: record.natural_key(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    async fn update(&self, key: &NaturalKey, record: &RateRecord) -> Result<(), StoreError> {
        if record.natural_key() != *key {
            return Err(StoreError::KeyMismatch {
                key_table: key.table(),
                record_table: record.table(),
            });
        }

        let done = match record {
            RateRecord::Exchange(r) => {
                sqlx::query(
                    r#"
                    UPDATE exchange_rates
                       SET base = $3,
                           rate = $4,
                           updated_at = NOW()
                     WHERE date = $1 AND currency_id = $2
                    "#,
                )
                .bind(r.date)
                .bind(r.currency_id)
                .bind(&r.base)
                .bind(r.rate)
                .execute(&self.pool)
                .await?
            }
            RateRecord::Bank(r) => {
                sqlx::query(
                    r#"
                    UPDATE bank_rates
                       SET hui_in = $4,
                           chao_in = $5,
                           hui_out = $6,
                           chao_out = $7,
                           zhesuan = $8,
                           cash_estimated = $9,
                           updated_at = NOW()
                     WHERE date = $1 AND bank_id = $2 AND currency_id = $3
                    "#,
                )
                .bind(r.date)
                .bind(r.bank_id)
                .bind(r.currency_id)
                .bind(r.hui_in)
                .bind(r.chao_in)
                .bind(r.hui_out)
                .bind(r.chao_out)
                .bind(r.zhesuan)
                .bind(r.cash_estimated)
                .execute(&self.pool)
                .await?
            }
            RateRecord::Metal(r) => {
                sqlx::query(
                    r#"
                    UPDATE precious_metals
                       SET title = $4,
                           type = $5,
                           price = $6,
                           min_price = $7,
                           max_price = $8,
                           kp_price = $9,
                           prev_close = $10,
                           unit = $11,
                           currency_id = $12,
                           updated_at = NOW()
                     WHERE date = $1 AND trading_venue = $2 AND symbol = $3
                    "#,
                )
                .bind(r.date)
                .bind(&r.trading_venue)
                .bind(&r.symbol)
                .bind(&r.title)
                .bind(&r.kind)
                .bind(r.price)
                .bind(r.min_price)
                .bind(r.max_price)
                .bind(r.open_price)
                .bind(r.prev_close)
                .bind(&r.unit)
                .bind(r.currency_id)
                .execute(&self.pool)
                .await?
            }
        };

        if done.rows_affected() == 0 {
            return Err(StoreError::MissingRow {
                table: key.table(),
                key: key.clone(),
            });
        }
        Ok(())
    }
}
