//! Ingestion jobs: fetch, extract, resolve, normalize, upsert.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use fxr_adapters::{
    absolute_url, extract_blob_quote, extract_directory, extract_realtime_price,
    extractor_for_source, percent_to_fraction, RateExtractor,
};
use fxr_core::{
    BankId, BankRate, ExchangeRate, PreciousMetal, RateRecord, ScrapedRate, BASE_CURRENCY_CODE,
};
use fxr_storage::{FetchedResponse, Fetcher, RateStore};
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::catalog::{BankResolution, CatalogResolver};
use crate::config::{BankDirectoryConfig, BankPageConfig, MetalFeedConfig, RealtimeConfig};
use crate::upsert::UpsertEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum JobKind {
    BankRates,
    Realtime,
    Metals,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::Realtime, JobKind::BankRates, JobKind::Metals];

    pub fn name(self) -> &'static str {
        match self {
            JobKind::BankRates => "bank-rates",
            JobKind::Realtime => "realtime",
            JobKind::Metals => "metals",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What one job cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub fetched: usize,
    pub extracted: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped_unresolved: usize,
    pub skipped_zero: usize,
    pub failures: usize,
}

impl CycleReport {
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IngestContext {
    pub run_id: Uuid,
    /// Market-local day every record of this cycle is keyed under.
    pub date: NaiveDate,
}

impl IngestContext {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            date,
        }
    }
}

#[async_trait]
pub trait IngestJob: Send + Sync {
    fn kind(&self) -> JobKind;

    /// Run one cycle. Failures are absorbed into the report.
    async fn run_cycle(&self, ctx: &IngestContext) -> CycleReport;
}

/// Run a cycle inside its tracing span and log the outcome.
pub async fn run_job_once(job: &dyn IngestJob, date: NaiveDate) -> CycleReport {
    let ctx = IngestContext::new(date);
    let kind = job.kind();
    let span = info_span!("ingest_cycle", job = kind.name(), run_id = %ctx.run_id);
    async move {
        info!(%date, "cycle started");
        let report = job.run_cycle(&ctx).await;
        info!(
            fetched = report.fetched,
            extracted = report.extracted,
            inserted = report.inserted,
            updated = report.updated,
            skipped_unresolved = report.skipped_unresolved,
            skipped_zero = report.skipped_zero,
            failures = report.failures,
            "cycle finished"
        );
        report
    }
    .instrument(span)
    .await
}

/// Handles shared by every job.
#[derive(Clone)]
pub struct IngestServices {
    pub fetcher: Arc<dyn Fetcher>,
    pub store: Arc<dyn RateStore>,
    pub resolver: CatalogResolver,
    pub upserts: UpsertEngine,
}

impl IngestServices {
    pub fn new(fetcher: Arc<dyn Fetcher>, store: Arc<dyn RateStore>) -> Self {
        Self {
            resolver: CatalogResolver::standard(store.clone()),
            upserts: UpsertEngine::new(store.clone()),
            fetcher,
            store,
        }
    }

    async fn fetch(
        &self,
        ctx: &IngestContext,
        source_id: &str,
        url: &str,
        report: &mut CycleReport,
    ) -> Option<FetchedResponse> {
        match self.fetcher.fetch_bytes(ctx.run_id, source_id, url).await {
            Ok(resp) => {
                report.fetched += 1;
                Some(resp)
            }
            Err(err) => {
                warn!(source_id, url, error = %err, "fetch failed");
                report.failures += 1;
                None
            }
        }
    }
}

pub struct BankRatesJob {
    services: IngestServices,
    directory: Option<BankDirectoryConfig>,
    pages: Vec<BankPageConfig>,
}

impl BankRatesJob {
    pub fn new(
        services: IngestServices,
        directory: Option<BankDirectoryConfig>,
        pages: Vec<BankPageConfig>,
    ) -> Self {
        Self {
            services,
            directory,
            pages,
        }
    }

    async fn sync_directory(
        &self,
        dir: &BankDirectoryConfig,
        ctx: &IngestContext,
        report: &mut CycleReport,
    ) {
        let Some(extractor) = extractor_for_source(&dir.extractor, &dir.source_id) else {
            warn!(source_id = %dir.source_id, extractor = %dir.extractor, "unknown extractor");
            report.failures += 1;
            return;
        };
        let Some(resp) = self
            .services
            .fetch(ctx, &dir.source_id, &dir.url, report)
            .await
        else {
            return;
        };
        let entries = match extract_directory(&resp.text()) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(source_id = %dir.source_id, error = %err, "bank directory unreadable");
                report.failures += 1;
                return;
            }
        };
        debug!(banks = entries.len(), "bank directory read");

        for entry in entries {
            let bank = match self
                .services
                .resolver
                .resolve_or_create_bank(&entry.label, &entry.href)
                .await
            {
                Ok(BankResolution::Found(bank) | BankResolution::Created(bank)) => bank,
                Ok(BankResolution::Unresolved) => {
                    report.skipped_unresolved += 1;
                    continue;
                }
                Err(err) => {
                    error!(bank = %entry.label, error = %err, "bank lookup failed");
                    report.failures += 1;
                    continue;
                }
            };

            let url = absolute_url(&dir.base_url, &entry.href);
            self.sync_bank_document(extractor.as_ref(), bank.id, &url, ctx, report)
                .await;
        }
    }

    async fn sync_page(&self, page: &BankPageConfig, ctx: &IngestContext, report: &mut CycleReport) {
        let Some(extractor) = extractor_for_source(&page.extractor, &page.bank_code) else {
            warn!(bank_code = %page.bank_code, extractor = %page.extractor, "unknown extractor");
            report.failures += 1;
            return;
        };
        let bank = match self.services.store.find_bank_by_code(&page.bank_code).await {
            Ok(Some(bank)) => bank,
            Ok(None) => {
                debug!(bank_code = %page.bank_code, "bank not in catalog");
                report.skipped_unresolved += 1;
                return;
            }
            Err(err) => {
                error!(bank_code = %page.bank_code, error = %err, "bank lookup failed");
                report.failures += 1;
                return;
            }
        };
        self.sync_bank_document(extractor.as_ref(), bank.id, &page.url, ctx, report)
            .await;
    }

    async fn sync_bank_document(
        &self,
        extractor: &dyn RateExtractor,
        bank_id: BankId,
        url: &str,
        ctx: &IngestContext,
        report: &mut CycleReport,
    ) {
        let Some(resp) = self
            .services
            .fetch(ctx, extractor.source_id(), url, report)
            .await
        else {
            return;
        };
        let rates = match extractor.extract(&resp.text()) {
            Ok(rates) => rates,
            Err(err) => {
                warn!(url, error = %err, "no rates extracted");
                report.failures += 1;
                return;
            }
        };
        for scraped in rates {
            report.extracted += 1;
            self.persist_bank_rate(bank_id, scraped, ctx, report).await;
        }
    }

    async fn persist_bank_rate(
        &self,
        bank_id: BankId,
        scraped: ScrapedRate,
        ctx: &IngestContext,
        report: &mut CycleReport,
    ) {
        let currency = match self
            .services
            .resolver
            .resolve_currency(&scraped.currency_label)
            .await
        {
            Ok(Some(currency)) => currency,
            Ok(None) => {
                report.skipped_unresolved += 1;
                return;
            }
            Err(err) => {
                error!(label = %scraped.currency_label, error = %err, "currency lookup failed");
                report.failures += 1;
                return;
            }
        };

        let record = RateRecord::Bank(BankRate {
            date: ctx.date,
            bank_id,
            currency_id: currency.id,
            hui_in: percent_to_fraction(scraped.hui_in),
            chao_in: percent_to_fraction(scraped.chao_in),
            hui_out: percent_to_fraction(scraped.hui_out),
            chao_out: percent_to_fraction(scraped.chao_out),
            zhesuan: percent_to_fraction(scraped.zhesuan),
            cash_estimated: scraped.cash_estimated,
        });
        self.services.upserts.persist(record, report).await;
    }
}

#[async_trait]
impl IngestJob for BankRatesJob {
    fn kind(&self) -> JobKind {
        JobKind::BankRates
    }

    async fn run_cycle(&self, ctx: &IngestContext) -> CycleReport {
        let mut report = CycleReport::default();
        if let Some(dir) = &self.directory {
            self.sync_directory(dir, ctx, &mut report).await;
        }
        for page in self.pages.iter().filter(|p| p.enabled) {
            self.sync_page(page, ctx, &mut report).await;
        }
        report
    }
}

pub struct RealtimeRatesJob {
    services: IngestServices,
    source: Option<RealtimeConfig>,
}

impl RealtimeRatesJob {
    pub fn new(services: IngestServices, source: Option<RealtimeConfig>) -> Self {
        Self { services, source }
    }
}

#[async_trait]
impl IngestJob for RealtimeRatesJob {
    fn kind(&self) -> JobKind {
        JobKind::Realtime
    }

    async fn run_cycle(&self, ctx: &IngestContext) -> CycleReport {
        let mut report = CycleReport::default();
        let Some(source) = &self.source else {
            debug!("no real-time source configured");
            return report;
        };
        let currencies = match self.services.store.list_currencies().await {
            Ok(currencies) => currencies,
            Err(err) => {
                error!(error = %err, "listing currencies failed");
                report.failures += 1;
                return report;
            }
        };

        for currency in currencies.iter().filter(|c| c.code != BASE_CURRENCY_CODE) {
            let url = source.url_for(&currency.code);
            let Some(resp) = self
                .services
                .fetch(ctx, &source.source_id, &url, &mut report)
                .await
            else {
                continue;
            };
            let rate = match extract_realtime_price(&resp.text(), &currency.code) {
                Ok(rate) => rate,
                Err(err) => {
                    warn!(code = %currency.code, error = %err, "no real-time price");
                    report.failures += 1;
                    continue;
                }
            };
            report.extracted += 1;

            let record = RateRecord::Exchange(ExchangeRate {
                date: ctx.date,
                currency_id: currency.id,
                base: BASE_CURRENCY_CODE.to_string(),
                rate,
            });
            self.services.upserts.persist(record, &mut report).await;
        }
        report
    }
}

pub struct MetalsJob {
    services: IngestServices,
    feeds: Vec<MetalFeedConfig>,
}

impl MetalsJob {
    pub fn new(services: IngestServices, feeds: Vec<MetalFeedConfig>) -> Self {
        Self { services, feeds }
    }

    async fn sync_feed(&self, feed: &MetalFeedConfig, ctx: &IngestContext, report: &mut CycleReport) {
        let Some(resp) = self
            .services
            .fetch(ctx, &feed.source_id, &feed.url, report)
            .await
        else {
            return;
        };
        let content = resp.text();

        for sym in &feed.symbols {
            let quote = match extract_blob_quote(&content, &sym.variable, sym.offsets) {
                Ok(quote) => quote,
                Err(err) => {
                    warn!(source_id = %feed.source_id, symbol = %sym.symbol, error = %err, "quote unreadable");
                    report.failures += 1;
                    continue;
                }
            };
            report.extracted += 1;
            if quote.price == 0.0 {
                debug!(symbol = %sym.symbol, "zero price, skipped");
                report.skipped_zero += 1;
                continue;
            }

            let currency = if sym.currency == BASE_CURRENCY_CODE {
                self.services.resolver.ensure_base_currency().await.map(Some)
            } else {
                self.services.resolver.resolve_currency(&sym.currency).await
            };
            let currency = match currency {
                Ok(Some(currency)) => currency,
                Ok(None) => {
                    report.skipped_unresolved += 1;
                    continue;
                }
                Err(err) => {
                    error!(currency = %sym.currency, error = %err, "currency lookup failed");
                    report.failures += 1;
                    continue;
                }
            };

            let record = RateRecord::Metal(PreciousMetal {
                date: ctx.date,
                trading_venue: sym.trading_venue.clone(),
                symbol: sym.symbol.clone(),
                title: sym.title.clone(),
                kind: sym.kind.clone(),
                price: quote.price,
                min_price: quote.low,
                max_price: quote.high,
                open_price: quote.open,
                prev_close: quote.prev_close,
                unit: sym.unit.clone(),
                currency_id: currency.id,
            });
            self.services.upserts.persist(record, report).await;
        }
    }
}

#[async_trait]
impl IngestJob for MetalsJob {
    fn kind(&self) -> JobKind {
        JobKind::Metals
    }

    async fn run_cycle(&self, ctx: &IngestContext) -> CycleReport {
        let mut report = CycleReport::default();
        for feed in &self.feeds {
            self.sync_feed(feed, ctx, &mut report).await;
        }
        report
    }
}
