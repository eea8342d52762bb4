//! Ingestion orchestration: catalog resolution, upserts, jobs and scheduling.

pub mod catalog;
pub mod config;
pub mod jobs;
pub mod scheduler;
pub mod upsert;

use std::sync::Arc;

use anyhow::{Context, Result};
use fxr_storage::{Fetcher, HttpFetcher, MemoryStore, PgStore, RateStore};
use tracing::info;

pub use catalog::{
    derive_bank_code, seed_catalog, BankAliasTable, BankResolution, CatalogResolver,
    CurrencyAliasTable, SeedReport,
};
pub use config::{SourceRegistry, SyncConfig};
pub use jobs::{
    run_job_once, BankRatesJob, CycleReport, IngestContext, IngestJob, IngestServices, JobKind,
    MetalsJob, RealtimeRatesJob,
};
pub use scheduler::{run_all_once, IngestScheduler, JobRunner};
pub use upsert::UpsertEngine;

pub const CRATE_NAME: &str = "fxr-sync";

/// Open the configured store. PostgreSQL stores are migrated first.
pub async fn open_store(config: &SyncConfig) -> Result<Arc<dyn RateStore>> {
    match config.postgres_url() {
        Some(url) => {
            let store = PgStore::connect(url)
                .await
                .context("connecting to database")?;
            store.migrate().await.context("applying migrations")?;
            info!("using postgres store");
            Ok(Arc::new(store))
        }
        None => {
            info!("using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Everything a process needs to run the ingestion jobs.
pub struct IngestRuntime {
    config: SyncConfig,
    registry: SourceRegistry,
    services: IngestServices,
}

impl IngestRuntime {
    pub fn new(
        config: SyncConfig,
        registry: SourceRegistry,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn RateStore>,
    ) -> Self {
        Self {
            config,
            registry,
            services: IngestServices::new(fetcher, store),
        }
    }

    pub async fn from_config(config: SyncConfig) -> Result<Self> {
        let registry = SourceRegistry::load(&config.sources_path).await?;
        let fetcher = HttpFetcher::new(config.http_client_config()).context("building http client")?;
        let store = open_store(&config).await?;
        Ok(Self::new(config, registry, Arc::new(fetcher), store))
    }

    pub fn store(&self) -> Arc<dyn RateStore> {
        self.services.store.clone()
    }

    pub async fn seed(&self) -> Result<SeedReport> {
        seed_catalog(self.services.store.as_ref())
            .await
            .context("seeding catalog")
    }

    pub fn job(&self, kind: JobKind) -> Arc<dyn IngestJob> {
        let services = self.services.clone();
        match kind {
            JobKind::BankRates => Arc::new(BankRatesJob::new(
                services,
                self.registry.bank_directory.clone(),
                self.registry.bank_pages.clone(),
            )),
            JobKind::Realtime => {
                Arc::new(RealtimeRatesJob::new(services, self.registry.realtime.clone()))
            }
            JobKind::Metals => Arc::new(MetalsJob::new(services, self.registry.metals.clone())),
        }
    }

    pub fn runner(&self, kind: JobKind) -> JobRunner {
        JobRunner::new(self.job(kind), self.config.market_offset())
    }

    pub async fn sync_once(&self, kind: JobKind) -> CycleReport {
        run_job_once(self.job(kind).as_ref(), self.config.market_today()).await
    }

    pub fn scheduler(&self) -> IngestScheduler {
        IngestScheduler::new()
            .with_job(self.runner(JobKind::Realtime), &self.config.cron_realtime)
            .with_job(self.runner(JobKind::BankRates), &self.config.cron_bank_rates)
            .with_job(self.runner(JobKind::Metals), &self.config.cron_metals)
    }

    pub async fn run_until_shutdown(&self) -> Result<()> {
        self.scheduler()
            .run_until_shutdown(self.config.run_on_start)
            .await
    }
}
