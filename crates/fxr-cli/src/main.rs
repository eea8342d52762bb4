use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use fxr_sync::{IngestRuntime, JobKind, SyncConfig};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Parser)]
#[command(name = "fxr-cli")]
#[command(about = "FX and precious-metal rate ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Seed the catalog, run every job once and keep the schedule running.
    Run,
    /// Run one cycle of a job and exit.
    Sync {
        #[arg(value_enum, default_value_t = SyncTarget::All)]
        job: SyncTarget,
    },
    /// Apply database migrations.
    Migrate,
    /// Install the default banks and currencies.
    Seed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SyncTarget {
    BankRates,
    Realtime,
    Metals,
    All,
}

impl SyncTarget {
    fn jobs(self) -> Vec<JobKind> {
        match self {
            SyncTarget::BankRates => vec![JobKind::BankRates],
            SyncTarget::Realtime => vec![JobKind::Realtime],
            SyncTarget::Metals => vec![JobKind::Metals],
            SyncTarget::All => JobKind::ALL.to_vec(),
        }
    }
}

/// An in-memory store starts empty, so a one-off sync has to install the
/// catalog itself.
fn seeds_before_sync(config: &SyncConfig) -> bool {
    config.postgres_url().is_none()
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = SyncConfig::from_env();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let runtime = IngestRuntime::from_config(config).await?;
            runtime.seed().await?;
            info!("ingestion service started");
            runtime.run_until_shutdown().await?;
        }
        Commands::Sync { job } => {
            let seed = seeds_before_sync(&config);
            let runtime = IngestRuntime::from_config(config).await?;
            if seed {
                runtime.seed().await?;
            }
            for kind in job.jobs() {
                let report = runtime.sync_once(kind).await;
                println!(
                    "{kind}: fetched={} extracted={} inserted={} updated={} unresolved={} zero={} failures={}",
                    report.fetched,
                    report.extracted,
                    report.inserted,
                    report.updated,
                    report.skipped_unresolved,
                    report.skipped_zero,
                    report.failures
                );
            }
        }
        Commands::Migrate => {
            if config.postgres_url().is_none() {
                anyhow::bail!("DATABASE_URL is not set");
            }
            fxr_sync::open_store(&config).await?;
            println!("migrations applied");
        }
        Commands::Seed => {
            let store = fxr_sync::open_store(&config).await?;
            let report = fxr_sync::seed_catalog(store.as_ref()).await?;
            println!(
                "seed complete: banks_created={} currencies_created={}",
                report.banks_created, report.currencies_created
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_defaults_to_every_job() {
        let cli = Cli::parse_from(["fxr-cli", "sync"]);
        match cli.command {
            Some(Commands::Sync { job }) => assert_eq!(job.jobs().len(), 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn sync_seeds_only_the_memory_store() {
        assert!(seeds_before_sync(&SyncConfig::from_lookup(|_| None)));
        let pg = SyncConfig::from_lookup(|k| {
            (k == "DATABASE_URL").then(|| "postgres://fxr@localhost/fxr".to_string())
        });
        assert!(!seeds_before_sync(&pg));
    }

    #[test]
    fn sync_accepts_kebab_case_job_names() {
        let cli = Cli::parse_from(["fxr-cli", "sync", "bank-rates"]);
        match cli.command {
            Some(Commands::Sync { job }) => assert_eq!(job.jobs(), vec![JobKind::BankRates]),
            other => panic!("unexpected {other:?}"),
        }
    }
}
