use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{FixedOffset, Utc};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

use crate::jobs::{run_job_once, CycleReport, IngestJob, JobKind};

/// One job plus the guard that keeps its cycles from overlapping.
#[derive(Clone)]
pub struct JobRunner {
    job: Arc<dyn IngestJob>,
    running: Arc<Mutex<()>>,
    offset: FixedOffset,
}

impl JobRunner {
    pub fn new(job: Arc<dyn IngestJob>, offset: FixedOffset) -> Self {
        Self {
            job,
            running: Arc::new(Mutex::new(())),
            offset,
        }
    }

    pub fn kind(&self) -> JobKind {
        self.job.kind()
    }

    /// Run a cycle unless the previous one is still going, in which case the
    /// trigger is dropped and `None` returned.
    pub async fn trigger(&self) -> Option<CycleReport> {
        let Ok(_running) = self.running.try_lock() else {
            warn!(job = self.kind().name(), "previous cycle still running, trigger skipped");
            return None;
        };
        let date = Utc::now().with_timezone(&self.offset).date_naive();
        Some(run_job_once(self.job.as_ref(), date).await)
    }
}

/// Run every job once, one after another.
pub async fn run_all_once(runners: &[JobRunner]) -> Vec<(JobKind, Option<CycleReport>)> {
    let mut out = Vec::with_capacity(runners.len());
    for runner in runners {
        out.push((runner.kind(), runner.trigger().await));
    }
    out
}

pub struct IngestScheduler {
    entries: Vec<(JobRunner, String)>,
}

impl IngestScheduler {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn with_job(mut self, runner: JobRunner, cron: impl Into<String>) -> Self {
        self.entries.push((runner, cron.into()));
        self
    }

    pub fn runners(&self) -> Vec<JobRunner> {
        self.entries.iter().map(|(r, _)| r.clone()).collect()
    }

    /// Register every job with a cron scheduler. Nothing runs until the
    /// returned scheduler is started.
    pub async fn build(&self) -> Result<JobScheduler> {
        let sched = JobScheduler::new().await.context("creating scheduler")?;
        for (runner, cron) in &self.entries {
            let runner = runner.clone();
            let kind = runner.kind();
            let job = Job::new_async(cron.as_str(), move |_uuid, _l| {
                let runner = runner.clone();
                Box::pin(async move {
                    runner.trigger().await;
                })
            })
            .with_context(|| format!("creating {kind} job for cron {cron}"))?;
            sched.add(job).await.context("adding scheduler job")?;
            info!(job = kind.name(), cron = %cron, "job scheduled");
        }
        Ok(sched)
    }

    /// Start the cron triggers, optionally run every job once right away,
    /// and block until Ctrl-C.
    pub async fn run_until_shutdown(self, run_on_start: bool) -> Result<()> {
        let mut sched = self.build().await?;
        sched.start().await.context("starting scheduler")?;

        if run_on_start {
            let runners = self.runners();
            tokio::spawn(async move {
                info!("initial sync started");
                run_all_once(&runners).await;
                info!("initial sync finished");
            });
        }

        tokio::signal::ctrl_c()
            .await
            .context("waiting for shutdown signal")?;
        info!("shutting down scheduler");
        sched.shutdown().await.context("stopping scheduler")?;
        Ok(())
    }
}

impl Default for IngestScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::jobs::IngestContext;

    struct GatedJob {
        started: Notify,
        release: Notify,
        runs: AtomicUsize,
    }

    #[async_trait]
    impl IngestJob for GatedJob {
        fn kind(&self) -> JobKind {
            JobKind::Metals
        }

        async fn run_cycle(&self, _ctx: &IngestContext) -> CycleReport {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();
            self.release.notified().await;
            CycleReport::default()
        }
    }

    fn utc8() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn overlapping_trigger_is_skipped() {
        let job = Arc::new(GatedJob {
            started: Notify::new(),
            release: Notify::new(),
            runs: AtomicUsize::new(0),
        });
        let runner = JobRunner::new(job.clone(), utc8());

        let background = runner.clone();
        let first = tokio::spawn(async move { background.trigger().await });
        job.started.notified().await;

        assert!(runner.trigger().await.is_none());

        job.release.notify_one();
        assert!(first.await.unwrap().is_some());
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_cron_is_rejected() {
        let job = Arc::new(GatedJob {
            started: Notify::new(),
            release: Notify::new(),
            runs: AtomicUsize::new(0),
        });
        let scheduler =
            IngestScheduler::new().with_job(JobRunner::new(job, utc8()), "every ten minutes");
        assert!(scheduler.build().await.is_err());
    }
}
