// service/scheduler.rs
use std::future::Future;
use std::sync::Arc;

use chrono::Local;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::service::{error::ServiceError, lifecycle_service::LifecycleService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Failed,
    Panicked,
    Skipped,
}

/// One named recurring procedure. At most one run is in flight; a run that
/// finds the previous one still going is skipped. Each run executes on its own
/// task so a panic is logged here instead of taking down the schedule.
#[derive(Clone)]
pub struct GuardedTask {
    name: &'static str,
    running: Arc<Mutex<()>>,
}

impl GuardedTask {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            running: Arc::new(Mutex::new(())),
        }
    }

    pub async fn run<F, Fut, T>(&self, job: F) -> TaskOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>> + Send + 'static,
        T: Send + 'static,
    {
        let _guard = match self.running.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::warn!("Skipping {} run, previous run is still in progress", self.name);
                return TaskOutcome::Skipped;
            }
        };

        match tokio::spawn(job()).await {
            Ok(Ok(_)) => TaskOutcome::Completed,
            Ok(Err(e)) => {
                tracing::error!("{} run failed: {}", self.name, e);
                TaskOutcome::Failed
            }
            Err(e) if e.is_panic() => {
                tracing::error!("{} run panicked: {}", self.name, e);
                TaskOutcome::Panicked
            }
            Err(e) => {
                tracing::error!("{} run was cancelled: {}", self.name, e);
                TaskOutcome::Failed
            }
        }
    }
}

/// The lifecycle procedures as the scheduler sees them.
#[derive(Clone)]
pub struct LifecycleJobs {
    engine: Arc<LifecycleService>,
    expiration: GuardedTask,
    reminders: GuardedTask,
}

impl LifecycleJobs {
    pub fn new(engine: Arc<LifecycleService>) -> Self {
        Self {
            engine,
            expiration: GuardedTask::new("expiration check"),
            reminders: GuardedTask::new("reminder check"),
        }
    }

    pub async fn expire(&self) -> TaskOutcome {
        let engine = self.engine.clone();
        self.expiration
            .run(move || async move { engine.run_expiration().await })
            .await
    }

    pub async fn remind(&self) -> TaskOutcome {
        let engine = self.engine.clone();
        self.reminders
            .run(move || async move { engine.run_reminders().await })
            .await
    }

    /// Shares the expiration guard so it never overlaps a scheduled expiration.
    pub async fn reconcile(&self) -> TaskOutcome {
        let engine = self.engine.clone();
        self.expiration
            .run(move || async move { engine.startup_reconciliation().await })
            .await
    }
}

/// Registers both daily jobs (cron expressions in local time) and starts the scheduler.
pub async fn start_lifecycle_scheduler(
    jobs: LifecycleJobs,
    expiration_cron: &str,
    reminder_cron: &str,
) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let expire_jobs = jobs.clone();
    let expire_job = Job::new_async_tz(expiration_cron, Local, move |_uuid, _lock| {
        let jobs = expire_jobs.clone();
        Box::pin(async move {
            tracing::info!("Running scheduled expiration check");
            jobs.expire().await;
        })
    })?;
    scheduler.add(expire_job).await?;

    let remind_jobs = jobs.clone();
    let remind_job = Job::new_async_tz(reminder_cron, Local, move |_uuid, _lock| {
        let jobs = remind_jobs.clone();
        Box::pin(async move {
            tracing::info!("Running scheduled reminder check");
            jobs.remind().await;
        })
    })?;
    scheduler.add(remind_job).await?;

    scheduler.start().await?;

    tracing::info!(
        "Lifecycle scheduler started (expiration: '{}', reminders: '{}')",
        expiration_cron,
        reminder_cron
    );
    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_overlapping_run_is_skipped() {
        let task = GuardedTask::new("test");
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let first = {
            let task = task.clone();
            tokio::spawn(async move {
                task.run(move || async move {
                    let _ = started_tx.send(());
                    let _ = release_rx.await;
                    Ok::<_, ServiceError>(())
                })
                .await
            })
        };

        started_rx.await.unwrap();
        let second = task.run(|| async { Ok::<_, ServiceError>(()) }).await;
        assert_eq!(second, TaskOutcome::Skipped);

        release_tx.send(()).unwrap();
        assert_eq!(first.await.unwrap(), TaskOutcome::Completed);

        let third = task.run(|| async { Ok::<_, ServiceError>(()) }).await;
        assert_eq!(third, TaskOutcome::Completed);
    }

    #[tokio::test]
    async fn test_panic_is_contained_and_schedule_keeps_running() {
        let task = GuardedTask::new("test");

        let outcome = task
            .run(|| async {
                if true {
                    panic!("boom");
                }
                Ok::<_, ServiceError>(())
            })
            .await;
        assert_eq!(outcome, TaskOutcome::Panicked);

        let next = task.run(|| async { Ok::<_, ServiceError>(()) }).await;
        assert_eq!(next, TaskOutcome::Completed);
    }

    #[tokio::test]
    async fn test_error_is_reported_as_failed() {
        let task = GuardedTask::new("test");
        let outcome = task
            .run(|| async { Err::<(), _>(ServiceError::Validation("bad".into())) })
            .await;
        assert_eq!(outcome, TaskOutcome::Failed);
    }

    #[tokio::test]
    async fn test_jobs_drive_the_engine() {
        use crate::db::test_support::{memory_client, residential_listing};
        use crate::db::listingdb::ListingExt;
        use crate::service::notification_service::testing::RecordingGateway;
        use crate::utils::clock::ManualClock;
        use chrono::{Duration, Utc};

        let store = Arc::new(memory_client().await);
        let start = Utc::now();
        store.insert_listing(&residential_listing(start, 1)).await.unwrap();

        let clock = Arc::new(ManualClock::new(start + Duration::days(2)));
        let engine = Arc::new(LifecycleService::new(
            store.clone(),
            Arc::new(RecordingGateway::default()),
            clock,
            14,
            2,
        ));
        let jobs = LifecycleJobs::new(engine);

        assert_eq!(jobs.reconcile().await, TaskOutcome::Completed);
        assert_eq!(jobs.expire().await, TaskOutcome::Completed);
        assert_eq!(jobs.remind().await, TaskOutcome::Completed);
        assert!(store.get_active_listings(start + Duration::days(2)).await.unwrap().is_empty());
    }
}
