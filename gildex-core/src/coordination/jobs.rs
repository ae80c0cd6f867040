//! Singleton periodic jobs across identical worker replicas.
//!
//! Every replica runs the same schedule; a job-lock lease decides which
//! replica actually executes each interval. Losing the race is normal and
//! silent. Job failures are caught and logged; they neither release the
//! lock early nor crash the process.

use crate::coordination::lease;
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// A periodic maintenance task run as a cross-replica singleton.
#[async_trait]
pub trait MaintenanceJob: Send + Sync {
    /// Stable name; also the job-lock key suffix (`job:{name}`).
    fn name(&self) -> &'static str;

    /// Scheduling interval.
    fn interval(&self) -> Duration;

    /// Lock TTL. Must exceed the expected runtime (no concurrent second
    /// start) and stay below the interval (a crashed run self-heals before
    /// the next attempt).
    fn lock_ttl(&self) -> Duration;

    async fn run(&self) -> Result<(), sqlx::Error>;
}

/// Errors raised when registering a job with an unsound schedule.
#[derive(Debug, Error)]
pub enum JobScheduleError {
    #[error("job {job}: lock TTL must be shorter than the interval")]
    LockOutlivesInterval { job: &'static str },
}

/// Runs the registered jobs on their intervals, gated by job locks.
pub struct JobRunner {
    pool: PgPool,
    /// This process's lease identity, shared with the cluster slot.
    owner: String,
    jobs: Vec<Arc<dyn MaintenanceJob>>,
}

impl JobRunner {
    pub fn new(pool: PgPool, owner: String) -> Self {
        Self {
            pool,
            owner,
            jobs: Vec::new(),
        }
    }

    /// Register a job, validating its lock TTL against its interval.
    pub fn register(&mut self, job: Arc<dyn MaintenanceJob>) -> Result<(), JobScheduleError> {
        if job.lock_ttl() >= job.interval() {
            return Err(JobScheduleError::LockOutlivesInterval { job: job.name() });
        }
        self.jobs.push(job);
        Ok(())
    }

    /// Run until shutdown is signaled. Each job gets its own tick loop.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut handles: Vec<(&'static str, JoinHandle<()>)> = Vec::new();
        for job in &self.jobs {
            let handle = spawn_job_loop(
                self.pool.clone(),
                self.owner.clone(),
                Arc::clone(job),
                shutdown_rx.clone(),
            );
            handles.push((job.name(), handle));
        }
        info!("JobRunner started with {} jobs", handles.len());

        loop {
            if shutdown_rx.changed().await.is_err() || *shutdown_rx.borrow() {
                break;
            }
        }

        for (name, handle) in handles {
            debug!(job = name, "Stopping job loop");
            handle.abort();
        }
        info!("JobRunner shutdown complete");
    }
}

fn spawn_job_loop(
    pool: PgPool,
    owner: String,
    job: Arc<dyn MaintenanceJob>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(job.interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Skip the immediate first tick so every replica's schedule starts
        // one full interval after boot.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }

                _ = ticker.tick() => {
                    match run_with_lock(&pool, &owner, job.as_ref()).await {
                        Ok(true) => {}
                        Ok(false) => {
                            debug!(job = job.name(), "Job lock held elsewhere, skipping");
                        }
                        Err(e) => {
                            error!(job = job.name(), error = %e, "Job lock acquisition failed");
                        }
                    }
                }
            }
        }
    })
}

/// Attempt the job lock and, if won, run the job for this interval.
///
/// Returns `Ok(false)` when another replica holds the lock. Job errors are
/// logged here and never propagate; the lock is left to expire on its own
/// so a slow or crashed run cannot trigger a concurrent second start.
pub async fn run_with_lock(
    pool: &PgPool,
    owner: &str,
    job: &dyn MaintenanceJob,
) -> Result<bool, sqlx::Error> {
    let key = lease::job_key(job.name());
    if !lease::try_acquire(pool, &key, owner, job.lock_ttl()).await? {
        return Ok(false);
    }

    debug!(job = job.name(), "Job lock won, running");
    let started = std::time::Instant::now();
    match job.run().await {
        Ok(()) => {
            info!(
                job = job.name(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Job completed"
            );
        }
        Err(e) => {
            error!(job = job.name(), error = %e, "Job failed");
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeJob {
        interval: Duration,
        ttl: Duration,
    }

    #[async_trait]
    impl MaintenanceJob for FakeJob {
        fn name(&self) -> &'static str {
            "fake"
        }
        fn interval(&self) -> Duration {
            self.interval
        }
        fn lock_ttl(&self) -> Duration {
            self.ttl
        }
        async fn run(&self) -> Result<(), sqlx::Error> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn register_rejects_lock_outliving_interval() {
        let pool_less = |interval, ttl| FakeJob { interval, ttl };

        // Registration checks scheduling invariants only, so a lazily
        // connected pool is fine here.
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/unused")
            .expect("lazy pool");
        let mut runner = JobRunner::new(pool, "owner".into());

        assert!(
            runner
                .register(Arc::new(pool_less(
                    Duration::from_secs(60),
                    Duration::from_secs(60)
                )))
                .is_err()
        );
        assert!(
            runner
                .register(Arc::new(pool_less(
                    Duration::from_secs(60),
                    Duration::from_secs(30)
                )))
                .is_ok()
        );
    }
}
