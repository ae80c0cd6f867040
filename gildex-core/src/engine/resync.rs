//! The leaderboard full resync.
//!
//! Re-derives every participant's net worth from authoritative
//! balance + holdings state in bounded id-cursor pages and rewrites the
//! ranked entries, repairing any drift from missed incremental updates.
//! Stale cached display names are refreshed on the same pass.

use crate::config::JobsConfig;
use crate::coordination::MaintenanceJob;
use crate::db::now_utc;
use crate::engine::net_worth::republish_tx;
use crate::entities::leaderboard::Leaderboard;
use crate::entities::participant::Participant;
use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, info};

/// Rewrite the ranked structure from authoritative state.
///
/// Pages by participant id; each page commits on its own, so a resync
/// interrupted halfway leaves earlier pages repaired rather than rolling
/// everything back. Returns the number of entries rewritten.
pub async fn full_resync(
    pool: &PgPool,
    jobs: &JobsConfig,
    guild_id: Option<i64>,
) -> Result<u64, sqlx::Error> {
    let mut cursor = 0i64;
    let mut entries = 0u64;

    loop {
        let ids = Participant::page_ids(pool, cursor, jobs.resync_batch_size, guild_id).await?;
        let Some(last) = ids.last().copied() else {
            break;
        };

        let now = now_utc();
        let mut tx = pool.begin().await?;
        let page = republish_tx(&mut tx, &ids, now).await?;
        tx.commit().await?;

        entries += page.len() as u64;
        cursor = last;
        debug!(cursor, page = page.len(), "Resync page committed");
    }

    // Name-cache refresh rides on the resync schedule; the TTL bounds how
    // much rename churn each pass re-derives.
    let now = now_utc();
    let cutoff = now - Duration::from_secs(jobs.name_cache_ttl_secs);
    let mut tx = pool.begin().await?;
    let refreshed = Leaderboard::refresh_stale_names_tx(&mut tx, cutoff, now).await?;
    tx.commit().await?;

    info!(entries, names_refreshed = refreshed, "Leaderboard resync completed");
    Ok(entries)
}

pub struct LeaderboardResyncJob {
    pool: PgPool,
    jobs: JobsConfig,
}

impl LeaderboardResyncJob {
    pub fn new(pool: PgPool, jobs: JobsConfig) -> Self {
        Self { pool, jobs }
    }
}

#[async_trait]
impl MaintenanceJob for LeaderboardResyncJob {
    fn name(&self) -> &'static str {
        "leaderboard_resync"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.jobs.resync_interval_secs)
    }

    fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.jobs.resync_lock_ttl_secs)
    }

    async fn run(&self) -> Result<(), sqlx::Error> {
        full_resync(&self.pool, &self.jobs, None).await?;
        Ok(())
    }
}
