//! The periodic decay sweep.
//!
//! Participants with no scored activity over the decay interval lose
//! `decay_rate` of their price, floored at the minimum; frozen valuations
//! are skipped entirely. The sweep also performs the housekeeping that
//! rides on the same schedule: price-history retention and purging stale
//! admission-gate rows.

use crate::admission::AdmissionGate;
use crate::config::{ConfigStore, EngineSettings, JobsConfig};
use crate::coordination::MaintenanceJob;
use crate::db::now_utc;
use crate::engine::net_worth::republish_tx;
use crate::engine::pricer::decay_price;
use crate::entities::holding::Holding;
use crate::entities::price_history::PriceHistory;
use crate::entities::valuation::Valuation;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, info};

/// Gate rows idle this long are dropped; far beyond any gate TTL.
const GATE_PURGE_AFTER: time::Duration = time::Duration::days(7);

pub struct DecaySweepJob {
    pool: PgPool,
    settings: ConfigStore<EngineSettings>,
    jobs: JobsConfig,
}

impl DecaySweepJob {
    pub fn new(pool: PgPool, settings: ConfigStore<EngineSettings>, jobs: JobsConfig) -> Self {
        Self {
            pool,
            settings,
            jobs,
        }
    }

    async fn sweep(&self) -> Result<(), sqlx::Error> {
        let economy = self.settings.read().await.economy.clone();
        let now = now_utc();
        let cutoff = now - Duration::from_secs(self.jobs.decay_interval_secs);

        let mut tx = self.pool.begin().await?;

        let candidates = Valuation::decay_candidates_tx(&mut tx, cutoff, now).await?;
        let new_prices: Vec<(i64, Decimal)> = candidates
            .iter()
            .filter_map(|candidate| {
                let decayed = decay_price(&economy, candidate.current_price);
                (decayed != candidate.current_price).then_some((candidate.participant_id, decayed))
            })
            .collect();

        if !new_prices.is_empty() {
            Valuation::set_prices_tx(&mut tx, &new_prices, now).await?;
            PriceHistory::append_many_tx(&mut tx, &new_prices, now).await?;

            let decayed_ids: Vec<i64> = new_prices.iter().map(|(id, _)| *id).collect();
            let mut affected = Holding::holders_of_tx(&mut tx, &decayed_ids).await?;
            affected.extend(decayed_ids.iter().copied());
            affected.sort_unstable();
            affected.dedup();
            republish_tx(&mut tx, &affected, now).await?;
        }

        let trimmed = PriceHistory::trim_tx(&mut tx, self.jobs.price_history_keep).await?;
        let purged = AdmissionGate::purge_stale_tx(&mut tx, now - GATE_PURGE_AFTER).await?;

        tx.commit().await?;

        info!(
            decayed = new_prices.len(),
            candidates = candidates.len(),
            history_trimmed = trimmed,
            gate_rows_purged = purged,
            "Decay sweep completed"
        );
        Ok(())
    }
}

#[async_trait]
impl MaintenanceJob for DecaySweepJob {
    fn name(&self) -> &'static str {
        "decay_sweep"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.jobs.decay_interval_secs)
    }

    fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.jobs.decay_lock_ttl_secs)
    }

    async fn run(&self) -> Result<(), sqlx::Error> {
        debug!("Decay sweep starting");
        self.sweep().await
    }
}
