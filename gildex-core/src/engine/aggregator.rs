//! The batch aggregator: drains the activity queue, scores events, and
//! publishes new prices, net worths, and leaderboard entries.
//!
//! The flush pipeline:
//! 1. Drain a bounded FIFO batch (`SKIP LOCKED`, so replicas never share
//!    rows).
//! 2. Validate payloads against the closed event schema; malformed items
//!    are dropped and logged, never retried.
//! 3. Resolve participants for every identity in one batched lookup,
//!    creating missing ones (with their valuations) so mid-batch creations
//!    are immediately scorable.
//! 4. Resolve modifiers once per participant, score each identity's
//!    events, and reprice every participant with a nonzero score.
//! 5. Republish net worths and leaderboard entries for everyone touched by
//!    a repriced valuation — holders included, not just owners.
//!
//! Steps 3–5 commit in a single transaction. On failure the raw batch is
//! requeued at the queue head and the flush aborts, so a replay recomputes
//! against unchanged prices instead of double-applying.

use crate::config::{ConfigStore, EngineSettings};
use crate::db::now_utc;
use crate::entities::Identity;
use crate::entities::activity_queue::{ActivityQueue, QueuedActivity, QueuedBody};
use crate::entities::holding::Holding;
use crate::entities::participant::Participant;
use crate::entities::price_history::PriceHistory;
use crate::entities::valuation::Valuation;
use crate::engine::net_worth::republish_tx;
use crate::engine::pricer::update_price;
use crate::engine::scoring::{EffectiveModifiers, resolve_modifiers, score_batch};
use crate::events::{ActivityRecorded, ActivityRecordedReceiver, FlushTick, FlushTickReceiver, FlushTickSender};
use gildex_sdk::objects::ActivityPayload;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::collections::HashMap;
use std::convert::Infallible;
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};

/// Errors that can abort a flush.
#[derive(Debug, Error)]
pub enum FlushError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// What a flush attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Another flush was already running in this process.
    AlreadyRunning,
    /// The queue was empty.
    Idle,
    Completed {
        drained: usize,
        dropped: usize,
        repriced: usize,
        /// Events still queued after this batch.
        remaining: i64,
    },
}

/// The batch aggregator. One instance per process.
pub struct Aggregator {
    pool: PgPool,
    settings: ConfigStore<EngineSettings>,
    /// In-process flush exclusivity. Cross-process exclusivity is not
    /// required: scoring is additive and deterministic per batch, and
    /// `SKIP LOCKED` draining keeps batches disjoint between replicas.
    flush_gate: Mutex<()>,
    flush_tx: FlushTickSender,
}

impl Aggregator {
    pub fn new(
        pool: PgPool,
        settings: ConfigStore<EngineSettings>,
        flush_tx: FlushTickSender,
    ) -> Self {
        Self {
            pool,
            settings,
            flush_gate: Mutex::new(()),
            flush_tx,
        }
    }

    /// Run the aggregator until shutdown is signaled.
    ///
    /// Flushes are triggered by ingestion nudges, by deferred retry ticks,
    /// and by a fallback interval so queued work never waits on a lost
    /// nudge.
    pub async fn run(
        self,
        mut shutdown_rx: watch::Receiver<bool>,
        mut activity_rx: ActivityRecordedReceiver,
        mut flush_rx: FlushTickReceiver,
    ) {
        let interval = self.settings.read().await.aggregator.flush_interval();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut config_watcher = self.settings.subscribe();

        info!("Aggregator started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Aggregator received shutdown signal");
                        break;
                    }
                }

                // Config changed — pick up the new fallback interval.
                Ok(()) = config_watcher.changed() => {
                    let interval = self.settings.read().await.aggregator.flush_interval();
                    ticker = tokio::time::interval(interval);
                    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                    info!(interval_secs = interval.as_secs(), "Aggregator reloaded tuning");
                }

                Some(event) = activity_rx.recv() => {
                    let _ = self.process(event).await;
                }

                Some(FlushTick) = flush_rx.recv() => {
                    self.flush_and_reschedule().await;
                }

                _ = ticker.tick() => {
                    self.flush_and_reschedule().await;
                }

                else => {
                    info!("Aggregator channels closed");
                    break;
                }
            }
        }

        info!("Aggregator shutdown complete");
    }

    /// Flush once; if the queue is still non-empty afterwards, schedule
    /// another attempt after a short delay instead of looping tightly.
    async fn flush_and_reschedule(&self) {
        let retry_delay = self.settings.read().await.aggregator.retry_delay();

        let reschedule = match self.flush().await {
            Ok(FlushOutcome::Completed {
                drained,
                dropped,
                repriced,
                remaining,
            }) => {
                debug!(drained, dropped, repriced, remaining, "Flush completed");
                remaining > 0
            }
            Ok(FlushOutcome::Idle) => false,
            Ok(FlushOutcome::AlreadyRunning) => false,
            Err(e) => {
                error!(error = %e, "Flush failed, batch requeued");
                true
            }
        };

        if reschedule {
            let flush_tx = self.flush_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(retry_delay).await;
                let _ = flush_tx.send(FlushTick).await;
            });
        }
    }

    /// Drain and process one batch.
    pub async fn flush(&self) -> Result<FlushOutcome, FlushError> {
        // Explicit idle/running state: at most one flush per process.
        let Ok(_guard) = self.flush_gate.try_lock() else {
            return Ok(FlushOutcome::AlreadyRunning);
        };

        let settings = self.settings.read().await.clone();
        let batch = ActivityQueue::drain_batch(&self.pool, settings.aggregator.batch_size).await?;
        if batch.is_empty() {
            return Ok(FlushOutcome::Idle);
        }

        let drained = batch.len();
        match self.process_batch(&batch, &settings).await {
            Ok((dropped, repriced)) => {
                let remaining = ActivityQueue::pending_count(&self.pool).await.unwrap_or(0);
                Ok(FlushOutcome::Completed {
                    drained,
                    dropped,
                    repriced,
                    remaining,
                })
            }
            Err(e) => {
                // Requeue the original raw batch at the head; the failed
                // transaction rolled back, so a replay starts from the
                // same prices this attempt saw.
                if let Err(requeue_err) = ActivityQueue::requeue_front(&self.pool, &batch).await {
                    error!(
                        error = %requeue_err,
                        lost_events = drained,
                        "Failed to requeue batch after flush failure"
                    );
                }
                Err(e)
            }
        }
    }

    /// Score one drained batch and commit all resulting writes as a single
    /// unit. Returns `(dropped, repriced)`.
    async fn process_batch(
        &self,
        batch: &[QueuedActivity],
        settings: &EngineSettings,
    ) -> Result<(usize, usize), FlushError> {
        let economy = &settings.economy;
        let now = now_utc();

        // -- Validate and group by identity (FIFO order preserved) -------
        let mut dropped = 0usize;
        let mut events_by_identity: HashMap<Identity, Vec<ActivityPayload>> = HashMap::new();
        let mut names: HashMap<Identity, String> = HashMap::new();

        for row in batch {
            let identity = Identity::new(row.guild_id, row.user_id);
            match serde_json::from_value::<QueuedBody>(row.payload.clone()) {
                Ok(body) => {
                    if let Some(name) = body.display_name {
                        names.insert(identity, name);
                    }
                    events_by_identity.entry(identity).or_default().push(body.payload);
                }
                Err(e) => {
                    warn!(seq = row.seq, identity = %identity, error = %e, "Dropping malformed event");
                    dropped += 1;
                }
            }
        }

        if events_by_identity.is_empty() {
            return Ok((dropped, 0));
        }

        let mut tx = self.pool.begin().await?;

        // -- Resolve participants, creating the never-seen ones ----------
        let entries: Vec<(Identity, String)> = events_by_identity
            .keys()
            .map(|identity| {
                let name = names
                    .get(identity)
                    .cloned()
                    .unwrap_or_else(|| format!("user-{}", identity.user_id));
                (*identity, name)
            })
            .collect();

        let created =
            Participant::insert_missing_tx(&mut tx, &entries, economy.starting_balance, now)
                .await?;
        Valuation::create_many_tx(&mut tx, &created, economy, now).await?;
        if !created.is_empty() {
            debug!(created = created.len(), "Created participants mid-batch");
            let starting_points: Vec<(i64, Decimal)> = created
                .iter()
                .map(|id| (*id, economy.starting_price))
                .collect();
            PriceHistory::append_many_tx(&mut tx, &starting_points, now).await?;
        }

        let identities: Vec<Identity> = events_by_identity.keys().copied().collect();
        let id_map = Participant::resolve_ids_tx(&mut tx, &identities).await?;
        let participant_ids: Vec<i64> = id_map.values().copied().collect();

        // -- Resolve modifiers once per participant -----------------------
        let valuations = Valuation::fetch_for_update_tx(&mut tx, &participant_ids).await?;
        let valuation_map: HashMap<i64, &Valuation> =
            valuations.iter().map(|v| (v.participant_id, v)).collect();

        let modifiers = Participant::active_modifiers_tx(&mut tx, &participant_ids, now).await?;
        let mut kinds_by_participant: HashMap<i64, Vec<crate::entities::ModifierKind>> =
            HashMap::new();
        for modifier in modifiers {
            kinds_by_participant
                .entry(modifier.participant_id)
                .or_default()
                .push(modifier.kind);
        }

        let effective: HashMap<i64, EffectiveModifiers> = participant_ids
            .iter()
            .map(|id| {
                let kinds = kinds_by_participant.get(id).map_or(&[][..], Vec::as_slice);
                let freeze_until = valuation_map.get(id).and_then(|v| v.freeze_until);
                (*id, resolve_modifiers(economy, kinds, freeze_until, now))
            })
            .collect();

        // -- Score and reprice --------------------------------------------
        let mut new_prices: Vec<(i64, Decimal)> = Vec::new();
        for (identity, payloads) in &events_by_identity {
            let Some(participant_id) = id_map.get(identity) else {
                // Unreachable after the ensure step; treat as a dropped item
                // rather than poisoning the batch.
                warn!(identity = %identity, "Identity unresolved after ensure step");
                dropped += payloads.len();
                continue;
            };
            let Some(valuation) = valuation_map.get(participant_id) else {
                warn!(participant_id, "Participant has no valuation row");
                continue;
            };
            let modifiers = &effective[participant_id];

            let score = score_batch(economy, payloads, modifiers);
            if score <= Decimal::ZERO {
                continue;
            }

            let new_price = update_price(
                economy,
                valuation.current_price,
                valuation.base_volatility,
                score,
                modifiers,
            );
            if new_price != valuation.current_price {
                new_prices.push((*participant_id, new_price));
            }
        }

        // -- Batch-write: prices, then net worths, then leaderboard -------
        Valuation::set_prices_tx(&mut tx, &new_prices, now).await?;
        PriceHistory::append_many_tx(&mut tx, &new_prices, now).await?;
        Participant::touch_last_active_tx(&mut tx, &participant_ids, now).await?;

        let repriced_ids: Vec<i64> = new_prices.iter().map(|(id, _)| *id).collect();
        let mut affected = Holding::holders_of_tx(&mut tx, &repriced_ids).await?;
        affected.extend(created.iter().copied());
        affected.extend(repriced_ids.iter().copied());
        affected.sort_unstable();
        affected.dedup();

        republish_tx(&mut tx, &affected, now).await?;

        tx.commit().await?;
        Ok((dropped, new_prices.len()))
    }
}

impl Processor<ActivityRecorded> for Aggregator {
    type Output = ();
    type Error = Infallible;

    /// Ingestion nudge: ask for a flush soon. A full channel is fine — a
    /// flush is already pending, and the interval tick backstops the rest.
    async fn process(&self, event: ActivityRecorded) -> Result<(), Infallible> {
        debug!(
            guild_id = event.guild_id,
            user_id = event.user_id,
            "Activity recorded, nudging flush"
        );
        let _ = self.flush_tx.try_send(FlushTick);
        Ok(())
    }
}
