//! Cluster-slot claiming and the ownership heartbeat.
//!
//! A process claims exactly one of `C` named slots at startup (a blocking
//! barrier, retried with backoff while all are held) and then renews it on
//! a heartbeat. Observing loss of ownership is fatal by contract: the
//! process must not keep operating on a shard range it may no longer own.

use crate::config::ClusterSettings;
use crate::coordination::lease;
use rand::Rng;
use sqlx::PgPool;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Contiguous shard-id range `[start, end)` owned by one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardRange {
    pub start: u32,
    pub end: u32,
}

impl ShardRange {
    pub fn contains(&self, shard_id: u32) -> bool {
        shard_id >= self.start && shard_id < self.end
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A successfully claimed cluster slot.
#[derive(Debug, Clone)]
pub struct ClaimedSlot {
    pub slot_id: u32,
    pub shards: ShardRange,
    /// This process's lease identity.
    pub owner: String,
}

/// `ceil(total_shards / slots)` — shards handled per cluster slot.
pub fn shards_per_cluster(total_shards: u32, slots: u32) -> u32 {
    total_shards.div_ceil(slots)
}

/// Deterministic slot → shard-range mapping.
///
/// The last slot's range is clipped to the shard space, so ranges cover
/// every shard exactly once even when the division is uneven.
pub fn shard_range(slot_id: u32, total_shards: u32, slots: u32) -> ShardRange {
    let per_cluster = shards_per_cluster(total_shards, slots);
    let start = (slot_id * per_cluster).min(total_shards);
    let end = ((slot_id + 1) * per_cluster).min(total_shards);
    ShardRange { start, end }
}

/// Backoff before re-trying a full slot scan: doubles from 2s, capped at
/// 30s, with up to 500ms of jitter so competing processes desynchronize.
pub fn claim_backoff(attempt: u32) -> Duration {
    let base_ms = 2_000u64.saturating_mul(1 << attempt.saturating_sub(1).min(4));
    let jitter = rand::rng().random_range(0..500);
    Duration::from_millis(base_ms.min(30_000) + jitter)
}

/// Claim one of the configured slots, trying them in order and blocking
/// with backoff until one frees up. This only returns once a slot is held.
pub async fn claim_slot(
    pool: &PgPool,
    settings: &ClusterSettings,
    owner: &str,
) -> Result<ClaimedSlot, sqlx::Error> {
    let mut attempt = 0u32;
    loop {
        for slot_id in 0..settings.slots {
            if lease::try_acquire(pool, &lease::slot_key(slot_id), owner, settings.lease_ttl())
                .await?
            {
                let shards = shard_range(slot_id, settings.total_shards, settings.slots);
                info!(
                    slot_id,
                    shard_start = shards.start,
                    shard_end = shards.end,
                    "Claimed cluster slot"
                );
                return Ok(ClaimedSlot {
                    slot_id,
                    shards,
                    owner: owner.to_owned(),
                });
            }
        }

        attempt += 1;
        let delay = claim_backoff(attempt);
        warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "All cluster slots held, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Spawn the ownership heartbeat for a claimed slot.
///
/// Returns the task handle and a watch receiver that flips to `true` the
/// moment ownership is observed lost. The subscriber must terminate the
/// process before dispatching any further shard-bound work.
pub fn spawn_heartbeat(
    pool: PgPool,
    slot: ClaimedSlot,
    settings: ClusterSettings,
    mut shutdown_rx: watch::Receiver<bool>,
) -> (JoinHandle<()>, watch::Receiver<bool>) {
    let (lost_tx, lost_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        let key = lease::slot_key(slot.slot_id);
        let mut ticker = tokio::time::interval(settings.heartbeat_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first interval tick fires immediately; skip it, the lease
        // was refreshed by the claim moments ago.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!(slot_id = slot.slot_id, "Releasing cluster slot on shutdown");
                        if let Err(e) = lease::release(&pool, &key, &slot.owner).await {
                            warn!(error = %e, "Failed to release cluster slot");
                        }
                        break;
                    }
                }

                _ = ticker.tick() => {
                    match lease::refresh(&pool, &key, &slot.owner, settings.lease_ttl()).await {
                        Ok(true) => {
                            debug!(slot_id = slot.slot_id, "Cluster slot heartbeat");
                        }
                        Ok(false) => {
                            error!(
                                slot_id = slot.slot_id,
                                "Cluster slot ownership lost; signaling fatal"
                            );
                            let _ = lost_tx.send(true);
                            return;
                        }
                        Err(e) => {
                            // Transient store failure: keep heartbeating. If
                            // it outlasts the TTL, the next successful
                            // refresh reports the loss and we exit then.
                            warn!(slot_id = slot.slot_id, error = %e, "Heartbeat failed");
                        }
                    }
                }
            }
        }
    });

    (handle, lost_rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shards_per_cluster_rounds_up() {
        assert_eq!(shards_per_cluster(12, 3), 4);
        assert_eq!(shards_per_cluster(13, 3), 5);
        assert_eq!(shards_per_cluster(1, 3), 1);
    }

    #[test]
    fn ranges_partition_the_shard_space() {
        for (total, slots) in [(12u32, 3u32), (13, 3), (7, 4), (3, 3), (1, 2)] {
            let mut seen = vec![false; total as usize];
            for slot in 0..slots {
                let range = shard_range(slot, total, slots);
                for shard in range.start..range.end {
                    assert!(!seen[shard as usize], "shard {shard} covered twice");
                    seen[shard as usize] = true;
                }
            }
            assert!(seen.iter().all(|&s| s), "uncovered shard ({total}/{slots})");
        }
    }

    #[test]
    fn distinct_slots_get_disjoint_ranges() {
        let a = shard_range(0, 12, 3);
        let b = shard_range(1, 12, 3);
        let c = shard_range(2, 12, 3);
        assert_eq!((a.start, a.end), (0, 4));
        assert_eq!((b.start, b.end), (4, 8));
        assert_eq!((c.start, c.end), (8, 12));
        assert!(a.contains(0) && !b.contains(0) && !c.contains(0));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let early = claim_backoff(1);
        assert!(early >= Duration::from_millis(2_000));
        assert!(early < Duration::from_millis(2_500));

        let late = claim_backoff(20);
        assert!(late >= Duration::from_millis(30_000));
        assert!(late < Duration::from_millis(30_500));
    }
}
