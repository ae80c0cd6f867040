//! Engine tuning structures and the shared config store.
//!
//! The tuning structs here are embedded verbatim in the server's TOML file
//! and handed to the engine behind a [`ConfigStore`] so a SIGHUP reload
//! reaches running loops without a restart.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, RwLockReadGuard, watch};

// ---------------------------------------------------------------------------
// Tuning structs
// ---------------------------------------------------------------------------

/// Valuation and scoring tuning (`[economy]` in the config file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// Cash balance granted when a participant is first created.
    pub starting_balance: Decimal,
    /// Price a newly issued valuation starts at.
    pub starting_price: Decimal,
    /// Units issued per valuation, fixed at creation.
    pub starting_units: i64,
    /// Base volatility coefficient for new valuations.
    pub base_volatility: Decimal,
    /// Message length is capped here before scoring.
    pub message_length_cap: u32,
    /// Capped message length is divided by this to produce points.
    pub message_divisor: u32,
    /// Points per pre-scaled voice minute.
    pub voice_minute_points: Decimal,
    /// Flat points per received reaction.
    pub reaction_points: Decimal,
    /// Score multiplier while the amplified-scoring modifier is active.
    pub amplified_score_multiplier: Decimal,
    /// Global dampening factor applied to every price delta.
    pub dampening_factor: Decimal,
    /// Smallest visible price movement for any nonzero score.
    pub min_tick: Decimal,
    /// Hard price floor.
    pub min_price: Decimal,
    /// A single update may not push the price above `current × ratio`.
    pub growth_cap_ratio: Decimal,
    pub volatility_floor: Decimal,
    pub volatility_ceiling: Decimal,
    /// Above this price, volatility is damped by an inverse-log curve.
    pub damping_threshold: Decimal,
    /// Growth multiplier while the suppressed-growth modifier is active.
    pub suppressed_growth_penalty: Decimal,
    /// Fraction of price removed per decay sweep for inactive participants.
    pub decay_rate: Decimal,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            starting_balance: Decimal::new(100_00, 2),
            starting_price: Decimal::new(10_00, 2),
            starting_units: 100,
            base_volatility: Decimal::new(10, 2),
            message_length_cap: 200,
            message_divisor: 2,
            voice_minute_points: Decimal::new(5, 0),
            reaction_points: Decimal::new(2, 0),
            amplified_score_multiplier: Decimal::new(2, 0),
            dampening_factor: Decimal::new(25, 2),
            min_tick: Decimal::new(1, 2),
            min_price: Decimal::new(1_00, 2),
            growth_cap_ratio: Decimal::new(2, 0),
            volatility_floor: Decimal::new(1, 2),
            volatility_ceiling: Decimal::new(15, 2),
            damping_threshold: Decimal::new(100_00, 2),
            suppressed_growth_penalty: Decimal::new(5, 1),
            decay_rate: Decimal::new(2, 2),
        }
    }
}

impl EconomyConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.volatility_floor > self.volatility_ceiling {
            return Err("volatility_floor exceeds volatility_ceiling".into());
        }
        if self.message_divisor == 0 {
            return Err("message_divisor must be nonzero".into());
        }
        if self.decay_rate >= Decimal::ONE || self.decay_rate < Decimal::ZERO {
            return Err("decay_rate must be within [0, 1)".into());
        }
        if self.growth_cap_ratio <= Decimal::ONE {
            return Err("growth_cap_ratio must exceed 1".into());
        }
        if self.starting_units <= 0 {
            return Err("starting_units must be positive".into());
        }
        Ok(())
    }
}

/// Admission-gate tuning (`[rate_limit]` in the config file).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Sliding window size; the jail check fires when the window is full.
    pub window_size: usize,
    /// A full window spanning less than this triggers the flood jail.
    pub min_window_span_secs: u64,
    pub jail_ttl_secs: u64,
    pub cooldown_ttl_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_size: 6,
            min_window_span_secs: 30,
            jail_ttl_secs: 600,
            cooldown_ttl_secs: 3,
        }
    }
}

impl RateLimitConfig {
    pub fn min_window_span_millis(&self) -> i64 {
        self.min_window_span_secs as i64 * 1000
    }

    pub fn jail_ttl_millis(&self) -> i64 {
        self.jail_ttl_secs as i64 * 1000
    }

    pub fn cooldown_ttl_millis(&self) -> i64 {
        self.cooldown_ttl_secs as i64 * 1000
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.window_size < 2 {
            return Err("window_size must be at least 2".into());
        }
        Ok(())
    }
}

/// Aggregator loop tuning (`[aggregator]` in the config file).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Maximum events drained per flush.
    pub batch_size: i64,
    /// Fallback flush interval when no nudges arrive.
    pub flush_interval_secs: u64,
    /// Delay before re-flushing when the queue is still non-empty.
    pub retry_delay_secs: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            batch_size: 256,
            flush_interval_secs: 10,
            retry_delay_secs: 2,
        }
    }
}

impl AggregatorConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size <= 0 {
            return Err("batch_size must be positive".into());
        }
        Ok(())
    }
}

/// Periodic maintenance tuning (`[jobs]` in the config file).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub decay_interval_secs: u64,
    pub decay_lock_ttl_secs: u64,
    pub resync_interval_secs: u64,
    pub resync_lock_ttl_secs: u64,
    /// Participants per resync page.
    pub resync_batch_size: i64,
    /// Price-history points retained per valuation.
    pub price_history_keep: i64,
    /// Leaderboard display names older than this are refreshed on resync.
    pub name_cache_ttl_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            decay_interval_secs: 3600,
            decay_lock_ttl_secs: 600,
            resync_interval_secs: 1800,
            resync_lock_ttl_secs: 600,
            resync_batch_size: 500,
            price_history_keep: 168,
            name_cache_ttl_secs: 900,
        }
    }
}

impl JobsConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.decay_lock_ttl_secs >= self.decay_interval_secs {
            return Err("decay lock TTL must be shorter than the decay interval".into());
        }
        if self.resync_lock_ttl_secs >= self.resync_interval_secs {
            return Err("resync lock TTL must be shorter than the resync interval".into());
        }
        if self.resync_batch_size <= 0 {
            return Err("resync_batch_size must be positive".into());
        }
        if self.price_history_keep <= 0 {
            return Err("price_history_keep must be positive".into());
        }
        Ok(())
    }
}

/// Cluster-slot settings (`[cluster]` in the config file).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSettings {
    /// Whether this process claims a cluster slot at startup.
    pub enabled: bool,
    /// Number of mutually exclusive slots (`C`).
    pub slots: u32,
    /// Total shard space partitioned across the slots.
    pub total_shards: u32,
    pub lease_ttl_secs: u64,
    pub heartbeat_secs: u64,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            slots: 3,
            total_shards: 12,
            lease_ttl_secs: 30,
            heartbeat_secs: 10,
        }
    }
}

impl ClusterSettings {
    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.slots == 0 {
            return Err("cluster slots must be positive".into());
        }
        if self.total_shards == 0 {
            return Err("total_shards must be positive".into());
        }
        if self.heartbeat_secs * 2 > self.lease_ttl_secs {
            return Err("heartbeat must be at most half the lease TTL".into());
        }
        Ok(())
    }
}

/// Everything the aggregation engine reads at runtime; swapped atomically
/// on config reload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub economy: EconomyConfig,
    pub aggregator: AggregatorConfig,
}

// ---------------------------------------------------------------------------
// ConfigStore
// ---------------------------------------------------------------------------

/// A shared, versioned configuration store with change notification.
///
/// Wraps a value of type `T` behind `Arc<RwLock<T>>` and maintains an
/// incrementing version counter. Subscribers receive a [`ConfigWatcher`]
/// that can `await` the next change.
pub struct ConfigStore<T> {
    inner: Arc<ConfigStoreInner<T>>,
}

struct ConfigStoreInner<T> {
    data: RwLock<T>,
    version: AtomicU64,
    version_tx: watch::Sender<u64>,
}

/// Receives notifications when a [`ConfigStore`] is updated.
pub struct ConfigWatcher {
    version_rx: watch::Receiver<u64>,
}

impl<T> ConfigStore<T> {
    /// Create a new `ConfigStore` with the given initial value.
    pub fn new(initial: T) -> Self {
        let (version_tx, _) = watch::channel(0u64);
        Self {
            inner: Arc::new(ConfigStoreInner {
                data: RwLock::new(initial),
                version: AtomicU64::new(0),
                version_tx,
            }),
        }
    }

    /// Replace the stored value and notify all watchers.
    pub async fn update(&self, value: T) {
        let mut guard = self.inner.data.write().await;
        *guard = value;
        let new_version = self.inner.version.fetch_add(1, Ordering::Relaxed) + 1;
        // Release the write lock before notifying so subscribers can
        // immediately acquire a read lock.
        drop(guard);
        let _ = self.inner.version_tx.send(new_version);
    }

    /// Read the current value.
    pub async fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.data.read().await
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> ConfigWatcher {
        ConfigWatcher {
            version_rx: self.inner.version_tx.subscribe(),
        }
    }
}

impl<T> Clone for ConfigStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ConfigWatcher {
    /// Wait until the config store is updated.
    ///
    /// Returns `Ok(())` when a new version is available, or `Err` if the
    /// [`ConfigStore`] has been dropped.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.version_rx.changed().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let economy = EconomyConfig::default();
        economy.validate().unwrap();
        assert!(economy.volatility_floor < economy.volatility_ceiling);
        assert!(economy.min_price <= economy.starting_price);

        RateLimitConfig::default().validate().unwrap();
        AggregatorConfig::default().validate().unwrap();
        JobsConfig::default().validate().unwrap();
        ClusterSettings::default().validate().unwrap();
    }

    #[test]
    fn jobs_validation_rejects_lock_outliving_interval() {
        let jobs = JobsConfig {
            decay_interval_secs: 60,
            decay_lock_ttl_secs: 60,
            ..JobsConfig::default()
        };
        assert!(jobs.validate().is_err());
    }

    #[test]
    fn cluster_validation_rejects_slow_heartbeat() {
        let cluster = ClusterSettings {
            lease_ttl_secs: 10,
            heartbeat_secs: 6,
            ..ClusterSettings::default()
        };
        assert!(cluster.validate().is_err());
    }

    #[tokio::test]
    async fn config_store_notifies_watchers() {
        let store = ConfigStore::new(EconomyConfig::default());
        let mut watcher = store.subscribe();

        let mut updated = EconomyConfig::default();
        updated.message_length_cap = 500;
        store.update(updated.clone()).await;

        watcher.changed().await.unwrap();
        assert_eq!(store.read().await.message_length_cap, 500);
    }
}
