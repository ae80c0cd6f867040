//! Postgres-backed admission gate.

use crate::admission::{GateState, decide, rate_key};
use crate::config::{ConfigStore, RateLimitConfig};
use crate::db::{now_unix_millis, now_utc};
use gildex_sdk::objects::AdmitDecision;
use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur during an admission check.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// The shared admission gate evaluated per inbound event.
///
/// Each call runs as one transaction holding the identity's row lock, so
/// concurrent callers for the same identity serialize instead of racing.
#[derive(Clone)]
pub struct AdmissionGate {
    pool: PgPool,
    config: ConfigStore<RateLimitConfig>,
}

impl AdmissionGate {
    pub fn new(pool: PgPool, config: ConfigStore<RateLimitConfig>) -> Self {
        Self { pool, config }
    }

    /// Atomically decide whether a submission from this identity is
    /// accepted, cooled down, or rejected by the flood jail.
    pub async fn admit(
        &self,
        guild_id: i64,
        user_id: i64,
    ) -> Result<AdmitDecision, AdmissionError> {
        let config = *self.config.read().await;
        let key = rate_key(guild_id, user_id);
        let now_ms = now_unix_millis();
        let now = now_utc();

        let mut tx = self.pool.begin().await?;

        // Make sure the row exists so the SELECT below can lock it; the
        // insert itself serializes racing first-time callers.
        sqlx::query(
            r#"
            INSERT INTO gate_states (cache_key, accept_window, updated_at)
            VALUES ($1, '{}', $2)
            ON CONFLICT (cache_key) DO NOTHING
            "#,
        )
        .bind(&key)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let (window, jailed_until, cooldown_until): (Vec<i64>, Option<i64>, Option<i64>) =
            sqlx::query_as(
                r#"
                SELECT accept_window, jailed_until, cooldown_until
                FROM gate_states
                WHERE cache_key = $1
                FOR UPDATE
                "#,
            )
            .bind(&key)
            .fetch_one(&mut *tx)
            .await?;

        let mut state = GateState {
            window,
            jailed_until,
            cooldown_until,
        };
        let decision = decide(&mut state, now_ms, &config);

        sqlx::query(
            r#"
            UPDATE gate_states
            SET accept_window = $2, jailed_until = $3, cooldown_until = $4, updated_at = $5
            WHERE cache_key = $1
            "#,
        )
        .bind(&key)
        .bind(&state.window)
        .bind(state.jailed_until)
        .bind(state.cooldown_until)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(decision)
    }

    /// Drop gate rows untouched for longer than `stale_after`.
    ///
    /// The state is logically self-expiring (timestamps compared against
    /// now), so this only bounds table growth; it runs inside the decay
    /// sweep.
    pub async fn purge_stale_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        cutoff: time::PrimitiveDateTime,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM gate_states WHERE updated_at < $1")
            .bind(cutoff)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected())
    }
}
