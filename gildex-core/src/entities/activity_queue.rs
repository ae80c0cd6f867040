//! The append-only activity ingestion queue.
//!
//! Producers (front-door shards) append; the aggregator drains in FIFO
//! batches. Payloads are stored as raw JSONB and validated only at drain
//! time, so nothing a producer writes can fail the enqueue path beyond
//! store unavailability.

use crate::entities::Identity;
use gildex_sdk::objects::ActivityPayload;
use serde::{Deserialize, Serialize};

/// The JSON body stored per queued event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub payload: ActivityPayload,
}

/// One raw row drained from the queue.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct QueuedActivity {
    pub seq: i64,
    pub guild_id: i64,
    pub user_id: i64,
    pub payload: serde_json::Value,
    pub enqueued_at: time::PrimitiveDateTime,
}

pub struct ActivityQueue;

impl ActivityQueue {
    /// Append one event to the queue tail.
    ///
    /// Best-effort from the caller's perspective: a failure here is
    /// telemetry loss, not a failure of the triggering action.
    pub async fn enqueue(
        pool: &sqlx::PgPool,
        identity: Identity,
        body: &QueuedBody,
        now: time::PrimitiveDateTime,
    ) -> Result<(), sqlx::Error> {
        let payload = serde_json::to_value(body).map_err(|e| sqlx::Error::Encode(e.into()))?;
        sqlx::query(
            r#"
            INSERT INTO activity_queue (guild_id, user_id, payload, enqueued_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(identity.guild_id)
        .bind(identity.user_id)
        .bind(payload)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Atomically remove and return up to `max_count` oldest events.
    ///
    /// `SKIP LOCKED` keeps concurrent drainers from ever receiving the
    /// same rows; FIFO order is restored in memory since `RETURNING` does
    /// not guarantee it.
    pub async fn drain_batch(
        pool: &sqlx::PgPool,
        max_count: i64,
    ) -> Result<Vec<QueuedActivity>, sqlx::Error> {
        let mut rows: Vec<QueuedActivity> = sqlx::query_as(
            r#"
            DELETE FROM activity_queue
            WHERE id IN (
                SELECT id FROM activity_queue
                ORDER BY seq ASC, id ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING seq, guild_id, user_id, payload, enqueued_at
            "#,
        )
        .bind(max_count)
        .fetch_all(pool)
        .await?;
        rows.sort_by_key(|r| r.seq);
        Ok(rows)
    }

    /// Reinsert a drained batch at the queue head, preserving relative
    /// order. Used only when a flush fails after draining, to avoid silent
    /// data loss.
    pub async fn requeue_front(
        pool: &sqlx::PgPool,
        batch: &[QueuedActivity],
    ) -> Result<(), sqlx::Error> {
        if batch.is_empty() {
            return Ok(());
        }
        let guild_ids: Vec<i64> = batch.iter().map(|r| r.guild_id).collect();
        let user_ids: Vec<i64> = batch.iter().map(|r| r.user_id).collect();
        let payloads: Vec<serde_json::Value> = batch.iter().map(|r| r.payload.clone()).collect();
        let enqueued: Vec<time::PrimitiveDateTime> =
            batch.iter().map(|r| r.enqueued_at).collect();

        sqlx::query(
            r#"
            WITH head AS (
                SELECT COALESCE(MIN(seq), 1) - $1::bigint AS start FROM activity_queue
            )
            INSERT INTO activity_queue (seq, guild_id, user_id, payload, enqueued_at)
            SELECT head.start + u.ord - 1, u.guild_id, u.user_id, u.payload, u.enqueued_at
            FROM head,
                 UNNEST($2::bigint[], $3::bigint[], $4::jsonb[], $5::timestamp[])
                     WITH ORDINALITY AS u(guild_id, user_id, payload, enqueued_at, ord)
            "#,
        )
        .bind(batch.len() as i64)
        .bind(&guild_ids)
        .bind(&user_ids)
        .bind(&payloads)
        .bind(&enqueued)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Number of events currently waiting.
    pub async fn pending_count(pool: &sqlx::PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM activity_queue")
            .fetch_one(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_body_round_trip() {
        let body = QueuedBody {
            display_name: Some("ada".into()),
            payload: ActivityPayload::Message {
                length: 120,
                fingerprint: None,
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        let back: QueuedBody = serde_json::from_value(value).unwrap();
        assert_eq!(back, body);
    }

    #[test]
    fn malformed_queue_payload_fails_validation() {
        let value = serde_json::json!({"payload": {"kind": "teleport", "distance": 3}});
        assert!(serde_json::from_value::<QueuedBody>(value).is_err());
    }
}
