//! TTL leases: the single coordination primitive.
//!
//! A lease is a row `(lease_key, owner, expires_at)`. Acquisition is one
//! `INSERT ... ON CONFLICT DO UPDATE ... WHERE expired` statement, so there
//! is no window in which two owners can both believe they hold the key.
//! There is no manual unlock for a foreign owner: a crashed holder's lease
//! heals itself by expiry alone.

use crate::db::now_utc;
use std::time::Duration;

/// Coordination key for cluster slot `id` (`slot:{id}`).
pub fn slot_key(slot_id: u32) -> String {
    format!("slot:{slot_id}")
}

/// Coordination key for the named periodic job (`job:{name}`).
pub fn job_key(name: &str) -> String {
    format!("job:{name}")
}

fn expiry_after(ttl: Duration) -> time::PrimitiveDateTime {
    now_utc() + ttl
}

/// Try to take the lease: succeeds if the key is absent or its current
/// lease has expired. Returns whether this owner now holds it.
pub async fn try_acquire(
    pool: &sqlx::PgPool,
    key: &str,
    owner: &str,
    ttl: Duration,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO leases (lease_key, owner, expires_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (lease_key) DO UPDATE
        SET owner = EXCLUDED.owner, expires_at = EXCLUDED.expires_at
        WHERE leases.expires_at <= $4
        "#,
    )
    .bind(key)
    .bind(owner)
    .bind(expiry_after(ttl))
    .bind(now_utc())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Extend the lease, guarded by ownership. Returns `false` when the lease
/// is no longer held by `owner` — the caller must treat that as loss of
/// ownership, not retry.
pub async fn refresh(
    pool: &sqlx::PgPool,
    key: &str,
    owner: &str,
    ttl: Duration,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE leases SET expires_at = $3
        WHERE lease_key = $1 AND owner = $2 AND expires_at > $4
        "#,
    )
    .bind(key)
    .bind(owner)
    .bind(expiry_after(ttl))
    .bind(now_utc())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Release the lease on clean shutdown. Only the owner's row is deleted;
/// releasing a lease someone else has since claimed is a no-op.
pub async fn release(pool: &sqlx::PgPool, key: &str, owner: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM leases WHERE lease_key = $1 AND owner = $2")
        .bind(key)
        .bind(owner)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_namespaces() {
        assert_eq!(slot_key(2), "slot:2");
        assert_eq!(job_key("decay_sweep"), "job:decay_sweep");
    }
}
