//! Valuation records: each participant's tradable instrument.
//!
//! Prices are mutated only by the pricing engine (live flush and decay
//! sweep); everything else reads.

use crate::config::EconomyConfig;
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Valuation {
    pub participant_id: i64,
    pub current_price: Decimal,
    pub base_volatility: Decimal,
    /// Units issued at creation; the ceiling on total units held.
    pub issued_units: i64,
    /// Decay protection expiry, if a freeze is active.
    pub freeze_until: Option<time::PrimitiveDateTime>,
    pub updated_at: time::PrimitiveDateTime,
}

/// A valuation eligible for the decay sweep.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct DecayCandidate {
    pub participant_id: i64,
    pub current_price: Decimal,
}

impl Valuation {
    /// Issue valuations for freshly created participants.
    ///
    /// Runs in the same transaction as the participant insert so the pair
    /// is created atomically.
    pub async fn create_many_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        participant_ids: &[i64],
        economy: &EconomyConfig,
        now: time::PrimitiveDateTime,
    ) -> Result<(), sqlx::Error> {
        if participant_ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            r#"
            INSERT INTO valuations
                (participant_id, current_price, base_volatility, issued_units, updated_at)
            SELECT u.id, $2, $3, $4, $5
            FROM UNNEST($1::bigint[]) AS u(id)
            "#,
        )
        .bind(participant_ids)
        .bind(economy.starting_price)
        .bind(economy.base_volatility)
        .bind(economy.starting_units)
        .bind(now)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Lock and fetch the valuations for a batch of participants.
    pub async fn fetch_for_update_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        participant_ids: &[i64],
    ) -> Result<Vec<Valuation>, sqlx::Error> {
        if participant_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as(
            r#"
            SELECT participant_id, current_price, base_volatility, issued_units,
                   freeze_until, updated_at
            FROM valuations
            WHERE participant_id = ANY($1)
            ORDER BY participant_id ASC
            FOR UPDATE
            "#,
        )
        .bind(participant_ids)
        .fetch_all(&mut **tx)
        .await
    }

    /// Lock and fetch one valuation for a trade.
    pub async fn get_for_update_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        participant_id: i64,
    ) -> Result<Option<Valuation>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT participant_id, current_price, base_volatility, issued_units,
                   freeze_until, updated_at
            FROM valuations
            WHERE participant_id = $1
            FOR UPDATE
            "#,
        )
        .bind(participant_id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Bulk-write freshly computed prices.
    pub async fn set_prices_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        prices: &[(i64, Decimal)],
        now: time::PrimitiveDateTime,
    ) -> Result<(), sqlx::Error> {
        if prices.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = prices.iter().map(|(id, _)| *id).collect();
        let values: Vec<Decimal> = prices.iter().map(|(_, p)| *p).collect();

        sqlx::query(
            r#"
            UPDATE valuations v
            SET current_price = u.price, updated_at = $3
            FROM UNNEST($1::bigint[], $2::numeric[]) AS u(id, price)
            WHERE v.participant_id = u.id
            "#,
        )
        .bind(&ids)
        .bind(&values)
        .bind(now)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Lock and fetch valuations eligible for decay: owner inactive since
    /// `cutoff`, no active freeze (neither the freeze-until column nor a
    /// growth-freeze modifier).
    pub async fn decay_candidates_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        cutoff: time::PrimitiveDateTime,
        now: time::PrimitiveDateTime,
    ) -> Result<Vec<DecayCandidate>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT v.participant_id, v.current_price
            FROM valuations v
            JOIN participants p ON p.id = v.participant_id
            WHERE p.last_active_at < $1
              AND (v.freeze_until IS NULL OR v.freeze_until < $2)
              AND NOT EXISTS (
                  SELECT 1 FROM participant_modifiers m
                  WHERE m.participant_id = p.id
                    AND m.kind = 'growth_freeze'
                    AND m.expires_at > $2
              )
            ORDER BY v.participant_id ASC
            FOR UPDATE OF v
            "#,
        )
        .bind(cutoff)
        .bind(now)
        .fetch_all(&mut **tx)
        .await
    }
}
