//! Participant records and their status modifiers.

use crate::db::DbProcessor;
use crate::entities::holding::HoldingPosition;
use crate::entities::valuation::Valuation;
use crate::entities::{Identity, ModifierKind};
use kanau::processor::Processor;
use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Participant {
    pub id: i64,
    pub guild_id: i64,
    pub user_id: i64,
    pub display_name: String,
    pub balance: Decimal,
    pub net_worth: Decimal,
    pub last_active_at: time::PrimitiveDateTime,
    pub created_at: time::PrimitiveDateTime,
}

/// Balance and identity data needed to recompute a net worth.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct BalanceRow {
    pub id: i64,
    pub guild_id: i64,
    pub user_id: i64,
    pub display_name: String,
    pub balance: Decimal,
}

/// An active status modifier attached to a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct ActiveModifier {
    pub participant_id: i64,
    pub kind: ModifierKind,
}

impl Participant {
    /// Insert participants for identities not seen before.
    ///
    /// Returns the ids of the rows actually created (conflicting identities
    /// are left untouched). Net worth starts equal to the balance since a
    /// fresh participant has no holdings. The caller issues the valuations
    /// for the returned ids inside the same transaction so the pair is
    /// created atomically.
    pub async fn insert_missing_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        entries: &[(Identity, String)],
        starting_balance: Decimal,
        now: time::PrimitiveDateTime,
    ) -> Result<Vec<i64>, sqlx::Error> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let guild_ids: Vec<i64> = entries.iter().map(|(i, _)| i.guild_id).collect();
        let user_ids: Vec<i64> = entries.iter().map(|(i, _)| i.user_id).collect();
        let names: Vec<String> = entries.iter().map(|(_, n)| n.clone()).collect();

        let created: Vec<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO participants
                (guild_id, user_id, display_name, balance, net_worth, last_active_at, created_at)
            SELECT u.guild_id, u.user_id, u.display_name, $4, $4, $5, $5
            FROM UNNEST($1::bigint[], $2::bigint[], $3::text[])
                AS u(guild_id, user_id, display_name)
            ON CONFLICT (guild_id, user_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&guild_ids)
        .bind(&user_ids)
        .bind(&names)
        .bind(starting_balance)
        .bind(now)
        .fetch_all(&mut **tx)
        .await?;

        Ok(created)
    }

    /// Resolve identities to participant ids in one batched lookup.
    pub async fn resolve_ids_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        identities: &[Identity],
    ) -> Result<HashMap<Identity, i64>, sqlx::Error> {
        if identities.is_empty() {
            return Ok(HashMap::new());
        }

        let guild_ids: Vec<i64> = identities.iter().map(|i| i.guild_id).collect();
        let user_ids: Vec<i64> = identities.iter().map(|i| i.user_id).collect();

        let rows: Vec<(i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT p.id, p.guild_id, p.user_id
            FROM participants p
            JOIN UNNEST($1::bigint[], $2::bigint[]) AS u(guild_id, user_id)
              ON p.guild_id = u.guild_id AND p.user_id = u.user_id
            "#,
        )
        .bind(&guild_ids)
        .bind(&user_ids)
        .fetch_all(&mut **tx)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, guild_id, user_id)| (Identity::new(guild_id, user_id), id))
            .collect())
    }

    /// Fetch balance rows for net-worth recomputation.
    pub async fn balances_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        ids: &[i64],
    ) -> Result<Vec<BalanceRow>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as(
            r#"
            SELECT id, guild_id, user_id, display_name, balance
            FROM participants
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&mut **tx)
        .await
    }

    /// Bulk-write recomputed net worths.
    pub async fn set_net_worths_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        values: &[(i64, Decimal)],
    ) -> Result<(), sqlx::Error> {
        if values.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = values.iter().map(|(id, _)| *id).collect();
        let worths: Vec<Decimal> = values.iter().map(|(_, w)| *w).collect();

        sqlx::query(
            r#"
            UPDATE participants p
            SET net_worth = u.net_worth
            FROM UNNEST($1::bigint[], $2::numeric[]) AS u(id, net_worth)
            WHERE p.id = u.id
            "#,
        )
        .bind(&ids)
        .bind(&worths)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Mark participants as active (they had scored events this batch).
    pub async fn touch_last_active_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        ids: &[i64],
        now: time::PrimitiveDateTime,
    ) -> Result<(), sqlx::Error> {
        if ids.is_empty() {
            return Ok(());
        }
        sqlx::query("UPDATE participants SET last_active_at = $2 WHERE id = ANY($1)")
            .bind(ids)
            .bind(now)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Fetch unexpired status modifiers for a batch of participants.
    pub async fn active_modifiers_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        ids: &[i64],
        now: time::PrimitiveDateTime,
    ) -> Result<Vec<ActiveModifier>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as(
            r#"
            SELECT participant_id, kind
            FROM participant_modifiers
            WHERE participant_id = ANY($1) AND expires_at > $2
            "#,
        )
        .bind(ids)
        .bind(now)
        .fetch_all(&mut **tx)
        .await
    }

    /// Lock and fetch a single participant row for a trade.
    pub async fn get_for_update_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        identity: Identity,
    ) -> Result<Option<Participant>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT id, guild_id, user_id, display_name, balance, net_worth,
                   last_active_at, created_at
            FROM participants
            WHERE guild_id = $1 AND user_id = $2
            FOR UPDATE
            "#,
        )
        .bind(identity.guild_id)
        .bind(identity.user_id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Adjust a participant's cash balance by a signed delta.
    pub async fn adjust_balance_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: i64,
        delta: Decimal,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE participants SET balance = balance + $2 WHERE id = $1")
            .bind(id)
            .bind(delta)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Overwrite balance and/or net worth directly (admin path).
    ///
    /// Returns the updated row, or `None` if the participant does not exist.
    pub async fn overwrite_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        identity: Identity,
        balance: Option<Decimal>,
        net_worth: Option<Decimal>,
    ) -> Result<Option<Participant>, sqlx::Error> {
        sqlx::query_as(
            r#"
            UPDATE participants
            SET balance = COALESCE($3, balance),
                net_worth = COALESCE($4, net_worth)
            WHERE guild_id = $1 AND user_id = $2
            RETURNING id, guild_id, user_id, display_name, balance, net_worth,
                      last_active_at, created_at
            "#,
        )
        .bind(identity.guild_id)
        .bind(identity.user_id)
        .bind(balance)
        .bind(net_worth)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Delete one participant (holdings, valuation, history, and leaderboard
    /// rows cascade). Returns the participant id if the row existed.
    pub async fn delete_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        identity: Identity,
    ) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar(
            "DELETE FROM participants WHERE guild_id = $1 AND user_id = $2 RETURNING id",
        )
        .bind(identity.guild_id)
        .bind(identity.user_id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Bulk-delete every participant of a disconnected guild.
    pub async fn delete_guild_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        guild_id: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM participants WHERE guild_id = $1")
            .bind(guild_id)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected())
    }

    /// Cursor-paginated id walk used by the leaderboard full resync.
    pub async fn page_ids(
        pool: &sqlx::PgPool,
        after_id: i64,
        limit: i64,
        guild_id: Option<i64>,
    ) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT id FROM participants
            WHERE id > $1 AND ($3::bigint IS NULL OR guild_id = $3)
            ORDER BY id ASC
            LIMIT $2
            "#,
        )
        .bind(after_id)
        .bind(limit)
        .bind(guild_id)
        .fetch_all(pool)
        .await
    }
}

// ---------------------------------------------------------------------------
// Query-API commands
// ---------------------------------------------------------------------------

/// Full snapshot of a participant: row, valuation, and holdings.
#[derive(Debug, Clone)]
pub struct ParticipantOverview {
    pub participant: Participant,
    pub valuation: Valuation,
    pub holdings: Vec<HoldingPosition>,
}

#[derive(Debug, Clone, Copy)]
/// Fetch the full snapshot for one participant, or `None` if the identity
/// has never been seen.
pub struct GetParticipantOverview {
    pub identity: Identity,
}

impl Processor<GetParticipantOverview> for DbProcessor {
    type Output = Option<ParticipantOverview>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetParticipantOverview")]
    async fn process(
        &self,
        query: GetParticipantOverview,
    ) -> Result<Option<ParticipantOverview>, sqlx::Error> {
        let participant: Option<Participant> = sqlx::query_as(
            r#"
            SELECT id, guild_id, user_id, display_name, balance, net_worth,
                   last_active_at, created_at
            FROM participants
            WHERE guild_id = $1 AND user_id = $2
            "#,
        )
        .bind(query.identity.guild_id)
        .bind(query.identity.user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(participant) = participant else {
            return Ok(None);
        };

        let valuation: Valuation = sqlx::query_as(
            r#"
            SELECT participant_id, current_price, base_volatility, issued_units,
                   freeze_until, updated_at
            FROM valuations
            WHERE participant_id = $1
            "#,
        )
        .bind(participant.id)
        .fetch_one(&self.pool)
        .await?;

        let holdings: Vec<HoldingPosition> = sqlx::query_as(
            r#"
            SELECT issuer.user_id AS issuer_user_id, h.units, h.avg_cost,
                   v.current_price
            FROM holdings h
            JOIN valuations v ON v.participant_id = h.valuation_id
            JOIN participants issuer ON issuer.id = v.participant_id
            WHERE h.holder_id = $1
            ORDER BY issuer.user_id ASC
            "#,
        )
        .bind(participant.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(ParticipantOverview {
            participant,
            valuation,
            holdings,
        }))
    }
}
