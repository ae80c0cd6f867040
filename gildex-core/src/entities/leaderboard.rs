//! The ranked leaderboard store, keyed by guild.
//!
//! Net-worth recomputation is the only writer of scores; display names are
//! a denormalized cache with a bounded freshness window refreshed by the
//! resync job.

use crate::db::DbProcessor;
use kanau::processor::Processor;
use rust_decimal::Decimal;

/// Everything needed to upsert one leaderboard entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardSource {
    pub participant_id: i64,
    pub guild_id: i64,
    pub user_id: i64,
    pub display_name: String,
    pub net_worth: Decimal,
}

/// One ranked row as served to the presentation layer.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct TopRow {
    pub user_id: i64,
    pub display_name: String,
    pub net_worth: Decimal,
}

pub struct Leaderboard;

impl Leaderboard {
    /// Upsert entries after a net-worth recomputation.
    ///
    /// Scores always win; the cached display name is only written on first
    /// insert, leaving refresh cost to the TTL-gated resync path.
    pub async fn upsert_many_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        entries: &[LeaderboardSource],
        now: time::PrimitiveDateTime,
    ) -> Result<(), sqlx::Error> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut query_builder = sqlx::QueryBuilder::new(
            "INSERT INTO leaderboard_entries \
            (guild_id, participant_id, user_id, net_worth, display_name, name_cached_at) ",
        );
        query_builder.push_values(entries, |mut b, entry| {
            b.push_bind(entry.guild_id)
                .push_bind(entry.participant_id)
                .push_bind(entry.user_id)
                .push_bind(entry.net_worth)
                .push_bind(&entry.display_name)
                .push_bind(now);
        });
        query_builder.push(
            " ON CONFLICT (guild_id, participant_id) \
            DO UPDATE SET net_worth = EXCLUDED.net_worth",
        );
        query_builder.build().execute(&mut **tx).await?;
        Ok(())
    }

    /// Refresh cached display names older than `cutoff` from the
    /// authoritative participant rows. Returns the number refreshed.
    pub async fn refresh_stale_names_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        cutoff: time::PrimitiveDateTime,
        now: time::PrimitiveDateTime,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE leaderboard_entries le
            SET display_name = p.display_name, name_cached_at = $2
            FROM participants p
            WHERE p.id = le.participant_id AND le.name_cached_at < $1
            "#,
        )
        .bind(cutoff)
        .bind(now)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone, Copy)]
/// Fetch the top `limit` entries of one guild by descending net worth.
pub struct GetLeaderboardTop {
    pub guild_id: i64,
    pub limit: i64,
}

impl Processor<GetLeaderboardTop> for DbProcessor {
    type Output = Vec<TopRow>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetLeaderboardTop")]
    async fn process(&self, query: GetLeaderboardTop) -> Result<Vec<TopRow>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT user_id, display_name, net_worth
            FROM leaderboard_entries
            WHERE guild_id = $1
            ORDER BY net_worth DESC, participant_id ASC
            LIMIT $2
            "#,
        )
        .bind(query.guild_id)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await
    }
}
