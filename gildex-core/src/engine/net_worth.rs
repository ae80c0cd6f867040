//! The derived net-worth ledger.
//!
//! `net worth = balance + Σ(units × current price)` over the participant's
//! holdings, exactly, in decimal arithmetic. Recomputation here is the only
//! writer of leaderboard scores, so the invariant and the ranking can never
//! drift apart within one transaction.

use crate::entities::Identity;
use crate::entities::holding::{Holding, PricedPosition};
use crate::entities::leaderboard::{Leaderboard, LeaderboardSource};
use crate::entities::participant::Participant;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Exact derived net worth for one participant.
pub fn net_worth(balance: Decimal, positions: &[(i64, Decimal)]) -> Decimal {
    positions
        .iter()
        .fold(balance, |acc, (units, price)| acc + Decimal::from(*units) * *price)
}

/// Recompute net worth for the given participants from authoritative
/// balance + holdings state, write the results, and republish the affected
/// leaderboard entries — the single dependency-ordered unit the aggregator,
/// decay sweep, trades, and admin mutations all go through.
pub async fn republish_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    participant_ids: &[i64],
    now: time::PrimitiveDateTime,
) -> Result<Vec<LeaderboardSource>, sqlx::Error> {
    if participant_ids.is_empty() {
        return Ok(Vec::new());
    }

    let balances = Participant::balances_tx(tx, participant_ids).await?;
    let positions = Holding::positions_for_tx(tx, participant_ids).await?;

    let mut by_holder: HashMap<i64, Vec<(i64, Decimal)>> = HashMap::new();
    for PricedPosition {
        holder_id,
        units,
        current_price,
    } in positions
    {
        by_holder.entry(holder_id).or_default().push((units, current_price));
    }

    let empty = Vec::new();
    let entries: Vec<LeaderboardSource> = balances
        .iter()
        .map(|row| {
            let positions = by_holder.get(&row.id).unwrap_or(&empty);
            LeaderboardSource {
                participant_id: row.id,
                guild_id: row.guild_id,
                user_id: row.user_id,
                display_name: row.display_name.clone(),
                net_worth: net_worth(row.balance, positions),
            }
        })
        .collect();

    let values: Vec<(i64, Decimal)> = entries
        .iter()
        .map(|e| (e.participant_id, e.net_worth))
        .collect();
    Participant::set_net_worths_tx(tx, &values).await?;
    Leaderboard::upsert_many_tx(tx, &entries, now).await?;

    Ok(entries)
}

/// Admin overwrite of balance and/or net worth, bypassing scoring.
///
/// When only the balance is overwritten, net worth is re-derived to keep
/// the invariant; an explicit net-worth overwrite is taken as-is. Either
/// way the dependent leaderboard entry is republished.
pub async fn overwrite_participant(
    pool: &sqlx::PgPool,
    identity: Identity,
    balance: Option<Decimal>,
    net_worth_override: Option<Decimal>,
    now: time::PrimitiveDateTime,
) -> Result<Option<Participant>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let Some(mut participant) =
        Participant::overwrite_tx(&mut tx, identity, balance, net_worth_override).await?
    else {
        return Ok(None);
    };

    if net_worth_override.is_some() {
        let entry = LeaderboardSource {
            participant_id: participant.id,
            guild_id: participant.guild_id,
            user_id: participant.user_id,
            display_name: participant.display_name.clone(),
            net_worth: participant.net_worth,
        };
        Leaderboard::upsert_many_tx(&mut tx, std::slice::from_ref(&entry), now).await?;
    } else {
        let entries = republish_tx(&mut tx, &[participant.id], now).await?;
        if let Some(entry) = entries.first() {
            participant.net_worth = entry.net_worth;
        }
    }

    tx.commit().await?;
    Ok(Some(participant))
}

/// Remove a participant who left the guild.
///
/// Holdings cascade away with the row, which changes every other holder's
/// portfolio value, so their net worths are republished in the same
/// transaction. Returns the number of participants removed (0 or 1).
pub async fn remove_participant(
    pool: &sqlx::PgPool,
    identity: Identity,
    now: time::PrimitiveDateTime,
) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let target: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM participants WHERE guild_id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(identity.guild_id)
    .bind(identity.user_id)
    .fetch_optional(&mut *tx)
    .await?;
    let Some(target) = target else {
        return Ok(0);
    };

    // Capture the holders of the doomed valuation before the cascade
    // erases the holdings.
    let mut affected = Holding::holders_of_tx(&mut tx, &[target]).await?;
    affected.retain(|id| *id != target);

    Participant::delete_tx(&mut tx, identity).await?;
    republish_tx(&mut tx, &affected, now).await?;
    tx.commit().await?;
    Ok(1)
}

/// Bulk-remove every participant of a disconnected guild.
pub async fn remove_guild(pool: &sqlx::PgPool, guild_id: i64) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let removed = Participant::delete_guild_tx(&mut tx, guild_id).await?;
    tx.commit().await?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn net_worth_is_exact_decimal_arithmetic() {
        // 100 + 3 x 10.35 + 2 x 1.00 = 133.05, exactly.
        let positions = vec![(3i64, dec("10.35")), (2, dec("1.00"))];
        assert_eq!(net_worth(dec("100"), &positions), dec("133.05"));
    }

    #[test]
    fn no_holdings_means_net_worth_equals_balance() {
        assert_eq!(net_worth(dec("50"), &[]), dec("50"));
    }

    #[test]
    fn many_small_positions_do_not_drift() {
        // 1000 positions of 1 unit at 0.01 would drift under f64; decimal
        // lands on exactly 10.00.
        let positions: Vec<(i64, Decimal)> = (0..1000).map(|_| (1i64, dec("0.01"))).collect();
        assert_eq!(net_worth(Decimal::ZERO, &positions), dec("10.00"));
    }
}
