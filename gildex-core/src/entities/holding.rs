//! Holding records: positions in other participants' valuations.

use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Holding {
    pub holder_id: i64,
    pub valuation_id: i64,
    pub units: i64,
    /// Weighted-average acquisition price; untouched on disposal.
    pub avg_cost: Decimal,
}

/// A holding joined with the issuer identity and live price, for snapshots.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct HoldingPosition {
    pub issuer_user_id: i64,
    pub units: i64,
    pub avg_cost: Decimal,
    pub current_price: Decimal,
}

/// A holder's position priced at the current market, for net-worth math.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PricedPosition {
    pub holder_id: i64,
    pub units: i64,
    pub current_price: Decimal,
}

/// Weighted-average acquisition price after buying `add_units` at `price`.
///
/// The average is recomputed on every acquisition and left untouched on
/// disposal, so unrealized-gain displays stay meaningful.
pub fn blend_avg_cost(units: i64, avg_cost: Decimal, add_units: i64, price: Decimal) -> Decimal {
    let total = units + add_units;
    if total <= 0 {
        return price;
    }
    let blended =
        (avg_cost * Decimal::from(units) + price * Decimal::from(add_units)) / Decimal::from(total);
    blended.round_dp_with_strategy(4, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

impl Holding {
    /// Every priced position held by any of the given participants.
    pub async fn positions_for_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        holder_ids: &[i64],
    ) -> Result<Vec<PricedPosition>, sqlx::Error> {
        if holder_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as(
            r#"
            SELECT h.holder_id, h.units, v.current_price
            FROM holdings h
            JOIN valuations v ON v.participant_id = h.valuation_id
            WHERE h.holder_id = ANY($1)
            "#,
        )
        .bind(holder_ids)
        .fetch_all(&mut **tx)
        .await
    }

    /// Distinct holders of any of the given valuations.
    pub async fn holders_of_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        valuation_ids: &[i64],
    ) -> Result<Vec<i64>, sqlx::Error> {
        if valuation_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_scalar(
            "SELECT DISTINCT holder_id FROM holdings WHERE valuation_id = ANY($1)",
        )
        .bind(valuation_ids)
        .fetch_all(&mut **tx)
        .await
    }

    /// Lock and fetch one (holder, valuation) position.
    pub async fn get_for_update_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        holder_id: i64,
        valuation_id: i64,
    ) -> Result<Option<Holding>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT holder_id, valuation_id, units, avg_cost
            FROM holdings
            WHERE holder_id = $1 AND valuation_id = $2
            FOR UPDATE
            "#,
        )
        .bind(holder_id)
        .bind(valuation_id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Units of a valuation currently held across all holders.
    pub async fn total_held_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        valuation_id: i64,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COALESCE(SUM(units), 0)::bigint FROM holdings WHERE valuation_id = $1",
        )
        .bind(valuation_id)
        .fetch_one(&mut **tx)
        .await
    }

    /// Write the post-acquisition state of a position.
    ///
    /// The caller holds the row lock and has already blended the average
    /// cost with [`blend_avg_cost`].
    pub async fn upsert_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        holder_id: i64,
        valuation_id: i64,
        units: i64,
        avg_cost: Decimal,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO holdings (holder_id, valuation_id, units, avg_cost)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (holder_id, valuation_id)
            DO UPDATE SET units = EXCLUDED.units, avg_cost = EXCLUDED.avg_cost
            "#,
        )
        .bind(holder_id)
        .bind(valuation_id)
        .bind(units)
        .bind(avg_cost)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Write the post-disposal state: update remaining units, or delete the
    /// record entirely when the position reaches zero.
    pub async fn reduce_or_delete_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        holder_id: i64,
        valuation_id: i64,
        remaining_units: i64,
    ) -> Result<(), sqlx::Error> {
        if remaining_units <= 0 {
            sqlx::query("DELETE FROM holdings WHERE holder_id = $1 AND valuation_id = $2")
                .bind(holder_id)
                .bind(valuation_id)
                .execute(&mut **tx)
                .await?;
        } else {
            sqlx::query(
                r#"
                UPDATE holdings SET units = $3
                WHERE holder_id = $1 AND valuation_id = $2
                "#,
            )
            .bind(holder_id)
            .bind(valuation_id)
            .bind(remaining_units)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn first_acquisition_sets_avg_to_price() {
        assert_eq!(blend_avg_cost(0, Decimal::ZERO, 10, dec("12.50")), dec("12.5000"));
    }

    #[test]
    fn blend_is_unit_weighted() {
        // 10 units @ 10.00 + 30 units @ 14.00 -> 13.00
        assert_eq!(blend_avg_cost(10, dec("10.00"), 30, dec("14.00")), dec("13.0000"));
    }

    #[test]
    fn blend_rounds_to_four_places() {
        // 3 units @ 10.00 + 1 unit @ 10.01 -> 10.0025
        assert_eq!(blend_avg_cost(3, dec("10.00"), 1, dec("10.01")), dec("10.0025"));
    }
}
