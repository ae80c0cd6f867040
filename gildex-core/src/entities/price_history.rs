//! Append-only price history, consumed only by the display query API.

use crate::db::DbProcessor;
use crate::entities::Identity;
use kanau::processor::Processor;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, sqlx::FromRow)]
pub struct HistoryPoint {
    pub price: Decimal,
    pub recorded_at: time::PrimitiveDateTime,
}

pub struct PriceHistory;

impl PriceHistory {
    /// Append one point per repriced valuation.
    pub async fn append_many_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        prices: &[(i64, Decimal)],
        now: time::PrimitiveDateTime,
    ) -> Result<(), sqlx::Error> {
        if prices.is_empty() {
            return Ok(());
        }

        let mut query_builder = sqlx::QueryBuilder::new(
            "INSERT INTO price_history (valuation_id, price, recorded_at) ",
        );
        query_builder.push_values(prices, |mut b, (valuation_id, price)| {
            b.push_bind(valuation_id).push_bind(price).push_bind(now);
        });
        query_builder.build().execute(&mut **tx).await?;
        Ok(())
    }

    /// Drop all but the newest `keep` points per valuation.
    ///
    /// Returns the number of rows removed.
    pub async fn trim_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        keep: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM price_history ph
            USING (
                SELECT id,
                       ROW_NUMBER() OVER (PARTITION BY valuation_id ORDER BY id DESC) AS rn
                FROM price_history
            ) ranked
            WHERE ph.id = ranked.id AND ranked.rn > $1
            "#,
        )
        .bind(keep)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone, Copy)]
/// Fetch the newest history points for one participant's valuation.
pub struct GetPriceHistory {
    pub identity: Identity,
    pub limit: i64,
}

impl Processor<GetPriceHistory> for DbProcessor {
    type Output = Vec<HistoryPoint>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetPriceHistory")]
    async fn process(&self, query: GetPriceHistory) -> Result<Vec<HistoryPoint>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT ph.price, ph.recorded_at
            FROM price_history ph
            JOIN participants p ON p.id = ph.valuation_id
            WHERE p.guild_id = $1 AND p.user_id = $2
            ORDER BY ph.id DESC
            LIMIT $3
            "#,
        )
        .bind(query.identity.guild_id)
        .bind(query.identity.user_id)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await
    }
}
