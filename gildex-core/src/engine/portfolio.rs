//! Holdings trades: acquiring and disposing units of another participant's
//! valuation at the live price, bounded by the caller's stated limit.
//!
//! Business-rule failures are typed rejections; nothing is mutated on any
//! rejection path. The whole trade — balance move, holding upsert/delete,
//! net-worth republish — commits as one transaction.

use crate::db::now_utc;
use crate::entities::Identity;
use crate::entities::holding::{Holding, blend_avg_cost};
use crate::entities::participant::Participant;
use crate::entities::valuation::Valuation;
use crate::engine::net_worth::republish_tx;
use gildex_sdk::objects::{TradeReceipt, TradeRequest, TradeSide};
use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;

/// Trade failures.
///
/// Everything except `Database` is a business-rule rejection surfaced to
/// the caller with a human-readable reason.
#[derive(Debug, Error)]
pub enum TradeError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No participant exists for the identity.
    #[error("participant {guild_id}:{user_id} not found")]
    MissingParticipant { guild_id: i64, user_id: i64 },

    /// Zero or negative unit count.
    #[error("trade quantity must be positive")]
    InvalidQuantity,

    /// The buyer cannot cover the cost.
    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    /// The seller holds fewer units than offered.
    #[error("insufficient units: have {held}")]
    InsufficientUnits { held: i64 },

    /// Not enough unissued units remain to cover the acquisition.
    #[error("supply exhausted: only {available} units available")]
    SupplyExhausted { available: i64 },

    /// The live price moved past the caller's stated bound.
    #[error("price {current} exceeds the stated bound")]
    PriceBoundExceeded { current: Decimal },
}

/// Execute one trade at the current price.
pub async fn execute_trade(
    pool: &PgPool,
    request: &TradeRequest,
) -> Result<TradeReceipt, TradeError> {
    if request.units <= 0 {
        return Err(TradeError::InvalidQuantity);
    }
    let now = now_utc();

    let mut tx = pool.begin().await?;

    let actor_identity = Identity::new(request.guild_id, request.actor_user_id);
    let actor = Participant::get_for_update_tx(&mut tx, actor_identity)
        .await?
        .ok_or(TradeError::MissingParticipant {
            guild_id: request.guild_id,
            user_id: request.actor_user_id,
        })?;

    let issuer_identity = Identity::new(request.guild_id, request.issuer_user_id);
    let issuer = Participant::get_for_update_tx(&mut tx, issuer_identity)
        .await?
        .ok_or(TradeError::MissingParticipant {
            guild_id: request.guild_id,
            user_id: request.issuer_user_id,
        })?;

    let valuation = Valuation::get_for_update_tx(&mut tx, issuer.id)
        .await?
        .ok_or(TradeError::MissingParticipant {
            guild_id: request.guild_id,
            user_id: request.issuer_user_id,
        })?;

    let unit_price = valuation.current_price;
    let total = unit_price * Decimal::from(request.units);

    let balance_after = match request.side {
        TradeSide::Buy => {
            if unit_price > request.limit_price {
                return Err(TradeError::PriceBoundExceeded {
                    current: unit_price,
                });
            }
            if actor.balance < total {
                return Err(TradeError::InsufficientBalance {
                    needed: total,
                    available: actor.balance,
                });
            }

            let held_across_holders = Holding::total_held_tx(&mut tx, issuer.id).await?;
            let available = valuation.issued_units - held_across_holders;
            if request.units > available {
                return Err(TradeError::SupplyExhausted { available });
            }

            let position = Holding::get_for_update_tx(&mut tx, actor.id, issuer.id).await?;
            let (units, avg_cost) = match position {
                Some(h) => (h.units, h.avg_cost),
                None => (0, Decimal::ZERO),
            };
            let new_units = units + request.units;
            let new_avg = blend_avg_cost(units, avg_cost, request.units, unit_price);

            Participant::adjust_balance_tx(&mut tx, actor.id, -total).await?;
            Holding::upsert_tx(&mut tx, actor.id, issuer.id, new_units, new_avg).await?;
            actor.balance - total
        }
        TradeSide::Sell => {
            if unit_price < request.limit_price {
                return Err(TradeError::PriceBoundExceeded {
                    current: unit_price,
                });
            }

            let position = Holding::get_for_update_tx(&mut tx, actor.id, issuer.id).await?;
            let held = position.map_or(0, |h| h.units);
            if held < request.units {
                return Err(TradeError::InsufficientUnits { held });
            }

            Participant::adjust_balance_tx(&mut tx, actor.id, total).await?;
            Holding::reduce_or_delete_tx(&mut tx, actor.id, issuer.id, held - request.units)
                .await?;
            actor.balance + total
        }
    };

    let entries = republish_tx(&mut tx, &[actor.id], now).await?;
    let net_worth_after = entries
        .first()
        .map(|e| e.net_worth)
        .unwrap_or(actor.net_worth);

    tx.commit().await?;

    info!(
        guild_id = request.guild_id,
        actor = request.actor_user_id,
        issuer = request.issuer_user_id,
        side = ?request.side,
        units = request.units,
        %unit_price,
        "Trade executed"
    );

    Ok(TradeReceipt {
        side: request.side,
        units: request.units,
        unit_price,
        total,
        balance_after,
        net_worth_after,
    })
}
