//! Trade execution wire objects (Service API).

use crate::signature::Signature;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a holdings trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Request body for `POST /service/trades`.
///
/// `limit_price` is the caller's stated price bound: the maximum acceptable
/// unit price on a buy, the minimum acceptable unit price on a sell. If the
/// live price has moved past the bound the trade is rejected with
/// [`TradeRejectionCode::PriceBoundExceeded`] and no state is mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRequest {
    pub guild_id: i64,
    /// The participant placing the trade.
    pub actor_user_id: i64,
    /// The participant whose valuation is being traded.
    pub issuer_user_id: i64,
    pub side: TradeSide,
    pub units: i64,
    pub limit_price: Decimal,
}

impl Signature for TradeRequest {}

/// Successful trade outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub side: TradeSide,
    pub units: i64,
    /// Unit price the trade executed at.
    pub unit_price: Decimal,
    /// Total amount debited (buy) or credited (sell).
    pub total: Decimal,
    pub balance_after: Decimal,
    pub net_worth_after: Decimal,
}

/// Stable machine-readable rejection reasons for business-rule failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeRejectionCode {
    MissingParticipant,
    InvalidQuantity,
    InsufficientBalance,
    InsufficientUnits,
    SupplyExhausted,
    PriceBoundExceeded,
}

/// Typed rejection body returned with HTTP 422.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRejection {
    pub code: TradeRejectionCode,
    /// Human-readable reason, suitable for direct display.
    pub message: String,
}
