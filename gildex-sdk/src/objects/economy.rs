//! Query API wire objects: leaderboards, participant snapshots, history.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One row of a guild leaderboard, ranked by descending net worth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    /// 1-based rank within the guild.
    pub rank: u32,
    pub user_id: i64,
    pub display_name: String,
    pub net_worth: Decimal,
}

/// Response body for `GET /query/guilds/{guild_id}/leaderboard`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub guild_id: i64,
    pub rows: Vec<LeaderboardRow>,
}

/// A position held in another participant's valuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldingView {
    /// Platform user id of the participant whose valuation is held.
    pub issuer_user_id: i64,
    pub units: i64,
    /// Weighted-average acquisition price.
    pub avg_cost: Decimal,
    pub current_price: Decimal,
}

/// Full participant snapshot for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSnapshot {
    pub guild_id: i64,
    pub user_id: i64,
    pub display_name: String,
    pub balance: Decimal,
    pub net_worth: Decimal,
    /// Current price of the participant's own valuation.
    pub price: Decimal,
    /// Base volatility coefficient of the valuation.
    pub volatility: Decimal,
    /// Unix timestamp until which the valuation is protected from decay,
    /// if a freeze is active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frozen_until: Option<i64>,
    pub holdings: Vec<HoldingView>,
}

/// One point of the append-only price history, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceHistoryPoint {
    pub price: Decimal,
    /// Unix timestamp of the price change.
    pub recorded_at: i64,
}

/// Response body for the price-history query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceHistoryResponse {
    pub guild_id: i64,
    pub user_id: i64,
    pub points: Vec<PriceHistoryPoint>,
}
