//! Query API handlers.
//!
//! These endpoints are called by the presentation layer and require a
//! verified signed request URL via the `Gildex-Signature` and
//! `Gildex-Signed-Url` headers.
//!
//! # Endpoints
//!
//! - `GET /guilds/{guild_id}/leaderboard?limit=n`
//! - `GET /guilds/{guild_id}/participants/{user_id}`
//! - `GET /guilds/{guild_id}/participants/{user_id}/history?limit=n`

use axum::{
    Json, Router,
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use gildex_core::db::DbProcessor;
use gildex_core::entities::Identity;
use gildex_core::entities::leaderboard::GetLeaderboardTop;
use gildex_core::entities::participant::{GetParticipantOverview, ParticipantOverview};
use gildex_core::entities::price_history::GetPriceHistory;
use gildex_sdk::objects::{
    HoldingView, LeaderboardResponse, LeaderboardRow, ParticipantSnapshot, PriceHistoryPoint,
    PriceHistoryResponse,
};
use kanau::processor::Processor;
use serde::Deserialize;

use crate::api::extractors::SignedUrl;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;

/// Build the Query API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/guilds/{guild_id}/leaderboard", get(get_leaderboard))
        .route(
            "/guilds/{guild_id}/participants/{user_id}",
            get(get_participant),
        )
        .route(
            "/guilds/{guild_id}/participants/{user_id}/history",
            get(get_price_history),
        )
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<i64>,
}

impl LimitQuery {
    fn clamped(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// `GET /guilds/{guild_id}/leaderboard` — top participants by net worth.
async fn get_leaderboard(
    state: axum::extract::State<AppState>,
    _auth: SignedUrl,
    Path(guild_id): Path<i64>,
    Query(limit): Query<LimitQuery>,
) -> Result<impl IntoResponse, QueryApiError> {
    let processor = DbProcessor {
        pool: state.db.clone(),
    };

    let rows = processor
        .process(GetLeaderboardTop {
            guild_id,
            limit: limit.clamped(),
        })
        .await
        .map_err(QueryApiError::Database)?;

    let rows = rows
        .into_iter()
        .enumerate()
        .map(|(index, row)| LeaderboardRow {
            rank: index as u32 + 1,
            user_id: row.user_id,
            display_name: row.display_name,
            net_worth: row.net_worth,
        })
        .collect();

    Ok(Json(LeaderboardResponse { guild_id, rows }))
}

/// `GET /guilds/{guild_id}/participants/{user_id}` — full snapshot.
async fn get_participant(
    state: axum::extract::State<AppState>,
    _auth: SignedUrl,
    Path((guild_id, user_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, QueryApiError> {
    let processor = DbProcessor {
        pool: state.db.clone(),
    };

    let overview = processor
        .process(GetParticipantOverview {
            identity: Identity::new(guild_id, user_id),
        })
        .await
        .map_err(QueryApiError::Database)?
        .ok_or(QueryApiError::NotFound)?;

    Ok(Json(to_snapshot(overview)))
}

/// `GET /guilds/{guild_id}/participants/{user_id}/history` — price history,
/// newest first.
async fn get_price_history(
    state: axum::extract::State<AppState>,
    _auth: SignedUrl,
    Path((guild_id, user_id)): Path<(i64, i64)>,
    Query(limit): Query<LimitQuery>,
) -> Result<impl IntoResponse, QueryApiError> {
    let processor = DbProcessor {
        pool: state.db.clone(),
    };

    let points = processor
        .process(GetPriceHistory {
            identity: Identity::new(guild_id, user_id),
            limit: limit.clamped(),
        })
        .await
        .map_err(QueryApiError::Database)?;

    let points = points
        .into_iter()
        .map(|p| PriceHistoryPoint {
            price: p.price,
            recorded_at: p.recorded_at.assume_utc().unix_timestamp(),
        })
        .collect();

    Ok(Json(PriceHistoryResponse {
        guild_id,
        user_id,
        points,
    }))
}

/// Convert a `ParticipantOverview` (DB model) into a `ParticipantSnapshot`
/// (API model).
fn to_snapshot(overview: ParticipantOverview) -> ParticipantSnapshot {
    ParticipantSnapshot {
        guild_id: overview.participant.guild_id,
        user_id: overview.participant.user_id,
        display_name: overview.participant.display_name,
        balance: overview.participant.balance,
        net_worth: overview.participant.net_worth,
        price: overview.valuation.current_price,
        volatility: overview.valuation.base_volatility,
        frozen_until: overview
            .valuation
            .freeze_until
            .map(|t| t.assume_utc().unix_timestamp()),
        holdings: overview
            .holdings
            .into_iter()
            .map(|h| HoldingView {
                issuer_user_id: h.issuer_user_id,
                units: h.units,
                avg_cost: h.avg_cost,
                current_price: h.current_price,
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

/// Errors that can occur in Query API handlers.
#[derive(Debug)]
enum QueryApiError {
    /// A database query failed.
    Database(sqlx::Error),
    /// The requested participant was not found.
    NotFound,
}

impl IntoResponse for QueryApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            QueryApiError::Database(e) => {
                tracing::error!(error = %e, "Query API database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            QueryApiError::NotFound => {
                (StatusCode::NOT_FOUND, "participant not found").into_response()
            }
        }
    }
}
