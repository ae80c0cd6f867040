use axum::{Json, response::IntoResponse};
use gildex_core::db::now_utc;
use gildex_core::engine::net_worth;
use gildex_core::entities::Identity;
use gildex_sdk::objects::{AdminParticipantView, OverwriteRequest};

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

/// `POST /participants/overwrite` — overwrite a participant's balance
/// and/or net worth, bypassing scoring.
///
/// A balance-only overwrite re-derives net worth from holdings to keep the
/// ledger invariant; either way the leaderboard entry is republished.
pub async fn overwrite_participant(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Json(request): Json<OverwriteRequest>,
) -> Result<impl IntoResponse, AdminApiError> {
    let updated = net_worth::overwrite_participant(
        &state.db,
        Identity::new(request.guild_id, request.user_id),
        request.balance,
        request.net_worth,
        now_utc(),
    )
    .await
    .map_err(AdminApiError::Database)?
    .ok_or(AdminApiError::NotFound)?;

    tracing::info!(
        guild_id = request.guild_id,
        user_id = request.user_id,
        balance_overwritten = request.balance.is_some(),
        net_worth_overwritten = request.net_worth.is_some(),
        "Admin overwrite applied"
    );

    Ok(Json(AdminParticipantView {
        guild_id: updated.guild_id,
        user_id: updated.user_id,
        display_name: updated.display_name,
        balance: updated.balance,
        net_worth: updated.net_worth,
    }))
}
