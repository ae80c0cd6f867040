use axum::{Json, extract::Path, response::IntoResponse};
use gildex_core::db::now_utc;
use gildex_core::engine::net_worth;
use gildex_core::entities::Identity;
use gildex_sdk::objects::RemoveResponse;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

/// `DELETE /guilds/{guild_id}/participants/{user_id}` — remove a
/// participant who left the guild.
///
/// Holdings cascade with the row; other holders of the removed valuation
/// get their net worths republished in the same transaction.
pub async fn remove_participant(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Path((guild_id, user_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AdminApiError> {
    let removed =
        net_worth::remove_participant(&state.db, Identity::new(guild_id, user_id), now_utc())
            .await
            .map_err(AdminApiError::Database)?;

    if removed == 0 {
        return Err(AdminApiError::NotFound);
    }

    tracing::info!(guild_id, user_id, "Participant removed");
    Ok(Json(RemoveResponse { removed }))
}

/// `DELETE /guilds/{guild_id}` — bulk-remove every participant of a
/// disconnected guild.
pub async fn remove_guild(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Path(guild_id): Path<i64>,
) -> Result<impl IntoResponse, AdminApiError> {
    let removed = net_worth::remove_guild(&state.db, guild_id)
        .await
        .map_err(AdminApiError::Database)?;

    tracing::info!(guild_id, removed, "Guild removed");
    Ok(Json(RemoveResponse { removed }))
}
