use axum::{Json, extract::Path, response::IntoResponse};
use gildex_core::engine::resync::full_resync;
use gildex_sdk::objects::ResyncResponse;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

/// `POST /leaderboard/{guild_id}/resync` — re-derive every participant of
/// one guild from authoritative state and rewrite the ranked entries.
pub async fn resync_leaderboard(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Path(guild_id): Path<i64>,
) -> Result<impl IntoResponse, AdminApiError> {
    let entries = full_resync(&state.db, &state.config.jobs, Some(guild_id))
        .await
        .map_err(AdminApiError::Database)?;

    tracing::info!(guild_id, entries, "Admin-triggered leaderboard resync");

    Ok(Json(ResyncResponse { guild_id, entries }))
}
