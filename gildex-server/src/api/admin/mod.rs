//! Admin API handlers.
//!
//! These endpoints are called by administrative tooling and require the
//! `Gildex-Admin-Authorization` header with the plaintext admin secret.
//!
//! # Endpoints
//!
//! - `POST   /participants/overwrite`                  – overwrite balance/net worth
//! - `POST   /leaderboard/{guild_id}/resync`           – full leaderboard resync
//! - `DELETE /guilds/{guild_id}/participants/{user_id}` – participant left the guild
//! - `DELETE /guilds/{guild_id}`                        – guild disconnected

use axum::{
    Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, post},
};

use crate::state::AppState;

mod overwrite;
mod remove;
mod resync;

/// Build the Admin API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/participants/overwrite",
            post(overwrite::overwrite_participant),
        )
        .route(
            "/leaderboard/{guild_id}/resync",
            post(resync::resync_leaderboard),
        )
        .route(
            "/guilds/{guild_id}/participants/{user_id}",
            delete(remove::remove_participant),
        )
        .route("/guilds/{guild_id}", delete(remove::remove_guild))
}

// ---------------------------------------------------------------------------
// Shared error type
// ---------------------------------------------------------------------------

/// Errors that can occur in Admin API handlers.
#[derive(Debug)]
pub(crate) enum AdminApiError {
    Database(sqlx::Error),
    NotFound,
}

impl IntoResponse for AdminApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AdminApiError::Database(e) => {
                tracing::error!(error = %e, "Admin API database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            AdminApiError::NotFound => {
                (StatusCode::NOT_FOUND, "resource not found").into_response()
            }
        }
    }
}
