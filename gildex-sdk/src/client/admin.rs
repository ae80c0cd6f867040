//! Admin API client (administrative tooling → Gildex server).
//!
//! All requests carry the plaintext admin secret in the
//! `Gildex-Admin-Authorization` header.

use reqwest::Client;
use url::Url;

use super::ClientError;
use crate::objects::admin::{
    AdminParticipantView, OverwriteRequest, RemoveResponse, ResyncResponse,
};
use crate::signature::ADMIN_AUTH_HEADER;

/// Typed HTTP client for the Gildex **Admin API**.
///
/// Authentication uses a plaintext secret sent in the
/// `Gildex-Admin-Authorization` header, verified server-side against an
/// argon2-hashed value.
#[derive(Debug, Clone)]
pub struct AdminClient {
    http: Client,
    base_url: Url,
    admin_secret: String,
}

impl AdminClient {
    /// Create a new `AdminClient`.
    pub fn new(base_url: Url, admin_secret: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url,
            admin_secret: admin_secret.into(),
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `POST /api/v1/admin/participants/overwrite` – overwrite balance
    /// and/or net worth, bypassing scoring.
    pub async fn overwrite_participant(
        &self,
        request: &OverwriteRequest,
    ) -> Result<AdminParticipantView, ClientError> {
        let url = self.base_url.join("/api/v1/admin/participants/overwrite")?;

        let resp = self
            .http
            .post(url)
            .header(ADMIN_AUTH_HEADER, &self.admin_secret)
            .json(request)
            .send()
            .await?;

        parse_response(resp).await
    }

    /// `POST /api/v1/admin/leaderboard/{guild_id}/resync` – trigger a full
    /// leaderboard re-derivation for one guild.
    pub async fn resync_leaderboard(&self, guild_id: i64) -> Result<ResyncResponse, ClientError> {
        let url = self
            .base_url
            .join(&format!("/api/v1/admin/leaderboard/{guild_id}/resync"))?;

        let resp = self
            .http
            .post(url)
            .header(ADMIN_AUTH_HEADER, &self.admin_secret)
            .send()
            .await?;

        parse_response(resp).await
    }

    /// `DELETE /api/v1/admin/guilds/{guild_id}/participants/{user_id}` –
    /// remove a participant who left the guild.
    pub async fn remove_participant(
        &self,
        guild_id: i64,
        user_id: i64,
    ) -> Result<RemoveResponse, ClientError> {
        let url = self.base_url.join(&format!(
            "/api/v1/admin/guilds/{guild_id}/participants/{user_id}"
        ))?;

        let resp = self
            .http
            .delete(url)
            .header(ADMIN_AUTH_HEADER, &self.admin_secret)
            .send()
            .await?;

        parse_response(resp).await
    }

    /// `DELETE /api/v1/admin/guilds/{guild_id}` – bulk-remove every
    /// participant of a disconnected guild.
    pub async fn remove_guild(&self, guild_id: i64) -> Result<RemoveResponse, ClientError> {
        let url = self
            .base_url
            .join(&format!("/api/v1/admin/guilds/{guild_id}"))?;

        let resp = self
            .http
            .delete(url)
            .header(ADMIN_AUTH_HEADER, &self.admin_secret)
            .send()
            .await?;

        parse_response(resp).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}
