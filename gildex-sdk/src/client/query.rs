//! Query API client (presentation layer → Gildex server).
//!
//! Query endpoints are `GET` requests authenticated by URL signing: the full
//! request URL is signed and sent alongside the signature.

use reqwest::Client;
use url::Url;

use super::ClientError;
use crate::objects::economy::{LeaderboardResponse, ParticipantSnapshot, PriceHistoryResponse};
use crate::signature::{SIGNATURE_HEADER, SIGNED_URL_HEADER, sign_url};

/// Typed HTTP client for the Gildex **Query API**.
#[derive(Debug, Clone)]
pub struct QueryClient {
    http: Client,
    base_url: Url,
    secret: Vec<u8>,
}

impl QueryClient {
    /// Create a new `QueryClient`.
    pub fn new(base_url: Url, service_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            http: Client::new(),
            base_url,
            secret: service_secret.into(),
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `GET /api/v1/query/guilds/{guild_id}/leaderboard?limit=n`
    pub async fn leaderboard(
        &self,
        guild_id: i64,
        limit: u32,
    ) -> Result<LeaderboardResponse, ClientError> {
        let url = self.base_url.join(&format!(
            "/api/v1/query/guilds/{guild_id}/leaderboard?limit={limit}"
        ))?;
        self.signed_get(url).await
    }

    /// `GET /api/v1/query/guilds/{guild_id}/participants/{user_id}`
    pub async fn participant(
        &self,
        guild_id: i64,
        user_id: i64,
    ) -> Result<ParticipantSnapshot, ClientError> {
        let url = self.base_url.join(&format!(
            "/api/v1/query/guilds/{guild_id}/participants/{user_id}"
        ))?;
        self.signed_get(url).await
    }

    /// `GET /api/v1/query/guilds/{guild_id}/participants/{user_id}/history?limit=n`
    pub async fn price_history(
        &self,
        guild_id: i64,
        user_id: i64,
        limit: u32,
    ) -> Result<PriceHistoryResponse, ClientError> {
        let url = self.base_url.join(&format!(
            "/api/v1/query/guilds/{guild_id}/participants/{user_id}/history?limit={limit}"
        ))?;
        self.signed_get(url).await
    }

    async fn signed_get<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
    ) -> Result<T, ClientError> {
        let url_str = url.to_string();
        let signature = sign_url(&url_str, &self.secret);

        let resp = self
            .http
            .get(url)
            .header(SIGNATURE_HEADER, signature)
            .header(SIGNED_URL_HEADER, url_str)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, body });
        }
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(ClientError::Json)
    }
}
