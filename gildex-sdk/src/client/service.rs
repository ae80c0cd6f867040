//! Service API client (platform gateway → Gildex server).
//!
//! All requests use body-signed HMAC-SHA256 authentication via
//! [`SignedObject`].

use reqwest::Client;
use url::Url;

use super::ClientError;
use crate::objects::activity::{ActivitySubmission, SubmitResponse};
use crate::objects::trade::{TradeReceipt, TradeRejection, TradeRequest};
use crate::signature::{SIGNATURE_HEADER, SignedObject};

/// Typed HTTP client for the Gildex **Service API**.
///
/// The service API is called by the platform gateway to submit activity
/// events and place trades on behalf of guild members. Every request body is
/// signed with `HMAC-SHA256("{timestamp}.{json}", service_secret)`.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: Client,
    base_url: Url,
    secret: Vec<u8>,
}

/// Result of a trade request: executed, or rejected by a business rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeOutcome {
    Executed(TradeReceipt),
    Rejected(TradeRejection),
}

impl ServiceClient {
    /// Create a new `ServiceClient`.
    ///
    /// * `base_url` – root URL of the Gildex server.
    /// * `service_secret` – the shared HMAC secret for body signing.
    pub fn new(base_url: Url, service_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            http: Client::new(),
            base_url,
            secret: service_secret.into(),
        }
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure timeouts or a proxy).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `POST /api/v1/service/events` – submit one activity event.
    ///
    /// The returned decision tells the gateway whether the event was
    /// enqueued (`accept`) or dropped by the admission gate.
    pub async fn submit_activity(
        &self,
        submission: ActivitySubmission,
    ) -> Result<SubmitResponse, ClientError> {
        let signed = SignedObject::new(submission, &self.secret).map_err(ClientError::Json)?;

        let url = self.base_url.join("/api/v1/service/events")?;

        let resp = self
            .http
            .post(url)
            .header(SIGNATURE_HEADER, signed.to_header())
            .body(signed.json)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?;

        parse_response(resp).await
    }

    /// `POST /api/v1/service/trades` – buy or sell holding units.
    ///
    /// Business-rule rejections (HTTP 422) are returned as
    /// [`TradeOutcome::Rejected`] rather than an error, since the gateway
    /// relays them verbatim to the user.
    pub async fn execute_trade(&self, request: TradeRequest) -> Result<TradeOutcome, ClientError> {
        let signed = SignedObject::new(request, &self.secret).map_err(ClientError::Json)?;

        let url = self.base_url.join("/api/v1/service/trades")?;

        let resp = self
            .http
            .post(url)
            .header(SIGNATURE_HEADER, signed.to_header())
            .body(signed.json)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            let bytes = resp.bytes().await?;
            let rejection: TradeRejection =
                serde_json::from_slice(&bytes).map_err(ClientError::Json)?;
            return Ok(TradeOutcome::Rejected(rejection));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, body });
        }
        let bytes = resp.bytes().await?;
        let receipt: TradeReceipt = serde_json::from_slice(&bytes).map_err(ClientError::Json)?;
        Ok(TradeOutcome::Executed(receipt))
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
