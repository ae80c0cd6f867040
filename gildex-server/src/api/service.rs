//! Service API handlers.
//!
//! These endpoints are called by the platform gateway and require a signed
//! body verified via the `Gildex-Signature` header.
//!
//! # Endpoints
//!
//! - `POST /events` – submit one activity event through the admission gate
//! - `POST /trades` – buy or sell holding units at the current price

use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::post};
use gildex_core::admission::AdmissionError;
use gildex_core::db::now_utc;
use gildex_core::engine::{TradeError, execute_trade};
use gildex_core::entities::Identity;
use gildex_core::entities::activity_queue::{ActivityQueue, QueuedBody};
use gildex_core::events::ActivityRecorded;
use gildex_sdk::objects::{
    ActivitySubmission, AdmitDecision, SubmitResponse, TradeRejection, TradeRejectionCode,
    TradeRequest,
};

use crate::api::extractors::SignedBody;
use crate::state::AppState;

/// Build the Service API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events", post(submit_event))
        .route("/trades", post(execute_trade_handler))
}

/// `POST /events` — run the admission gate and, on accept, enqueue.
///
/// Only `accept` enqueues. An enqueue failure after an accept is
/// best-effort telemetry loss: logged, and the accept decision is still
/// returned so the gateway does not retry a side effect that already
/// consumed the sender's rate budget.
async fn submit_event(
    state: axum::extract::State<AppState>,
    SignedBody(submission): SignedBody<ActivitySubmission>,
) -> Result<impl IntoResponse, ServiceApiError> {
    let decision = state
        .gate
        .admit(submission.guild_id, submission.user_id)
        .await?;

    if decision == AdmitDecision::Accept {
        let identity = Identity::new(submission.guild_id, submission.user_id);
        let body = QueuedBody {
            display_name: submission.display_name,
            payload: submission.payload,
        };
        match ActivityQueue::enqueue(&state.db, identity, &body, now_utc()).await {
            Ok(()) => {
                let _ = state.events.activity_recorded.try_send(ActivityRecorded {
                    guild_id: identity.guild_id,
                    user_id: identity.user_id,
                });
            }
            Err(e) => {
                tracing::warn!(identity = %identity, error = %e, "Enqueue failed, event lost");
            }
        }
    }

    Ok(Json(SubmitResponse { decision }))
}

/// `POST /trades` — execute one holdings trade.
///
/// Business-rule failures come back as HTTP 422 with a typed rejection
/// body the gateway can relay verbatim.
async fn execute_trade_handler(
    state: axum::extract::State<AppState>,
    SignedBody(request): SignedBody<TradeRequest>,
) -> Result<axum::response::Response, ServiceApiError> {
    match execute_trade(&state.db, &request).await {
        Ok(receipt) => Ok(Json(receipt).into_response()),
        Err(TradeError::Database(e)) => Err(ServiceApiError::Database(e)),
        Err(rejection) => {
            let code = match &rejection {
                TradeError::MissingParticipant { .. } => TradeRejectionCode::MissingParticipant,
                TradeError::InvalidQuantity => TradeRejectionCode::InvalidQuantity,
                TradeError::InsufficientBalance { .. } => TradeRejectionCode::InsufficientBalance,
                TradeError::InsufficientUnits { .. } => TradeRejectionCode::InsufficientUnits,
                TradeError::SupplyExhausted { .. } => TradeRejectionCode::SupplyExhausted,
                TradeError::PriceBoundExceeded { .. } | TradeError::Database(_) => {
                    TradeRejectionCode::PriceBoundExceeded
                }
            };
            let body = TradeRejection {
                code,
                message: rejection.to_string(),
            };
            Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response())
        }
    }
}

/// Errors that can occur in Service API handlers.
#[derive(Debug)]
enum ServiceApiError {
    /// A database query failed.
    Database(sqlx::Error),
}

impl From<AdmissionError> for ServiceApiError {
    fn from(err: AdmissionError) -> Self {
        match err {
            AdmissionError::Database(e) => Self::Database(e),
        }
    }
}

impl IntoResponse for ServiceApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ServiceApiError::Database(e) => {
                tracing::error!(error = %e, "Service API database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
        }
    }
}
