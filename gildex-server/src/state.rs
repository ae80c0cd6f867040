//! Application state shared across all request handlers.

use crate::config::runtime::SharedConfig;
use gildex_core::admission::AdmissionGate;
use gildex_core::events::EventSenders;
use sqlx::PgPool;

/// Application state that is shared across all request handlers.
///
/// Cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Runtime configuration (reloaded via SIGHUP).
    pub config: SharedConfig,
    /// The shared admission gate for the ingestion path.
    pub gate: AdmissionGate,
    /// In-process event senders (flush nudges).
    pub events: EventSenders,
}

impl AppState {
    pub fn new(
        db: PgPool,
        config: SharedConfig,
        gate: AdmissionGate,
        events: EventSenders,
    ) -> Self {
        Self {
            db,
            config,
            gate,
            events,
        }
    }
}
