//! Wire objects shared between the server and its API consumers.
//!
//! These types define the JSON bodies of the Service, Query, and Admin APIs.
//! The server converts between these and its database models at the handler
//! boundary; the platform gateway and presentation layers consume them
//! through the clients in [`crate::client`].

pub mod activity;
pub mod admin;
pub mod economy;
pub mod trade;

pub use activity::{ActivityPayload, ActivitySubmission, AdmitDecision, SubmitResponse};
pub use admin::{AdminParticipantView, OverwriteRequest, RemoveResponse, ResyncResponse};
pub use economy::{
    HoldingView, LeaderboardResponse, LeaderboardRow, ParticipantSnapshot, PriceHistoryPoint,
    PriceHistoryResponse,
};
pub use trade::{TradeReceipt, TradeRejection, TradeRejectionCode, TradeRequest, TradeSide};
