//! The aggregation and pricing engine.
//!
//! - `scoring`: event → points, and the per-flush modifier resolution
//! - `pricer`: pure price-update and decay math
//! - `net_worth`: the derived-net-worth ledger and leaderboard publishing
//! - `aggregator`: the batch flush loop draining the activity queue
//! - `portfolio`: holdings trades with typed business-rule rejections
//! - `decay`: the periodic decay sweep job
//! - `resync`: the periodic leaderboard full-resync job

pub mod aggregator;
pub mod decay;
pub mod net_worth;
pub mod portfolio;
pub mod pricer;
pub mod resync;
pub mod scoring;

pub use aggregator::{Aggregator, FlushError, FlushOutcome};
pub use decay::DecaySweepJob;
pub use portfolio::{TradeError, execute_trade};
pub use resync::LeaderboardResyncJob;
pub use scoring::EffectiveModifiers;
