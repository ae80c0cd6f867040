//! Admin API wire objects.

use crate::signature::Signature;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Request body for `POST /admin/participants/overwrite`.
///
/// Overwrites a participant's balance and/or net worth directly, bypassing
/// scoring. Omitted fields are left untouched. The server re-derives the
/// dependent leaderboard entry either way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverwriteRequest {
    pub guild_id: i64,
    pub user_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_worth: Option<Decimal>,
}

impl Signature for OverwriteRequest {}

/// Participant view returned by admin mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminParticipantView {
    pub guild_id: i64,
    pub user_id: i64,
    pub display_name: String,
    pub balance: Decimal,
    pub net_worth: Decimal,
}

/// Response body for an admin-triggered leaderboard resync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResyncResponse {
    pub guild_id: i64,
    /// Number of leaderboard entries rewritten.
    pub entries: u64,
}

/// Response body for participant/guild removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveResponse {
    /// Number of participants removed (holdings cascade with them).
    pub removed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrite_request_omits_untouched_fields() {
        let req = OverwriteRequest {
            guild_id: 1,
            user_id: 2,
            balance: Some(Decimal::new(12_345, 2)),
            net_worth: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""balance":"123.45""#));
        assert!(!json.contains("net_worth"));

        let back: OverwriteRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, req);
    }
}
