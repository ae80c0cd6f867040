//! Activity ingestion wire objects (Service API).

use crate::signature::Signature;
use serde::{Deserialize, Serialize};

/// A single observed activity event submitted by the platform gateway.
///
/// Only the submission envelope is validated at the HTTP boundary; the
/// payload itself is re-validated when the aggregator drains it from the
/// queue, so a stale gateway cannot poison the scoring path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySubmission {
    pub guild_id: i64,
    pub user_id: i64,
    /// Display name as currently known by the gateway. Used when the
    /// participant is created on first sight; ignored afterwards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub payload: ActivityPayload,
}

impl Signature for ActivitySubmission {}

/// Closed set of scorable activity kinds.
///
/// The `kind` discriminant is required; an unknown discriminant fails
/// deserialization at the validation boundary instead of defaulting
/// silently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityPayload {
    /// A chat message; `length` is the character count.
    Message {
        length: u32,
        /// Content fingerprint used to drop copy-paste duplicates within a
        /// scoring batch.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fingerprint: Option<String>,
    },
    /// Voice presence, pre-scaled by the producer to whole minutes.
    VoiceMinute { minutes: i64 },
    /// A reaction received on one of the participant's messages.
    ReactionReceived,
}

/// Outcome of the admission gate for one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmitDecision {
    /// Event accepted and enqueued for scoring.
    Accept,
    /// A recent accept is still inside its cooldown window; event dropped.
    Cooldown,
    /// Sender is under an active flood penalty; event dropped.
    Jailed,
    /// This submission tripped the anti-flood threshold and started the
    /// penalty; event dropped.
    TriggerJail,
}

/// Response body for `POST /service/events`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub decision: AdmitDecision,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_kind_discriminant_round_trip() {
        let payload = ActivityPayload::Message {
            length: 50,
            fingerprint: Some("abcd".into()),
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains(r#""kind":"message""#));
        let back: ActivityPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let json = r#"{"kind":"emoji_spam","length":3}"#;
        assert!(serde_json::from_str::<ActivityPayload>(json).is_err());
    }

    #[test]
    fn missing_kind_is_rejected() {
        let json = r#"{"length":3}"#;
        assert!(serde_json::from_str::<ActivityPayload>(json).is_err());
    }
}
