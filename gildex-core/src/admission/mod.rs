//! Admission control: the per-identity rate limiter and flood jail.
//!
//! The decision algorithm is a pure function over a [`GateState`]; the
//! Postgres-backed [`gate::AdmissionGate`] loads the state under a row
//! lock, applies it, and writes back, so each call is one atomic unit
//! with no read-modify-write window across concurrent callers.

pub mod gate;

pub use gate::{AdmissionError, AdmissionGate};

use crate::config::RateLimitConfig;
use gildex_sdk::objects::AdmitDecision;

/// Coordination key for one identity's gate state.
///
/// Part of the shared key-namespace contract: `rate:{guild}:{identity}`.
pub fn rate_key(guild_id: i64, user_id: i64) -> String {
    format!("rate:{guild_id}:{user_id}")
}

/// Mutable admission state for one (guild, identity) pair.
///
/// All fields are unix-millisecond timestamps; expiry is a comparison
/// against `now`, so stale state needs no sweeper to stay correct.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateState {
    /// Sliding window of recent submission timestamps, oldest first.
    pub window: Vec<i64>,
    pub jailed_until: Option<i64>,
    pub cooldown_until: Option<i64>,
}

/// Apply one submission to the gate state and return the decision.
///
/// Order matters and follows the admission contract: active jail first,
/// then the window append + flood check, then the cooldown flag.
pub fn decide(state: &mut GateState, now_ms: i64, config: &RateLimitConfig) -> AdmitDecision {
    if state.jailed_until.is_some_and(|until| until > now_ms) {
        return AdmitDecision::Jailed;
    }

    state.window.push(now_ms);
    let len = state.window.len();
    if len > config.window_size {
        state.window.drain(..len - config.window_size);
    }

    if state.window.len() == config.window_size {
        let span = now_ms - state.window[0];
        if span < config.min_window_span_millis() {
            state.jailed_until = Some(now_ms + config.jail_ttl_millis());
            return AdmitDecision::TriggerJail;
        }
    }

    if state.cooldown_until.is_some_and(|until| until > now_ms) {
        return AdmitDecision::Cooldown;
    }

    state.cooldown_until = Some(now_ms + config.cooldown_ttl_millis());
    AdmitDecision::Accept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RateLimitConfig {
        RateLimitConfig::default()
    }

    #[test]
    fn sixth_rapid_call_triggers_jail_and_seventh_is_jailed() {
        let cfg = config();
        let mut state = GateState::default();

        // Six calls spaced 4s apart: each clears the 3s cooldown, and the
        // full window spans 20s, under the 30s anti-flood threshold.
        let mut now = 0;
        for i in 0..5 {
            let decision = decide(&mut state, now, &cfg);
            assert_eq!(decision, AdmitDecision::Accept, "call {i}");
            now += 4_000;
        }
        assert_eq!(decide(&mut state, now, &cfg), AdmitDecision::TriggerJail);

        // Immediately after, the jail flag is active.
        assert_eq!(decide(&mut state, now + 100, &cfg), AdmitDecision::Jailed);
    }

    #[test]
    fn jail_expires_after_ttl() {
        let cfg = config();
        let mut state = GateState::default();

        let mut now = 0;
        for _ in 0..5 {
            decide(&mut state, now, &cfg);
            now += 4_000;
        }
        assert_eq!(decide(&mut state, now, &cfg), AdmitDecision::TriggerJail);

        let after_jail = now + cfg.jail_ttl_millis() + 1;
        let decision = decide(&mut state, after_jail, &cfg);
        assert_ne!(decision, AdmitDecision::Jailed);
        assert!(matches!(
            decision,
            AdmitDecision::Accept | AdmitDecision::Cooldown
        ));
    }

    #[test]
    fn second_call_inside_cooldown_is_rejected_without_flag_refresh() {
        let cfg = config();
        let mut state = GateState::default();

        assert_eq!(decide(&mut state, 0, &cfg), AdmitDecision::Accept);
        assert_eq!(decide(&mut state, 1_000, &cfg), AdmitDecision::Cooldown);
        // The cooldown flag was not extended by the rejected call.
        assert_eq!(state.cooldown_until, Some(cfg.cooldown_ttl_millis()));
        assert_eq!(decide(&mut state, 3_001, &cfg), AdmitDecision::Accept);
    }

    #[test]
    fn window_is_trimmed_to_size() {
        let cfg = config();
        let mut state = GateState::default();

        let mut now = 0;
        for _ in 0..20 {
            decide(&mut state, now, &cfg);
            // Spaced widely enough never to trip the flood check.
            now += 10_000;
        }
        assert_eq!(state.window.len(), cfg.window_size);
        // Oldest entries were evicted.
        assert_eq!(state.window[0], now - 10_000 * cfg.window_size as i64);
    }

    #[test]
    fn slow_full_window_does_not_jail() {
        let cfg = config();
        let mut state = GateState::default();

        let mut now = 0;
        for _ in 0..12 {
            let decision = decide(&mut state, now, &cfg);
            assert_ne!(decision, AdmitDecision::TriggerJail);
            assert_ne!(decision, AdmitDecision::Jailed);
            now += cfg.min_window_span_millis();
        }
    }

    #[test]
    fn rate_key_namespace() {
        assert_eq!(rate_key(42, 7), "rate:42:7");
    }
}
