//! Event scoring and per-flush modifier resolution.
//!
//! Modifier checks happen exactly once per participant per flush: the
//! resolution step folds every active modifier (and the valuation's own
//! freeze column) into an [`EffectiveModifiers`] value that scoring and the
//! pricer consume uniformly, instead of re-checking expiry at each site.

use crate::config::EconomyConfig;
use crate::entities::ModifierKind;
use gildex_sdk::objects::ActivityPayload;
use rust_decimal::Decimal;
use std::collections::HashSet;

/// The resolved effect of a participant's active modifiers for one flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveModifiers {
    /// Multiplier applied to the participant's batch point total.
    pub score_multiplier: Decimal,
    /// Volatility pinned to the ceiling for this update.
    pub amplified_volatility: bool,
    /// Positive deltas get the growth penalty multiplier.
    pub suppressed_growth: bool,
    /// Protected from the decay sweep (scored growth still applies).
    pub frozen: bool,
}

impl Default for EffectiveModifiers {
    fn default() -> Self {
        Self {
            score_multiplier: Decimal::ONE,
            amplified_volatility: false,
            suppressed_growth: false,
            frozen: false,
        }
    }
}

/// Fold active modifier kinds and the valuation freeze column into one
/// effective-parameters value.
///
/// `kinds` must already be filtered to unexpired modifiers (the batch
/// lookup does this in SQL); `freeze_until` is compared against `now` here
/// since it lives on the valuation row, not in the modifier set.
pub fn resolve_modifiers(
    config: &EconomyConfig,
    kinds: &[ModifierKind],
    freeze_until: Option<time::PrimitiveDateTime>,
    now: time::PrimitiveDateTime,
) -> EffectiveModifiers {
    let mut effective = EffectiveModifiers::default();

    if freeze_until.is_some_and(|until| until > now) {
        effective.frozen = true;
    }

    for kind in kinds {
        match kind {
            ModifierKind::AmplifiedScoring => {
                effective.score_multiplier = config.amplified_score_multiplier;
            }
            ModifierKind::AmplifiedVolatility => effective.amplified_volatility = true,
            ModifierKind::GrowthFreeze => effective.frozen = true,
            ModifierKind::SuppressedGrowth => effective.suppressed_growth = true,
        }
    }

    effective
}

/// Points contributed by a single event.
pub fn event_points(config: &EconomyConfig, payload: &ActivityPayload) -> Decimal {
    match payload {
        ActivityPayload::Message { length, .. } => {
            let capped = (*length).min(config.message_length_cap);
            Decimal::from(capped) / Decimal::from(config.message_divisor)
        }
        ActivityPayload::VoiceMinute { minutes } => {
            Decimal::from((*minutes).max(0)) * config.voice_minute_points
        }
        ActivityPayload::ReactionReceived => config.reaction_points,
    }
}

/// Point total for one participant's batch, with the score multiplier
/// applied and copy-paste duplicates dropped.
///
/// Messages carrying the same content fingerprint count once per batch;
/// events without a fingerprint are never deduplicated.
pub fn score_batch(
    config: &EconomyConfig,
    payloads: &[ActivityPayload],
    effective: &EffectiveModifiers,
) -> Decimal {
    let mut seen_fingerprints: HashSet<&str> = HashSet::new();
    let mut total = Decimal::ZERO;

    for payload in payloads {
        if let ActivityPayload::Message {
            fingerprint: Some(fingerprint),
            ..
        } = payload
        {
            if !seen_fingerprints.insert(fingerprint.as_str()) {
                continue;
            }
        }
        total += event_points(config, payload);
    }

    total * effective.score_multiplier
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn config() -> EconomyConfig {
        EconomyConfig::default()
    }

    fn message(length: u32) -> ActivityPayload {
        ActivityPayload::Message {
            length,
            fingerprint: None,
        }
    }

    fn now() -> time::PrimitiveDateTime {
        time::PrimitiveDateTime::new(
            time::Date::from_calendar_date(2024, time::Month::March, 1).unwrap(),
            time::Time::from_hms(12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn message_points_are_halved_length() {
        assert_eq!(event_points(&config(), &message(50)), dec("25"));
        assert_eq!(event_points(&config(), &message(35)), dec("17.5"));
    }

    #[test]
    fn message_length_is_capped() {
        assert_eq!(event_points(&config(), &message(200)), dec("100"));
        assert_eq!(event_points(&config(), &message(5000)), dec("100"));
    }

    #[test]
    fn voice_and_reaction_points() {
        assert_eq!(
            event_points(&config(), &ActivityPayload::VoiceMinute { minutes: 3 }),
            dec("15")
        );
        assert_eq!(
            event_points(&config(), &ActivityPayload::ReactionReceived),
            dec("2")
        );
        // A negative magnitude from a confused producer scores nothing.
        assert_eq!(
            event_points(&config(), &ActivityPayload::VoiceMinute { minutes: -2 }),
            dec("0")
        );
    }

    #[test]
    fn amplified_scoring_doubles_the_batch_total() {
        let cfg = config();
        let payloads = vec![message(50), ActivityPayload::ReactionReceived];
        let base = score_batch(&cfg, &payloads, &EffectiveModifiers::default());
        assert_eq!(base, dec("27"));

        let amplified = EffectiveModifiers {
            score_multiplier: cfg.amplified_score_multiplier,
            ..EffectiveModifiers::default()
        };
        assert_eq!(score_batch(&cfg, &payloads, &amplified), dec("54"));
    }

    #[test]
    fn duplicate_fingerprints_count_once() {
        let cfg = config();
        let spam = ActivityPayload::Message {
            length: 100,
            fingerprint: Some("deadbeef".into()),
        };
        let payloads = vec![spam.clone(), spam.clone(), spam, message(100)];
        // Two of the three fingerprinted copies are dropped.
        assert_eq!(
            score_batch(&cfg, &payloads, &EffectiveModifiers::default()),
            dec("100")
        );
    }

    #[test]
    fn modifier_kinds_map_to_effects() {
        let cfg = config();
        let effective = resolve_modifiers(
            &cfg,
            &[
                ModifierKind::AmplifiedScoring,
                ModifierKind::AmplifiedVolatility,
                ModifierKind::SuppressedGrowth,
            ],
            None,
            now(),
        );
        assert_eq!(effective.score_multiplier, cfg.amplified_score_multiplier);
        assert!(effective.amplified_volatility);
        assert!(effective.suppressed_growth);
        assert!(!effective.frozen);

        let frozen = resolve_modifiers(&cfg, &[ModifierKind::GrowthFreeze], None, now());
        assert!(frozen.frozen);
    }

    #[test]
    fn valuation_freeze_column_counts_as_frozen() {
        let cfg = config();
        let future = now() + time::Duration::hours(1);
        let past = now() - time::Duration::hours(1);

        assert!(resolve_modifiers(&cfg, &[], Some(future), now()).frozen);
        assert!(!resolve_modifiers(&cfg, &[], Some(past), now()).frozen);
    }
}
