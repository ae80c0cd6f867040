//! Pure valuation-update math.
//!
//! Nothing here touches the database; the aggregator and the decay sweep
//! feed current state in and write the results back. Prices and deltas are
//! `Decimal` throughout — floating point appears only inside the log10
//! score compression, which never touches money directly.

use crate::config::EconomyConfig;
use crate::engine::scoring::EffectiveModifiers;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Effective volatility for one update.
///
/// The amplified-volatility modifier pins volatility to the ceiling.
/// Otherwise, prices above the damping threshold get `base / log10(price)`
/// so high-priced instruments grow more slowly in relative terms. The
/// result is always clamped to the configured `[floor, ceiling]` band.
pub fn effective_volatility(
    config: &EconomyConfig,
    current_price: Decimal,
    base_volatility: Decimal,
    amplified: bool,
) -> Decimal {
    let vol = if amplified {
        config.volatility_ceiling
    } else if current_price > config.damping_threshold {
        let price = current_price.to_f64().unwrap_or(f64::MAX);
        let damped = base_volatility.to_f64().unwrap_or(0.0) / price.log10();
        Decimal::from_f64(damped).unwrap_or(base_volatility)
    } else {
        base_volatility
    };
    vol.clamp(config.volatility_floor, config.volatility_ceiling)
}

/// Log-compress a point total: `log10(score + 1)`.
pub fn compress_score(score: Decimal) -> Decimal {
    let raw = score.to_f64().unwrap_or(0.0).max(0.0);
    Decimal::from_f64((raw + 1.0).log10()).unwrap_or(Decimal::ZERO)
}

/// Compute the new price for a participant with a nonzero batch score.
///
/// `delta = price × volatility × log10(score + 1) × dampening`, clamped to
/// at least one tick so any nonzero score moves the price visibly, capped
/// at doubling per update, floored at the minimum price. A freeze does not
/// suppress scored growth — it only shields against decay.
pub fn update_price(
    config: &EconomyConfig,
    current_price: Decimal,
    base_volatility: Decimal,
    score: Decimal,
    effective: &EffectiveModifiers,
) -> Decimal {
    if score <= Decimal::ZERO {
        return current_price;
    }

    let volatility =
        effective_volatility(config, current_price, base_volatility, effective.amplified_volatility);
    let compressed = compress_score(score);

    let mut delta = current_price * volatility * compressed * config.dampening_factor;
    if effective.suppressed_growth {
        delta *= config.suppressed_growth_penalty;
    }
    let mut delta = round_money(delta);
    if delta < config.min_tick {
        delta = config.min_tick;
    }

    let capped = (current_price + delta).min(current_price * config.growth_cap_ratio);
    round_money(capped.max(config.min_price))
}

/// One decay step for an inactive participant's price.
///
/// The caller is responsible for skipping frozen valuations entirely.
pub fn decay_price(config: &EconomyConfig, current_price: Decimal) -> Decimal {
    let decayed = round_money(current_price * (Decimal::ONE - config.decay_rate));
    decayed.max(config.min_price)
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

    #[test]
    fn single_message_scenario() {
        // balance 100, price 10.00, volatility 0.1, one message of length
        // 50 => score 25, log10(26) ~ 1.415, delta ~ 0.354 => 10.35.
        let new_price = update_price(
            &config(),
            dec("10.00"),
            dec("0.10"),
            dec("25"),
            &EffectiveModifiers::default(),
        );
        assert_eq!(new_price, dec("10.35"));
    }

    #[test]
    fn nonzero_score_always_moves_at_least_one_tick() {
        let cfg = config();
        let new_price = update_price(
            &cfg,
            dec("1.00"),
            dec("0.10"),
            dec("0.01"),
            &EffectiveModifiers::default(),
        );
        assert_eq!(new_price, dec("1.01"));
    }

    #[test]
    fn zero_score_leaves_price_untouched() {
        let cfg = config();
        let price = dec("12.34");
        assert_eq!(
            update_price(&cfg, price, dec("0.10"), Decimal::ZERO, &EffectiveModifiers::default()),
            price
        );
    }

    #[test]
    fn growth_is_capped_at_doubling() {
        let cfg = config();
        let effective = EffectiveModifiers {
            amplified_volatility: true,
            ..EffectiveModifiers::default()
        };
        // Astronomical score (1e27): even log-compressed, the uncapped
        // delta exceeds the doubling cap.
        let new_price = update_price(
            &cfg,
            dec("1.00"),
            dec("0.10"),
            dec("1000000000000000000000000000"),
            &effective,
        );
        assert_eq!(new_price, dec("2.00"));
    }

    #[test]
    fn suppressed_growth_halves_the_delta() {
        let cfg = config();
        let effective = EffectiveModifiers {
            suppressed_growth: true,
            ..EffectiveModifiers::default()
        };
        // Unsuppressed delta is 0.35; the 0.5 penalty lands at 0.18.
        let new_price = update_price(&cfg, dec("10.00"), dec("0.10"), dec("25"), &effective);
        assert_eq!(new_price, dec("10.18"));
    }

    #[test]
    fn price_and_volatility_stay_in_bounds_for_any_inputs() {
        let cfg = config();
        let prices = ["1.00", "10.00", "99.99", "100.01", "5000.00"];
        let scores = ["0", "0.5", "1", "25", "10000", "999999999"];
        let flag_sets = [
            EffectiveModifiers::default(),
            EffectiveModifiers {
                amplified_volatility: true,
                ..EffectiveModifiers::default()
            },
            EffectiveModifiers {
                suppressed_growth: true,
                ..EffectiveModifiers::default()
            },
            EffectiveModifiers {
                amplified_volatility: true,
                suppressed_growth: true,
                frozen: true,
                ..EffectiveModifiers::default()
            },
        ];

        for price in prices {
            let price = dec(price);
            for score in scores {
                for effective in &flag_sets {
                    let vol =
                        effective_volatility(&cfg, price, dec("0.10"), effective.amplified_volatility);
                    assert!(vol >= cfg.volatility_floor && vol <= cfg.volatility_ceiling);

                    let new_price = update_price(&cfg, price, dec("0.10"), dec(score), effective);
                    assert!(new_price >= cfg.min_price, "floor violated at {price}/{score}");
                    assert!(
                        new_price <= price * cfg.growth_cap_ratio,
                        "cap violated at {price}/{score}"
                    );
                }
            }
        }
    }

    #[test]
    fn high_prices_are_log_damped() {
        let cfg = config();
        // At 1000.00 the damping divides base volatility by 3.
        let vol = effective_volatility(&cfg, dec("1000.00"), dec("0.10"), false);
        assert!(vol < dec("0.04"));
        assert!(vol >= cfg.volatility_floor);

        // Below the threshold the base passes through.
        assert_eq!(effective_volatility(&cfg, dec("50.00"), dec("0.10"), false), dec("0.10"));
    }

    #[test]
    fn two_decay_cycles_compound_and_floor_holds() {
        let cfg = config();
        let first = decay_price(&cfg, dec("10.00"));
        assert_eq!(first, dec("9.80"));
        let second = decay_price(&cfg, first);
        assert_eq!(second, dec("9.60"));

        // Near the floor, decay clamps instead of dropping below 1.00.
        assert_eq!(decay_price(&cfg, dec("1.01")), dec("1.00"));
        assert_eq!(decay_price(&cfg, dec("1.00")), dec("1.00"));
    }
}
