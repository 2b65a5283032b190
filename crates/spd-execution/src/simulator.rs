//! Fill simulation against the synthetic feed.
//!
//! Pure price arithmetic: the engine reads the current price once, draws
//! the baseline slippage from the feed's seeded RNG, and calls in here.
//! Slippage is always adverse to the trader's side and is recorded on the
//! execution separately from commission.

use crate::types::{OrderKind, Side};

/// What a trigger evaluation decided for a resting (or just-submitted)
/// order at the current price.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FillDecision {
    /// Condition not met; order keeps resting.
    None,
    /// Limit condition crossed: fill the full remainder, zero slippage.
    /// The fill price is the caller's choice of sampling policy: a
    /// marketable *arrival* improves to the current price
    /// ([`limit_fill_price`]), while a resting order discovered crossed by
    /// the sweep fills at the limit itself — the cross happened somewhere
    /// between samples and pricing it off the later sample would be
    /// look-ahead.
    FillAtLimit { limit_price_micros: i64 },
    /// Market order, or a stop whose trigger fired: fill at current price
    /// plus adverse slippage.
    FillAsMarket,
    /// Stop-limit trigger fired: the order converts into a working limit —
    /// no fill on this evaluation.
    ConvertedToLimit,
}

/// Baseline slippage scaled by order size: larger orders get
/// proportionally more adverse ticks. `base_ticks` is drawn uniformly in
/// `0..=slippage_base_ticks_max` from the symbol's RNG.
pub fn effective_slippage_ticks(base_ticks: i64, qty: i64, size_step: i64) -> i64 {
    let step = size_step.max(1);
    base_ticks * (1 + qty / step)
}

/// Market fill: current price moved against the trader by `slip_ticks`.
/// Returns `(fill_price_micros, slippage_micros)`. The sell side floors at
/// one tick so a simulated price can never go non-positive.
pub fn market_fill_price(
    side: Side,
    current_micros: i64,
    slip_ticks: i64,
    tick_size_micros: i64,
) -> (i64, i64) {
    let slip = slip_ticks * tick_size_micros;
    match side {
        Side::Buy => (current_micros + slip, slip),
        Side::Sell => {
            let px = (current_micros - slip).max(tick_size_micros);
            (px, current_micros - px)
        }
    }
}

/// Has price crossed the limit favorably? Buy: price at or under the
/// limit; sell: at or over.
pub fn limit_crossed(side: Side, current_micros: i64, limit_micros: i64) -> bool {
    match side {
        Side::Buy => current_micros <= limit_micros,
        Side::Sell => current_micros >= limit_micros,
    }
}

/// Better of limit price and current price — the fill price for a limit
/// that is marketable on arrival (or just converted from a stop-limit).
pub fn limit_fill_price(side: Side, current_micros: i64, limit_micros: i64) -> i64 {
    match side {
        Side::Buy => current_micros.min(limit_micros),
        Side::Sell => current_micros.max(limit_micros),
    }
}

/// Stop trigger: price crossing the stop level in the adverse-confirming
/// direction. Buy stop: price at or above; sell stop: at or below.
pub fn stop_triggered(side: Side, current_micros: i64, stop_micros: i64) -> bool {
    match side {
        Side::Buy => current_micros >= stop_micros,
        Side::Sell => current_micros <= stop_micros,
    }
}

/// Recompute a trailing stop level: `current ∓ trail`, ratcheting only in
/// the trader's favor (a sell trail only rises, a buy trail only falls).
/// Pass `None` for the first computation at submission time.
pub fn ratchet_trailing_stop(
    side: Side,
    current_micros: i64,
    trail_micros: i64,
    current_stop_micros: Option<i64>,
) -> i64 {
    match side {
        Side::Sell => {
            let candidate = current_micros - trail_micros;
            match current_stop_micros {
                Some(stop) => stop.max(candidate),
                None => candidate,
            }
        }
        Side::Buy => {
            let candidate = current_micros + trail_micros;
            match current_stop_micros {
                Some(stop) => stop.min(candidate),
                None => candidate,
            }
        }
    }
}

/// Evaluate one resting order against the current price, mutating the
/// order kind in place where the evaluation itself changes it (trailing
/// ratchet, stop-limit conversion).
pub fn evaluate_trigger(kind: &mut OrderKind, side: Side, current_micros: i64) -> FillDecision {
    match *kind {
        OrderKind::Market => FillDecision::FillAsMarket,

        OrderKind::Limit { limit_price_micros } => {
            if limit_crossed(side, current_micros, limit_price_micros) {
                FillDecision::FillAtLimit { limit_price_micros }
            } else {
                FillDecision::None
            }
        }

        OrderKind::Stop { stop_price_micros } => {
            if stop_triggered(side, current_micros, stop_price_micros) {
                FillDecision::FillAsMarket
            } else {
                FillDecision::None
            }
        }

        OrderKind::StopLimit {
            stop_price_micros,
            limit_price_micros,
        } => {
            if stop_triggered(side, current_micros, stop_price_micros) {
                // Conversion, not a fill: the order becomes a plain working
                // limit at the original limit price.
                *kind = OrderKind::Limit { limit_price_micros };
                FillDecision::ConvertedToLimit
            } else {
                FillDecision::None
            }
        }

        OrderKind::TrailingStop {
            trail_micros,
            stop_price_micros,
        } => {
            if stop_triggered(side, current_micros, stop_price_micros) {
                return FillDecision::FillAsMarket;
            }
            let ratcheted =
                ratchet_trailing_stop(side, current_micros, trail_micros, Some(stop_price_micros));
            *kind = OrderKind::TrailingStop {
                trail_micros,
                stop_price_micros: ratcheted,
            };
            FillDecision::None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: i64 = 250_000;
    const PX: i64 = 5_100_000_000;

    #[test]
    fn slippage_scales_with_size() {
        assert_eq!(effective_slippage_ticks(2, 3, 10), 2);
        assert_eq!(effective_slippage_ticks(2, 10, 10), 4);
        assert_eq!(effective_slippage_ticks(2, 25, 10), 6);
        assert_eq!(effective_slippage_ticks(0, 100, 10), 0);
    }

    #[test]
    fn market_fill_is_adverse_both_sides() {
        let (buy_px, buy_slip) = market_fill_price(Side::Buy, PX, 2, TICK);
        assert_eq!(buy_px, PX + 2 * TICK);
        assert_eq!(buy_slip, 2 * TICK);

        let (sell_px, sell_slip) = market_fill_price(Side::Sell, PX, 2, TICK);
        assert_eq!(sell_px, PX - 2 * TICK);
        assert_eq!(sell_slip, 2 * TICK);
    }

    #[test]
    fn sell_slippage_floors_at_one_tick() {
        let (px, slip) = market_fill_price(Side::Sell, TICK, 5, TICK);
        assert_eq!(px, TICK);
        assert_eq!(slip, 0);
    }

    #[test]
    fn marketable_arrival_improves_to_current() {
        let limit = 5_150_000_000;
        let current = 5_148_000_000;
        assert!(limit_crossed(Side::Buy, current, limit));
        // Arriving buy limit above the market pays the market, not the limit.
        assert_eq!(limit_fill_price(Side::Buy, current, limit), current);
        assert_eq!(limit_fill_price(Side::Buy, limit, limit), limit);

        // Sell side: better means higher.
        assert_eq!(
            limit_fill_price(Side::Sell, 5_152_000_000, limit),
            5_152_000_000
        );
    }

    #[test]
    fn crossed_limit_reports_the_limit_for_sweep_pricing() {
        let mut kind = OrderKind::Limit {
            limit_price_micros: 5_150_000_000,
        };
        let d = evaluate_trigger(&mut kind, Side::Buy, 5_148_000_000);
        assert_eq!(
            d,
            FillDecision::FillAtLimit {
                limit_price_micros: 5_150_000_000
            }
        );
    }

    #[test]
    fn limit_not_crossed_keeps_resting() {
        let mut kind = OrderKind::Limit {
            limit_price_micros: 5_150_000_000,
        };
        let d = evaluate_trigger(&mut kind, Side::Buy, 5_160_000_000);
        assert_eq!(d, FillDecision::None);
    }

    #[test]
    fn stop_triggers_in_the_adverse_confirming_direction() {
        assert!(stop_triggered(Side::Buy, PX, PX));
        assert!(stop_triggered(Side::Buy, PX + TICK, PX));
        assert!(!stop_triggered(Side::Buy, PX - TICK, PX));

        assert!(stop_triggered(Side::Sell, PX, PX));
        assert!(stop_triggered(Side::Sell, PX - TICK, PX));
        assert!(!stop_triggered(Side::Sell, PX + TICK, PX));
    }

    #[test]
    fn stop_limit_converts_instead_of_filling() {
        let mut kind = OrderKind::StopLimit {
            stop_price_micros: PX,
            limit_price_micros: PX + 4 * TICK,
        };
        let d = evaluate_trigger(&mut kind, Side::Buy, PX + TICK);
        assert_eq!(d, FillDecision::ConvertedToLimit);
        assert_eq!(
            kind,
            OrderKind::Limit {
                limit_price_micros: PX + 4 * TICK
            }
        );
    }

    #[test]
    fn trailing_stop_ratchets_only_in_favor() {
        // Sell trail protecting a long: stop rises with price, never falls.
        let trail = 8 * TICK;
        let stop0 = ratchet_trailing_stop(Side::Sell, PX, trail, None);
        assert_eq!(stop0, PX - trail);

        let up = ratchet_trailing_stop(Side::Sell, PX + 4 * TICK, trail, Some(stop0));
        assert_eq!(up, PX + 4 * TICK - trail);

        let down = ratchet_trailing_stop(Side::Sell, PX - 4 * TICK, trail, Some(up));
        assert_eq!(down, up, "trail must never loosen");

        // Buy trail mirrors: stop falls with price, never rises.
        let bstop0 = ratchet_trailing_stop(Side::Buy, PX, trail, None);
        assert_eq!(bstop0, PX + trail);
        let bdown = ratchet_trailing_stop(Side::Buy, PX - 4 * TICK, trail, Some(bstop0));
        assert_eq!(bdown, PX - 4 * TICK + trail);
        let bup = ratchet_trailing_stop(Side::Buy, PX + 4 * TICK, trail, Some(bdown));
        assert_eq!(bup, bdown);
    }

    #[test]
    fn trailing_stop_triggers_like_a_plain_stop() {
        let trail = 4 * TICK;
        let mut kind = OrderKind::TrailingStop {
            trail_micros: trail,
            stop_price_micros: PX - trail,
        };
        // Price falls to the trail level: market fill.
        let d = evaluate_trigger(&mut kind, Side::Sell, PX - trail);
        assert_eq!(d, FillDecision::FillAsMarket);
    }

    #[test]
    fn trailing_evaluation_ratchets_in_place() {
        let trail = 4 * TICK;
        let mut kind = OrderKind::TrailingStop {
            trail_micros: trail,
            stop_price_micros: PX - trail,
        };
        let d = evaluate_trigger(&mut kind, Side::Sell, PX + 2 * TICK);
        assert_eq!(d, FillDecision::None);
        assert_eq!(kind.stop_price(), Some(PX + 2 * TICK - trail));
    }
}
