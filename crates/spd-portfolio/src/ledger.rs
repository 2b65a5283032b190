use crate::types::{ContractEconomics, Fill, PositionState};

fn i128_to_i64_clamp(x: i128) -> i64 {
    if x > i64::MAX as i128 {
        i64::MAX
    } else if x < i64::MIN as i128 {
        i64::MIN
    } else {
        x as i64
    }
}

/// Dollar PnL (micros) for `closed` contracts between `entry` and `exit`,
/// from the perspective of a position that was long (`long == true`) or
/// short. One tick of favorable movement earns `tick_value_micros` per
/// contract.
fn price_pnl_micros(closed: i64, long: bool, exit_px: i64, entry_px: i64, econ: &ContractEconomics) -> i64 {
    let diff = if long {
        exit_px as i128 - entry_px as i128
    } else {
        entry_px as i128 - exit_px as i128
    };
    let gross = closed as i128 * diff * econ.tick_value_micros as i128 / econ.tick_size_micros as i128;
    i128_to_i64_clamp(gross)
}

/// What one execution did to the position, plus the deltas the caller
/// applies to the account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Applied {
    /// Contracts closed out of the pre-existing quantity.
    pub closed_qty: i64,
    /// Contracts added (same direction, or the reopened leg of a reversal).
    pub opened_qty: i64,
    /// Price PnL on the closed portion, before any costs.
    pub gross_pnl_micros: i64,
    /// Change to the position's reported realized PnL: gross minus the
    /// released cost carry minus this execution's own costs. Zero on adds.
    pub realized_delta_micros: i64,
    /// Change to the account balance: gross price PnL minus this
    /// execution's costs. Costs hit the balance on every execution; the
    /// carry release does not (it was debited when the add happened).
    pub balance_delta_micros: i64,
}

/// Apply one execution to the position.
///
/// - same direction (or flat): grows the position; the weighted average
///   entry price moves, realized PnL does not
/// - opposite direction, `qty <= |position|`: reduces; realized PnL moves,
///   the average entry price of the remainder does not
/// - opposite direction, `qty > |position|`: reversal through zero —
///   full close of the old quantity followed by a fresh leg at the fill
///   price for the excess; all execution costs land on the closing leg
pub fn apply_execution(pos: &mut PositionState, fill: &Fill, econ: &ContractEconomics) -> Applied {
    debug_assert!(fill.qty > 0, "fill qty must be positive");
    debug_assert!(fill.price_micros > 0, "fill price must be positive");

    let delta = fill.side.signed(fill.qty);
    let costs = fill.cost_micros();

    match fill.side {
        crate::Side::Buy => pos.bought = pos.bought.saturating_add(fill.qty),
        crate::Side::Sell => pos.sold = pos.sold.saturating_add(fill.qty),
    }

    let same_direction = pos.qty_signed == 0 || (pos.qty_signed > 0) == (delta > 0);

    if same_direction {
        // Add: weighted average entry, no realized PnL.
        let old_abs = pos.abs_qty();
        let new_abs = old_abs + fill.qty;
        let weighted = old_abs as i128 * pos.avg_entry_price_micros as i128
            + fill.qty as i128 * fill.price_micros as i128;
        // Round to nearest micro.
        pos.avg_entry_price_micros = i128_to_i64_clamp((weighted + new_abs as i128 / 2) / new_abs as i128);
        pos.qty_signed += delta;
        pos.open = true;
        pos.open_cost_carry_micros = pos.open_cost_carry_micros.saturating_add(costs);

        return Applied {
            closed_qty: 0,
            opened_qty: fill.qty,
            gross_pnl_micros: 0,
            realized_delta_micros: 0,
            balance_delta_micros: -costs,
        };
    }

    let was_long = pos.qty_signed > 0;
    let held_abs = pos.abs_qty();

    if fill.qty <= held_abs {
        // Reduce: realize on the closed contracts, remainder keeps its
        // average entry price.
        let closed = fill.qty;
        let gross = price_pnl_micros(closed, was_long, fill.price_micros, pos.avg_entry_price_micros, econ);

        let released = if closed == held_abs {
            pos.open_cost_carry_micros
        } else {
            i128_to_i64_clamp(
                pos.open_cost_carry_micros as i128 * closed as i128 / held_abs as i128,
            )
        };

        let realized_delta = gross
            .saturating_sub(released)
            .saturating_sub(costs);

        pos.qty_signed += delta;
        pos.open_cost_carry_micros -= released;
        pos.realized_pnl_micros = pos.realized_pnl_micros.saturating_add(realized_delta);
        if pos.qty_signed == 0 {
            pos.open = false;
        }

        return Applied {
            closed_qty: closed,
            opened_qty: 0,
            gross_pnl_micros: gross,
            realized_delta_micros: realized_delta,
            balance_delta_micros: gross.saturating_sub(costs),
        };
    }

    // Reversal through zero: close everything held, realize on it, then
    // open the excess in the new direction at the fill price. The whole
    // execution cost is assigned to the closing leg; the new leg starts
    // with zero cost carry.
    let closed = held_abs;
    let excess = fill.qty - held_abs;
    let gross = price_pnl_micros(closed, was_long, fill.price_micros, pos.avg_entry_price_micros, econ);
    let released = pos.open_cost_carry_micros;
    let realized_delta = gross.saturating_sub(released).saturating_sub(costs);

    pos.qty_signed += delta; // lands on the excess, opposite sign
    debug_assert_eq!(pos.abs_qty(), excess);
    pos.avg_entry_price_micros = fill.price_micros;
    pos.open_cost_carry_micros = 0;
    pos.realized_pnl_micros = pos.realized_pnl_micros.saturating_add(realized_delta);
    pos.open = true;

    Applied {
        closed_qty: closed,
        opened_qty: excess,
        gross_pnl_micros: gross,
        realized_delta_micros: realized_delta,
        balance_delta_micros: gross.saturating_sub(costs),
    }
}

/// Unrealized PnL marked to `mark_micros`. Always recomputed fresh from
/// the current quantity and average entry — never accumulated.
pub fn unrealized_pnl_micros(pos: &PositionState, mark_micros: i64, econ: &ContractEconomics) -> i64 {
    if pos.qty_signed == 0 {
        return 0;
    }
    let diff = mark_micros as i128 - pos.avg_entry_price_micros as i128;
    let pnl = pos.qty_signed as i128 * diff * econ.tick_value_micros as i128
        / econ.tick_size_micros as i128;
    i128_to_i64_clamp(pnl)
}

/// Result of rebuilding one symbol's position history from its execution
/// log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recomputed {
    /// Final position record (realized PnL and counters aggregate the
    /// symbol's whole execution history, across intermediate closes).
    pub position: PositionState,
    /// Net account-balance contribution of the replayed executions.
    pub balance_delta_micros: i64,
}

/// Rebuild position and balance contribution from the execution log.
///
/// The execution log is the recovery source of truth: after a crash inside
/// the fill unit, replaying the persisted executions through this function
/// must converge to the same state the incremental path would have
/// produced.
pub fn recompute_from_executions(
    symbol: &str,
    fills: &[Fill],
    econ: &ContractEconomics,
) -> Recomputed {
    let mut position = PositionState::new(symbol);
    let mut balance_delta: i64 = 0;

    for fill in fills {
        let applied = apply_execution(&mut position, fill, econ);
        balance_delta = balance_delta.saturating_add(applied.balance_delta_micros);
    }

    Recomputed {
        position,
        balance_delta_micros: balance_delta,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
