//! spd-portfolio
//!
//! Position ledger for the evaluation engine:
//! - one open-or-closed aggregate per (account, symbol)
//! - weighted average entry price on adds
//! - realized vs unrealized PnL split on reductions and reversals
//! - rebuild from the execution log (executions are the source of truth)
//!
//! Pure deterministic logic. No IO, no time, no feed access. All cash and
//! price values are `i64` micros with `i128` intermediates.
//!
//! Cost policy (documented decision): commissions and fees on *adds* debit
//! the account immediately and accumulate on the position as a cost carry;
//! *reductions* release the carry pro-rata into realized PnL together with
//! the reducing execution's own costs. A reversal assigns the whole
//! execution cost to the closing leg; the reopened leg starts with zero
//! carry. A flat round-trip therefore realizes exactly minus its total
//! commission and fees.

mod ledger;
mod types;

pub use ledger::{apply_execution, recompute_from_executions, unrealized_pnl_micros, Applied, Recomputed};
pub use types::{ContractEconomics, Fill, PositionState, Side};

/// 1e-6 fixed-point scale.
pub const MICROS_SCALE: i64 = 1_000_000;
