//! spd-risk
//!
//! Pre-trade order validation and account-level evaluation for simulated
//! prop-trading accounts:
//! - five-check order validator (balance, position limit, drawdown,
//!   daily loss, margin) — all checks always run, full diagnostics
//! - account evaluation state machine (trailing drawdown, daily-loss
//!   suspension flag, profit-target pass)
//! - trading-day rollover (high-water-mark trailing, daily resets)
//!
//! Deterministic, pure logic. No IO, no time, no feed access. Callers pass
//! point-in-time snapshots; decisions carry their evidence instead of
//! logging it.

mod evaluator;
mod types;
mod validator;

pub use evaluator::{evaluate_after_balance_change, roll_trading_day, EvalDecision, EvalOutcome};
pub use types::{AccountState, AccountStatus, ContractSpec, StatusError, TierLimits};
pub use validator::{
    validate, CheckKind, CheckOutcome, CheckResult, ValidationReport, ValidationSnapshot,
};

/// 1e-6 fixed-point scale.
pub const MICROS_SCALE: i64 = 1_000_000;
