//! spd-schemas
//!
//! Shared wire DTOs crossing crate boundaries (db rows, daemon responses,
//! audit payloads). Plain serde structs, no business logic. Enumerated
//! fields (side, order kind, statuses) are carried as canonical strings at
//! this layer; the owning crates parse them into real enums.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One fill event against an order. Immutable, append-only; the execution
/// log is the recovery source of truth for positions and balances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: Uuid,
    pub order_id: Uuid,
    pub account_id: Uuid,
    pub symbol: String,
    /// "BUY" | "SELL"
    pub side: String,
    pub qty: i64,
    pub fill_price_micros: i64,
    pub commission_micros: i64,
    pub fee_micros: i64,
    /// Adverse price adjustment applied to this fill, recorded separately
    /// from commission for audit.
    pub slippage_micros: i64,
    pub ts_utc: DateTime<Utc>,
}

/// Outcome of a single pre-trade check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCheckResult {
    /// "balance" | "position_limit" | "drawdown" | "daily_loss" | "margin"
    pub name: String,
    /// "passed" | "failed" | "skipped"
    pub outcome: String,
    pub reason: Option<String>,
}

/// Audit snapshot of one validator run, taken at submission time.
/// Write-once; never read back for control flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCheckRecord {
    pub record_id: Uuid,
    pub order_id: Uuid,
    pub account_id: Uuid,
    pub passed: bool,
    pub checks: Vec<RuleCheckResult>,
    pub failure_reasons: Vec<String>,
    pub ts_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub account_id: Uuid,
    pub tier: String,
    pub balance_micros: i64,
    pub initial_balance_micros: i64,
    pub high_water_mark_micros: i64,
    pub drawdown_threshold_micros: i64,
    pub daily_pnl_micros: i64,
    pub daily_loss_limit_hit: bool,
    pub profit_target_reached: bool,
    pub trading_days: u32,
    /// "pending_activation" | "active" | "passed" | "funded" | "failed"
    /// | "suspended" | "expired"
    pub status: String,
    pub open_orders: u32,
    pub open_contracts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order_id: Uuid,
    pub account_id: Uuid,
    pub symbol: String,
    pub side: String,
    /// "market" | "limit" | "stop" | "stop_limit" | "trailing_stop"
    pub kind: String,
    pub qty: i64,
    pub filled_qty: i64,
    pub remaining_qty: i64,
    pub limit_price_micros: Option<i64>,
    pub stop_price_micros: Option<i64>,
    pub trail_micros: Option<i64>,
    pub avg_fill_price_micros: Option<i64>,
    pub status: String,
    pub reject_reason: Option<String>,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub account_id: Uuid,
    pub symbol: String,
    /// Signed quantity: +long, -short.
    pub qty_signed: i64,
    pub avg_entry_price_micros: i64,
    pub realized_pnl_micros: i64,
    pub unrealized_pnl_micros: i64,
    pub open: bool,
    pub bought: i64,
    pub sold: i64,
}

/// Result of one resting-order monitor sweep.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SweepReport {
    /// Working/submitted orders examined.
    pub checked: u32,
    /// Orders fully filled during the sweep.
    pub filled: u32,
    /// Orders whose trigger fired (stop -> market, stop-limit -> working
    /// limit, trailing ratchet trip). Always >= `filled` minus plain limit
    /// completions.
    pub triggered: u32,
}

/// OHLC aggregate over a fixed tick span. Completed bars are cached by the
/// price feed and never regenerated, so chart history stays consistent with
/// execution prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarRecord {
    pub seq: u64,
    pub open_micros: i64,
    pub high_micros: i64,
    pub low_micros: i64,
    pub close_micros: i64,
    pub ticks: u32,
}
