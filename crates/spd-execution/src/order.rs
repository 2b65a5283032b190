//! Order lifecycle state machine.
//!
//! ```text
//!                     Reject (terminal)
//!   new() ──► Pending ───────────────► Rejected
//!                │ Accept
//!                ▼          Park
//!            Submitted ───────────► Working ◄────────┐
//!                │                     │             │ partial Fill
//!                │ Fill                │ Fill        │
//!                ▼                     ▼             │
//!             Filled (term.)   Filled / PartiallyFilled
//!                                      │
//!                    Cancel / Expire   ▼
//!            (Pending|Submitted|Working) ──► Cancelled / Expired (term.)
//! ```
//!
//! Every transition goes through [`Order::apply`]; illegal events return a
//! typed [`TransitionError`] and leave the order untouched. Duplicate fill
//! events on an already-`Filled` order are absorbed as no-ops so replaying
//! a sweep cannot double-fill.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::{OrderKind, OrderRequest, Side};
use spd_schemas::OrderSnapshot;

// ---------------------------------------------------------------------------
// OrderStatus
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    /// Created, not yet validated.
    Pending,
    /// Validator passed; not yet routed.
    Submitted,
    /// Resting: awaiting a price condition.
    Working,
    /// Some quantity filled, remainder still working.
    PartiallyFilled,
    /// Fully filled. **Terminal.**
    Filled,
    /// Explicitly cancelled before any fill. **Terminal.**
    Cancelled,
    /// Validator refused the order. **Terminal.**
    Rejected,
    /// Lapsed without filling. **Terminal.**
    Expired,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Cancelled | Self::Rejected | Self::Expired
        )
    }

    /// Statuses the monitor sweep picks up.
    pub fn is_resting(&self) -> bool {
        matches!(self, Self::Submitted | Self::Working | Self::PartiallyFilled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Submitted => "submitted",
            Self::Working => "working",
            Self::PartiallyFilled => "partially_filled",
            Self::Filled => "filled",
            Self::Cancelled => "cancelled",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "submitted" => Some(Self::Submitted),
            "working" => Some(Self::Working),
            "partially_filled" => Some(Self::PartiallyFilled),
            "filled" => Some(Self::Filled),
            "cancelled" => Some(Self::Cancelled),
            "rejected" => Some(Self::Rejected),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Events + errors
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum OrderEvent {
    /// Validator passed.
    Accept,
    /// Validator failed; carries the joined reasons.
    Reject { reason: String },
    /// No immediate fill condition; order rests.
    Park,
    /// `qty` contracts filled at `price_micros`.
    Fill { qty: i64, price_micros: i64 },
    /// Explicit cancellation. Only legal before any fill.
    Cancel,
    /// Order lapsed.
    Expire,
}

/// Returned when an event cannot legally be applied in the current status.
/// Callers treat this as an engine-consistency alarm, not a user error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: OrderStatus,
    pub event: String,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "illegal order transition: {} + {}",
            self.from.as_str(),
            self.event
        )
    }
}

impl std::error::Error for TransitionError {}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// One trading instruction tracked through its lifecycle. Immutable once
/// terminal (the state machine refuses every event except absorbed
/// duplicate fills).
#[derive(Clone, Debug, PartialEq)]
pub struct Order {
    pub order_id: Uuid,
    pub account_id: Uuid,
    pub symbol: String,
    pub side: Side,
    /// Trigger parameters mutate in place for trailing stops (ratchet) and
    /// stop-limits (conversion to a plain working limit).
    pub kind: OrderKind,
    pub qty: i64,
    pub filled_qty: i64,
    pub remaining_qty: i64,
    pub avg_fill_price_micros: Option<i64>,
    pub status: OrderStatus,
    pub reject_reason: Option<String>,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

impl Order {
    pub fn from_request(req: &OrderRequest, now: DateTime<Utc>) -> Self {
        Self {
            order_id: Uuid::new_v4(),
            account_id: req.account_id,
            symbol: req.symbol.clone(),
            side: req.side,
            kind: req.kind,
            qty: req.qty,
            filled_qty: 0,
            remaining_qty: req.qty,
            avg_fill_price_micros: None,
            status: OrderStatus::Pending,
            reject_reason: None,
            created_at_utc: now,
            updated_at_utc: now,
        }
    }

    /// Apply a lifecycle event.
    ///
    /// # Errors
    /// [`TransitionError`] for illegal transitions; state is unchanged.
    pub fn apply(&mut self, event: OrderEvent, now: DateTime<Utc>) -> Result<(), TransitionError> {
        use OrderEvent::*;
        use OrderStatus::*;

        match (self.status, &event) {
            (Pending, Accept) => self.status = Submitted,

            (Pending, Reject { reason }) => {
                self.status = Rejected;
                self.reject_reason = Some(reason.clone());
            }

            (Submitted, Park) => self.status = Working,

            // Fills land from the immediate path (Submitted) or the monitor
            // path (Working / PartiallyFilled).
            (Submitted | Working | PartiallyFilled, Fill { qty, price_micros }) => {
                let qty = *qty;
                if qty <= 0 || qty > self.remaining_qty {
                    return Err(TransitionError {
                        from: self.status,
                        event: format!("{event:?}"),
                    });
                }
                self.record_fill(qty, *price_micros);
                self.status = if self.remaining_qty == 0 {
                    Filled
                } else {
                    PartiallyFilled
                };
            }

            // Duplicate fill after completion: absorbed, not an error, so a
            // replayed sweep converges instead of halting.
            (Filled, Fill { .. }) => return Ok(()),

            // Cancellation is only permitted before any fill.
            (Pending | Submitted | Working, Cancel) => self.status = Cancelled,

            (Submitted | Working, Expire) => self.status = Expired,

            (from, ev) => {
                return Err(TransitionError {
                    from,
                    event: format!("{ev:?}"),
                })
            }
        }

        self.updated_at_utc = now;
        Ok(())
    }

    fn record_fill(&mut self, qty: i64, price_micros: i64) {
        let prev_filled = self.filled_qty;
        self.filled_qty += qty;
        self.remaining_qty -= qty;

        // Volume-weighted average across partial fills.
        let weighted = prev_filled as i128 * self.avg_fill_price_micros.unwrap_or(0) as i128
            + qty as i128 * price_micros as i128;
        let avg = weighted / self.filled_qty as i128;
        self.avg_fill_price_micros = Some(avg as i64);
    }

    /// Can the fill path still act on this order? Checked under the account
    /// lock — this is the at-most-one-fill guard.
    pub fn is_fillable(&self) -> bool {
        self.status.is_resting() && self.remaining_qty > 0
    }

    /// Rebuild an order from its persisted snapshot (recovery path).
    /// Returns `None` for snapshots with inconsistent or unknown fields.
    pub fn from_snapshot(snap: &OrderSnapshot) -> Option<Self> {
        let side = Side::parse(&snap.side)?;
        let status = OrderStatus::parse(&snap.status)?;
        let kind = OrderKind::from_wire(
            &snap.kind,
            snap.limit_price_micros,
            snap.stop_price_micros,
            snap.trail_micros,
        )?;
        if snap.filled_qty + snap.remaining_qty != snap.qty || snap.qty <= 0 {
            return None;
        }
        Some(Self {
            order_id: snap.order_id,
            account_id: snap.account_id,
            symbol: snap.symbol.clone(),
            side,
            kind,
            qty: snap.qty,
            filled_qty: snap.filled_qty,
            remaining_qty: snap.remaining_qty,
            avg_fill_price_micros: snap.avg_fill_price_micros,
            status,
            reject_reason: snap.reject_reason.clone(),
            created_at_utc: snap.created_at_utc,
            updated_at_utc: snap.updated_at_utc,
        })
    }

    pub fn snapshot(&self) -> OrderSnapshot {
        OrderSnapshot {
            order_id: self.order_id,
            account_id: self.account_id,
            symbol: self.symbol.clone(),
            side: self.side.as_str().to_string(),
            kind: self.kind.as_str().to_string(),
            qty: self.qty,
            filled_qty: self.filled_qty,
            remaining_qty: self.remaining_qty,
            limit_price_micros: self.kind.limit_price(),
            stop_price_micros: self.kind.stop_price(),
            trail_micros: self.kind.trail(),
            avg_fill_price_micros: self.avg_fill_price_micros,
            status: self.status.as_str().to_string(),
            reject_reason: self.reject_reason.clone(),
            created_at_utc: self.created_at_utc,
            updated_at_utc: self.updated_at_utc,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
