//! spd-execution
//!
//! The simulated execution core: order lifecycle state machine, fill
//! simulator, per-account engine container, and the resting-order monitor
//! sweep.
//!
//! Pipeline for one submission:
//! validator -> simulator -> position ledger -> account update -> evaluator.
//! The reject path ends at the validator; non-marketable orders park as
//! `Working` and re-enter the pipeline from the simulator step on every
//! monitor sweep.
//!
//! Concurrency: one mutex per account book. Everything the fill path
//! touches for a single order (execution record, order quantities, position,
//! balance, evaluation, counters) mutates under that one lock, so fills on
//! the same account are sequentially consistent while different accounts
//! proceed in parallel. The at-most-one-fill guard re-checks order status
//! inside the lock, which makes monitor sweeps idempotent.

mod engine;
mod monitor;
mod order;
mod simulator;
mod types;

pub use engine::{AccountBook, Engine, EngineError};
pub use monitor::run_monitor_sweep;
pub use order::{Order, OrderEvent, OrderStatus, TransitionError};
pub use simulator::{
    effective_slippage_ticks, limit_crossed, limit_fill_price, market_fill_price,
    ratchet_trailing_stop, stop_triggered, FillDecision,
};
pub use types::{OrderKind, OrderRequest, Side};

// Evaluation decisions surface through engine APIs; re-exported so callers
// do not need a direct spd-risk dependency just to match on them.
pub use spd_risk::{EvalDecision, EvalOutcome};
