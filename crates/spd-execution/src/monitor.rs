//! Resting-order monitor sweep.
//!
//! Driven on a fixed external cadence (the daemon's sweep task, or the
//! manual `POST /v1/sweep` trigger) — the engine never self-schedules.
//! One sweep:
//! - loads every resting (`submitted`/`working`/`partially_filled`) order
//! - reads the current price once per symbol and re-tests the trigger
//! - routes due orders through the lifecycle manager's fill path
//!
//! Failure isolation: an error on one order is logged and the sweep moves
//! on; an order that left the working set concurrently is skipped without
//! noise. Re-running a sweep with no price change in between is a no-op
//! thanks to the at-most-one-fill guard.

use std::collections::BTreeMap;

use tracing::warn;
use uuid::Uuid;

use spd_schemas::SweepReport;

use crate::engine::{Engine, SweepOutcome};

/// Run one monitor sweep over all accounts.
pub fn run_monitor_sweep(engine: &Engine) -> SweepReport {
    let mut report = SweepReport::default();

    for cell in engine.account_cells() {
        let mut book = cell.lock().expect("account lock poisoned");

        // Collect ids first; the fill path mutates the order map.
        let resting: Vec<(Uuid, String)> = book
            .orders
            .values()
            .filter(|o| o.status.is_resting())
            .map(|o| (o.order_id, o.symbol.clone()))
            .collect();

        // One price read per (symbol, sweep): the trigger check and the
        // fill price come from the same sample.
        let mut price_cache: BTreeMap<String, i64> = BTreeMap::new();

        for (order_id, symbol) in resting {
            report.checked += 1;

            let px = match price_cache.get(&symbol) {
                Some(px) => *px,
                None => match engine.feed().current(&symbol) {
                    Ok(px) => {
                        price_cache.insert(symbol.clone(), px);
                        px
                    }
                    Err(err) => {
                        warn!(order = %order_id, %symbol, error = %err, "sweep: no price; skipping order");
                        continue;
                    }
                },
            };

            match engine.try_fill_locked(&mut book, order_id, px, false) {
                Ok(SweepOutcome::Filled { triggered }) => {
                    report.filled += 1;
                    if triggered {
                        report.triggered += 1;
                    }
                }
                Ok(SweepOutcome::Triggered) => report.triggered += 1,
                Ok(SweepOutcome::Resting | SweepOutcome::Skipped) => {}
                Err(err) => {
                    // Per-order isolation: log and keep sweeping.
                    warn!(order = %order_id, error = %err, "sweep: order evaluation failed; continuing");
                }
            }
        }
    }

    report
}

impl Engine {
    /// The externally invokable monitor entry (`runMonitorSweep`).
    pub fn run_monitor_sweep(&self) -> SweepReport {
        run_monitor_sweep(self)
    }
}
