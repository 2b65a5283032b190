//! Limit order pricing: a resting buy limit discovered crossed by the
//! sweep fills at the limit price (the cross happened between samples);
//! a limit that is marketable on arrival improves to the current price.

mod common;

use common::{engine, set_price};
use spd_execution::{OrderRequest, Side};
use uuid::Uuid;

const LIMIT_5150: i64 = 5_150_000_000;

#[test]
fn resting_buy_limit_fills_at_the_limit_not_the_sampled_price() {
    let (engine, feed) = engine();
    let account = Uuid::new_v4();
    engine.add_account(account, "eval-50k").unwrap();

    // Current price 5160: a buy limit at 5150 is not marketable yet.
    set_price(&feed, 5_160_000_000);
    let snap = engine
        .submit_order(&OrderRequest::limit(
            account, "MES", Side::Buy, 1, LIMIT_5150,
        ))
        .unwrap();
    assert_eq!(snap.status, "working");

    // Price ticks down through the limit to 5148.
    set_price(&feed, 5_148_000_000);
    let report = engine.run_monitor_sweep();
    assert_eq!(report.checked, 1);
    assert_eq!(report.filled, 1);

    let order = engine.order(account, snap.order_id).unwrap();
    assert_eq!(order.status, "filled");
    assert_eq!(
        order.avg_fill_price_micros,
        Some(LIMIT_5150),
        "fill at the limit price, not at 5148"
    );
    assert_eq!(engine.executions(account).unwrap()[0].slippage_micros, 0);
}

#[test]
fn marketable_arrival_improves_to_current_price() {
    let (engine, feed) = engine();
    let account = Uuid::new_v4();
    engine.add_account(account, "eval-50k").unwrap();

    // Market already below the limit: fills immediately at the better
    // (current) price.
    set_price(&feed, 5_148_000_000);
    let snap = engine
        .submit_order(&OrderRequest::limit(
            account, "MES", Side::Buy, 1, LIMIT_5150,
        ))
        .unwrap();
    assert_eq!(snap.status, "filled");
    assert_eq!(snap.avg_fill_price_micros, Some(5_148_000_000));
}

#[test]
fn sell_limit_waits_for_price_to_rise() {
    let (engine, feed) = engine();
    let account = Uuid::new_v4();
    engine.add_account(account, "eval-50k").unwrap();

    set_price(&feed, 5_140_000_000);
    let snap = engine
        .submit_order(&OrderRequest::limit(
            account, "MES", Side::Sell, 1, LIMIT_5150,
        ))
        .unwrap();
    assert_eq!(snap.status, "working");

    // Not there yet.
    set_price(&feed, 5_149_000_000);
    let report = engine.run_monitor_sweep();
    assert_eq!(report.filled, 0);

    set_price(&feed, 5_151_000_000);
    let report = engine.run_monitor_sweep();
    assert_eq!(report.filled, 1);
    let order = engine.order(account, snap.order_id).unwrap();
    assert_eq!(order.avg_fill_price_micros, Some(LIMIT_5150));
}

#[test]
fn cancel_working_then_cancel_again_is_a_noop() {
    let (engine, feed) = engine();
    let account = Uuid::new_v4();
    engine.add_account(account, "eval-50k").unwrap();

    set_price(&feed, 5_160_000_000);
    let snap = engine
        .submit_order(&OrderRequest::limit(
            account, "MES", Side::Buy, 1, LIMIT_5150,
        ))
        .unwrap();

    let cancelled = engine.cancel_order(account, snap.order_id).unwrap();
    assert_eq!(cancelled.status, "cancelled");

    // Cancelling a terminal order is silently skipped, not an error.
    let again = engine.cancel_order(account, snap.order_id).unwrap();
    assert_eq!(again.status, "cancelled");

    // And the sweep no longer sees it.
    let report = engine.run_monitor_sweep();
    assert_eq!(report.checked, 0);
}

#[test]
fn cancelled_order_never_fills_even_if_price_crosses() {
    let (engine, feed) = engine();
    let account = Uuid::new_v4();
    engine.add_account(account, "eval-50k").unwrap();

    set_price(&feed, 5_160_000_000);
    let snap = engine
        .submit_order(&OrderRequest::limit(
            account, "MES", Side::Buy, 1, LIMIT_5150,
        ))
        .unwrap();
    engine.cancel_order(account, snap.order_id).unwrap();

    set_price(&feed, 5_140_000_000);
    let report = engine.run_monitor_sweep();
    assert_eq!(report.filled, 0);
    assert!(engine.executions(account).unwrap().is_empty());
}
