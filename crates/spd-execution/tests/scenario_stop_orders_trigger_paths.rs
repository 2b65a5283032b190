//! Stop, stop-limit, and trailing-stop trigger behavior through the
//! monitor sweep.

mod common;

use common::{engine, set_price, PX_5100, TICK};
use spd_execution::{OrderRequest, Side};
use uuid::Uuid;

#[test]
fn sell_stop_triggers_into_a_market_fill() {
    let (engine, feed) = engine();
    let account = Uuid::new_v4();
    engine.add_account(account, "eval-50k").unwrap();

    set_price(&feed, PX_5100);
    let snap = engine
        .submit_order(&OrderRequest::stop(
            account,
            "MES",
            Side::Sell,
            1,
            5_090_000_000,
        ))
        .unwrap();
    assert_eq!(snap.status, "working");

    // Above the stop: nothing.
    set_price(&feed, 5_095_000_000);
    assert_eq!(engine.run_monitor_sweep().filled, 0);

    // At the stop: triggers and fills as a market order.
    set_price(&feed, 5_090_000_000);
    let report = engine.run_monitor_sweep();
    assert_eq!(report.filled, 1);
    assert_eq!(report.triggered, 1);

    let order = engine.order(account, snap.order_id).unwrap();
    assert_eq!(order.status, "filled");
    assert_eq!(order.avg_fill_price_micros, Some(5_090_000_000));
}

#[test]
fn buy_stop_already_beyond_level_fills_at_submission() {
    let (engine, feed) = engine();
    let account = Uuid::new_v4();
    engine.add_account(account, "eval-50k").unwrap();

    set_price(&feed, PX_5100);
    // Stop below current price: adverse confirmation already true.
    let snap = engine
        .submit_order(&OrderRequest::stop(
            account,
            "MES",
            Side::Buy,
            1,
            5_098_000_000,
        ))
        .unwrap();
    assert_eq!(snap.status, "filled");
    assert_eq!(snap.avg_fill_price_micros, Some(PX_5100));
}

#[test]
fn stop_limit_converts_then_fills_within_its_limit() {
    let (engine, feed) = engine();
    let account = Uuid::new_v4();
    engine.add_account(account, "eval-50k").unwrap();

    set_price(&feed, PX_5100);
    let snap = engine
        .submit_order(&OrderRequest::stop_limit(
            account,
            "MES",
            Side::Buy,
            1,
            5_110_000_000,
            5_112_000_000,
        ))
        .unwrap();
    assert_eq!(snap.status, "working");
    assert_eq!(snap.kind, "stop_limit");

    // Price pushes through the stop but stays inside the limit: the order
    // converts and fills at the (better) current price, no slippage.
    set_price(&feed, 5_111_000_000);
    let report = engine.run_monitor_sweep();
    assert_eq!(report.filled, 1);
    assert_eq!(report.triggered, 1);

    let order = engine.order(account, snap.order_id).unwrap();
    assert_eq!(order.status, "filled");
    assert_eq!(order.kind, "limit", "converted before filling");
    assert_eq!(order.avg_fill_price_micros, Some(5_111_000_000));
    assert_eq!(engine.executions(account).unwrap()[0].slippage_micros, 0);
}

#[test]
fn stop_limit_conversion_can_leave_a_working_limit() {
    let (engine, feed) = engine();
    let account = Uuid::new_v4();
    engine.add_account(account, "eval-50k").unwrap();

    set_price(&feed, PX_5100);
    let snap = engine
        .submit_order(&OrderRequest::stop_limit(
            account,
            "MES",
            Side::Buy,
            1,
            5_110_000_000,
            5_112_000_000,
        ))
        .unwrap();

    // Price gaps straight past the limit: trigger fires, but the limit is
    // not marketable — the order stays working as a plain limit.
    set_price(&feed, 5_116_000_000);
    let report = engine.run_monitor_sweep();
    assert_eq!(report.filled, 0);
    assert_eq!(report.triggered, 1);

    let order = engine.order(account, snap.order_id).unwrap();
    assert_eq!(order.status, "working");
    assert_eq!(order.kind, "limit");

    // Price comes back inside the limit: the sweep completes it at the
    // limit price.
    set_price(&feed, 5_111_000_000);
    let report = engine.run_monitor_sweep();
    assert_eq!(report.filled, 1);
    let order = engine.order(account, snap.order_id).unwrap();
    assert_eq!(order.avg_fill_price_micros, Some(5_112_000_000));
}

#[test]
fn trailing_stop_ratchets_with_price_then_fires() {
    let (engine, feed) = engine();
    let account = Uuid::new_v4();
    engine.add_account(account, "eval-50k").unwrap();

    let trail = 8 * TICK; // $2 of price

    set_price(&feed, PX_5100);
    let snap = engine
        .submit_order(&OrderRequest::trailing_stop(
            account, "MES", Side::Sell, 1, trail,
        ))
        .unwrap();
    assert_eq!(snap.status, "working");
    assert_eq!(snap.stop_price_micros, Some(PX_5100 - trail));

    // Price rallies: the stop follows up, never loosening.
    set_price(&feed, 5_110_000_000);
    let report = engine.run_monitor_sweep();
    assert_eq!(report.filled, 0);
    let order = engine.order(account, snap.order_id).unwrap();
    assert_eq!(order.stop_price_micros, Some(5_110_000_000 - trail));

    // Pullback that does not reach the stop leaves it where it was.
    set_price(&feed, 5_109_000_000);
    engine.run_monitor_sweep();
    let order = engine.order(account, snap.order_id).unwrap();
    assert_eq!(order.stop_price_micros, Some(5_110_000_000 - trail));

    // Pullback to the stop: fires like a plain stop, market fill.
    set_price(&feed, 5_108_000_000);
    let report = engine.run_monitor_sweep();
    assert_eq!(report.filled, 1);
    assert_eq!(report.triggered, 1);
    let order = engine.order(account, snap.order_id).unwrap();
    assert_eq!(order.status, "filled");
    assert_eq!(order.avg_fill_price_micros, Some(5_108_000_000));
}
