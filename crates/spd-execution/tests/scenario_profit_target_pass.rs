//! Reaching the profit target passes the evaluation, freezes the trailing
//! drawdown floor, and opens the path to funding.

mod common;

use common::{engine, engine_with_tier, set_price};
use spd_execution::{OrderRequest, Side};
use uuid::Uuid;

#[test]
fn winning_round_trip_passes_the_account() {
    let (engine, feed) = engine();
    let account = Uuid::new_v4();
    engine.add_account(account, "eval-50k").unwrap();

    // Long 5 @ 5100, flat at 5221: 5 * 484 ticks * $1.25 = $3,025 gross,
    // $20 costs => +$3,005 against a $3,000 target (min days 0).
    engine
        .submit_order(&OrderRequest::market(account, "MES", Side::Buy, 5))
        .unwrap();
    set_price(&feed, 5_221_000_000);
    engine
        .submit_order(&OrderRequest::market(account, "MES", Side::Sell, 5))
        .unwrap();

    let acct = engine.account(account).unwrap();
    assert_eq!(acct.balance_micros, 53_005_000_000);
    assert_eq!(acct.status, "passed");
    assert!(acct.profit_target_reached);

    // Passed accounts no longer accept orders; funding is the next step.
    assert!(engine
        .submit_order(&OrderRequest::market(account, "MES", Side::Buy, 1))
        .is_err());
    let funded = engine.fund_account(account).unwrap();
    assert_eq!(funded.status, "funded");
}

#[test]
fn floor_freezes_once_target_reached() {
    let (engine, feed) = engine();
    let account = Uuid::new_v4();
    engine.add_account(account, "eval-50k").unwrap();

    engine
        .submit_order(&OrderRequest::market(account, "MES", Side::Buy, 5))
        .unwrap();
    set_price(&feed, 5_221_000_000);
    engine
        .submit_order(&OrderRequest::market(account, "MES", Side::Sell, 5))
        .unwrap();

    let before = engine.account(account).unwrap();
    assert!(before.profit_target_reached);
    assert_eq!(before.drawdown_threshold_micros, 47_500_000_000);

    // Rollover would normally trail the floor up to the new high-water
    // mark; after the target it must not move.
    engine.roll_trading_day();
    let after = engine.account(account).unwrap();
    assert_eq!(after.drawdown_threshold_micros, 47_500_000_000);
}

#[test]
fn min_trading_days_holds_the_pass_until_rollover() {
    let (engine, feed) = engine_with_tier(|tier| {
        tier.min_trading_days = 1;
    });
    let account = Uuid::new_v4();
    engine.add_account(account, "eval-50k").unwrap();

    engine
        .submit_order(&OrderRequest::market(account, "MES", Side::Buy, 5))
        .unwrap();
    set_price(&feed, 5_221_000_000);
    engine
        .submit_order(&OrderRequest::market(account, "MES", Side::Sell, 5))
        .unwrap();

    // Target reached on day zero: flag set, no pass yet.
    let acct = engine.account(account).unwrap();
    assert!(acct.profit_target_reached);
    assert_eq!(acct.status, "active");
    assert_eq!(acct.trading_days, 0);

    // The rollover credits the trading day and completes the pass.
    engine.roll_trading_day();
    let acct = engine.account(account).unwrap();
    assert_eq!(acct.trading_days, 1);
    assert_eq!(acct.status, "passed");
}
