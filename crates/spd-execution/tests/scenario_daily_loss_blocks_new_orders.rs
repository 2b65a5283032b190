//! Reaching the daily loss limit does not fail the account — it raises the
//! sticky flag, and the validator refuses every new order until the
//! trading-day rollover clears it.

mod common;

use common::{engine, set_price};
use spd_execution::{EvalOutcome, OrderRequest, Side};
use uuid::Uuid;

#[test]
fn daily_loss_flag_blocks_submissions_while_balance_is_healthy() {
    let (engine, feed) = engine();
    let account = Uuid::new_v4();
    engine.add_account(account, "eval-50k").unwrap();

    // Long 5 @ 5100, flat at 5050: 5 * 200 ticks * $1.25 = $1,250 gross
    // loss + $20 costs => daily PnL -$1,270, past the -$1,250 limit.
    engine
        .submit_order(&OrderRequest::market(account, "MES", Side::Buy, 5))
        .unwrap();
    set_price(&feed, 5_050_000_000);
    engine
        .submit_order(&OrderRequest::market(account, "MES", Side::Sell, 5))
        .unwrap();

    let acct = engine.account(account).unwrap();
    assert!(acct.daily_loss_limit_hit);
    assert_eq!(acct.daily_pnl_micros, -1_270_000_000);
    // Balance $48,730 is far above the $47,500 floor: status untouched.
    assert_eq!(acct.balance_micros, 48_730_000_000);
    assert_eq!(acct.status, "active");

    // The next submission is rejected by the daily-loss check alone.
    let rejected = engine
        .submit_order(&OrderRequest::market(account, "MES", Side::Buy, 1))
        .unwrap();
    assert_eq!(rejected.status, "rejected");
    assert!(rejected
        .reject_reason
        .as_deref()
        .unwrap()
        .contains("daily loss"));

    // The refusal itself is auditable.
    let checks = engine.rule_checks(account).unwrap();
    let last = checks.last().unwrap();
    assert!(!last.passed);
    assert!(last
        .checks
        .iter()
        .any(|c| c.name == "daily_loss" && c.outcome == "failed"));
}

#[test]
fn rollover_clears_the_flag_and_reopens_trading() {
    let (engine, feed) = engine();
    let account = Uuid::new_v4();
    engine.add_account(account, "eval-50k").unwrap();

    engine
        .submit_order(&OrderRequest::market(account, "MES", Side::Buy, 5))
        .unwrap();
    set_price(&feed, 5_050_000_000);
    engine
        .submit_order(&OrderRequest::market(account, "MES", Side::Sell, 5))
        .unwrap();
    assert!(engine.account(account).unwrap().daily_loss_limit_hit);

    let decisions = engine.roll_trading_day();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].1.outcome, EvalOutcome::NoChange);

    let acct = engine.account(account).unwrap();
    assert!(!acct.daily_loss_limit_hit);
    assert_eq!(acct.daily_pnl_micros, 0);
    assert_eq!(acct.trading_days, 1);

    let accepted = engine
        .submit_order(&OrderRequest::market(account, "MES", Side::Buy, 1))
        .unwrap();
    assert_eq!(accepted.status, "filled");
}
