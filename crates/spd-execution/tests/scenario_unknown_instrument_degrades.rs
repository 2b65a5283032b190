//! A symbol with a price series but no contract specification still
//! trades: the drawdown and margin checks degrade to "skipped" (logged as
//! a warning) instead of failing closed.

mod common;

use std::sync::Arc;

use common::{mes, sim_config};
use spd_execution::{Engine, EngineError, OrderRequest, Side};
use spd_prices::PriceFeed;
use uuid::Uuid;

fn engine_with_unlisted_symbol() -> (Engine, Arc<PriceFeed>) {
    let cfg = sim_config();
    let feed = Arc::new(PriceFeed::new(7, 10));
    feed.register("MES", mes()).unwrap();
    // Price series exists, but no InstrumentSpec in the engine config.
    let mut odd = mes();
    odd.reference_price_micros = 1_000_000_000;
    feed.register("XYZ", odd).unwrap();
    let engine = Engine::new(cfg, Arc::clone(&feed));
    (engine, feed)
}

#[test]
fn unlisted_symbol_trades_with_skipped_checks() {
    let (engine, _feed) = engine_with_unlisted_symbol();
    let account = Uuid::new_v4();
    engine.add_account(account, "eval-50k").unwrap();

    let snap = engine
        .submit_order(&OrderRequest::market(account, "XYZ", Side::Buy, 1))
        .unwrap();
    assert_eq!(snap.status, "filled");
    // No tick structure to slip against.
    assert_eq!(snap.avg_fill_price_micros, Some(1_000_000_000));

    let checks = engine.rule_checks(account).unwrap();
    assert_eq!(checks.len(), 1);
    let record = &checks[0];
    assert!(record.passed);
    let outcome = |name: &str| {
        record
            .checks
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.outcome.clone())
            .unwrap()
    };
    assert_eq!(outcome("drawdown"), "skipped");
    assert_eq!(outcome("margin"), "skipped");
    assert_eq!(outcome("balance"), "passed");
    assert_eq!(outcome("position_limit"), "passed");
    assert_eq!(outcome("daily_loss"), "passed");

    // Tier costs still apply.
    let acct = engine.account(account).unwrap();
    assert_eq!(acct.balance_micros, 49_998_000_000);
}

#[test]
fn symbol_without_a_price_series_aborts_cleanly() {
    let (engine, _feed) = engine_with_unlisted_symbol();
    let account = Uuid::new_v4();
    engine.add_account(account, "eval-50k").unwrap();

    let err = engine
        .submit_order(&OrderRequest::market(account, "NOPE", Side::Buy, 1))
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownSymbol(_)));

    // No partial state: no order, no execution, no rule-check record.
    assert!(engine.orders(account).unwrap().is_empty());
    assert!(engine.executions(account).unwrap().is_empty());
    assert!(engine.rule_checks(account).unwrap().is_empty());
}
