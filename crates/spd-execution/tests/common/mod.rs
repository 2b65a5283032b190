// Each scenario file pulls in the subset of fixtures it needs.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use spd_config::{EngineSettings, InstrumentSpec, SimConfig, TierRules};
use spd_execution::Engine;
use spd_prices::PriceFeed;

pub const TICK: i64 = 250_000;
pub const PX_5100: i64 = 5_100_000_000;

/// MES-like micro contract: $0.25 tick worth $1.25, $1,500 margin.
pub fn mes() -> InstrumentSpec {
    InstrumentSpec {
        tick_size_micros: TICK,
        tick_value_micros: 1_250_000,
        // Zero volatility: the walk stands still and tests script exact
        // prices through the testkit escape hatch.
        volatility_ticks: 0,
        margin_per_contract_micros: 1_500_000_000,
        reference_price_micros: PX_5100,
    }
}

/// $50k evaluation tier: $2.5k trailing drawdown, $1.25k daily loss,
/// $3k target, $2.00 round cost per contract per leg.
pub fn tier_50k() -> TierRules {
    TierRules {
        initial_balance_micros: 50_000_000_000,
        max_drawdown_micros: 2_500_000_000,
        daily_loss_limit_micros: 1_250_000_000,
        profit_target_micros: 3_000_000_000,
        max_contracts_per_trade: 5,
        max_open_contracts: 10,
        min_trading_days: 0,
        commission_per_contract_micros: 1_500_000,
        fee_per_contract_micros: 500_000,
        worst_case_ticks: 8,
    }
}

pub fn sim_config() -> SimConfig {
    let mut instruments = BTreeMap::new();
    instruments.insert("MES".to_string(), mes());
    let mut tiers = BTreeMap::new();
    tiers.insert("eval-50k".to_string(), tier_50k());
    SimConfig {
        engine: EngineSettings {
            sweep_interval_secs: 5,
            session_timezone: "America/New_York".to_string(),
            bar_span_ticks: 10,
            price_seed: 42,
            // Deterministic fills: no baseline slippage draw.
            slippage_base_ticks_max: 0,
            slippage_size_step: 10,
        },
        instruments,
        tiers,
    }
}

pub fn engine() -> (Engine, Arc<PriceFeed>) {
    Engine::bootstrap(sim_config()).expect("bootstrap")
}

/// Engine with the standard tier adjusted for one scenario's needs.
#[allow(dead_code)]
pub fn engine_with_tier(adjust: impl FnOnce(&mut TierRules)) -> (Engine, Arc<PriceFeed>) {
    let mut cfg = sim_config();
    adjust(cfg.tiers.get_mut("eval-50k").expect("tier"));
    Engine::bootstrap(cfg).expect("bootstrap")
}

pub fn set_price(feed: &PriceFeed, px: i64) {
    feed.set_price_for_test("MES", px).expect("set price");
}
