//! spd-testkit
//!
//! Shared scenario fixtures: a canonical instrument/tier/config and a
//! [`Harness`] that wires an engine to a scripted feed so tests read like
//! trade blotters. Test crates only — never a production dependency.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use uuid::Uuid;

use spd_config::{EngineSettings, InstrumentSpec, SimConfig, TierRules};
use spd_execution::{Engine, OrderRequest, Side};
use spd_prices::PriceFeed;
use spd_schemas::{AccountSnapshot, OrderSnapshot, PositionSnapshot, SweepReport};

pub const TICK: i64 = 250_000;
pub const PX_5100: i64 = 5_100_000_000;

/// MES-like micro contract with a frozen walk (tests script every price).
pub fn default_instrument() -> InstrumentSpec {
    InstrumentSpec {
        tick_size_micros: TICK,
        tick_value_micros: 1_250_000,
        volatility_ticks: 0,
        margin_per_contract_micros: 1_500_000_000,
        reference_price_micros: PX_5100,
    }
}

/// $50k evaluation tier, no minimum trading days.
pub fn default_tier() -> TierRules {
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

/// Deterministic config: zero slippage, scripted prices.
pub fn default_config() -> SimConfig {
    let mut instruments = BTreeMap::new();
    instruments.insert("MES".to_string(), default_instrument());
    let mut tiers = BTreeMap::new();
    tiers.insert("eval-50k".to_string(), default_tier());
    SimConfig {
        engine: EngineSettings {
            sweep_interval_secs: 5,
            session_timezone: "America/New_York".to_string(),
            bar_span_ticks: 10,
            price_seed: 42,
            slippage_base_ticks_max: 0,
            slippage_size_step: 10,
        },
        instruments,
        tiers,
    }
}

/// Engine + scripted feed for scenario tests.
pub struct Harness {
    pub engine: Arc<Engine>,
    pub feed: Arc<PriceFeed>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(default_config())
    }

    pub fn with_config(cfg: SimConfig) -> Self {
        let (engine, feed) = Engine::bootstrap(cfg).expect("bootstrap");
        Self {
            engine: Arc::new(engine),
            feed,
        }
    }

    /// Create and activate an account on the default tier.
    pub fn account(&self) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.engine
            .add_account(id, "eval-50k")
            .map_err(|e| anyhow!(e.to_string()))?;
        Ok(id)
    }

    pub fn set_price(&self, px: i64) {
        self.feed
            .set_price_for_test("MES", px)
            .expect("scripted symbol registered");
    }

    pub fn market(&self, account: Uuid, side: Side, qty: i64) -> Result<OrderSnapshot> {
        self.engine
            .submit_order(&OrderRequest::market(account, "MES", side, qty))
            .map_err(|e| anyhow!(e.to_string()))
    }

    pub fn limit(&self, account: Uuid, side: Side, qty: i64, limit: i64) -> Result<OrderSnapshot> {
        self.engine
            .submit_order(&OrderRequest::limit(account, "MES", side, qty, limit))
            .map_err(|e| anyhow!(e.to_string()))
    }

    pub fn sweep(&self) -> SweepReport {
        self.engine.run_monitor_sweep()
    }

    pub fn roll_day(&self) {
        self.engine.roll_trading_day();
    }

    pub fn account_snapshot(&self, account: Uuid) -> AccountSnapshot {
        self.engine.account(account).expect("account exists")
    }

    pub fn positions(&self, account: Uuid) -> Vec<PositionSnapshot> {
        self.engine.positions(account).expect("account exists")
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
