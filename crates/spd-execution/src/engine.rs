use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use spd_config::{InstrumentSpec, SimConfig, TierRules};
use spd_portfolio::{
    apply_execution, unrealized_pnl_micros, ContractEconomics, Fill, PositionState,
};
use spd_prices::{FeedError, PriceFeed};
use spd_risk::{
    evaluate_after_balance_change, roll_trading_day, validate, AccountState, ContractSpec,
    EvalDecision, EvalOutcome, StatusError, TierLimits, ValidationReport, ValidationSnapshot,
};
use spd_schemas::{
    AccountSnapshot, ExecutionRecord, OrderSnapshot, PositionSnapshot, RuleCheckRecord,
    RuleCheckResult,
};

use crate::order::{Order, OrderEvent, OrderStatus, TransitionError};
use crate::simulator::{
    effective_slippage_ticks, evaluate_trigger, limit_fill_price, market_fill_price,
    ratchet_trailing_stop, FillDecision,
};
use crate::types::{OrderKind, OrderRequest, Side};

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// Typed engine failures. Validation rejections are NOT errors — they come
/// back as a rejected [`OrderSnapshot`] with itemized reasons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    UnknownAccount(Uuid),
    UnknownOrder(Uuid),
    UnknownTier(String),
    AccountAlreadyExists(Uuid),
    /// The account's lifecycle status refuses new orders.
    AccountNotTradable { account_id: Uuid, status: String },
    /// The symbol has no price series; nothing can fill against it.
    UnknownSymbol(String),
    /// Malformed request (non-positive quantity or price parameter).
    BadRequest(String),
    /// Illegal order state transition — an engine consistency alarm.
    Transition(TransitionError),
    /// Illegal account status transition.
    Status(StatusError),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownAccount(id) => write!(f, "unknown account: {id}"),
            Self::UnknownOrder(id) => write!(f, "unknown order: {id}"),
            Self::UnknownTier(name) => write!(f, "unknown tier: {name}"),
            Self::AccountAlreadyExists(id) => write!(f, "account already exists: {id}"),
            Self::AccountNotTradable { account_id, status } => {
                write!(f, "account {account_id} not tradable (status {status})")
            }
            Self::UnknownSymbol(sym) => write!(f, "no price series for symbol: {sym}"),
            Self::BadRequest(msg) => write!(f, "bad request: {msg}"),
            Self::Transition(e) => write!(f, "{e}"),
            Self::Status(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<TransitionError> for EngineError {
    fn from(e: TransitionError) -> Self {
        Self::Transition(e)
    }
}

impl From<StatusError> for EngineError {
    fn from(e: StatusError) -> Self {
        Self::Status(e)
    }
}

// ---------------------------------------------------------------------------
// AccountBook
// ---------------------------------------------------------------------------

/// Everything one account owns, guarded by a single mutex: risk state,
/// orders, positions, and the account's slice of the execution log. Every
/// fill-path step mutates under that one lock, which is what gives fills
/// on the same account sequential consistency while different accounts
/// proceed fully in parallel.
#[derive(Debug)]
pub struct AccountBook {
    pub account_id: Uuid,
    pub tier_name: String,
    pub tier: TierLimits,
    pub state: AccountState,
    pub orders: BTreeMap<Uuid, Order>,
    /// Current position per symbol (open, or the last closed record until
    /// the symbol trades again).
    pub positions: BTreeMap<String, PositionState>,
    /// Closed position records archived when a symbol re-opens.
    pub closed_positions: Vec<PositionState>,
    pub executions: Vec<ExecutionRecord>,
    pub rule_checks: Vec<RuleCheckRecord>,
}

impl AccountBook {
    fn new(account_id: Uuid, tier_name: String, tier: TierLimits) -> Self {
        let state = AccountState::new(&tier);
        Self {
            account_id,
            tier_name,
            tier,
            state,
            orders: BTreeMap::new(),
            positions: BTreeMap::new(),
            closed_positions: Vec::new(),
            executions: Vec::new(),
            rule_checks: Vec::new(),
        }
    }

    /// Contracts currently open across all positions (absolute).
    pub fn open_contracts(&self) -> i64 {
        self.positions.values().map(|p| p.abs_qty()).sum()
    }

    /// Orders still awaiting a price condition.
    pub fn open_orders(&self) -> u32 {
        self.orders
            .values()
            .filter(|o| o.status.is_resting())
            .count() as u32
    }

    pub fn account_snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            account_id: self.account_id,
            tier: self.tier_name.clone(),
            balance_micros: self.state.balance_micros,
            initial_balance_micros: self.state.initial_balance_micros,
            high_water_mark_micros: self.state.high_water_mark_micros,
            drawdown_threshold_micros: self.state.drawdown_threshold_micros,
            daily_pnl_micros: self.state.daily_pnl_micros,
            daily_loss_limit_hit: self.state.daily_loss_limit_hit,
            profit_target_reached: self.state.profit_target_reached,
            trading_days: self.state.trading_days,
            status: self.state.status.as_str().to_string(),
            open_orders: self.open_orders(),
            open_contracts: self.open_contracts(),
        }
    }
}

/// Outcome of one order's sweep evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SweepOutcome {
    /// Order was gone or already terminal: silently skipped.
    Skipped,
    /// Still resting, no trigger.
    Resting,
    /// Trigger fired without a fill (stop-limit conversion whose limit is
    /// not yet marketable).
    Triggered,
    Filled { triggered: bool },
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The simulated execution engine: per-account books around a shared
/// synthetic feed. Share behind an `Arc`.
pub struct Engine {
    cfg: SimConfig,
    feed: Arc<PriceFeed>,
    accounts: RwLock<BTreeMap<Uuid, Arc<Mutex<AccountBook>>>>,
}

fn tier_limits(rules: &TierRules) -> TierLimits {
    TierLimits {
        initial_balance_micros: rules.initial_balance_micros,
        max_drawdown_micros: rules.max_drawdown_micros,
        daily_loss_limit_micros: rules.daily_loss_limit_micros,
        profit_target_micros: rules.profit_target_micros,
        max_contracts_per_trade: rules.max_contracts_per_trade,
        max_open_contracts: rules.max_open_contracts,
        min_trading_days: rules.min_trading_days,
        commission_per_contract_micros: rules.commission_per_contract_micros,
        fee_per_contract_micros: rules.fee_per_contract_micros,
        worst_case_ticks: rules.worst_case_ticks,
    }
}

fn contract_spec(spec: &InstrumentSpec) -> ContractSpec {
    ContractSpec {
        tick_value_micros: spec.tick_value_micros,
        margin_per_contract_micros: spec.margin_per_contract_micros,
    }
}

fn economics(spec: &InstrumentSpec) -> ContractEconomics {
    ContractEconomics {
        tick_size_micros: spec.tick_size_micros,
        tick_value_micros: spec.tick_value_micros,
    }
}

impl Engine {
    /// Wrap an already-initialized feed. Symbols the engine will trade must
    /// have been registered by the caller (see [`Engine::bootstrap`]).
    pub fn new(cfg: SimConfig, feed: Arc<PriceFeed>) -> Self {
        Self {
            cfg,
            feed,
            accounts: RwLock::new(BTreeMap::new()),
        }
    }

    /// Build the feed from configuration, register every configured
    /// instrument, and return the engine plus the shared feed handle (the
    /// same handle serves chart/bar consumers — one read path for both).
    pub fn bootstrap(cfg: SimConfig) -> Result<(Self, Arc<PriceFeed>), EngineError> {
        let feed = Arc::new(PriceFeed::new(
            cfg.engine.price_seed,
            cfg.engine.bar_span_ticks,
        ));
        for (symbol, spec) in &cfg.instruments {
            feed.register(symbol, spec.clone())
                .map_err(|e| EngineError::BadRequest(e.to_string()))?;
        }
        let engine = Self::new(cfg, Arc::clone(&feed));
        Ok((engine, feed))
    }

    pub fn config(&self) -> &SimConfig {
        &self.cfg
    }

    pub fn feed(&self) -> &Arc<PriceFeed> {
        &self.feed
    }

    // -- account management --------------------------------------------------

    /// Hand an externally-created account to the core. The account starts
    /// active at the tier's initial balance.
    pub fn add_account(
        &self,
        account_id: Uuid,
        tier_name: &str,
    ) -> Result<AccountSnapshot, EngineError> {
        let rules = self
            .cfg
            .tiers
            .get(tier_name)
            .ok_or_else(|| EngineError::UnknownTier(tier_name.to_string()))?;

        let mut accounts = self.accounts.write().expect("accounts lock poisoned");
        if accounts.contains_key(&account_id) {
            return Err(EngineError::AccountAlreadyExists(account_id));
        }

        let mut book = AccountBook::new(account_id, tier_name.to_string(), tier_limits(rules));
        book.state.activate()?;
        let snap = book.account_snapshot();
        accounts.insert(account_id, Arc::new(Mutex::new(book)));

        info!(account = %account_id, tier = %tier_name, "account activated");
        Ok(snap)
    }

    pub(crate) fn account_cell(
        &self,
        account_id: Uuid,
    ) -> Result<Arc<Mutex<AccountBook>>, EngineError> {
        self.accounts
            .read()
            .expect("accounts lock poisoned")
            .get(&account_id)
            .cloned()
            .ok_or(EngineError::UnknownAccount(account_id))
    }

    pub(crate) fn account_cells(&self) -> Vec<Arc<Mutex<AccountBook>>> {
        self.accounts
            .read()
            .expect("accounts lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn account(&self, account_id: Uuid) -> Result<AccountSnapshot, EngineError> {
        let cell = self.account_cell(account_id)?;
        let book = cell.lock().expect("account lock poisoned");
        Ok(book.account_snapshot())
    }

    pub fn account_ids(&self) -> Vec<Uuid> {
        self.accounts
            .read()
            .expect("accounts lock poisoned")
            .keys()
            .copied()
            .collect()
    }

    /// Positions marked to the current feed price.
    pub fn positions(&self, account_id: Uuid) -> Result<Vec<PositionSnapshot>, EngineError> {
        let cell = self.account_cell(account_id)?;
        let book = cell.lock().expect("account lock poisoned");
        Ok(book
            .positions
            .values()
            .map(|pos| self.position_snapshot(account_id, pos))
            .collect())
    }

    fn position_snapshot(&self, account_id: Uuid, pos: &PositionState) -> PositionSnapshot {
        let unrealized = match (
            self.cfg.instrument(&pos.symbol),
            self.feed.current(&pos.symbol),
        ) {
            (Some(spec), Ok(mark)) => unrealized_pnl_micros(pos, mark, &economics(spec)),
            _ => 0,
        };
        PositionSnapshot {
            account_id,
            symbol: pos.symbol.clone(),
            qty_signed: pos.qty_signed,
            avg_entry_price_micros: pos.avg_entry_price_micros,
            realized_pnl_micros: pos.realized_pnl_micros,
            unrealized_pnl_micros: unrealized,
            open: pos.open,
            bought: pos.bought,
            sold: pos.sold,
        }
    }

    pub fn orders(&self, account_id: Uuid) -> Result<Vec<OrderSnapshot>, EngineError> {
        let cell = self.account_cell(account_id)?;
        let book = cell.lock().expect("account lock poisoned");
        Ok(book.orders.values().map(|o| o.snapshot()).collect())
    }

    pub fn order(&self, account_id: Uuid, order_id: Uuid) -> Result<OrderSnapshot, EngineError> {
        let cell = self.account_cell(account_id)?;
        let book = cell.lock().expect("account lock poisoned");
        book.orders
            .get(&order_id)
            .map(|o| o.snapshot())
            .ok_or(EngineError::UnknownOrder(order_id))
    }

    pub fn executions(&self, account_id: Uuid) -> Result<Vec<ExecutionRecord>, EngineError> {
        let cell = self.account_cell(account_id)?;
        let book = cell.lock().expect("account lock poisoned");
        Ok(book.executions.clone())
    }

    pub fn rule_checks(&self, account_id: Uuid) -> Result<Vec<RuleCheckRecord>, EngineError> {
        let cell = self.account_cell(account_id)?;
        let book = cell.lock().expect("account lock poisoned");
        Ok(book.rule_checks.clone())
    }

    // -- order submission ----------------------------------------------------

    /// Run one submission through the full pipeline: validator -> simulator
    /// -> ledger -> account update -> evaluator. A validator refusal is a
    /// *successful* call returning a rejected snapshot; errors are reserved
    /// for not-found / not-tradable / malformed input.
    pub fn submit_order(&self, req: &OrderRequest) -> Result<OrderSnapshot, EngineError> {
        validate_request(req)?;

        // The fill needs a price series; without one the submission aborts
        // cleanly, writing no partial state.
        let current_px = self
            .feed
            .current(&req.symbol)
            .map_err(|e: FeedError| EngineError::UnknownSymbol(e.to_string()))?;

        let cell = self.account_cell(req.account_id)?;
        let mut book = cell.lock().expect("account lock poisoned");

        if !book.state.status.can_trade() {
            return Err(EngineError::AccountNotTradable {
                account_id: req.account_id,
                status: book.state.status.as_str().to_string(),
            });
        }

        let now = Utc::now();
        let mut order = Order::from_request(req, now);

        // Trailing stops snapshot their initial level from the price at
        // submission time — no hidden first-read side effects later.
        if let OrderKind::TrailingStop { trail_micros, .. } = order.kind {
            order.kind = OrderKind::TrailingStop {
                trail_micros,
                stop_price_micros: ratchet_trailing_stop(order.side, current_px, trail_micros, None),
            };
        }

        // Pre-trade checks against a point-in-time snapshot. The rule-check
        // record is written regardless of outcome.
        let instrument = self.cfg.instrument(&req.symbol);
        if instrument.is_none() {
            warn!(
                symbol = %req.symbol,
                "no contract specification; drawdown and margin checks skipped"
            );
        }
        let contract = instrument.map(contract_spec);
        let report = validate(&ValidationSnapshot {
            account: &book.state,
            tier: &book.tier,
            contract: contract.as_ref(),
            open_contracts: book.open_contracts(),
            qty: req.qty,
        });

        book.rule_checks
            .push(rule_check_record(&order, &report, now));

        if !report.passed {
            let reason = report.joined_reasons();
            info!(order = %order.order_id, %reason, "order rejected");
            order.apply(OrderEvent::Reject { reason }, now)?;
            let snap = order.snapshot();
            book.orders.insert(order.order_id, order);
            return Ok(snap);
        }

        order.apply(OrderEvent::Accept, now)?;
        let order_id = order.order_id;
        book.orders.insert(order_id, order);

        // Immediate evaluation: market orders fill now, marketable limits
        // fill at the better price, triggered stops convert or fill, the
        // rest park as working.
        self.try_fill_locked(&mut book, order_id, current_px, true)?;

        book.orders
            .get(&order_id)
            .map(|o| o.snapshot())
            .ok_or(EngineError::UnknownOrder(order_id))
    }

    /// Evaluate one order's trigger at `current_px` and run the fill unit
    /// if a fill is due. Caller holds the account lock.
    ///
    /// `on_arrival` selects the limit pricing policy: a marketable arrival
    /// (or a limit freshly converted from a stop-limit) improves to the
    /// current price; a resting limit the sweep found crossed fills at the
    /// limit itself, because the cross happened between samples.
    ///
    /// The status re-check at the top is the at-most-one-fill guard: a
    /// racing second path (foreground submit vs monitor sweep) observes a
    /// non-fillable order here and no-ops.
    pub(crate) fn try_fill_locked(
        &self,
        book: &mut AccountBook,
        order_id: Uuid,
        current_px: i64,
        on_arrival: bool,
    ) -> Result<SweepOutcome, EngineError> {
        let now = Utc::now();
        let mut triggered = false;
        let mut arrival = on_arrival;

        // Two passes at most: a stop-limit conversion may leave a limit
        // that is already marketable at this same price.
        for _ in 0..2 {
            // Re-borrow per pass so the fill unit below can take the book.
            let (mut kind, side, symbol, remaining) = {
                let Some(order) = book.orders.get(&order_id) else {
                    return Ok(SweepOutcome::Skipped);
                };
                if !order.is_fillable() {
                    return Ok(SweepOutcome::Skipped);
                }
                (
                    order.kind,
                    order.side,
                    order.symbol.clone(),
                    order.remaining_qty,
                )
            };

            let decision = evaluate_trigger(&mut kind, side, current_px);

            // Persist whatever the evaluation did to the trigger state
            // (trailing ratchet, stop-limit conversion).
            if let Some(order) = book.orders.get_mut(&order_id) {
                order.kind = kind;
            }

            match decision {
                FillDecision::None => {
                    self.park_if_submitted(book, order_id, now)?;
                    return Ok(if triggered {
                        SweepOutcome::Triggered
                    } else {
                        SweepOutcome::Resting
                    });
                }
                FillDecision::ConvertedToLimit => {
                    triggered = true;
                    // The converted limit is a fresh arrival for pricing.
                    arrival = true;
                    self.park_if_submitted(book, order_id, now)?;
                    continue;
                }
                FillDecision::FillAtLimit { limit_price_micros } => {
                    let px = if arrival {
                        limit_fill_price(side, current_px, limit_price_micros)
                    } else {
                        limit_price_micros
                    };
                    self.fill_unit_locked(book, order_id, px, 0)?;
                    return Ok(SweepOutcome::Filled { triggered });
                }
                FillDecision::FillAsMarket => {
                    let is_stop = !matches!(kind, OrderKind::Market);
                    triggered = triggered || is_stop;
                    let (px, slippage) = self.marketable_price(&symbol, side, remaining, current_px);
                    self.fill_unit_locked(book, order_id, px, slippage)?;
                    return Ok(SweepOutcome::Filled { triggered });
                }
            }
        }

        Ok(if triggered {
            SweepOutcome::Triggered
        } else {
            SweepOutcome::Resting
        })
    }

    fn park_if_submitted(
        &self,
        book: &mut AccountBook,
        order_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        if let Some(order) = book.orders.get_mut(&order_id) {
            if order.status == OrderStatus::Submitted {
                order.apply(OrderEvent::Park, now)?;
            }
        }
        Ok(())
    }

    /// Current price plus size-scaled adverse slippage for a market-style
    /// fill. The baseline draw comes from the symbol's seeded RNG.
    fn marketable_price(&self, symbol: &str, side: Side, qty: i64, current_px: i64) -> (i64, i64) {
        let Some(spec) = self.cfg.instrument(symbol) else {
            // No contract spec: no tick structure to slip against.
            return (current_px, 0);
        };
        let base_ticks = self
            .feed
            .draw_slippage_ticks(symbol, self.cfg.engine.slippage_base_ticks_max)
            .unwrap_or(0);
        let slip_ticks =
            effective_slippage_ticks(base_ticks, qty, self.cfg.engine.slippage_size_step);
        market_fill_price(side, current_px, slip_ticks, spec.tick_size_micros)
    }

    /// The fill unit — one logical commit under the account lock:
    /// (a) record the execution, (b) update order quantities/avg price,
    /// (c) apply to the position ledger, (d) move balance and daily PnL by
    /// gross realized minus commission and fees, (e) run the account
    /// evaluator, (f) open-order/open-contract counters are derived views
    /// of the book and are consistent the moment the lock releases.
    fn fill_unit_locked(
        &self,
        book: &mut AccountBook,
        order_id: Uuid,
        fill_px: i64,
        slippage_micros: i64,
    ) -> Result<(), EngineError> {
        let now = Utc::now();

        let (qty, symbol, side) = {
            let order = book
                .orders
                .get(&order_id)
                .ok_or(EngineError::UnknownOrder(order_id))?;
            (order.remaining_qty, order.symbol.clone(), order.side)
        };

        let commission = book.tier.commission_per_contract_micros.saturating_mul(qty);
        let fee = book.tier.fee_per_contract_micros.saturating_mul(qty);

        // (a) the execution is the durable fact; position and balance
        // re-derive from the execution log on recovery.
        book.executions.push(ExecutionRecord {
            execution_id: Uuid::new_v4(),
            order_id,
            account_id: book.account_id,
            symbol: symbol.clone(),
            side: side.as_str().to_string(),
            qty,
            fill_price_micros: fill_px,
            commission_micros: commission,
            fee_micros: fee,
            slippage_micros,
            ts_utc: now,
        });

        // (b) order quantities and average fill price.
        {
            let order = book
                .orders
                .get_mut(&order_id)
                .ok_or(EngineError::UnknownOrder(order_id))?;
            order.apply(
                OrderEvent::Fill {
                    qty,
                    price_micros: fill_px,
                },
                now,
            )?;
        }

        info!(
            order = %order_id,
            %symbol,
            side = %side,
            qty,
            price_micros = fill_px,
            slippage_micros,
            "order filled"
        );

        // (c) position ledger split.
        let econ = self
            .cfg
            .instrument(&symbol)
            .map(economics)
            // Degenerate 1:1 economics when no spec exists: price moves
            // convert to dollars tick-for-tick.
            .unwrap_or(ContractEconomics {
                tick_size_micros: 1,
                tick_value_micros: 1,
            });

        let pos = book
            .positions
            .entry(symbol.clone())
            .or_insert_with(|| PositionState::new(symbol.clone()));
        // A closed record means the symbol traded flat earlier: archive it
        // and begin the new position the data model requires.
        if !pos.open && (pos.bought > 0 || pos.sold > 0) {
            let archived = std::mem::replace(pos, PositionState::new(symbol.clone()));
            book.closed_positions.push(archived);
        }

        let applied = apply_execution(
            pos,
            &Fill {
                side: side.into(),
                qty,
                price_micros: fill_px,
                commission_micros: commission,
                fee_micros: fee,
            },
            &econ,
        );

        // (d) balance and daily PnL.
        book.state.balance_micros = book
            .state
            .balance_micros
            .saturating_add(applied.balance_delta_micros);
        book.state.daily_pnl_micros = book
            .state
            .daily_pnl_micros
            .saturating_add(applied.balance_delta_micros);
        book.state.traded_today = true;

        // (e) evaluation after every balance change.
        let decision = evaluate_after_balance_change(&book.tier, &mut book.state);
        self.react_to_evaluation(book, &decision, now);

        // (f) derived counters: nothing to write, see AccountBook.
        Ok(())
    }

    fn react_to_evaluation(
        &self,
        book: &mut AccountBook,
        decision: &EvalDecision,
        now: DateTime<Utc>,
    ) {
        match decision.outcome {
            EvalOutcome::Failed => {
                warn!(
                    account = %book.account_id,
                    reason = decision.reason.unwrap_or(""),
                    "account failed"
                );
                // A breached account must not keep trading: every resting
                // order dies with the account.
                cancel_all_resting(book, now);
            }
            EvalOutcome::DailyLossTripped => {
                warn!(account = %book.account_id, "daily loss limit hit; new orders blocked");
            }
            EvalOutcome::Passed => {
                info!(account = %book.account_id, "evaluation passed");
            }
            EvalOutcome::NoChange | EvalOutcome::NotEvaluable => {}
        }
    }

    // -- cancellation --------------------------------------------------------

    /// Cancel an order. Cancelling an already-terminal order is a silent
    /// no-op returning the current snapshot — the monitor may have filled
    /// it concurrently and that is not an error.
    pub fn cancel_order(
        &self,
        account_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderSnapshot, EngineError> {
        let cell = self.account_cell(account_id)?;
        let mut book = cell.lock().expect("account lock poisoned");

        let order = book
            .orders
            .get_mut(&order_id)
            .ok_or(EngineError::UnknownOrder(order_id))?;

        if order.status.is_terminal() {
            return Ok(order.snapshot());
        }

        order.apply(OrderEvent::Cancel, Utc::now())?;
        info!(order = %order_id, "order cancelled");
        Ok(order.snapshot())
    }

    // -- administrative transitions -------------------------------------------

    pub fn suspend_account(&self, account_id: Uuid) -> Result<AccountSnapshot, EngineError> {
        self.with_book(account_id, |book| {
            book.state.suspend()?;
            cancel_all_resting(book, Utc::now());
            Ok(book.account_snapshot())
        })
    }

    pub fn resume_account(&self, account_id: Uuid) -> Result<AccountSnapshot, EngineError> {
        self.with_book(account_id, |book| {
            book.state.activate()?;
            Ok(book.account_snapshot())
        })
    }

    /// Evaluation period ended without a pass: resting orders expire and
    /// the account leaves the tradable set.
    pub fn expire_account(&self, account_id: Uuid) -> Result<AccountSnapshot, EngineError> {
        self.with_book(account_id, |book| {
            book.state.expire()?;
            let now = Utc::now();
            let ids: Vec<Uuid> = book
                .orders
                .values()
                .filter(|o| o.status.is_resting())
                .map(|o| o.order_id)
                .collect();
            for id in ids {
                if let Some(order) = book.orders.get_mut(&id) {
                    // PartiallyFilled orders cannot expire; leave them.
                    let _ = order.apply(OrderEvent::Expire, now);
                }
            }
            Ok(book.account_snapshot())
        })
    }

    pub fn fund_account(&self, account_id: Uuid) -> Result<AccountSnapshot, EngineError> {
        self.with_book(account_id, |book| {
            book.state.fund()?;
            Ok(book.account_snapshot())
        })
    }

    /// End-of-day processing for every account: trail the drawdown floor,
    /// reset daily state, count trading days — may complete a pass.
    pub fn roll_trading_day(&self) -> Vec<(Uuid, EvalDecision)> {
        let mut out = Vec::new();
        for cell in self.account_cells() {
            let mut book = cell.lock().expect("account lock poisoned");
            let book = &mut *book;
            let decision = roll_trading_day(&book.tier, &mut book.state);
            if decision.status_changed() {
                info!(
                    account = %book.account_id,
                    outcome = ?decision.outcome,
                    "status change at day rollover"
                );
            }
            out.push((book.account_id, decision));
        }
        out
    }

    fn with_book<T>(
        &self,
        account_id: Uuid,
        f: impl FnOnce(&mut AccountBook) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let cell = self.account_cell(account_id)?;
        let mut book = cell.lock().expect("account lock poisoned");
        f(&mut book)
    }

    // -- recovery -------------------------------------------------------------

    /// Rebuild an account book from durable storage after a restart.
    ///
    /// The execution log is the source of truth: the current position per
    /// symbol, realized PnL, and the balance re-derive from replaying it.
    /// Status, high-water mark, trailing floor, and daily state come from
    /// the persisted projection; orders are restored from their snapshots
    /// (unparseable ones are logged and skipped, not fatal).
    pub fn restore_account(
        &self,
        snapshot: &AccountSnapshot,
        orders: &[OrderSnapshot],
        executions: &[ExecutionRecord],
    ) -> Result<AccountSnapshot, EngineError> {
        let rules = self
            .cfg
            .tiers
            .get(&snapshot.tier)
            .ok_or_else(|| EngineError::UnknownTier(snapshot.tier.clone()))?;
        let status = spd_risk::AccountStatus::parse(&snapshot.status).ok_or_else(|| {
            EngineError::BadRequest(format!("unknown account status: {}", snapshot.status))
        })?;

        let mut accounts = self.accounts.write().expect("accounts lock poisoned");
        if accounts.contains_key(&snapshot.account_id) {
            return Err(EngineError::AccountAlreadyExists(snapshot.account_id));
        }

        let mut book = AccountBook::new(
            snapshot.account_id,
            snapshot.tier.clone(),
            tier_limits(rules),
        );
        book.state.status = status;
        book.state.high_water_mark_micros = snapshot.high_water_mark_micros;
        book.state.drawdown_threshold_micros = snapshot.drawdown_threshold_micros;
        book.state.daily_pnl_micros = snapshot.daily_pnl_micros;
        book.state.daily_loss_limit_hit = snapshot.daily_loss_limit_hit;
        book.state.profit_target_reached = snapshot.profit_target_reached;
        book.state.trading_days = snapshot.trading_days;

        // Replay the execution log: per-symbol position rebuild plus the
        // net balance contribution.
        let mut per_symbol: BTreeMap<String, Vec<Fill>> = BTreeMap::new();
        for exec in executions {
            let Some(side) = Side::parse(&exec.side) else {
                warn!(execution = %exec.execution_id, side = %exec.side, "skipping execution with unknown side");
                continue;
            };
            per_symbol.entry(exec.symbol.clone()).or_default().push(Fill {
                side: side.into(),
                qty: exec.qty,
                price_micros: exec.fill_price_micros,
                commission_micros: exec.commission_micros,
                fee_micros: exec.fee_micros,
            });
        }

        let mut balance = book.state.initial_balance_micros;
        for (symbol, fills) in per_symbol {
            let econ = self
                .cfg
                .instrument(&symbol)
                .map(economics)
                .unwrap_or(ContractEconomics {
                    tick_size_micros: 1,
                    tick_value_micros: 1,
                });
            let recomputed = spd_portfolio::recompute_from_executions(&symbol, &fills, &econ);
            balance = balance.saturating_add(recomputed.balance_delta_micros);
            book.positions.insert(symbol, recomputed.position);
        }
        book.state.balance_micros = balance;
        book.executions = executions.to_vec();

        for snap in orders {
            match Order::from_snapshot(snap) {
                Some(order) => {
                    book.orders.insert(order.order_id, order);
                }
                None => {
                    warn!(order = %snap.order_id, "skipping unparseable order snapshot");
                }
            }
        }

        let restored = book.account_snapshot();
        accounts.insert(snapshot.account_id, Arc::new(Mutex::new(book)));
        info!(account = %snapshot.account_id, balance_micros = restored.balance_micros, "account restored from execution log");
        Ok(restored)
    }
}

fn cancel_all_resting(book: &mut AccountBook, now: DateTime<Utc>) {
    let ids: Vec<Uuid> = book
        .orders
        .values()
        .filter(|o| o.status.is_resting())
        .map(|o| o.order_id)
        .collect();
    for id in ids {
        if let Some(order) = book.orders.get_mut(&id) {
            // PartiallyFilled cannot cancel; the fill path owns it.
            if order.apply(OrderEvent::Cancel, now).is_ok() {
                info!(order = %id, "resting order cancelled with account");
            }
        }
    }
}

fn validate_request(req: &OrderRequest) -> Result<(), EngineError> {
    if req.qty <= 0 {
        return Err(EngineError::BadRequest(format!(
            "quantity must be positive, got {}",
            req.qty
        )));
    }
    let params = [
        req.kind.limit_price(),
        match req.kind {
            // The trailing placeholder stop is computed at submission; the
            // trail distance itself is what must be positive.
            OrderKind::TrailingStop { trail_micros, .. } => Some(trail_micros),
            _ => req.kind.stop_price(),
        },
    ];
    for px in params.into_iter().flatten() {
        if px <= 0 {
            return Err(EngineError::BadRequest(
                "price parameters must be positive".to_string(),
            ));
        }
    }
    Ok(())
}

fn rule_check_record(
    order: &Order,
    report: &ValidationReport,
    now: DateTime<Utc>,
) -> RuleCheckRecord {
    RuleCheckRecord {
        record_id: Uuid::new_v4(),
        order_id: order.order_id,
        account_id: order.account_id,
        passed: report.passed,
        checks: report
            .checks
            .iter()
            .map(|c| RuleCheckResult {
                name: c.kind.as_str().to_string(),
                outcome: c.outcome.as_str().to_string(),
                reason: c.reason.clone(),
            })
            .collect(),
        failure_reasons: report.failure_reasons.clone(),
        ts_utc: now,
    }
}
