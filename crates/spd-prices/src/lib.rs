//! spd-prices
//!
//! Synthetic per-symbol price series: a bounded random walk with mean
//! reversion toward the instrument's reference level, always emitted as a
//! multiple of tick size.
//!
//! # Design invariants
//!
//! - The feed is an explicit shared handle injected into every consumer
//!   (execution path and bar/chart path read the same state). It is never
//!   ambient global state, and symbols are registered explicitly up front —
//!   there is no lazy ensure-initialized on first read.
//! - `current()` is idempotent within a sampling interval: repeated reads
//!   return the identical price until `advance()` moves the walk one tick.
//!   A resting order's trigger check and its fill therefore price off the
//!   same value.
//! - Completed OHLC bars are built once as ticks advance and cached; they
//!   are never regenerated, so execution prices stay consistent with any
//!   history already shown to the trader.
//! - Per-symbol RNGs are seeded from sha256(master_seed, symbol), so a
//!   fixed master seed reproduces each symbol's series regardless of
//!   registration order.

use std::collections::BTreeMap;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

use spd_config::InstrumentSpec;
use spd_schemas::BarRecord;

mod wire;

pub use wire::{micros_to_price, price_to_micros, PricingError, MICROS_PER_UNIT};

/// Divisor controlling mean-reversion strength: each tick pulls the walk
/// back toward the reference by displacement/REVERSION_DIVISOR ticks.
const REVERSION_DIVISOR: i64 = 64;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// Symbol was never registered with the feed.
    UnknownSymbol(String),
    /// Symbol registered twice; registration is a one-time explicit step.
    AlreadyRegistered(String),
}

impl std::fmt::Display for FeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedError::UnknownSymbol(s) => write!(f, "unknown symbol: {s}"),
            FeedError::AlreadyRegistered(s) => write!(f, "symbol already registered: {s}"),
        }
    }
}

impl std::error::Error for FeedError {}

// ---------------------------------------------------------------------------
// SymbolWalk
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct SymbolWalk {
    spec: InstrumentSpec,
    rng: StdRng,
    last_price_micros: i64,
    /// Monotonic tick counter (also the seq of the bar being built).
    tick_seq: u64,
    bar_span_ticks: u32,
    current_bar: Option<BarRecord>,
    completed_bars: Vec<BarRecord>,
}

impl SymbolWalk {
    fn new(spec: InstrumentSpec, seed: u64, bar_span_ticks: u32) -> Self {
        let start = spec.reference_price_micros;
        Self {
            spec,
            rng: StdRng::seed_from_u64(seed),
            last_price_micros: start,
            tick_seq: 0,
            bar_span_ticks: bar_span_ticks.max(1),
            current_bar: None,
            completed_bars: Vec::new(),
        }
    }

    /// One walk step: bounded random movement plus mean reversion, rounded
    /// to tick size by construction (all arithmetic is in whole ticks).
    fn advance(&mut self) -> i64 {
        let tick = self.spec.tick_size_micros;
        let vol = self.spec.volatility_ticks as i64;

        let random_ticks = if vol > 0 {
            self.rng.gen_range(-vol..=vol)
        } else {
            0
        };

        // Displacement from the reference, in ticks; the pull is a fraction
        // of it, capped at the volatility amplitude so reversion can never
        // dominate the walk.
        let displacement_ticks = (self.spec.reference_price_micros - self.last_price_micros) / tick;
        let reversion_ticks = (displacement_ticks / REVERSION_DIVISOR).clamp(-vol.max(1), vol.max(1));

        let mut next = self.last_price_micros + (random_ticks + reversion_ticks) * tick;
        // Never at or below zero: floor at one tick.
        if next < tick {
            next = tick;
        }

        self.last_price_micros = next;
        self.tick_seq += 1;
        self.roll_bar(next);
        next
    }

    fn roll_bar(&mut self, px: i64) {
        match self.current_bar.as_mut() {
            None => {
                self.current_bar = Some(BarRecord {
                    seq: self.completed_bars.len() as u64,
                    open_micros: px,
                    high_micros: px,
                    low_micros: px,
                    close_micros: px,
                    ticks: 1,
                });
            }
            Some(bar) => {
                bar.high_micros = bar.high_micros.max(px);
                bar.low_micros = bar.low_micros.min(px);
                bar.close_micros = px;
                bar.ticks += 1;
            }
        }

        let complete = self
            .current_bar
            .map(|b| b.ticks >= self.bar_span_ticks)
            .unwrap_or(false);
        if complete {
            // A completed bar is frozen: appended once, never touched again.
            if let Some(bar) = self.current_bar.take() {
                self.completed_bars.push(bar);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PriceFeed
// ---------------------------------------------------------------------------

/// Shared synthetic feed. Wrap in an `Arc` and hand the same instance to
/// the execution engine and to any chart/bar consumer.
pub struct PriceFeed {
    master_seed: u64,
    bar_span_ticks: u32,
    walks: Mutex<BTreeMap<String, SymbolWalk>>,
}

impl PriceFeed {
    pub fn new(master_seed: u64, bar_span_ticks: u32) -> Self {
        Self {
            master_seed,
            bar_span_ticks,
            walks: Mutex::new(BTreeMap::new()),
        }
    }

    /// Explicit one-time registration of a symbol. Returns an error if the
    /// symbol is already registered.
    pub fn register(&self, symbol: &str, spec: InstrumentSpec) -> Result<(), FeedError> {
        let mut walks = self.walks.lock().expect("price feed mutex poisoned");
        if walks.contains_key(symbol) {
            return Err(FeedError::AlreadyRegistered(symbol.to_string()));
        }
        let seed = sub_seed(self.master_seed, symbol);
        walks.insert(
            symbol.to_string(),
            SymbolWalk::new(spec, seed, self.bar_span_ticks),
        );
        Ok(())
    }

    pub fn is_registered(&self, symbol: &str) -> bool {
        self.walks
            .lock()
            .expect("price feed mutex poisoned")
            .contains_key(symbol)
    }

    /// Current price for `symbol`. Idempotent: reads do not move the walk.
    pub fn current(&self, symbol: &str) -> Result<i64, FeedError> {
        let walks = self.walks.lock().expect("price feed mutex poisoned");
        walks
            .get(symbol)
            .map(|w| w.last_price_micros)
            .ok_or_else(|| FeedError::UnknownSymbol(symbol.to_string()))
    }

    /// Advance one symbol by a single tick and return the new price.
    pub fn advance(&self, symbol: &str) -> Result<i64, FeedError> {
        let mut walks = self.walks.lock().expect("price feed mutex poisoned");
        walks
            .get_mut(symbol)
            .map(|w| w.advance())
            .ok_or_else(|| FeedError::UnknownSymbol(symbol.to_string()))
    }

    /// Advance every registered symbol by one tick (one sampling interval).
    pub fn advance_all(&self) {
        let mut walks = self.walks.lock().expect("price feed mutex poisoned");
        for walk in walks.values_mut() {
            walk.advance();
        }
    }

    /// Completed bars for `symbol` (the in-progress bar is excluded until
    /// it completes).
    pub fn bars(&self, symbol: &str) -> Result<Vec<BarRecord>, FeedError> {
        let walks = self.walks.lock().expect("price feed mutex poisoned");
        walks
            .get(symbol)
            .map(|w| w.completed_bars.clone())
            .ok_or_else(|| FeedError::UnknownSymbol(symbol.to_string()))
    }

    /// Instrument spec the symbol was registered with.
    pub fn spec(&self, symbol: &str) -> Result<InstrumentSpec, FeedError> {
        let walks = self.walks.lock().expect("price feed mutex poisoned");
        walks
            .get(symbol)
            .map(|w| w.spec.clone())
            .ok_or_else(|| FeedError::UnknownSymbol(symbol.to_string()))
    }

    pub fn symbols(&self) -> Vec<String> {
        self.walks
            .lock()
            .expect("price feed mutex poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Test escape hatch: pin a symbol's current price so scenario tests
    /// can script exact sequences. Gated so production code cannot reach
    /// it.
    #[cfg(any(test, feature = "testkit"))]
    pub fn set_price_for_test(&self, symbol: &str, price_micros: i64) -> Result<(), FeedError> {
        let mut walks = self.walks.lock().expect("price feed mutex poisoned");
        let walk = walks
            .get_mut(symbol)
            .ok_or_else(|| FeedError::UnknownSymbol(symbol.to_string()))?;
        walk.last_price_micros = price_micros;
        Ok(())
    }

    /// Draw a baseline slippage amount in ticks from the symbol's RNG,
    /// uniform in `0..=max_ticks`. Lives here so all randomness flows from
    /// the same seeded per-symbol stream.
    pub fn draw_slippage_ticks(&self, symbol: &str, max_ticks: u32) -> Result<i64, FeedError> {
        let mut walks = self.walks.lock().expect("price feed mutex poisoned");
        let walk = walks
            .get_mut(symbol)
            .ok_or_else(|| FeedError::UnknownSymbol(symbol.to_string()))?;
        if max_ticks == 0 {
            return Ok(0);
        }
        Ok(walk.rng.gen_range(0..=max_ticks as i64))
    }
}

/// Derive a per-symbol sub-seed from the master seed. Hash-based, so the
/// result is independent of registration order.
fn sub_seed(master_seed: u64, symbol: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(master_seed.to_le_bytes());
    hasher.update(symbol.as_bytes());
    let hash = hasher.finalize();
    u64::from_le_bytes(hash[..8].try_into().expect("sha256 output >= 8 bytes"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
