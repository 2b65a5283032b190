#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    /// Signed quantity delta this side contributes: +qty for buys,
    /// -qty for sells.
    pub fn signed(&self, qty: i64) -> i64 {
        match self {
            Side::Buy => qty,
            Side::Sell => -qty,
        }
    }
}

/// The slice of an execution the ledger needs. `qty` is always positive;
/// direction comes from `side`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fill {
    pub side: Side,
    pub qty: i64,
    pub price_micros: i64,
    pub commission_micros: i64,
    pub fee_micros: i64,
}

impl Fill {
    pub fn cost_micros(&self) -> i64 {
        self.commission_micros.saturating_add(self.fee_micros)
    }
}

/// Contract economics needed to turn a price move into dollars:
/// one tick of movement is worth `tick_value_micros` per contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContractEconomics {
    pub tick_size_micros: i64,
    pub tick_value_micros: i64,
}

/// The single position aggregate for one (account, symbol).
///
/// Invariants:
/// - `realized_pnl_micros` changes only when `qty_signed` moves toward
///   zero (a reduction or the closing leg of a reversal)
/// - `avg_entry_price_micros` changes only when the magnitude grows in the
///   same direction (or a reversal opens the opposite leg)
/// - `open == (qty_signed != 0)`; a closed record stays for audit and a
///   new position starts if the symbol trades again
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PositionState {
    pub symbol: String,
    /// +long / -short.
    pub qty_signed: i64,
    pub avg_entry_price_micros: i64,
    /// Net realized PnL accumulated over reductions (monotonic timeline,
    /// not monotonic value).
    pub realized_pnl_micros: i64,
    /// Commissions/fees paid on adds, not yet released into realized PnL.
    pub open_cost_carry_micros: i64,
    pub open: bool,
    /// Cumulative contracts bought / sold over the record's lifetime.
    pub bought: i64,
    pub sold: i64,
}

impl PositionState {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            qty_signed: 0,
            avg_entry_price_micros: 0,
            realized_pnl_micros: 0,
            open_cost_carry_micros: 0,
            open: false,
            bought: 0,
            sold: 0,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.qty_signed == 0
    }

    pub fn abs_qty(&self) -> i64 {
        self.qty_signed.abs()
    }
}
