use std::fmt;

use uuid::Uuid;

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

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BUY" => Some(Side::Buy),
            "SELL" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Side> for spd_portfolio::Side {
    fn from(s: Side) -> Self {
        match s {
            Side::Buy => spd_portfolio::Side::Buy,
            Side::Sell => spd_portfolio::Side::Sell,
        }
    }
}

/// Order type as a tagged union: the price parameters an order type needs
/// travel with the variant, so a limit order without a limit price is
/// unrepresentable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderKind {
    Market,
    Limit {
        limit_price_micros: i64,
    },
    Stop {
        stop_price_micros: i64,
    },
    /// On trigger this does not fill — it converts into a working limit at
    /// `limit_price_micros`.
    StopLimit {
        stop_price_micros: i64,
        limit_price_micros: i64,
    },
    /// `stop_price_micros` is the current ratcheted level, recomputed every
    /// monitoring tick as `price ∓ trail`, moving only in the trader's
    /// favor.
    TrailingStop {
        trail_micros: i64,
        stop_price_micros: i64,
    },
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Market => "market",
            OrderKind::Limit { .. } => "limit",
            OrderKind::Stop { .. } => "stop",
            OrderKind::StopLimit { .. } => "stop_limit",
            OrderKind::TrailingStop { .. } => "trailing_stop",
        }
    }

    pub fn limit_price(&self) -> Option<i64> {
        match self {
            OrderKind::Limit { limit_price_micros }
            | OrderKind::StopLimit {
                limit_price_micros, ..
            } => Some(*limit_price_micros),
            _ => None,
        }
    }

    pub fn stop_price(&self) -> Option<i64> {
        match self {
            OrderKind::Stop { stop_price_micros }
            | OrderKind::StopLimit {
                stop_price_micros, ..
            }
            | OrderKind::TrailingStop {
                stop_price_micros, ..
            } => Some(*stop_price_micros),
            _ => None,
        }
    }

    pub fn trail(&self) -> Option<i64> {
        match self {
            OrderKind::TrailingStop { trail_micros, .. } => Some(*trail_micros),
            _ => None,
        }
    }

    /// Rebuild a kind from its wire representation (recovery path).
    /// Returns `None` when a required price parameter is missing.
    pub fn from_wire(
        kind: &str,
        limit_price_micros: Option<i64>,
        stop_price_micros: Option<i64>,
        trail_micros: Option<i64>,
    ) -> Option<Self> {
        match kind {
            "market" => Some(OrderKind::Market),
            "limit" => Some(OrderKind::Limit {
                limit_price_micros: limit_price_micros?,
            }),
            "stop" => Some(OrderKind::Stop {
                stop_price_micros: stop_price_micros?,
            }),
            "stop_limit" => Some(OrderKind::StopLimit {
                stop_price_micros: stop_price_micros?,
                limit_price_micros: limit_price_micros?,
            }),
            "trailing_stop" => Some(OrderKind::TrailingStop {
                trail_micros: trail_micros?,
                stop_price_micros: stop_price_micros?,
            }),
            _ => None,
        }
    }
}

/// One incoming trading instruction, before the engine assigns it an order
/// id and runs it through the pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderRequest {
    pub account_id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub kind: OrderKind,
    /// Always positive.
    pub qty: i64,
}

impl OrderRequest {
    pub fn market(account_id: Uuid, symbol: impl Into<String>, side: Side, qty: i64) -> Self {
        Self {
            account_id,
            symbol: symbol.into(),
            side,
            kind: OrderKind::Market,
            qty,
        }
    }

    pub fn limit(
        account_id: Uuid,
        symbol: impl Into<String>,
        side: Side,
        qty: i64,
        limit_price_micros: i64,
    ) -> Self {
        Self {
            account_id,
            symbol: symbol.into(),
            side,
            kind: OrderKind::Limit { limit_price_micros },
            qty,
        }
    }

    pub fn stop(
        account_id: Uuid,
        symbol: impl Into<String>,
        side: Side,
        qty: i64,
        stop_price_micros: i64,
    ) -> Self {
        Self {
            account_id,
            symbol: symbol.into(),
            side,
            kind: OrderKind::Stop { stop_price_micros },
            qty,
        }
    }

    pub fn stop_limit(
        account_id: Uuid,
        symbol: impl Into<String>,
        side: Side,
        qty: i64,
        stop_price_micros: i64,
        limit_price_micros: i64,
    ) -> Self {
        Self {
            account_id,
            symbol: symbol.into(),
            side,
            kind: OrderKind::StopLimit {
                stop_price_micros,
                limit_price_micros,
            },
            qty,
        }
    }

    /// Trailing stop; the initial stop level is computed from the current
    /// price at submission time.
    pub fn trailing_stop(
        account_id: Uuid,
        symbol: impl Into<String>,
        side: Side,
        qty: i64,
        trail_micros: i64,
    ) -> Self {
        Self {
            account_id,
            symbol: symbol.into(),
            side,
            kind: OrderKind::TrailingStop {
                trail_micros,
                // Placeholder until submission snapshots the price.
                stop_price_micros: 0,
            },
            qty,
        }
    }
}
