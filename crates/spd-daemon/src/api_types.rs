//! Request and response types for all spd-daemon HTTP endpoints.
//!
//! `Serialize + Deserialize` so Axum can JSON-encode them and the tests
//! can decode them. No business logic lives here.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// /v1/health  /v1/status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub daemon_uptime_secs: u64,
    pub config_hash: String,
    pub accounts: usize,
    pub symbols: Vec<String>,
    pub sweep_interval_secs: u64,
    pub persistence: bool,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Uniform error body. Internal failures use the generic message and leak
/// no detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// /v1/accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    pub tier: String,
    /// Billing hands the core a pre-existing account id; generated when
    /// absent (manual/testing use).
    pub account_id: Option<Uuid>,
}

// ---------------------------------------------------------------------------
// /v1/orders
// ---------------------------------------------------------------------------

/// Wire form of an order submission. Prices are integer micros, like
/// every other price in the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOrderRequest {
    pub account_id: Uuid,
    pub symbol: String,
    /// "BUY" | "SELL"
    pub side: String,
    /// "market" | "limit" | "stop" | "stop_limit" | "trailing_stop"
    pub kind: String,
    pub qty: i64,
    pub limit_price_micros: Option<i64>,
    pub stop_price_micros: Option<i64>,
    pub trail_micros: Option<i64>,
}

// ---------------------------------------------------------------------------
// /v1/prices/:symbol
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceResponse {
    pub symbol: String,
    pub price_micros: i64,
    /// Convenience float for display; the engine never consumes it.
    pub price: f64,
}
