//! Axum router and all HTTP handlers for spd-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and
//! attaches middleware layers. Handlers stay thin: parse, call the
//! engine, persist, broadcast, respond.
//!
//! Error policy: validation refusals come back as ordinary `200` order
//! snapshots with itemized reasons; not-found and not-tradable map to
//! 404/409 with a message; engine consistency alarms map to a generic
//! 500 ("order could not be processed") with no internal detail.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{error, info};
use uuid::Uuid;

use spd_execution::{EngineError, OrderKind, OrderRequest, Side};
use spd_prices::micros_to_price;

use crate::{
    api_types::{
        CreateAccountRequest, ErrorResponse, HealthResponse, PriceResponse, StatusResponse,
        SubmitOrderRequest,
    },
    state::{uptime_secs, AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .route("/v1/accounts", post(create_account))
        .route("/v1/accounts/:id", get(get_account))
        .route("/v1/accounts/:id/positions", get(get_positions))
        .route("/v1/accounts/:id/orders", get(get_orders))
        .route("/v1/accounts/:id/executions", get(get_executions))
        .route("/v1/accounts/:id/rule-checks", get(get_rule_checks))
        .route("/v1/accounts/:id/orders/:order_id/cancel", post(cancel_order))
        .route("/v1/orders", post(submit_order))
        .route("/v1/sweep", post(run_sweep))
        .route("/v1/roll-day", post(roll_day))
        .route("/v1/prices/:symbol", get(get_price))
        .route("/v1/bars/:symbol", get(get_bars))
        .with_state(state)
}

fn not_found(msg: String) -> Response {
    (StatusCode::NOT_FOUND, Json(ErrorResponse { error: msg })).into_response()
}

fn bad_request(msg: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: msg })).into_response()
}

fn engine_error_response(err: EngineError) -> Response {
    match &err {
        EngineError::UnknownAccount(_)
        | EngineError::UnknownOrder(_)
        | EngineError::UnknownTier(_)
        | EngineError::UnknownSymbol(_) => not_found(err.to_string()),
        EngineError::AccountAlreadyExists(_) | EngineError::AccountNotTradable { .. } => (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: err.to_string(),
            }),
        )
            .into_response(),
        EngineError::BadRequest(_) => bad_request(err.to_string()),
        EngineError::Transition(_) | EngineError::Status(_) => {
            // Consistency alarm: log the detail, return nothing internal.
            error!(error = %err, "engine consistency error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "order could not be processed".to_string(),
                }),
            )
                .into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// GET /v1/health  /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let cfg = st.engine.config();
    (
        StatusCode::OK,
        Json(StatusResponse {
            daemon_uptime_secs: uptime_secs(),
            config_hash: st.config_hash.clone(),
            accounts: st.engine.account_ids().len(),
            symbols: st.engine.feed().symbols(),
            sweep_interval_secs: cfg.engine.sweep_interval_secs,
            persistence: st.pool.is_some(),
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /v1/accounts  GET /v1/accounts/:id ...
// ---------------------------------------------------------------------------

pub(crate) async fn create_account(
    State(st): State<Arc<AppState>>,
    Json(req): Json<CreateAccountRequest>,
) -> Response {
    let account_id = req.account_id.unwrap_or_else(Uuid::new_v4);
    match st.engine.add_account(account_id, &req.tier) {
        Ok(snap) => {
            if let Some(pool) = &st.pool {
                if let Err(err) = spd_db::upsert_account(pool, &snap).await {
                    error!(account = %account_id, error = %err, "persist account failed");
                }
            }
            st.audit(
                account_id,
                spd_audit::TOPIC_ACCOUNTS,
                "account_activated",
                serde_json::json!({ "tier": snap.tier, "balance_micros": snap.balance_micros }),
            );
            let _ = st.bus.send(BusMsg::Account(snap.clone()));
            (StatusCode::CREATED, Json(snap)).into_response()
        }
        Err(err) => engine_error_response(err),
    }
}

pub(crate) async fn get_account(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match st.engine.account(id) {
        Ok(snap) => (StatusCode::OK, Json(snap)).into_response(),
        Err(err) => engine_error_response(err),
    }
}

pub(crate) async fn get_positions(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match st.engine.positions(id) {
        Ok(positions) => (StatusCode::OK, Json(positions)).into_response(),
        Err(err) => engine_error_response(err),
    }
}

pub(crate) async fn get_orders(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    match st.engine.orders(id) {
        Ok(orders) => (StatusCode::OK, Json(orders)).into_response(),
        Err(err) => engine_error_response(err),
    }
}

pub(crate) async fn get_executions(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match st.engine.executions(id) {
        Ok(execs) => (StatusCode::OK, Json(execs)).into_response(),
        Err(err) => engine_error_response(err),
    }
}

pub(crate) async fn get_rule_checks(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match st.engine.rule_checks(id) {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(err) => engine_error_response(err),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/orders
// ---------------------------------------------------------------------------

fn order_request_from_wire(req: &SubmitOrderRequest) -> Result<OrderRequest, String> {
    let side = Side::parse(&req.side).ok_or_else(|| format!("unknown side: {}", req.side))?;

    let kind = match req.kind.as_str() {
        "market" => OrderKind::Market,
        "limit" => OrderKind::Limit {
            limit_price_micros: req
                .limit_price_micros
                .ok_or("limit order requires limit_price_micros")?,
        },
        "stop" => OrderKind::Stop {
            stop_price_micros: req
                .stop_price_micros
                .ok_or("stop order requires stop_price_micros")?,
        },
        "stop_limit" => OrderKind::StopLimit {
            stop_price_micros: req
                .stop_price_micros
                .ok_or("stop_limit order requires stop_price_micros")?,
            limit_price_micros: req
                .limit_price_micros
                .ok_or("stop_limit order requires limit_price_micros")?,
        },
        "trailing_stop" => OrderKind::TrailingStop {
            trail_micros: req
                .trail_micros
                .ok_or("trailing_stop order requires trail_micros")?,
            // The engine snapshots the initial level from the current
            // price at submission.
            stop_price_micros: 0,
        },
        other => return Err(format!("unknown order kind: {other}")),
    };

    Ok(OrderRequest {
        account_id: req.account_id,
        symbol: req.symbol.clone(),
        side,
        kind,
        qty: req.qty,
    })
}

pub(crate) async fn submit_order(
    State(st): State<Arc<AppState>>,
    Json(req): Json<SubmitOrderRequest>,
) -> Response {
    let order_req = match order_request_from_wire(&req) {
        Ok(r) => r,
        Err(msg) => return bad_request(msg),
    };

    match st.engine.submit_order(&order_req) {
        Ok(snap) => {
            info!(order = %snap.order_id, status = %snap.status, "order submitted");
            persist_order_flow(&st, &snap).await;
            st.audit(
                snap.account_id,
                spd_audit::TOPIC_ORDERS,
                "order_submitted",
                serde_json::json!({
                    "order_id": snap.order_id,
                    "symbol": snap.symbol,
                    "side": snap.side,
                    "kind": snap.kind,
                    "qty": snap.qty,
                    "status": snap.status,
                    "reject_reason": snap.reject_reason,
                }),
            );
            let _ = st.bus.send(BusMsg::Order(snap.clone()));
            if let Ok(acct) = st.engine.account(snap.account_id) {
                let _ = st.bus.send(BusMsg::Account(acct));
            }
            (StatusCode::OK, Json(snap)).into_response()
        }
        Err(err) => engine_error_response(err),
    }
}

/// Persist everything one submission changed. A fill goes through
/// [`spd_db::commit_fill`] so the execution, order, position, and account
/// land in one transaction.
async fn persist_order_flow(st: &AppState, snap: &spd_schemas::OrderSnapshot) {
    let Some(pool) = &st.pool else {
        return;
    };

    let result = async {
        if let Some(record) = st
            .engine
            .rule_checks(snap.account_id)?
            .into_iter()
            .rev()
            .find(|r| r.order_id == snap.order_id)
        {
            spd_db::insert_rule_check(pool, &record).await?;
        }

        if snap.status == "filled" {
            let account = st.engine.account(snap.account_id)?;
            let execution = st
                .engine
                .executions(snap.account_id)?
                .into_iter()
                .rev()
                .find(|e| e.order_id == snap.order_id);
            let position = st
                .engine
                .positions(snap.account_id)?
                .into_iter()
                .find(|p| p.symbol == snap.symbol);

            if let (Some(execution), Some(position)) = (execution, position) {
                spd_db::commit_fill(
                    pool,
                    &spd_db::FillCommit {
                        execution,
                        order: snap.clone(),
                        position,
                        account,
                    },
                )
                .await?;
                return anyhow::Ok(());
            }
        }

        spd_db::upsert_order(pool, snap).await?;
        spd_db::upsert_account(pool, &st.engine.account(snap.account_id)?).await?;
        anyhow::Ok(())
    }
    .await;

    if let Err(err) = result {
        error!(order = %snap.order_id, error = %err, "persist order flow failed");
    }
}

// ---------------------------------------------------------------------------
// POST /v1/accounts/:id/orders/:order_id/cancel
// ---------------------------------------------------------------------------

pub(crate) async fn cancel_order(
    State(st): State<Arc<AppState>>,
    Path((id, order_id)): Path<(Uuid, Uuid)>,
) -> Response {
    match st.engine.cancel_order(id, order_id) {
        Ok(snap) => {
            if let Some(pool) = &st.pool {
                if let Err(err) = spd_db::upsert_order(pool, &snap).await {
                    error!(order = %order_id, error = %err, "persist cancel failed");
                }
            }
            st.audit(
                id,
                spd_audit::TOPIC_ORDERS,
                "order_cancel_requested",
                serde_json::json!({ "order_id": order_id, "status": snap.status }),
            );
            let _ = st.bus.send(BusMsg::Order(snap.clone()));
            (StatusCode::OK, Json(snap)).into_response()
        }
        Err(err) => engine_error_response(err),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/sweep  POST /v1/roll-day
// ---------------------------------------------------------------------------

/// Manual/administrative monitor trigger: one sweep at the current price,
/// no feed advance.
pub(crate) async fn run_sweep(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let report = st.engine.run_monitor_sweep();
    info!(
        checked = report.checked,
        filled = report.filled,
        triggered = report.triggered,
        "manual sweep"
    );
    if report.filled > 0 {
        crate::state::checkpoint(&st).await;
    }
    let _ = st.bus.send(BusMsg::Sweep(report));
    (StatusCode::OK, Json(report))
}

/// Manual trading-day rollover (ops/testing; the scheduled task does this
/// at session midnight).
pub(crate) async fn roll_day(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let decisions = st.engine.roll_trading_day();
    let rolled = decisions.len();
    for (account_id, decision) in decisions {
        if decision.status_changed() {
            if let Ok(snap) = st.engine.account(account_id) {
                let _ = st.bus.send(BusMsg::Account(snap));
            }
        }
    }
    crate::state::checkpoint(&st).await;
    (
        StatusCode::OK,
        Json(serde_json::json!({ "rolled": rolled })),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/prices/:symbol  GET /v1/bars/:symbol
// ---------------------------------------------------------------------------

pub(crate) async fn get_price(
    State(st): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Response {
    match st.engine.feed().current(&symbol) {
        Ok(price_micros) => (
            StatusCode::OK,
            Json(PriceResponse {
                symbol,
                price_micros,
                price: micros_to_price(price_micros),
            }),
        )
            .into_response(),
        Err(err) => not_found(err.to_string()),
    }
}

pub(crate) async fn get_bars(
    State(st): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Response {
    match st.engine.feed().bars(&symbol) {
        Ok(bars) => (StatusCode::OK, Json(bars)).into_response(),
        Err(err) => not_found(err.to_string()),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);
    Sse::new(events).keep_alive(KeepAlive::new()).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::Order(_) => "order",
                    BusMsg::Account(_) => "account",
                    BusMsg::Sweep(_) => "sweep",
                    BusMsg::LogLine { .. } => "log",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
