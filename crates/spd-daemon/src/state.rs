//! Shared runtime state for spd-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. Background tasks
//! (heartbeat, monitor sweep, trading-day rollover, persistence
//! checkpoint) are spawned from `main.rs` and owned by the Tokio runtime.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Days, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

use spd_audit::AuditWriter;
use spd_execution::Engine;
use spd_schemas::{AccountSnapshot, OrderSnapshot, SweepReport};

// ---------------------------------------------------------------------------
// BusMsg — SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE
/// events. The daemon emits state changes; it does not push notifications
/// anywhere itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Order(OrderSnapshot),
    Account(AccountSnapshot),
    Sweep(SweepReport),
    LogLine { level: String, msg: String },
}

// ---------------------------------------------------------------------------
// BuildInfo / AppState
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Cloneable (Arc) handle shared across all Axum handlers.
pub struct AppState {
    pub engine: Arc<Engine>,
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub config_hash: String,
    /// `None` runs fully in-memory (tests, demos); `Some` persists through
    /// spd-db.
    pub pool: Option<PgPool>,
    /// Append-only JSONL audit trail (hash-chained). `None` disables it.
    pub audit: Option<Mutex<AuditWriter>>,
}

impl AppState {
    pub fn new(
        engine: Arc<Engine>,
        config_hash: String,
        pool: Option<PgPool>,
        audit: Option<AuditWriter>,
    ) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        Self {
            engine,
            bus,
            build: BuildInfo {
                service: "spd-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            config_hash,
            pool,
            audit: audit.map(Mutex::new),
        }
    }

    /// Best-effort audit append; trouble with the log is reported, never
    /// propagated into the request path.
    pub fn audit(&self, account_id: Uuid, topic: &str, event_type: &str, payload: Value) {
        let Some(writer) = &self.audit else {
            return;
        };
        let mut writer = writer.lock().expect("audit writer poisoned");
        if let Err(err) = writer.append(account_id, topic, event_type, payload) {
            error!(error = %err, "audit append failed");
        }
    }
}

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

/// Heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

/// The monitor cadence: every `interval` the feed advances one sampling
/// step and the resting-order sweep re-tests every trigger. The interval
/// is configuration (`engine.sweep_interval_secs`); price movement inside
/// one interval is invisible to trigger checks by design.
pub fn spawn_sweep_tick(state: Arc<AppState>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            state.engine.feed().advance_all();
            let report = state.engine.run_monitor_sweep();
            if report.checked > 0 {
                let _ = state.bus.send(BusMsg::Sweep(report));
            }
            if report.filled > 0 {
                checkpoint(&state).await;
            }
        }
    });
}

/// Trading-day rollover at midnight in the configured session timezone:
/// trail the drawdown floor, reset daily limits, count trading days.
pub fn spawn_day_roll(state: Arc<AppState>, tz: Tz) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(secs_until_next_midnight(&tz))).await;
            info!("trading-day rollover");
            for (account_id, decision) in state.engine.roll_trading_day() {
                if decision.status_changed() {
                    if let Ok(snap) = state.engine.account(account_id) {
                        let _ = state.bus.send(BusMsg::Account(snap));
                    }
                }
            }
            checkpoint(&state).await;
        }
    });
}

fn secs_until_next_midnight(tz: &Tz) -> u64 {
    let now = Utc::now().with_timezone(tz);
    let Some(tomorrow) = now.date_naive().checked_add_days(Days::new(1)) else {
        return 86_400;
    };
    let Some(naive_midnight) = tomorrow.and_hms_opt(0, 0, 0) else {
        return 86_400;
    };
    match naive_midnight.and_local_timezone(*tz).earliest() {
        Some(next) => (next.with_timezone(&Utc) - Utc::now())
            .num_seconds()
            .max(1) as u64,
        None => 86_400,
    }
}

/// Coarse persistence checkpoint: every account's projection, orders, open
/// positions, and any executions not yet durable. Execution inserts are
/// idempotent, so checkpointing after a sweep can never double-write a
/// fill.
pub async fn checkpoint(state: &AppState) {
    let Some(pool) = &state.pool else {
        return;
    };

    for account_id in state.engine.account_ids() {
        let result = checkpoint_account(state, pool, account_id).await;
        if let Err(err) = result {
            // Persistence trouble must not take the engine down; the next
            // checkpoint retries from the in-memory truth.
            error!(account = %account_id, error = %err, "checkpoint failed");
        }
    }
}

async fn checkpoint_account(
    state: &AppState,
    pool: &PgPool,
    account_id: uuid::Uuid,
) -> anyhow::Result<()> {
    let engine = &state.engine;
    let snap = engine.account(account_id)?;
    spd_db::upsert_account(pool, &snap).await?;

    for order in engine.orders(account_id)? {
        spd_db::upsert_order(pool, &order).await?;
    }
    for exec in engine.executions(account_id)? {
        spd_db::insert_execution_idempotent(pool, &exec).await?;
    }
    for pos in engine.positions(account_id)? {
        spd_db::upsert_position(pool, &pos).await?;
    }
    Ok(())
}

/// Cold-start recovery: rebuild every persisted account from its stored
/// projection plus the execution log (the source of truth for positions
/// and balances).
pub async fn recover_from_db(engine: &Engine, pool: &PgPool) -> anyhow::Result<usize> {
    let mut restored = 0usize;
    for account_id in spd_db::list_account_ids(pool).await? {
        let snap = spd_db::fetch_account(pool, account_id).await?;
        let orders = spd_db::list_orders(pool, account_id).await?;
        let executions = spd_db::load_executions(pool, account_id).await?;
        match engine.restore_account(&snap, &orders, &executions) {
            Ok(_) => restored += 1,
            Err(err) => {
                warn!(account = %account_id, error = %err, "skipping unrecoverable account");
            }
        }
    }
    info!(restored, "recovery complete");
    Ok(restored)
}
