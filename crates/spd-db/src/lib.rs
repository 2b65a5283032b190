//! spd-db
//!
//! Postgres persistence for accounts, orders, executions, positions, and
//! rule-check audit records. Runtime queries only (`sqlx::query` + bind);
//! the embedded migrations in `./migrations` define the schema.
//!
//! [`commit_fill`] is the recovery boundary for the fill unit: execution
//! insert, order update, position upsert, and account update land in one
//! transaction, so a crash can never leave an order `filled` with a stale
//! balance or vice versa. After a restart, [`load_executions`] feeds the
//! execution log back through the position ledger to re-derive state —
//! executions are the source of truth.

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use spd_schemas::{
    AccountSnapshot, ExecutionRecord, OrderSnapshot, PositionSnapshot, RuleCheckRecord,
};

pub const ENV_DB_URL: &str = "SPD_DATABASE_URL";

/// Connect to Postgres using SPD_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url =
        std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_accounts_table: bool,
}

/// Simple status query (connectivity + schema presence).
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='accounts'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_accounts_table: exists,
    })
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

pub async fn upsert_account(pool: &PgPool, acct: &AccountSnapshot) -> Result<()> {
    let mut tx = pool.begin().await.context("begin upsert_account")?;
    upsert_account_tx(&mut tx, acct).await?;
    tx.commit().await.context("commit upsert_account")?;
    Ok(())
}

async fn upsert_account_tx(
    tx: &mut Transaction<'_, Postgres>,
    acct: &AccountSnapshot,
) -> Result<()> {
    sqlx::query(
        r#"
        insert into accounts (
          account_id, tier, balance_micros, initial_balance_micros,
          high_water_mark_micros, drawdown_threshold_micros, daily_pnl_micros,
          daily_loss_limit_hit, profit_target_reached, trading_days, status,
          updated_at_utc
        ) values (
          $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, now()
        )
        on conflict (account_id) do update set
          balance_micros = excluded.balance_micros,
          high_water_mark_micros = excluded.high_water_mark_micros,
          drawdown_threshold_micros = excluded.drawdown_threshold_micros,
          daily_pnl_micros = excluded.daily_pnl_micros,
          daily_loss_limit_hit = excluded.daily_loss_limit_hit,
          profit_target_reached = excluded.profit_target_reached,
          trading_days = excluded.trading_days,
          status = excluded.status,
          updated_at_utc = now()
        "#,
    )
    .bind(acct.account_id)
    .bind(&acct.tier)
    .bind(acct.balance_micros)
    .bind(acct.initial_balance_micros)
    .bind(acct.high_water_mark_micros)
    .bind(acct.drawdown_threshold_micros)
    .bind(acct.daily_pnl_micros)
    .bind(acct.daily_loss_limit_hit)
    .bind(acct.profit_target_reached)
    .bind(acct.trading_days as i32)
    .bind(&acct.status)
    .execute(&mut **tx)
    .await
    .context("upsert_account failed")?;
    Ok(())
}

pub async fn fetch_account(pool: &PgPool, account_id: Uuid) -> Result<AccountSnapshot> {
    let row = sqlx::query(
        r#"
        select account_id, tier, balance_micros, initial_balance_micros,
               high_water_mark_micros, drawdown_threshold_micros,
               daily_pnl_micros, daily_loss_limit_hit, profit_target_reached,
               trading_days, status
        from accounts
        where account_id = $1
        "#,
    )
    .bind(account_id)
    .fetch_optional(pool)
    .await
    .context("fetch_account failed")?
    .ok_or_else(|| anyhow!("account not found: {account_id}"))?;

    Ok(AccountSnapshot {
        account_id: row.try_get("account_id")?,
        tier: row.try_get("tier")?,
        balance_micros: row.try_get("balance_micros")?,
        initial_balance_micros: row.try_get("initial_balance_micros")?,
        high_water_mark_micros: row.try_get("high_water_mark_micros")?,
        drawdown_threshold_micros: row.try_get("drawdown_threshold_micros")?,
        daily_pnl_micros: row.try_get("daily_pnl_micros")?,
        daily_loss_limit_hit: row.try_get("daily_loss_limit_hit")?,
        profit_target_reached: row.try_get("profit_target_reached")?,
        trading_days: row.try_get::<i32, _>("trading_days")? as u32,
        status: row.try_get("status")?,
        // Derived counters live in memory; recovery recomputes them.
        open_orders: 0,
        open_contracts: 0,
    })
}

pub async fn list_account_ids(pool: &PgPool) -> Result<Vec<Uuid>> {
    let rows = sqlx::query("select account_id from accounts order by account_id")
        .fetch_all(pool)
        .await
        .context("list_account_ids failed")?;
    rows.iter()
        .map(|r| r.try_get("account_id").map_err(Into::into))
        .collect()
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

pub async fn upsert_order(pool: &PgPool, order: &OrderSnapshot) -> Result<()> {
    let mut tx = pool.begin().await.context("begin upsert_order")?;
    upsert_order_tx(&mut tx, order).await?;
    tx.commit().await.context("commit upsert_order")?;
    Ok(())
}

async fn upsert_order_tx(tx: &mut Transaction<'_, Postgres>, order: &OrderSnapshot) -> Result<()> {
    sqlx::query(
        r#"
        insert into orders (
          order_id, account_id, symbol, side, kind, qty, filled_qty,
          remaining_qty, limit_price_micros, stop_price_micros, trail_micros,
          avg_fill_price_micros, status, reject_reason, created_at_utc,
          updated_at_utc
        ) values (
          $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16
        )
        on conflict (order_id) do update set
          filled_qty = excluded.filled_qty,
          remaining_qty = excluded.remaining_qty,
          stop_price_micros = excluded.stop_price_micros,
          avg_fill_price_micros = excluded.avg_fill_price_micros,
          kind = excluded.kind,
          limit_price_micros = excluded.limit_price_micros,
          status = excluded.status,
          reject_reason = excluded.reject_reason,
          updated_at_utc = excluded.updated_at_utc
        "#,
    )
    .bind(order.order_id)
    .bind(order.account_id)
    .bind(&order.symbol)
    .bind(&order.side)
    .bind(&order.kind)
    .bind(order.qty)
    .bind(order.filled_qty)
    .bind(order.remaining_qty)
    .bind(order.limit_price_micros)
    .bind(order.stop_price_micros)
    .bind(order.trail_micros)
    .bind(order.avg_fill_price_micros)
    .bind(&order.status)
    .bind(&order.reject_reason)
    .bind(order.created_at_utc)
    .bind(order.updated_at_utc)
    .execute(&mut **tx)
    .await
    .context("upsert_order failed")?;
    Ok(())
}

fn order_from_row(row: &sqlx::postgres::PgRow) -> Result<OrderSnapshot> {
    Ok(OrderSnapshot {
        order_id: row.try_get("order_id")?,
        account_id: row.try_get("account_id")?,
        symbol: row.try_get("symbol")?,
        side: row.try_get("side")?,
        kind: row.try_get("kind")?,
        qty: row.try_get("qty")?,
        filled_qty: row.try_get("filled_qty")?,
        remaining_qty: row.try_get("remaining_qty")?,
        limit_price_micros: row.try_get("limit_price_micros")?,
        stop_price_micros: row.try_get("stop_price_micros")?,
        trail_micros: row.try_get("trail_micros")?,
        avg_fill_price_micros: row.try_get("avg_fill_price_micros")?,
        status: row.try_get("status")?,
        reject_reason: row.try_get("reject_reason")?,
        created_at_utc: row.try_get("created_at_utc")?,
        updated_at_utc: row.try_get("updated_at_utc")?,
    })
}

/// Orders still awaiting a price condition, across all accounts — the
/// monitor's working set on a cold start.
pub async fn list_resting_orders(pool: &PgPool) -> Result<Vec<OrderSnapshot>> {
    let rows = sqlx::query(
        r#"
        select * from orders
        where status in ('submitted', 'working', 'partially_filled')
        order by created_at_utc
        "#,
    )
    .fetch_all(pool)
    .await
    .context("list_resting_orders failed")?;
    rows.iter().map(order_from_row).collect()
}

pub async fn list_orders(pool: &PgPool, account_id: Uuid) -> Result<Vec<OrderSnapshot>> {
    let rows = sqlx::query("select * from orders where account_id = $1 order by created_at_utc")
        .bind(account_id)
        .fetch_all(pool)
        .await
        .context("list_orders failed")?;
    rows.iter().map(order_from_row).collect()
}

// ---------------------------------------------------------------------------
// Executions / positions / rule checks
// ---------------------------------------------------------------------------

async fn insert_execution_tx(
    tx: &mut Transaction<'_, Postgres>,
    exec: &ExecutionRecord,
) -> Result<()> {
    sqlx::query(
        r#"
        insert into executions (
          execution_id, order_id, account_id, symbol, side, qty,
          fill_price_micros, commission_micros, fee_micros, slippage_micros,
          ts_utc
        ) values (
          $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11
        )
        "#,
    )
    .bind(exec.execution_id)
    .bind(exec.order_id)
    .bind(exec.account_id)
    .bind(&exec.symbol)
    .bind(&exec.side)
    .bind(exec.qty)
    .bind(exec.fill_price_micros)
    .bind(exec.commission_micros)
    .bind(exec.fee_micros)
    .bind(exec.slippage_micros)
    .bind(exec.ts_utc)
    .execute(&mut **tx)
    .await
    .context("insert_execution failed")?;
    Ok(())
}

/// Idempotent append for checkpointing paths: an execution id that is
/// already durable is skipped, never rewritten.
pub async fn insert_execution_idempotent(pool: &PgPool, exec: &ExecutionRecord) -> Result<bool> {
    let result = sqlx::query(
        r#"
        insert into executions (
          execution_id, order_id, account_id, symbol, side, qty,
          fill_price_micros, commission_micros, fee_micros, slippage_micros,
          ts_utc
        ) values (
          $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11
        )
        on conflict (execution_id) do nothing
        "#,
    )
    .bind(exec.execution_id)
    .bind(exec.order_id)
    .bind(exec.account_id)
    .bind(&exec.symbol)
    .bind(&exec.side)
    .bind(exec.qty)
    .bind(exec.fill_price_micros)
    .bind(exec.commission_micros)
    .bind(exec.fee_micros)
    .bind(exec.slippage_micros)
    .bind(exec.ts_utc)
    .execute(pool)
    .await
    .context("insert_execution_idempotent failed")?;
    Ok(result.rows_affected() == 1)
}

pub async fn upsert_position(pool: &PgPool, pos: &PositionSnapshot) -> Result<()> {
    let mut tx = pool.begin().await.context("begin upsert_position")?;
    upsert_position_tx(&mut tx, pos).await?;
    tx.commit().await.context("commit upsert_position")?;
    Ok(())
}

/// Executions for one account in timestamp order — the replay input for
/// position/balance re-derivation.
pub async fn load_executions(pool: &PgPool, account_id: Uuid) -> Result<Vec<ExecutionRecord>> {
    let rows = sqlx::query(
        r#"
        select execution_id, order_id, account_id, symbol, side, qty,
               fill_price_micros, commission_micros, fee_micros,
               slippage_micros, ts_utc
        from executions
        where account_id = $1
        order by ts_utc, execution_id
        "#,
    )
    .bind(account_id)
    .fetch_all(pool)
    .await
    .context("load_executions failed")?;

    rows.iter()
        .map(|row| {
            Ok(ExecutionRecord {
                execution_id: row.try_get("execution_id")?,
                order_id: row.try_get("order_id")?,
                account_id: row.try_get("account_id")?,
                symbol: row.try_get("symbol")?,
                side: row.try_get("side")?,
                qty: row.try_get("qty")?,
                fill_price_micros: row.try_get("fill_price_micros")?,
                commission_micros: row.try_get("commission_micros")?,
                fee_micros: row.try_get("fee_micros")?,
                slippage_micros: row.try_get("slippage_micros")?,
                ts_utc: row.try_get("ts_utc")?,
            })
        })
        .collect()
}

async fn upsert_position_tx(
    tx: &mut Transaction<'_, Postgres>,
    pos: &PositionSnapshot,
) -> Result<()> {
    if !pos.open {
        // A close finalizes the existing open row in place. Re-running the
        // checkpoint after that touches zero rows, so closed history is
        // never duplicated.
        sqlx::query(
            r#"
            update positions
            set qty_signed = $3,
                avg_entry_price_micros = $4,
                realized_pnl_micros = $5,
                open = false,
                bought = $6,
                sold = $7,
                updated_at_utc = now()
            where account_id = $1 and symbol = $2 and open
            "#,
        )
        .bind(pos.account_id)
        .bind(&pos.symbol)
        .bind(pos.qty_signed)
        .bind(pos.avg_entry_price_micros)
        .bind(pos.realized_pnl_micros)
        .bind(pos.bought)
        .bind(pos.sold)
        .execute(&mut **tx)
        .await
        .context("close position failed")?;
        return Ok(());
    }

    sqlx::query(
        r#"
        insert into positions (
          position_id, account_id, symbol, qty_signed,
          avg_entry_price_micros, realized_pnl_micros, open, bought, sold,
          updated_at_utc
        ) values (
          $1, $2, $3, $4, $5, $6, true, $7, $8, now()
        )
        on conflict (account_id, symbol) where open do update set
          qty_signed = excluded.qty_signed,
          avg_entry_price_micros = excluded.avg_entry_price_micros,
          realized_pnl_micros = excluded.realized_pnl_micros,
          bought = excluded.bought,
          sold = excluded.sold,
          updated_at_utc = now()
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(pos.account_id)
    .bind(&pos.symbol)
    .bind(pos.qty_signed)
    .bind(pos.avg_entry_price_micros)
    .bind(pos.realized_pnl_micros)
    .bind(pos.bought)
    .bind(pos.sold)
    .execute(&mut **tx)
    .await
    .context("upsert_position failed")?;
    Ok(())
}

pub async fn insert_rule_check(pool: &PgPool, record: &RuleCheckRecord) -> Result<()> {
    let checks: Value = serde_json::to_value(&record.checks).context("serialize checks")?;
    let reasons: Value =
        serde_json::to_value(&record.failure_reasons).context("serialize reasons")?;

    sqlx::query(
        r#"
        insert into rule_checks (
          record_id, order_id, account_id, passed, checks, failure_reasons,
          ts_utc
        ) values (
          $1, $2, $3, $4, $5, $6, $7
        )
        "#,
    )
    .bind(record.record_id)
    .bind(record.order_id)
    .bind(record.account_id)
    .bind(record.passed)
    .bind(checks)
    .bind(reasons)
    .bind(record.ts_utc)
    .execute(pool)
    .await
    .context("insert_rule_check failed")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// The fill unit
// ---------------------------------------------------------------------------

/// Everything one fill changed, persisted as a single transaction: either
/// the execution, the order update, the position, and the account all
/// land, or none do.
#[derive(Debug, Clone)]
pub struct FillCommit {
    pub execution: ExecutionRecord,
    pub order: OrderSnapshot,
    pub position: PositionSnapshot,
    pub account: AccountSnapshot,
}

pub async fn commit_fill(pool: &PgPool, commit: &FillCommit) -> Result<()> {
    let mut tx = pool.begin().await.context("begin commit_fill")?;

    insert_execution_tx(&mut tx, &commit.execution).await?;
    upsert_order_tx(&mut tx, &commit.order).await?;
    upsert_position_tx(&mut tx, &commit.position).await?;
    upsert_account_tx(&mut tx, &commit.account).await?;

    tx.commit().await.context("commit_fill transaction failed")?;
    Ok(())
}
