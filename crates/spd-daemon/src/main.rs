//! spd-daemon entry point.
//!
//! Thin by design: load configuration, bootstrap the engine and feed,
//! optionally recover from Postgres, spawn the background tasks, serve
//! HTTP. Route handlers live in `routes.rs`; shared state in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use spd_config::SimConfig;
use spd_daemon::{routes, state};
use spd_execution::Engine;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

/// Built-in configuration used when SPD_CONFIG is not set: one micro
/// index future and one $50k evaluation tier.
const DEFAULT_CONFIG_YAML: &str = include_str!("../config/default.yaml");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if the file
    // does not exist — production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let loaded = load_config()?;
    let cfg = SimConfig::from_loaded(&loaded)?;
    let config_hash = loaded.config_hash.clone();
    info!(%config_hash, "configuration loaded");

    let tz: chrono_tz::Tz = cfg
        .engine
        .session_timezone
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid session_timezone: {e}"))?;
    let sweep_interval = Duration::from_secs(cfg.engine.sweep_interval_secs);

    let (engine, _feed) = Engine::bootstrap(cfg).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let engine = Arc::new(engine);

    // Optional persistence: without SPD_DATABASE_URL the daemon runs
    // fully in-memory.
    let pool = match std::env::var(spd_db::ENV_DB_URL) {
        Ok(_) => {
            let pool = spd_db::connect_from_env().await?;
            spd_db::migrate(&pool).await?;
            let restored = state::recover_from_db(&engine, &pool).await?;
            info!(restored, "database attached");
            Some(pool)
        }
        Err(_) => {
            warn!("SPD_DATABASE_URL not set; running in-memory only");
            None
        }
    };

    // Hash-chained JSONL audit trail; disable with SPD_AUDIT_LOG=off.
    let audit = match std::env::var("SPD_AUDIT_LOG") {
        Ok(v) if v == "off" => None,
        Ok(path) => Some(spd_audit::AuditWriter::new(path, true)?),
        Err(_) => Some(spd_audit::AuditWriter::new("spd-audit.jsonl", true)?),
    };

    let shared = Arc::new(state::AppState::new(
        Arc::clone(&engine),
        config_hash,
        pool,
        audit,
    ));

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));
    state::spawn_sweep_tick(Arc::clone(&shared), sweep_interval);
    state::spawn_day_roll(Arc::clone(&shared), tz);

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8790)));
    info!("spd-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// SPD_CONFIG holds a comma-separated list of YAML layer paths (later
/// layers override earlier). Unset means the embedded default.
fn load_config() -> anyhow::Result<spd_config::LoadedConfig> {
    match std::env::var("SPD_CONFIG") {
        Ok(paths) => {
            let parts: Vec<&str> = paths.split(',').map(str::trim).collect();
            spd_config::load_layered_yaml(&parts)
        }
        Err(_) => spd_config::load_layered_yaml_from_strings(&[DEFAULT_CONFIG_YAML]),
    }
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("SPD_DAEMON_ADDR").ok()?.parse().ok()
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
