#![warn(clippy::nursery, clippy::pedantic)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use tokio::task;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::engine::Engine;
use crate::store::RocksStore;

mod api;
mod clock;
mod config;
mod engine;
mod error;
mod paste;
mod store;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    if config.allow_clock_override {
        warn!("Clock override header is enabled; this must not be used in production");
    }

    let db_path = config.db_path.clone();
    let store = task::spawn_blocking(move || RocksStore::open(db_path))
        .await?
        .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?;

    let engine = Engine::new(Arc::new(store), config.max_content_bytes);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let stop_signal = Arc::new(AtomicBool::new(false));
    task::spawn(cleanup(
        Arc::clone(&stop_signal),
        engine.clone(),
        Arc::clone(&clock),
        Duration::from_secs(config.sweep_interval_secs),
    ));

    let state = AppState {
        engine,
        clock,
        public_url: config.public_url,
        allow_clock_override: config.allow_clock_override,
    };

    let app = api::router(state).layer(TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    let signals = Signals::new([SIGINT, SIGTERM])?;
    let signals_handle = signals.handle();

    info!(addr = %config.bind, "server starting");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown(signals))
        .await?;

    signals_handle.close();
    stop_signal.store(true, Ordering::Release);
    Ok(())
}

async fn shutdown(mut signals: Signals) {
    if let Some(signal) = signals.next().await {
        info!(signal, "shutting down");
    }
}

/// Periodic clean-up task that deletes expired pastes.
async fn cleanup(
    stop_signal: Arc<AtomicBool>,
    engine: Engine,
    clock: Arc<dyn Clock>,
    every: Duration,
) {
    while !stop_signal.load(Ordering::Acquire) {
        tokio::time::sleep(every).await;
        match engine.sweep_expired(clock.now()).await {
            Ok(0) => (),
            Ok(removed) => info!(removed, "swept expired pastes"),
            Err(e) => warn!("Failed to cleanup db: {}", e),
        }
    }
}
