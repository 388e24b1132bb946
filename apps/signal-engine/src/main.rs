//! Signal Engine Binary
//!
//! Starts the webhook-driven trading engine.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin signal-engine
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `ALPACA_API_KEY_ID`: Broker API key id
//! - `ALPACA_API_SECRET_KEY`: Broker API secret key
//!
//! ## Optional
//! - `ALPACA_ENV`: paper | live (default: paper)
//! - `HTTP_PORT`: HTTP server port (default: 8000)
//! - `MAX_POSITION_DOLLARS`: Notional ceiling per entry (default: 500)
//! - `ALLOWED_BASES`: Comma-separated base allow-list (default: allow all)
//! - `COOLDOWN_SECS`, `DAILY_PROFIT_TARGET`, `DAILY_LOSS_LIMIT`,
//!   `MAX_TRADES_PER_DAY`, `MAX_LOSERS_PER_DAY`, `RECONCILE_INTERVAL_SECS`
//! - `RUST_LOG`: Log level (default: info)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use signal_engine::application::recovery::rebuild_exit_registry;
use signal_engine::application::{
    EngineState, EntryExecutor, ExitPlanner, FillObserver, ManualExitExecutor, Reconciler,
    RiskGovernor,
};
use signal_engine::config::Settings;
use signal_engine::infrastructure::broker::alpaca::{AlpacaBrokerAdapter, AlpacaConfig};
use signal_engine::infrastructure::http::{AppState, create_router};
use signal_engine::telemetry::init_tracing;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Default HTTP server port.
const DEFAULT_HTTP_PORT: u16 = 8000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    tracing::info!("Starting signal engine");

    let settings = Settings::from_env();
    let alpaca_config = AlpacaConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let environment = alpaca_config.environment.to_string();
    tracing::info!(
        environment = %environment,
        max_notional = %settings.entry.max_notional,
        cooldown_secs = settings.entry.cooldown_secs,
        reconcile_secs = settings.reconciler.interval_secs,
        "Configuration loaded"
    );

    let broker = Arc::new(
        AlpacaBrokerAdapter::new(&alpaca_config).context("building Alpaca adapter")?,
    );
    let state = Arc::new(EngineState::new());
    let shutdown = CancellationToken::new();

    // In-memory state does not survive restarts; rebuild the protective
    // order registry from the live order book before reconciling anything.
    match rebuild_exit_registry(broker.as_ref(), state.as_ref()).await {
        Ok(recovered) if recovered > 0 => {
            tracing::info!(instruments = recovered, "Recovered protective orders");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Could not rebuild exit registry; continuing empty");
        }
    }

    let governor = Arc::new(RiskGovernor::new(
        Arc::clone(&broker),
        Arc::clone(&state),
        settings.risk.clone(),
    ));
    let fill_observer = FillObserver::new(
        Arc::clone(&broker),
        settings.fill.clone(),
        shutdown.clone(),
    );
    let exit_planner = ExitPlanner::new(
        Arc::clone(&broker),
        Arc::clone(&state),
        settings.exits.to_ladder_config(),
    );
    let entry = Arc::new(EntryExecutor::new(
        Arc::clone(&broker),
        Arc::clone(&state),
        Arc::clone(&governor),
        fill_observer,
        exit_planner,
        settings.entry.clone(),
    ));
    let manual_exit = Arc::new(ManualExitExecutor::new(
        Arc::clone(&broker),
        Arc::clone(&state),
        settings.entry.clone(),
    ));

    let reconciler = Reconciler::new(
        Arc::clone(&broker),
        Arc::clone(&state),
        Arc::clone(&governor),
        settings.exits.to_ladder_config(),
        settings.reconciler.interval(),
    );
    let reconciler_handle = reconciler.spawn(shutdown.clone());

    let router = create_router(AppState {
        entry,
        manual_exit,
        engine: state,
        environment,
    });

    let port = std::env::var("HTTP_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_HTTP_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "HTTP server listening");

    let server_shutdown = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received");
            server_shutdown.cancel();
        })
        .await
        .context("HTTP server failed")?;

    shutdown.cancel();
    reconciler_handle.await.context("reconciler task panicked")?;
    tracing::info!("Signal engine stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sigterm) = signal::unix::signal(signal::unix::SignalKind::terminate()) {
            sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
