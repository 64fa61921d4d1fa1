//! `colloquy serve`: HTTP API plus the periodic reconciler.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use tokio_util::sync::CancellationToken;

use colloquy_core::sync::ReconciliationScheduler;

use crate::http::router::build_router;
use crate::state::AppState;

pub async fn serve(host: &str, port: u16) -> Result<()> {
    let state = AppState::init().await?;

    let interval = Duration::from_secs(state.config.reconcile.interval_secs.max(1));
    let cancel = CancellationToken::new();
    let scheduler =
        ReconciliationScheduler::new(Arc::clone(&state.reconciler), interval).spawn(cancel.clone());

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    println!();
    println!(
        "  {} Colloquy v{} listening on {}",
        style("●").green().bold(),
        env!("CARGO_PKG_VERSION"),
        style(format!("http://{addr}")).cyan()
    );
    println!(
        "  {} {}",
        style("Data:").dim(),
        style(state.data_dir.display()).dim()
    );
    println!("  {}", style("Press Ctrl+C to stop").dim());

    let router = build_router(state);
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    cancel.cancel();
    if let Err(e) = scheduler.await {
        tracing::warn!(error = %e, "reconciliation scheduler task failed");
    }

    served.context("server error")?;
    println!("\n  Server stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
