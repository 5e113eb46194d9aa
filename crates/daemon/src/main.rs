use std::sync::Arc;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Extension, Router,
};
use clap::Parser;
use tower_http::trace::TraceLayer;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod keyfile;
mod manager;
mod notifier;
mod qt_theme;
mod queue;
mod rethemer;
mod session_env;
mod settings;
#[cfg(test)]
mod testing;

use config::Opts;
use manager::ScaleManager;
use notifier::BroadcastNotifier;
use qt_theme::QtThemeWriter;
use queue::{CoalescingQueue, FactorBounds};
use rethemer::PlymouthRethemer;
use settings::SettingsStore;

const EVENT_BUFFER: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let opts = Opts::parse();
    let bounds = FactorBounds::new(opts.min_factor, opts.max_factor)?;

    let settings_path = opts.settings_path();
    let settings = SettingsStore::open(&settings_path)
        .with_context(|| format!("failed to open settings at {}", settings_path.display()))?;

    let mut changes = settings.subscribe();
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(key) => debug!("setting {} changed", key),
                Err(RecvError::Lagged(skipped)) => warn!("missed {} setting changes", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let notifier = BroadcastNotifier::new(EVENT_BUFFER);
    let rethemer = PlymouthRethemer::new(&opts.plymouth_config, opts.plymouth_command.clone());
    let queue = CoalescingQueue::new(Arc::new(rethemer), Arc::new(notifier.clone()), bounds);

    let manager = Arc::new(ScaleManager::new(
        Arc::new(settings),
        queue.clone(),
        QtThemeWriter::new(opts.qt_theme_path(), opts.greeter_qt_theme.clone()),
        opts.session_env_path(),
    ));

    let app = Router::new()
        .route("/scale_factor", post(handlers::set_scale_factor).get(handlers::get_scale_factor))
        .route("/scale_factor_silent", post(handlers::set_scale_factor_silent))
        .route(
            "/screen_scale_factors",
            post(handlers::set_screen_scale_factors).get(handlers::get_screen_scale_factors),
        )
        .route("/status", get(handlers::get_status))
        .route("/events", get(handlers::events))
        .layer(TraceLayer::new_for_http()) // add request tracing
        .layer(Extension(manager))
        .layer(Extension(notifier));

    let listener = tokio::net::TcpListener::bind(&opts.bind)
        .await
        .with_context(|| format!("failed to bind {}", opts.bind))?;
    info!("scaled listening on {}", opts.bind);

    let server = axum::serve(listener, app);
    let graceful = server.with_graceful_shutdown(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl_c: {}", e);
        }
    });

    if let Err(e) = graceful.await {
        error!("server error: {}", e);
    }

    // an in-flight boot-splash update cannot be interrupted
    if queue.status().active {
        info!("waiting for boot splash update to finish");
        queue.wait_idle().await;
    }
    Ok(())
}
