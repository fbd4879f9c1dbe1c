//! Cube Tag Back binary entrypoint wiring the WebSocket arena, sweeps, and storage layers.

use std::{env, net::SocketAddr};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod dao;
mod dto;
mod error;
mod routes;
mod services;
mod state;

use config::AppConfig;
use dto::ws::{LobbyKickReason, ServerMessage};
use services::{events, liveness, moderation::ModerationClient, reconciliation};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    // A moderation URL without its key is a misconfiguration we refuse to
    // run with; no URL at all just disables uploads (fail closed).
    let moderation = ModerationClient::from_env().context("moderation configuration")?;
    if moderation.is_none() {
        warn!("moderation API unconfigured; background uploads will be rejected");
    }

    let app_state = AppState::new(config, moderation);

    spawn_storage_supervisor(&app_state);
    tokio::spawn(liveness::run(app_state.clone()));
    tokio::spawn(reconciliation::run(app_state.clone()));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state.clone());

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(2220);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    // Drain: tell connected players why they are leaving and push the last
    // accumulated distance into durable storage before the process exits.
    events::broadcast_all(
        &app_state,
        &ServerMessage::ForcedToLobby {
            reason: LobbyKickReason::Maintenance,
        },
    );
    reconciliation::flush_all(&app_state).await;

    Ok(())
}

#[cfg(feature = "mongo-store")]
/// Launch the supervisor that connects the MongoDB account store.
fn spawn_storage_supervisor(state: &state::SharedState) {
    use std::sync::Arc;

    use crate::dao::account_store::{
        AccountStore,
        mongodb::{MongoAccountStore, MongoConfig},
    };
    use crate::services::storage_supervisor;

    let mongo_uri = env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
    let mongo_db = env::var("MONGO_DB").ok();

    tokio::spawn(storage_supervisor::run(state.clone(), move || {
        let uri = mongo_uri.clone();
        let db = mongo_db.clone();
        async move {
            let config = MongoConfig::from_uri(&uri, db.as_deref()).await?;
            let store = MongoAccountStore::connect(config).await?;
            Ok(Arc::new(store) as Arc<dyn AccountStore>)
        }
    }));
}

#[cfg(not(feature = "mongo-store"))]
/// Without a storage backend the server stays in degraded mode forever.
fn spawn_storage_supervisor(_state: &state::SharedState) {
    warn!("built without a storage backend; accounts and achievements are disabled");
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: state::SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
