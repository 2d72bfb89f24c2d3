//! MVP Anthem Back binary entrypoint wiring the catalog, the preference store, the game loop and
//! the HTTP/WebSocket layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::{net::TcpListener, sync::mpsc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mvp_anthem_back::{
    config::AppConfig,
    dao::{preference_store::PreferenceStore, storage::StorageError},
    routes,
    services::{
        catalog_service::CatalogSynchronizer,
        game_loop::{self, GameLoop, LoopEvent},
        storage_supervisor, websocket_service,
    },
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let synchronizer = CatalogSynchronizer::from_config(&config);
    let catalog = synchronizer.load_or_fetch().await;
    info!(version = %catalog.version, rewards = catalog.reward_count(), "catalog ready");

    let (app_state, events) = AppState::new(config, synchronizer, catalog);

    let (effects_tx, effects_rx) = mpsc::unbounded_channel();
    let loop_task = tokio::spawn(GameLoop::new(app_state.clone(), events, effects_tx).run());
    tokio::spawn(websocket_service::forward_effects(
        app_state.clone(),
        effects_rx,
    ));

    spawn_storage_supervisor(app_state.clone());

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state.clone());

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    app_state.send_event(LoopEvent::Shutdown);
    if let Err(err) = loop_task.await {
        warn!(error = %err, "game loop ended abnormally");
    }
    game_loop::flush_dirty(&app_state).await;
    info!("shutdown complete");

    Ok(())
}

/// Pick the preference store backend from `STORE_BACKEND` and supervise its connection.
fn spawn_storage_supervisor(state: SharedState) {
    let backend = env::var("STORE_BACKEND").unwrap_or_default();
    match backend.as_str() {
        #[cfg(feature = "mongo-store")]
        "" | "mongo" => {
            info!("using MongoDB preference store");
            tokio::spawn(storage_supervisor::run(state, connect_mongo));
        }
        #[cfg(all(feature = "couch-store", not(feature = "mongo-store")))]
        "" => {
            info!("using CouchDB preference store");
            tokio::spawn(storage_supervisor::run(state, connect_couch));
        }
        #[cfg(feature = "couch-store")]
        "couch" => {
            info!("using CouchDB preference store");
            tokio::spawn(storage_supervisor::run(state, connect_couch));
        }
        other => {
            warn!(
                backend = other,
                "no usable preference store backend; preferences stay in memory only"
            );
        }
    }
}

#[cfg(feature = "mongo-store")]
async fn connect_mongo() -> Result<Arc<dyn PreferenceStore>, StorageError> {
    use mvp_anthem_back::dao::preference_store::mongodb::{MongoConfig, MongoPreferenceStore};

    let config = MongoConfig::from_env().await?;
    let store = MongoPreferenceStore::connect(config).await?;
    Ok(Arc::new(store))
}

#[cfg(feature = "couch-store")]
async fn connect_couch() -> Result<Arc<dyn PreferenceStore>, StorageError> {
    use mvp_anthem_back::dao::preference_store::couchdb::{CouchConfig, CouchPreferenceStore};

    let config = CouchConfig::from_env()?;
    let store = CouchPreferenceStore::connect(config).await?;
    Ok(Arc::new(store))
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
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
