/**
 * Server Initialization
 *
 * 1. Load the database (optional)
 * 2. Build the stores and services into an `AppState`
 * 3. Start the presence sweep
 * 4. Create the router
 */

use axum::Router;
use tokio::task::JoinHandle;

use crate::backend::routes::create_router;
use crate::backend::server::config::load_database;
use crate::backend::server::state::{AppState, Stores};
use crate::shared::AppConfig;

/// Build the application state for `config`
pub async fn build_state(config: AppConfig) -> AppState {
    let db_pool = load_database(config.database_url.as_deref()).await;

    let stores = match &db_pool {
        Some(pool) => Stores::postgres(pool.clone()),
        None => {
            tracing::warn!("Running on in-memory stores; messages and presence are lost on restart");
            Stores::in_memory()
        }
    };

    AppState::from_stores(config, stores, db_pool)
}

/// Periodically mark accounts offline that stopped reporting activity
pub fn spawn_presence_sweep(state: &AppState) -> JoinHandle<()> {
    let broker = state.broker.clone();
    let idle_timeout = state.config.presence.idle_timeout;
    let mut interval = tokio::time::interval(state.config.presence.sweep_interval);

    tokio::spawn(async move {
        loop {
            interval.tick().await;
            match broker.sweep_idle_presence(idle_timeout).await {
                Ok(0) => {}
                Ok(expired) => tracing::info!("[Presence] Swept {} idle accounts offline", expired),
                Err(e) => tracing::warn!("[Presence] Idle sweep failed: {}", e),
            }
        }
    })
}

/// Create the state, start background tasks and build the router
///
/// The state is returned alongside the router so the caller can shut the
/// realtime broker down once the server stops.
pub async fn create_app(config: AppConfig) -> (Router<()>, AppState) {
    tracing::info!("Initializing vms-chat server");

    let app_state = build_state(config).await;
    spawn_presence_sweep(&app_state);

    let app = create_router(app_state.clone());
    tracing::info!("Router configured");

    (app, app_state)
}
