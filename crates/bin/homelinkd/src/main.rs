//! # homelinkd: homelink daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Load configuration (`homelink.toml` plus environment overrides)
//! - Initialize tracing
//! - Initialize the `SQLite` connection pool and run migrations
//! - Load persisted native API entries and publish each node's status entity
//! - Build the axum router, injecting application services
//! - Bind to a TCP port and serve until SIGINT/SIGTERM
//!
//! The daemon serves the native API integration only; the `HomeKit` and
//! `MySensors` adapters are libraries with no transport wired here yet. No
//! domain logic belongs here.

mod config;
mod loader;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use homelink_adapter_http_axum::state::AppState;
use homelink_adapter_native_api::TcpDeviceClient;
use homelink_adapter_storage_sqlite_sqlx::SqliteConfigEntryRepository;
use homelink_app::event_bus::InProcessEventBus;
use homelink_app::loaded_entries::LoadedEntryRegistry;
use homelink_app::services::config_entry_service::ConfigEntryService;
use homelink_app::services::flow_manager::FlowManager;
use homelink_app::services::state_machine::StateMachine;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Database
    let db = homelink_adapter_storage_sqlite_sqlx::Config {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await
    .context("opening database")?;
    let repo = SqliteConfigEntryRepository::new(db.pool().clone());

    // Services
    let event_bus = Arc::new(InProcessEventBus::new(config.server.event_capacity));
    let client = Arc::new(TcpDeviceClient::new(config.native_api.clone()));
    let entries = Arc::new(ConfigEntryService::new(repo));
    let registry = Arc::new(LoadedEntryRegistry::new());
    let states = Arc::new(StateMachine::new(Arc::clone(&event_bus)));

    let loaded =
        loader::load_native_api_entries(client.as_ref(), &entries, &registry, states.as_ref())
            .await
            .context("loading config entries")?;
    tracing::info!(loaded, "native api entries loaded");

    let flow_manager = Arc::new(FlowManager::new(
        client,
        Arc::clone(&entries),
        registry,
        Arc::clone(&event_bus),
    ));

    // HTTP
    let state = AppState::new(flow_manager, entries, states, event_bus);
    let app = homelink_adapter_http_axum::router::build(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!(%bind_addr, "homelinkd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving http")?;

    tracing::info!("homelinkd stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "unable to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
