//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{open_store, EmailNotifier},
    config::Config,
    error::ApiError,
    office::{spawn_overdue_scheduler, OfficeService},
    shutdown::shutdown_signal,
    web::{router, state::AppState},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Open the Store & the Mail Transport ---
    let store = open_store(&config.store, 5).await?;
    let notifier = Arc::new(EmailNotifier::new(&config.email)?);

    // --- 3. Build the Office & the Shared AppState ---
    let office = Arc::new(OfficeService::new(
        store,
        notifier,
        config.lock_wait,
        config.school_name.clone(),
    ));
    let app_state = Arc::new(AppState {
        office: office.clone(),
        config: config.clone(),
    });

    // --- 4. Start the Overdue Sweep ---
    let shutdown = CancellationToken::new();
    let sweeper = if config.sweep_enabled {
        info!("Overdue sweep runs every {:?}", config.sweep_interval);
        Some(spawn_overdue_scheduler(
            office,
            config.sweep_interval,
            shutdown.clone(),
        ))
    } else {
        info!("Overdue sweep disabled.");
        None
    };

    // --- 5. Create the Web Router & Start the Server ---
    let app = router(app_state)?;
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Some(handle) = sweeper {
        if let Err(e) = handle.await {
            warn!("Overdue sweep task ended abnormally: {}", e);
        }
    }
    info!("Server stopped.");
    Ok(())
}
