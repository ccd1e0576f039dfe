use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{debug, error, info, trace};

use crate::config::{initialize_app_state, Settings};
use crate::router::create_router;

/// Bind the listener and serve until shutdown.
pub async fn run_server(settings: Settings) -> Result<()> {
    let bind_address = settings.bind_address.clone();
    debug!("Bind address: {}", bind_address);
    debug!(
        "Back-dated scheduling {}",
        if settings.schedule.backdate_scheduling { "enabled" } else { "disabled" }
    );

    trace!("Initializing application state");
    let state = match initialize_app_state(settings).await {
        Ok(state) => {
            debug!("Application state initialized successfully");
            state
        }
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            return Err(e);
        }
    };

    trace!("Creating application router");
    let app = create_router(state);

    info!("Starting server on {}", bind_address);
    let listener = match TcpListener::bind(&bind_address).await {
        Ok(listener) => {
            debug!("Successfully bound to address: {}", bind_address);
            listener
        }
        Err(e) => {
            error!("Failed to bind to address {}: {}", bind_address, e);
            return Err(e.into());
        }
    };

    info!("FieldOps API server running on http://{}", bind_address);
    info!("Swagger UI available at http://{}/swagger-ui", bind_address);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown gracefully");
    Ok(())
}

pub async fn serve(settings: Settings) -> Result<()> {
    trace!("Entering serve function");
    info!("FieldOps application starting up");
    debug!("Database URL: {}", settings.database_url);

    run_server(settings).await
}
