//! ServerBuilder for fluent API to build HTTP servers

use anyhow::Result;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use super::exposure::RestExposure;
use super::host::AppState;
use crate::config::AppConfig;
use crate::core::store::Stores;
use crate::images::{ImageStore, image_store_from_config};
use crate::storage::InMemoryDatabase;

/// Builder for the storefront HTTP server
///
/// Stores default to a fresh in-memory database and images to the store
/// described by `config.images.storage`.
///
/// # Example
///
/// ```ignore
/// let app = ServerBuilder::new(config)
///     .with_stores(mongo.stores())
///     .build()?;
/// ```
pub struct ServerBuilder {
    config: AppConfig,
    stores: Option<Stores>,
    image_store: Option<Arc<dyn ImageStore>>,
}

impl ServerBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            stores: None,
            image_store: None,
        }
    }

    /// Use these stores instead of an in-memory database
    pub fn with_stores(mut self, stores: Stores) -> Self {
        self.stores = Some(stores);
        self
    }

    /// Use this image store instead of the configured one
    pub fn with_image_store(mut self, store: Arc<dyn ImageStore>) -> Self {
        self.image_store = Some(store);
        self
    }

    /// Assemble the shared state without building routes
    pub fn build_state(self) -> Result<AppState> {
        let stores = self
            .stores
            .unwrap_or_else(|| InMemoryDatabase::new().stores());
        let image_store = match self.image_store {
            Some(store) => store,
            None => image_store_from_config(&self.config.images.storage)?,
        };
        Ok(AppState::new(self.config, stores, image_store)?)
    }

    /// Build the final REST router
    pub fn build(self) -> Result<Router> {
        Ok(RestExposure::build_router(self.build_state()?))
    }

    /// Serve the application with graceful shutdown
    ///
    /// This will:
    /// - Start the periodic cache purge
    /// - Bind to the provided address
    /// - Handle SIGTERM and SIGINT (Ctrl+C) for graceful shutdown
    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        let state = self.build_state()?;

        let purge_every = state.config.cache.purge_interval_secs;
        let purge = (state.cache.is_enabled() && purge_every > 0)
            .then(|| state.cache.spawn_purge_task(Duration::from_secs(purge_every)));

        let app = RestExposure::build_router(state);
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", listener.local_addr()?);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        if let Some(task) = purge {
            task.abort();
        }
        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
