//! Browsing server implementation

use axum::Router;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::browse::error::BrowseError;
use crate::browse::router::create_router;
use crate::catalog::Catalog;
use crate::config::{ResponseFormat, ServerConfig};

/// Shared state for the handlers
pub struct BrowseState {
    pub catalog: Catalog,
    pub format: ResponseFormat,
    /// Applied when a request gives no `limit`
    pub row_limit: Option<u64>,
}

/// Read-only HTTP view of one database file
pub struct BrowseServer {
    state: Arc<BrowseState>,
    config: ServerConfig,
}

impl BrowseServer {
    /// Open the database at `path` (which must exist) for serving.
    pub async fn open(path: impl AsRef<Path>, config: ServerConfig) -> Result<Self, BrowseError> {
        let catalog = Catalog::open(path).await?;
        Ok(Self::new(catalog, config))
    }

    pub fn new(catalog: Catalog, config: ServerConfig) -> Self {
        let state = Arc::new(BrowseState {
            catalog,
            format: config.format,
            row_limit: config.row_limit,
        });
        Self { state, config }
    }

    pub fn router(&self) -> Router {
        create_router(Arc::clone(&self.state), self.config.cors)
    }

    /// Serve until Ctrl+C.
    pub async fn serve(self) -> Result<(), BrowseError> {
        let addr = self.config.address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| BrowseError::Bind {
                address: addr.clone(),
                source,
            })?;

        tracing::info!(
            db = %self.state.catalog.path().display(),
            format = ?self.state.format,
            "litemodel browsing on http://{}",
            addr
        );
        tracing::info!("   GET /               - Welcome");
        tracing::info!("   GET /tables         - Table names");
        tracing::info!("   GET /tables/{{name}}  - Table rows (?limit=N&where=...)");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(BrowseError::Serve)?;

        self.state.catalog.close().await;
        tracing::info!("server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
