//! HTTP server for the tutor UI

pub mod health;
pub mod session;
pub mod websocket;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::response::Html;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::config::DEFAULT_PORT;
use crate::controller::SessionController;

/// Single-page UI served when no static directory is configured
pub const INDEX_HTML: &str = include_str!("../../static/index.html");

/// Shared state for API handlers
pub struct ApiState {
    pub controller: Arc<SessionController>,
}

/// Builder for the API server
pub struct ApiServerBuilder {
    controller: Arc<SessionController>,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServerBuilder {
    #[must_use]
    pub const fn new(controller: Arc<SessionController>) -> Self {
        Self {
            controller,
            port: DEFAULT_PORT,
            static_dir: None,
        }
    }

    /// Port to listen on
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Serve the UI from a directory instead of the embedded page
    #[must_use]
    pub fn static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    #[must_use]
    pub fn build(self) -> ApiServer {
        ApiServer {
            state: Arc::new(ApiState {
                controller: self.controller,
            }),
            port: self.port,
            static_dir: self.static_dir,
        }
    }
}

/// HTTP API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .nest("/api", session::router(self.state.clone()))
            .nest("/ws/session", websocket::router(self.state.clone()))
            .merge(health::router());

        if let Some(static_dir) = &self.static_dir {
            let index_file = static_dir.join("index.html");
            let serve_dir =
                ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_file));

            router = router.fallback_service(serve_dir);
            tracing::info!(path = %static_dir.display(), "serving static files");
        } else {
            router = router.route("/", get(|| async { Html(INDEX_HTML) }));
        }

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "tutor UI listening on http://localhost:{}", self.port);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
