//! HTTP server for the admission API.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::Result;

use super::service::{self, AppState};

/// HTTP server exposing the admission API.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// Shared engine state
    state: Arc<AppState>,
}

impl HttpServer {
    /// Create a new server over the given state.
    pub fn new(addr: SocketAddr, state: Arc<AppState>) -> Self {
        Self { addr, state }
    }

    /// Build the admission API router.
    pub fn router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/healthz", get(service::health))
            .route("/v1/check", post(service::check))
            .route("/v1/violations", post(service::record_violation))
            .route(
                "/v1/abuse/:identifier",
                get(service::get_abuse).delete(service::clear_abuse),
            )
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Start the server.
    ///
    /// This method will block until the server is shut down.
    pub async fn serve(self) -> Result<()> {
        let app = Self::router(self.state);
        let listener = TcpListener::bind(self.addr).await?;

        info!(addr = %self.addr, "Starting HTTP server for admission API");

        axum::serve(listener, app).await?;
        Ok(())
    }

    /// Start the server with graceful shutdown.
    ///
    /// The server stops accepting connections when `signal` resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = Self::router(self.state);
        let listener = TcpListener::bind(self.addr).await?;

        info!(
            addr = %self.addr,
            "Starting HTTP server for admission API with graceful shutdown"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abuse::AbuseTracker;
    use crate::ratelimit::{PolicySet, RateLimiter};
    use crate::store::MemoryStore;

    fn test_state() -> Arc<AppState> {
        let store = Arc::new(MemoryStore::new());
        Arc::new(AppState {
            limiter: RateLimiter::new(store.clone()),
            abuse: AbuseTracker::new(store),
            policies: PolicySet::new(),
            enforce: true,
        })
    }

    #[test]
    fn test_server_creation() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let _server = HttpServer::new(addr, test_state());
    }

    #[test]
    fn test_router_builds() {
        let _router = HttpServer::router(test_state());
    }
}
