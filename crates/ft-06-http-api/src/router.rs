//! # Router
//!
//! | Method | Path | Success |
//! |--------|------|---------|
//! | POST | `/transactions` | 202 |
//! | GET | `/transactions` | 200 |
//! | DELETE | `/transactions/:id` | 204 |
//! | POST | `/import` | 202 |
//! | GET | `/reports` | 200 |
//! | GET | `/health` | 200 |

use crate::handlers::{
    add_transaction, delete_transaction, get_report, get_transactions, health_check,
    import_statement,
};
use crate::state::AppState;
use axum::routing::{delete, get, post};
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub listen_addr: SocketAddr,
    /// Requests running longer are answered with 408 and their handler
    /// future is dropped.
    pub request_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Build the application router with tracing and timeout middleware.
pub fn build_router(state: AppState, config: &HttpConfig) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(config.request_timeout));

    Router::new()
        .route("/transactions", post(add_transaction).get(get_transactions))
        .route("/transactions/:id", delete(delete_transaction))
        .route("/import", post(import_statement))
        .route("/reports", get(get_report))
        .route("/health", get(health_check))
        .layer(middleware)
        .with_state(state)
}

/// Serve `router` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(addr = ?listener.local_addr().ok(), "HTTP server listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
