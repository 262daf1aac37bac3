//! HTTP server exposing the gauges
//!
//! ## Architecture
//!
//! - **Axum** web framework with Tower middleware
//! - **MetricSurface** handle shared with the query executor
//!
//! ## Endpoints
//!
//! - `GET /metrics` - Prometheus text exposition
//! - `GET /health` - Liveness of the exporter
//! - `GET /` - Landing page

pub mod error;
pub mod routes;
pub mod state;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;
pub use types::HealthResponse;

use std::future::Future;
use std::net::{IpAddr, SocketAddr};

use axum::{Router, routing::get};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::Config;
use crate::util::{get_default_listen_addr, get_default_listen_port};

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:9102")
    pub bind_addr: SocketAddr,
}

impl ApiConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            bind_addr: SocketAddr::new(config.host, config.port),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(get_default_listen_addr(), get_default_listen_port()),
        }
    }
}

impl From<(IpAddr, u16)> for ApiConfig {
    fn from((host, port): (IpAddr, u16)) -> Self {
        Self {
            bind_addr: SocketAddr::new(host, port),
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(routes::index::landing_page))
        .route("/metrics", get(routes::metrics::scrape))
        .route("/health", get(routes::health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Spawn the API server
///
/// Binds before returning, so a bind failure is reported to the caller. The
/// server runs in a background task until `shutdown` resolves. Returns the
/// bound address (useful with port 0) and the server task.
pub async fn spawn_api_server<F>(
    config: ApiConfig,
    state: ApiState,
    shutdown: F,
) -> anyhow::Result<(SocketAddr, JoinHandle<()>)>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("starting API server on {}", config.bind_addr);

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("API server error: {}", e);
        }
        info!("API server stopped");
    });

    Ok((addr, server))
}
