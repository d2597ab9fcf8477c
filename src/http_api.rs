//! HTTP status surface: `/health` and `/stats`, entirely separate from the
//! Modbus wire protocol.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::info;

use crate::connection::Manager as ConnectionManager;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    tcp_connections: usize,
    rtu_status: &'static str,
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    total_requests: u64,
    active_connections: usize,
    error_count: u64,
    avg_response_time_ms: u64,
    requests_per_second: f64,
}

/// Tracks whether the RTU reader loop is currently running, reported by
/// `/health`. Cheap enough to share by value rather than behind the
/// connection manager.
#[derive(Clone, Default)]
pub struct RtuStatus(Arc<AtomicBool>);

impl RtuStatus {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn set_running(&self, running: bool) {
        self.0.store(running, Ordering::Relaxed);
    }

    fn label(&self) -> &'static str {
        if self.0.load(Ordering::Relaxed) {
            "ok"
        } else {
            "stopped"
        }
    }
}

#[derive(Clone)]
struct ApiState {
    connections: Arc<ConnectionManager>,
    rtu_status: RtuStatus,
}

async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let stats = state.connections.get_stats().await;
    let response = HealthResponse {
        status: "ok",
        tcp_connections: stats.active_connections,
        rtu_status: state.rtu_status.label(),
    };
    (StatusCode::OK, Json(response))
}

async fn stats_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let stats = state.connections.get_stats().await;
    let response = StatsResponse {
        total_requests: stats.total_requests,
        active_connections: stats.active_connections,
        error_count: stats.total_errors,
        avg_response_time_ms: stats.avg_response_time_ms,
        requests_per_second: stats.requests_per_second,
    };
    (StatusCode::OK, Json(response))
}

/// Serves `/health` and `/stats` until a signal arrives on `shutdown`.
pub async fn serve(
    bind_addr: &str,
    port: u16,
    connections: Arc<ConnectionManager>,
    rtu_status: RtuStatus,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let state = ApiState {
        connections,
        rtu_status,
    };
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let addr = format!("{bind_addr}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP status server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            info!("HTTP status server shutting down");
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionConfig;

    #[tokio::test]
    async fn health_and_stats_reflect_connection_manager_state() {
        let manager = Arc::new(ConnectionManager::new(ConnectionConfig::default()));
        let addr: std::net::SocketAddr = "127.0.0.1:9001".parse().unwrap();
        let guard = manager.accept(addr).await.unwrap();
        manager
            .record_request(addr, true, std::time::Duration::from_millis(5))
            .await;

        let rtu_status = RtuStatus::new();
        rtu_status.set_running(true);
        let state = ApiState {
            connections: Arc::clone(&manager),
            rtu_status,
        };

        let health = health_handler(State(state.clone())).await.into_response();
        assert_eq!(health.status(), StatusCode::OK);

        let stats = manager.get_stats().await;
        assert_eq!(stats.active_connections, 1);
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.avg_response_time_ms, 5);
        drop(guard);
    }
}
