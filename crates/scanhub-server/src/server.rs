//! `ScanhubServer` — Axum HTTP + WebSocket server.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::files::FileStore;
use crate::health::{self, HealthResponse};
use crate::http;
use crate::registry::ClientRegistry;
use crate::rpc::handlers;
use crate::rpc::registry::MethodRegistry;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcast::BroadcastManager;
use crate::websocket::session::run_ws_session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: ServerConfig,
    /// Registry of connected clients.
    pub registry: Arc<ClientRegistry>,
    /// Live connection send handles.
    pub broadcast: Arc<BroadcastManager>,
    /// RPC method registry.
    pub methods: Arc<MethodRegistry>,
    /// Demo-directory file store.
    pub files: Arc<FileStore>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus render handle for `/metrics`.
    pub metrics: PrometheusHandle,
}

/// The main scanhub server.
pub struct ScanhubServer {
    config: ServerConfig,
    registry: Arc<ClientRegistry>,
    broadcast: Arc<BroadcastManager>,
    methods: Arc<MethodRegistry>,
    files: Arc<FileStore>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: PrometheusHandle,
}

impl ScanhubServer {
    /// Create a new server with all methods registered.
    pub fn new(config: ServerConfig, metrics: PrometheusHandle) -> Self {
        let mut methods = MethodRegistry::new();
        handlers::register_all(&mut methods);

        let files = Arc::new(FileStore::new(config.demo_dir.clone()));
        Self {
            config,
            registry: Arc::new(ClientRegistry::new()),
            broadcast: Arc::new(BroadcastManager::new()),
            methods: Arc::new(methods),
            files,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics,
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            config: self.config.clone(),
            registry: self.registry.clone(),
            broadcast: self.broadcast.clone(),
            methods: self.methods.clone(),
            files: self.files.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_handler))
            .route("/api/upload-file", post(http::upload_file))
            .route("/api/files", get(http::list_files))
            .route("/api/files/{filename}", get(http::download_file))
            .route("/api/create-demo-files", post(http::create_demo_files))
            .route_service(
                "/",
                ServeFile::new(self.config.assets_dir.join("dashboard.html")),
            )
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind and start serving. Returns the bound address and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        self.files.ensure_root().await.map_err(std::io::Error::other)?;

        let listener =
            tokio::net::TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;

        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "server task failed");
            }
        });

        Ok((addr, handle))
    }

    /// Get the client registry.
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Get the broadcast manager.
    pub fn broadcast(&self) -> &Arc<BroadcastManager> {
        &self.broadcast
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the file store.
    pub fn files(&self) -> &Arc<FileStore> {
        &self.files
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.broadcast.connection_count().await;
    Json(health::health_check(state.start_time, connections))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    crate::metrics::render(&state.metrics)
}

/// GET /ws — WebSocket upgrade.
///
/// An optional `clientName` query parameter seeds the registry entry, the
/// same way a handshake query would on the wire.
async fn ws_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    if state.broadcast.connection_count().await >= state.config.max_connections {
        tracing::warn!(max = state.config.max_connections, "connection limit reached");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let client_id = format!("conn_{}", Uuid::now_v7());
    let handshake_name = params.get("clientName").cloned();

    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| {
            run_ws_session(
                socket,
                client_id,
                Some(addr.to_string()),
                handshake_name,
                state.methods.clone(),
                state.registry.clone(),
                state.broadcast.clone(),
            )
        })
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    /// State over a temp demo directory, without installing a global recorder.
    pub(crate) async fn make_test_state() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            demo_dir: dir.path().to_path_buf(),
            ..ServerConfig::default()
        };
        let server = ScanhubServer::new(config, PrometheusBuilder::new().build_recorder().handle());
        server.files().ensure_root().await.unwrap();

        let state = AppState {
            config: server.config.clone(),
            registry: server.registry.clone(),
            broadcast: server.broadcast.clone(),
            methods: server.methods.clone(),
            files: server.files.clone(),
            shutdown: server.shutdown.clone(),
            start_time: server.start_time,
            metrics: server.metrics.clone(),
        };
        (state, dir)
    }
}
