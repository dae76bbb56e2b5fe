use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::hub::{BroadcastHub, HubMetrics};
use crate::ingest::{BridgeMetrics, IngestionBridge};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub hub: BroadcastHub,
    pub bridge: IngestionBridge,
    pub config: Arc<ServerConfig>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(hub: BroadcastHub, bridge: IngestionBridge, config: Arc<ServerConfig>) -> Self {
        Self {
            hub,
            bridge,
            config,
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Build the service router: websocket stream plus health and diagnostics.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(handle_websocket))
        .route("/health", get(health_check))
        .route("/stats", get(stats))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle WebSocket upgrade
pub async fn handle_websocket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Drive one subscriber connection: forward frames from the hub queue and
/// watch the inbound side for close. Inbound data messages are ignored.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (id, mut frames) = state.hub.register();
    info!(subscriber = %id, "subscriber connected");

    loop {
        tokio::select! {
            frame = frames.recv() => {
                match frame {
                    Some(payload) => {
                        if let Err(e) = sender.send(Message::Text(payload)).await {
                            warn!(subscriber = %id, "send failed: {e}");
                            break;
                        }
                    }
                    // Queue closed: evicted as too slow, or hub shutdown.
                    None => break,
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(subscriber = %id, "websocket error: {e}");
                        break;
                    }
                }
            }
        }
    }

    state.hub.unregister(id);
    info!(subscriber = %id, "subscriber disconnected");
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub subscribers: usize,
    pub uptime_seconds: u64,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        subscribers: state.hub.subscriber_count(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// Pipeline diagnostics response
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub bridge: BridgeMetrics,
    pub hub: HubMetrics,
    pub sample_rate_hz: f64,
    pub window_size: usize,
}

/// Diagnostics endpoint: ingestion and fan-out counters, including how many
/// samples the bridge has had to drop.
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        bridge: state.bridge.metrics(),
        hub: state.hub.metrics(),
        sample_rate_hz: state.config.sample_rate_hz,
        window_size: state.config.window_size,
    })
}
