//! Arena - game server with HTTP status endpoints.

use axum::{
    extract::{ws::{Message, WebSocket, WebSocketUpgrade}, ConnectInfo, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use protocol::packets::{LeaderboardEntry, Stats};
use serde::Serialize;
use server::{Hub, Session};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct AppState {
    hub: Arc<Hub>,
    name: Arc<str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    name: String,
    version: &'static str,
    players: usize,
    connections: usize,
    max_connections: usize,
    uptime_secs: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    stats: Stats,
    leaderboard: Vec<LeaderboardEntry>,
    entities: usize,
    update_time_avg: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Cell Arena Server v{}", env!("CARGO_PKG_VERSION"));

    let config = server::Config::load()?;
    info!("Loaded configuration");
    info!("  Port: {}", config.server.port);
    info!("  World: {}x{}", config.world.width, config.world.height);
    info!("  Tick rate: {} Hz, broadcast rate: {} Hz", config.server.tick_rate, config.server.broadcast_rate);

    let hub = Hub::new(&config);
    tokio::spawn(server::run_game_loop(Arc::clone(&hub)));

    let state = AppState {
        hub,
        name: config.server.name.as_str().into(),
    };

    let app = Router::new()
        .route("/ws", get(websocket_handler))
        .route("/", get(status_handler))
        .route("/api/stats", get(stats_handler))
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
        )
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Game WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    Ok(())
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let game = state.hub.state.read().await;
    Json(StatusResponse {
        name: state.name.to_string(),
        version: env!("CARGO_PKG_VERSION"),
        players: game.players.len(),
        connections: game.connections,
        max_connections: game.config.server.max_connections,
        uptime_secs: state.hub.uptime_secs(),
    })
}

async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let game = state.hub.state.read().await;
    Json(StatsResponse {
        stats: game.stats.clone(),
        leaderboard: game.leaderboard.clone(),
        entities: game.world.len(),
        update_time_avg: game.update_time_avg,
    })
}

/// Handle WebSocket connections for the game
async fn websocket_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    info!("WebSocket connection from {}", addr);
    ws.on_upgrade(move |socket| handle_websocket(socket, addr, state.hub))
}

/// Bridge an axum socket to a game session.
async fn handle_websocket(socket: WebSocket, addr: SocketAddr, hub: Arc<Hub>) {
    let (mut sender, mut receiver) = socket.split();

    let Some(mut session) = Session::open(hub).await else {
        warn!("Connection rejected (limit reached): {}", addr);
        let _ = sender.send(Message::Close(None)).await;
        return;
    };
    info!("New game connection from {} ({})", addr, session.id());

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => session.handle_text(text.as_str()).await,
                    Some(Ok(Message::Close(_))) => {
                        info!("Client {} disconnected", addr);
                        break;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error from {}: {}", addr, e);
                        break;
                    }
                    None => break,
                    _ => {}
                }
            }
            frame = session.recv() => {
                let Some(text) = frame else {
                    break;
                };
                if let Err(e) = sender.send(Message::text(text.to_string())).await {
                    warn!("Failed to send to {}: {}", addr, e);
                    break;
                }
            }
        }
    }

    session.close().await;
}
