//! Game server runtime: simulation, command handling and the WebSocket transport.

use crate::config::Config;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};

mod actions;
pub mod commands;
pub mod game;
mod resolve;
pub mod session;
mod snapshot;

pub use commands::CommandError;
pub use game::{run_game_loop, GameState};
pub use session::{Frame, Hub, Session};
pub use snapshot::SNAPSHOT_CHAT_WINDOW;

/// Run the standalone WebSocket server until the listener fails.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on ws://{}", addr);

    let hub = Hub::new(&config);
    tokio::spawn(run_game_loop(Arc::clone(&hub)));

    loop {
        let (stream, addr) = listener.accept().await?;
        let hub = Arc::clone(&hub);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, addr, hub).await {
                error!("Connection error from {}: {}", addr, e);
            }
        });
    }
}

async fn handle_connection(stream: TcpStream, addr: SocketAddr, hub: Arc<Hub>) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    let (mut write, mut read) = ws_stream.split();

    let Some(mut session) = Session::open(hub).await else {
        warn!("Connection rejected (limit reached): {}", addr);
        write.send(Message::Close(None)).await?;
        return Ok(());
    };
    info!("New connection from {} ({})", addr, session.id());

    loop {
        tokio::select! {
            msg = read.next() => {
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
                if let Err(e) = write.send(Message::text(text.to_string())).await {
                    warn!("Failed to send to {}: {}", addr, e);
                    break;
                }
            }
        }
    }

    session.close().await;
    Ok(())
}
