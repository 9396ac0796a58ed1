//! Transport-agnostic client sessions and the fan-out hub.

use super::commands::CommandError;
use super::game::GameState;
use crate::config::Config;
use crate::events::{Outbound, Recipient};
use protocol::packets::{decode_command, encode_event, ServerEvent, Snapshot};
use protocol::PlayerId;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const SNAPSHOT_CHANNEL_CAPACITY: usize = 4;

/// An encoded event together with who should receive it.
#[derive(Debug, Clone)]
pub struct Frame {
    pub recipient: Recipient,
    pub text: Arc<str>,
}

/// Shared game state plus the channels sessions listen on.
pub struct Hub {
    pub state: Arc<RwLock<GameState>>,
    events: broadcast::Sender<Arc<Frame>>,
    snapshots: broadcast::Sender<Arc<str>>,
    max_connections: usize,
    started: Instant,
}

impl Hub {
    pub fn new(config: &Config) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (snapshots, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        Arc::new(Self {
            state: Arc::new(RwLock::new(GameState::new(config))),
            events,
            snapshots,
            max_connections: config.server.max_connections,
            started: Instant::now(),
        })
    }

    /// Seconds since the hub was created.
    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Encode each event once and fan it out to every session.
    pub fn publish(&self, outbound: Vec<Outbound>) {
        for Outbound { recipient, event } in outbound {
            let text = match encode_event(&event) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to encode {} event: {}", event.name(), e);
                    continue;
                }
            };
            // No subscribers is not an error.
            let _ = self.events.send(Arc::new(Frame { recipient, text: text.into() }));
        }
    }

    /// Encode a world snapshot and publish it on the snapshot channel.
    pub fn publish_snapshot(&self, snapshot: Snapshot) {
        match encode_event(&ServerEvent::GameUpdate(Box::new(snapshot))) {
            Ok(text) => {
                let _ = self.snapshots.send(text.into());
            }
            Err(e) => error!("Failed to encode snapshot: {}", e),
        }
    }
}

/// One connected client, independent of the socket library carrying it.
pub struct Session {
    hub: Arc<Hub>,
    id: PlayerId,
    events: broadcast::Receiver<Arc<Frame>>,
    snapshots: broadcast::Receiver<Arc<str>>,
}

impl Session {
    /// Register a new connection, or `None` when the server is full.
    pub async fn open(hub: Arc<Hub>) -> Option<Session> {
        let events = hub.events.subscribe();
        let snapshots = hub.snapshots.subscribe();
        let id = {
            let mut game = hub.state.write().await;
            if game.connections >= hub.max_connections {
                warn!("Connection limit reached ({})", hub.max_connections);
                return None;
            }
            game.connect()
        };
        Some(Session { hub, id, events, snapshots })
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    /// Decode and apply one inbound text frame.
    pub async fn handle_text(&self, text: &str) {
        let command = match decode_command(text) {
            Ok(command) => command,
            Err(e) => {
                warn!("Dropping frame from {}: {}", self.id, e);
                return;
            }
        };

        let outbound = {
            let mut game = self.hub.state.write().await;
            match game.handle_command(self.id, command) {
                Ok(()) => {}
                Err(e @ CommandError::Protocol(_)) => warn!("Rejected command from {}: {}", self.id, e),
                Err(e) => debug!("Ignored command from {}: {}", self.id, e),
            }
            game.outbox.drain()
        };
        self.hub.publish(outbound);
    }

    /// Next encoded frame addressed to this session. `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        loop {
            tokio::select! {
                biased;
                event = self.events.recv() => match event {
                    Ok(frame) => {
                        if frame.recipient.includes(self.id) {
                            return Some(Arc::clone(&frame.text));
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => warn!("Session {} lagged, {} events dropped", self.id, skipped),
                    Err(RecvError::Closed) => return None,
                },
                snapshot = self.snapshots.recv() => match snapshot {
                    Ok(text) => return Some(text),
                    Err(RecvError::Lagged(skipped)) => debug!("Session {} skipped {} snapshots", self.id, skipped),
                    Err(RecvError::Closed) => return None,
                },
            }
        }
    }

    /// Unregister the connection and announce the departure.
    pub async fn close(self) {
        let outbound = {
            let mut game = self.hub.state.write().await;
            game.disconnect(self.id);
            game.outbox.drain()
        };
        info!("Session {} closed", self.id);
        self.hub.publish(outbound);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hub(max_connections: usize) -> Arc<Hub> {
        let mut config = Config::default();
        config.server.max_connections = max_connections;
        config.food.count = 0;
        config.virus.initial_count = 0;
        Hub::new(&config)
    }

    fn event_type(text: &str) -> String {
        let value: serde_json::Value = serde_json::from_str(text).unwrap();
        value["type"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_join_reaches_only_the_joiner_first() {
        let hub = hub(10);
        let mut ann = Session::open(Arc::clone(&hub)).await.unwrap();
        let mut bob = Session::open(Arc::clone(&hub)).await.unwrap();

        ann.handle_text(r#"{"type":"join","name":"ann"}"#).await;

        let first = ann.recv().await.unwrap();
        assert_eq!(event_type(&first), "gameInit");

        // Bob sees the broadcast but not ann's private init.
        let seen = bob.recv().await.unwrap();
        assert_eq!(event_type(&seen), "playerJoined");
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let hub = hub(1);
        let first = Session::open(Arc::clone(&hub)).await;
        assert!(first.is_some());
        assert!(Session::open(Arc::clone(&hub)).await.is_none());

        first.unwrap().close().await;
        assert!(Session::open(Arc::clone(&hub)).await.is_some());
    }

    #[tokio::test]
    async fn test_malformed_frame_is_dropped() {
        let hub = hub(10);
        let session = Session::open(Arc::clone(&hub)).await.unwrap();
        session.handle_text("not json").await;
        session.handle_text(r#"{"type":"move","x":1}"#).await;
        assert!(hub.state.read().await.players.is_empty());
    }

    #[tokio::test]
    async fn test_close_announces_departure() {
        let hub = hub(10);
        let ann = Session::open(Arc::clone(&hub)).await.unwrap();
        let mut bob = Session::open(Arc::clone(&hub)).await.unwrap();
        ann.handle_text(r#"{"type":"join","name":"ann"}"#).await;
        assert_eq!(event_type(&bob.recv().await.unwrap()), "playerJoined");
        assert_eq!(event_type(&bob.recv().await.unwrap()), "chatMessage");

        ann.close().await;
        assert_eq!(event_type(&bob.recv().await.unwrap()), "chatMessage");
        assert_eq!(event_type(&bob.recv().await.unwrap()), "playerLeft");
        assert_eq!(hub.state.read().await.connections, 1);
    }

    #[tokio::test]
    async fn test_snapshots_reach_every_session() {
        let hub = hub(10);
        let mut session = Session::open(Arc::clone(&hub)).await.unwrap();
        let snapshot = hub.state.read().await.snapshot();
        hub.publish_snapshot(snapshot);
        assert_eq!(event_type(&session.recv().await.unwrap()), "gameUpdate");
    }
}
