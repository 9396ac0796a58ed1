//! Outbound event queue.
//!
//! Simulation code never talks to the network. It pushes events here and the
//! runtime drains the queue after each tick or command, once the lock is gone.

use protocol::packets::ServerEvent;
use protocol::PlayerId;

/// Who receives an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    All,
    Player(PlayerId),
    AllExcept(PlayerId),
}

impl Recipient {
    /// Whether the connection owned by `id` should get the event.
    #[inline]
    pub fn includes(&self, id: PlayerId) -> bool {
        match self {
            Recipient::All => true,
            Recipient::Player(target) => *target == id,
            Recipient::AllExcept(skip) => *skip != id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub recipient: Recipient,
    pub event: ServerEvent,
}

#[derive(Debug, Default)]
pub struct Outbox {
    queue: Vec<Outbound>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, recipient: Recipient, event: ServerEvent) {
        self.queue.push(Outbound { recipient, event });
    }

    #[inline]
    pub fn to_all(&mut self, event: ServerEvent) {
        self.push(Recipient::All, event);
    }

    #[inline]
    pub fn to_player(&mut self, id: PlayerId, event: ServerEvent) {
        self.push(Recipient::Player(id), event);
    }

    #[inline]
    pub fn to_all_except(&mut self, id: PlayerId, event: ServerEvent) {
        self.push(Recipient::AllExcept(id), event);
    }

    /// Take every queued event, oldest first.
    pub fn drain(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.queue)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
