//! Chat log.

use crate::player::Player;
use protocol::packets::{ChatEntry, ChatKind};
use std::collections::VecDeque;
use thiserror::Error;

/// Reasons a chat message is rejected. The display text is sent to the client.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("Message is empty")]
    Empty,
    #[error("Message is too long (max {max} characters)")]
    TooLong { max: usize },
    #[error("Join the game before chatting")]
    NotJoined,
}

/// Trim a message and check its length in characters.
pub fn validate(raw: &str, max_chars: usize) -> Result<String, ChatError> {
    let message = raw.trim();
    if message.is_empty() {
        return Err(ChatError::Empty);
    }
    if message.chars().count() > max_chars {
        return Err(ChatError::TooLong { max: max_chars });
    }
    Ok(message.to_string())
}

/// Bounded chat history. The oldest entry is evicted once full.
#[derive(Debug)]
pub struct ChatLog {
    entries: VecDeque<ChatEntry>,
    capacity: usize,
    next_id: u64,
}

impl ChatLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            next_id: 1,
        }
    }

    fn push(&mut self, mut entry: ChatEntry) -> ChatEntry {
        entry.id = self.next_id;
        self.next_id += 1;
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry.clone());
        entry
    }

    /// Append a validated message from a player.
    pub fn push_player(&mut self, player: &Player, message: String, now_ms: u64) -> ChatEntry {
        self.push(ChatEntry {
            id: 0,
            player_id: Some(player.id),
            player_name: player.name.clone(),
            player_color: Some(player.color),
            message,
            timestamp: now_ms,
            kind: ChatKind::Normal,
        })
    }

    /// Append a server announcement.
    pub fn push_system(&mut self, message: impl Into<String>, now_ms: u64) -> ChatEntry {
        self.push(ChatEntry {
            id: 0,
            player_id: None,
            player_name: "System".to_string(),
            player_color: None,
            message: message.into(),
            timestamp: now_ms,
            kind: ChatKind::System,
        })
    }

    /// The newest `count` entries, oldest first.
    pub fn recent(&self, count: usize) -> Vec<ChatEntry> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip).cloned().collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::PlayerId;

    #[test]
    fn test_validation() {
        assert_eq!(validate("  hi  ", 100), Ok("hi".to_string()));
        assert_eq!(validate("   ", 100), Err(ChatError::Empty));
        assert_eq!(validate(&"a".repeat(101), 100), Err(ChatError::TooLong { max: 100 }));
        assert!(validate(&"é".repeat(100), 100).is_ok());
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let mut log = ChatLog::new(3);
        let player = Player::new(PlayerId(1), "ann".into());
        for i in 0..5 {
            log.push_player(&player, format!("m{}", i), i);
        }
        assert_eq!(log.len(), 3);
        let recent = log.recent(10);
        assert_eq!(recent.first().map(|e| e.message.as_str()), Some("m2"));
        assert_eq!(recent.last().map(|e| e.id), Some(5));
        assert_eq!(log.recent(1)[0].message, "m4");
    }

    #[test]
    fn test_system_entries() {
        let mut log = ChatLog::new(10);
        let entry = log.push_system("ann joined the game", 7);
        assert_eq!(entry.kind, ChatKind::System);
        assert!(entry.player_id.is_none());
        assert_eq!(entry.timestamp, 7);
    }
}
