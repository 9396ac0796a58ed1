//! Message definitions for the arena protocol.
//!
//! Every frame is a JSON object tagged by its `type` field. Client commands
//! live in [`client`], server events and snapshot views in [`server`].

mod client;
mod server;

pub use client::*;
pub use server::*;

use crate::ProtocolError;

/// Largest inbound text frame accepted from a client.
pub const MAX_COMMAND_BYTES: usize = 4096;

/// Decode a client text frame.
pub fn decode_command(text: &str) -> Result<ClientCommand, ProtocolError> {
    if text.len() > MAX_COMMAND_BYTES {
        return Err(ProtocolError::TooLarge(text.len()));
    }
    Ok(serde_json::from_str(text)?)
}

/// Encode a server event as a text frame.
pub fn encode_event(event: &ServerEvent) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(event)?)
}
