//! Client -> Server commands.

use crate::{Position, ProtocolError};
use serde::{Deserialize, Serialize};

/// Parsed client command.
///
/// Timestamps are client clocks in milliseconds; the server only echoes them.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientCommand {
    /// Enter the arena with a display name.
    Join {
        #[serde(default)]
        name: String,
    },
    /// Update the movement target of all owned cells.
    Move {
        target_x: f32,
        target_y: f32,
        #[serde(default)]
        timestamp: f64,
    },
    /// Split every eligible cell toward the mouse.
    Split {
        mouse_x: f32,
        mouse_y: f32,
        #[serde(default)]
        timestamp: f64,
    },
    /// Eject mass from the first eligible cell.
    Eject {
        #[serde(default)]
        mouse_x: Option<f32>,
        #[serde(default)]
        mouse_y: Option<f32>,
        #[serde(default)]
        timestamp: f64,
    },
    /// Fire a bullet toward the mouse.
    Shoot {
        mouse_x: f32,
        mouse_y: f32,
        #[serde(default)]
        timestamp: f64,
    },
    Chat {
        message: String,
    },
    BuyGun,
    BuyBarrier,
    ActivateBarrier,
    ActivateSpeedUp,
    Ping {
        #[serde(default)]
        timestamp: f64,
    },
}

impl ClientCommand {
    /// Short name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::Join { .. } => "join",
            ClientCommand::Move { .. } => "move",
            ClientCommand::Split { .. } => "split",
            ClientCommand::Eject { .. } => "eject",
            ClientCommand::Shoot { .. } => "shoot",
            ClientCommand::Chat { .. } => "chat",
            ClientCommand::BuyGun => "buyGun",
            ClientCommand::BuyBarrier => "buyBarrier",
            ClientCommand::ActivateBarrier => "activateBarrier",
            ClientCommand::ActivateSpeedUp => "activateSpeedUp",
            ClientCommand::Ping { .. } => "ping",
        }
    }

    /// Whether this command is sent at a high rate (kept out of debug logs).
    pub fn is_frequent(&self) -> bool {
        matches!(self, ClientCommand::Move { .. } | ClientCommand::Ping { .. })
    }
}

/// Validate a pair of coordinates, rejecting NaN and infinities.
pub fn finite_point(x: f32, y: f32, command: &'static str) -> Result<Position, ProtocolError> {
    if x.is_finite() && y.is_finite() {
        Ok(Position::new(x, y))
    } else {
        Err(ProtocolError::NonFinite(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packets::decode_command;

    #[test]
    fn test_parse_move() {
        let cmd = decode_command(r#"{"type":"move","targetX":10.5,"targetY":20,"timestamp":123}"#).unwrap();
        assert_eq!(
            cmd,
            ClientCommand::Move { target_x: 10.5, target_y: 20.0, timestamp: 123.0 }
        );
    }

    #[test]
    fn test_parse_unit_commands() {
        assert_eq!(decode_command(r#"{"type":"buyGun"}"#).unwrap(), ClientCommand::BuyGun);
        assert_eq!(
            decode_command(r#"{"type":"activateSpeedUp"}"#).unwrap(),
            ClientCommand::ActivateSpeedUp
        );
    }

    #[test]
    fn test_eject_without_mouse() {
        let cmd = decode_command(r#"{"type":"eject"}"#).unwrap();
        assert_eq!(cmd, ClientCommand::Eject { mouse_x: None, mouse_y: None, timestamp: 0.0 });
    }

    #[test]
    fn test_join_default_name() {
        let cmd = decode_command(r#"{"type":"join"}"#).unwrap();
        assert_eq!(cmd, ClientCommand::Join { name: String::new() });
    }

    #[test]
    fn test_rejects_unknown_and_malformed() {
        assert!(matches!(decode_command(r#"{"type":"teleport"}"#), Err(ProtocolError::Malformed(_))));
        assert!(matches!(decode_command("not json"), Err(ProtocolError::Malformed(_))));
        let huge = format!(r#"{{"type":"chat","message":"{}"}}"#, "a".repeat(5000));
        assert!(matches!(decode_command(&huge), Err(ProtocolError::TooLarge(_))));
    }

    #[test]
    fn test_finite_point() {
        assert!(finite_point(1.0, 2.0, "move").is_ok());
        assert!(matches!(finite_point(f32::NAN, 2.0, "move"), Err(ProtocolError::NonFinite("move"))));
        assert!(finite_point(1.0, f32::INFINITY, "split").is_err());
    }
}
