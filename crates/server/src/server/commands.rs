//! Client command handlers.
//!
//! Handlers run under the write lock between ticks. Movement and actions only
//! stage intents for the next tick; purchases, chat and activations are small
//! checked mutations of the caller's own state.

use super::game::GameState;
use crate::chat::{self, ChatError};
use crate::entity::PlayerCell;
use crate::player::{sanitize_name, EjectRequest, Player};
use crate::shop;
use crate::world::Entity;
use protocol::packets::{finite_point, ClientCommand, PurchaseResult, ServerEvent};
use protocol::{PlayerId, ProtocolError};
use thiserror::Error;
use tracing::{debug, info};

/// Why a command was dropped. Never reaches the tick.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("player {0} has not joined")]
    NotJoined(PlayerId),
    #[error("player {0} has already joined")]
    AlreadyJoined(PlayerId),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("{command} rejected: {reason}")]
    Precondition { command: &'static str, reason: &'static str },
}

impl GameState {
    /// Apply one decoded command from connection `id`.
    pub fn handle_command(&mut self, id: PlayerId, command: ClientCommand) -> Result<(), CommandError> {
        if !command.is_frequent() {
            debug!("Player {} sent {}", id, command.name());
        }

        match command {
            ClientCommand::Join { name } => self.handle_join(id, &name),
            ClientCommand::Move { target_x, target_y, .. } => {
                let target = finite_point(target_x, target_y, "move")?;
                let target = self.world.border.clamp_point(target, self.config.player.target_margin);
                let player = self.players.get(&id).ok_or(CommandError::NotJoined(id))?;
                for cell_id in &player.cells {
                    if let Some(cell) = self.world.player_cell_mut(*cell_id) {
                        cell.target = target;
                    }
                }
                Ok(())
            }
            ClientCommand::Split { mouse_x, mouse_y, .. } => {
                let mouse = finite_point(mouse_x, mouse_y, "split")?;
                self.joined_mut(id)?.intents.split = Some(mouse);
                Ok(())
            }
            ClientCommand::Eject { mouse_x, mouse_y, .. } => {
                let aim = match (mouse_x, mouse_y) {
                    (Some(x), Some(y)) => finite_point(x, y, "eject")
                        .ok()
                        .filter(|p| self.world.border.contains(*p)),
                    _ => None,
                };
                self.joined_mut(id)?.intents.eject = Some(EjectRequest { aim });
                Ok(())
            }
            ClientCommand::Shoot { mouse_x, mouse_y, .. } => {
                let mouse = finite_point(mouse_x, mouse_y, "shoot")?;
                let player = self.joined_mut(id)?;
                if !player.gun.has {
                    return Err(CommandError::Precondition { command: "shoot", reason: "no gun" });
                }
                player.intents.shoot = Some(mouse);
                Ok(())
            }
            ClientCommand::Chat { message } => {
                self.handle_chat(id, &message);
                Ok(())
            }
            ClientCommand::BuyGun => self.handle_buy_gun(id),
            ClientCommand::BuyBarrier => self.handle_buy_barrier(id),
            ClientCommand::ActivateBarrier => self.handle_activate_barrier(id),
            ClientCommand::ActivateSpeedUp => self.handle_activate_speed_up(id),
            ClientCommand::Ping { timestamp } => {
                self.outbox.to_player(id, ServerEvent::Pong { timestamp });
                Ok(())
            }
        }
    }

    fn joined_mut(&mut self, id: PlayerId) -> Result<&mut Player, CommandError> {
        self.players.get_mut(&id).ok_or(CommandError::NotJoined(id))
    }

    fn handle_join(&mut self, id: PlayerId, raw_name: &str) -> Result<(), CommandError> {
        if self.players.contains_key(&id) {
            return Err(CommandError::AlreadyJoined(id));
        }

        let name = sanitize_name(raw_name, id, self.config.player.max_nick_length);
        let mut player = Player::new(id, name);

        let position = self.world.border.random_position(self.config.player.spawn_margin);
        let cell_id = self.world.next_id();
        let cell = PlayerCell::new(cell_id, id, position, self.config.player.initial_mass, player.color, self.now_ms);
        self.world.insert(Entity::Player(cell));
        player.cells.push(cell_id);

        info!("Player {} ({}) joined at ({:.0}, {:.0})", player.name, id, position.x, position.y);

        let joined = ServerEvent::PlayerJoined {
            player_id: id,
            name: player.name.clone(),
            color: player.color,
        };
        let announcement = self.chat.push_system(format!("{} joined the game", player.name), self.now_ms);
        self.players.insert(id, player);

        self.outbox.to_player(
            id,
            ServerEvent::GameInit {
                my_id: id,
                snapshot: Box::new(self.snapshot()),
            },
        );
        self.outbox.to_all_except(id, joined);
        self.outbox.to_all(ServerEvent::ChatMessage(announcement));
        Ok(())
    }

    fn handle_chat(&mut self, id: PlayerId, raw: &str) {
        let result = match self.players.get(&id) {
            Some(player) => chat::validate(raw, self.config.chat.max_length)
                .map(|message| self.chat.push_player(player, message, self.now_ms)),
            None => Err(ChatError::NotJoined),
        };

        match result {
            Ok(entry) => self.outbox.to_all(ServerEvent::ChatMessage(entry)),
            Err(e) => {
                debug!("Chat from {} rejected: {}", id, e);
                self.outbox.to_player(id, ServerEvent::ChatError { reason: e.to_string() });
            }
        }
    }

    fn handle_buy_gun(&mut self, id: PlayerId) -> Result<(), CommandError> {
        let player = self.players.get_mut(&id).ok_or(CommandError::NotJoined(id))?;
        let result = match shop::buy_gun(player, &mut self.world, &self.config, self.now_ms) {
            Ok(bullets) => {
                info!("{} bought a gun ({} bullets)", player.name, bullets);
                self.outbox.to_all(ServerEvent::PlayerBoughtGun { player_id: id, name: player.name.clone() });
                PurchaseResult {
                    success: true,
                    message: format!("Gun purchased! {} bullets", bullets),
                    bullets_left: Some(bullets),
                    duration: Some(self.config.shop.gun_duration_ms),
                }
            }
            Err(e) => {
                debug!("{} failed to buy a gun: {}", player.name, e);
                PurchaseResult {
                    success: false,
                    message: e.to_string(),
                    bullets_left: None,
                    duration: None,
                }
            }
        };
        self.outbox.to_player(id, ServerEvent::BuyGunResult(result));
        Ok(())
    }

    fn handle_buy_barrier(&mut self, id: PlayerId) -> Result<(), CommandError> {
        let player = self.players.get_mut(&id).ok_or(CommandError::NotJoined(id))?;
        let result = match shop::buy_barrier(player, &mut self.world, &self.config) {
            Ok(duration) => {
                info!("{} bought a barrier", player.name);
                self.outbox.to_all(ServerEvent::PlayerBoughtBarrier { player_id: id, name: player.name.clone() });
                PurchaseResult {
                    success: true,
                    message: "Barrier purchased! Activate it when you need it".to_string(),
                    bullets_left: None,
                    duration: Some(duration),
                }
            }
            Err(e) => {
                debug!("{} failed to buy a barrier: {}", player.name, e);
                PurchaseResult {
                    success: false,
                    message: e.to_string(),
                    bullets_left: None,
                    duration: None,
                }
            }
        };
        self.outbox.to_player(id, ServerEvent::BuyBarrierResult(result));
        Ok(())
    }

    fn handle_activate_barrier(&mut self, id: PlayerId) -> Result<(), CommandError> {
        let now_ms = self.now_ms;
        let player = self.players.get_mut(&id).ok_or(CommandError::NotJoined(id))?;
        if !player.barrier.activate(now_ms) {
            return Err(CommandError::Precondition {
                command: "activateBarrier",
                reason: "no idle barrier",
            });
        }
        info!("{} activated a barrier", player.name);
        self.outbox.to_all(ServerEvent::BarrierActivated {
            player_id: id,
            duration: self.config.items.barrier_duration_ms,
        });
        Ok(())
    }

    fn handle_activate_speed_up(&mut self, id: PlayerId) -> Result<(), CommandError> {
        let now_ms = self.now_ms;
        let player = self.players.get_mut(&id).ok_or(CommandError::NotJoined(id))?;
        if !player.speed_up.activate(now_ms) {
            return Err(CommandError::Precondition {
                command: "activateSpeedUp",
                reason: "no idle speed-up",
            });
        }
        info!("{} activated a speed-up", player.name);
        self.outbox.to_all(ServerEvent::SpeedUpActivated {
            player_id: id,
            duration: self.config.items.speed_up_duration_ms,
            multiplier: self.config.items.speed_up_multiplier,
        });
        Ok(())
    }

    /// Total mass of the player's cells, if joined.
    pub fn mass_of(&self, id: PlayerId) -> Option<f32> {
        self.players.get(&id).map(|p| self.player_mass(p))
    }
}
