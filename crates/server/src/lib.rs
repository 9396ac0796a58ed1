//! Authoritative cell arena game server library.

pub mod chat;
pub mod collision;
pub mod config;
pub mod entity;
pub mod events;
pub mod player;
pub mod server;
pub mod shop;
pub mod spatial;
pub mod world;

// Re-export commonly used types
pub use chat::ChatError;
pub use config::Config;
pub use events::{Outbound, Recipient};
pub use server::{run, run_game_loop, CommandError, GameState, Hub, Session};
pub use shop::ShopError;
