//! Server -> Client events and snapshot views.

use crate::{Color, EntityId, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Round to two decimals (positions, radii).
#[inline]
pub fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

/// Round to one decimal (masses).
#[inline]
pub fn round1(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

/// Server event, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Sent to a player right after joining.
    GameInit {
        my_id: PlayerId,
        #[serde(flatten)]
        snapshot: Box<Snapshot>,
    },
    /// Periodic full snapshot.
    GameUpdate(Box<Snapshot>),
    PlayerJoined {
        player_id: PlayerId,
        name: String,
        color: Color,
    },
    PlayerLeft {
        player_id: PlayerId,
    },
    PlayerEaten {
        predator_id: PlayerId,
        prey_id: PlayerId,
        cell_id: EntityId,
        remaining_cells: usize,
    },
    /// Sent to an eliminated player.
    PlayerDeath {
        killed_by: String,
        final_mass: f32,
        final_score: u64,
        death_reason: DeathReason,
    },
    PlayerKilledByBullet {
        victim_id: PlayerId,
        victim_name: String,
        shooter_id: PlayerId,
        shooter_name: String,
    },
    ChatMessage(ChatEntry),
    ChatError {
        reason: String,
    },
    GunAcquired {
        bullets: u32,
    },
    GunExpired,
    GunShotResult {
        bullets_left: u32,
    },
    BulletHit {
        shooter_id: PlayerId,
        target_id: PlayerId,
        cell_id: EntityId,
        damage: f32,
        remaining_mass: f32,
    },
    BarrierAcquired,
    BarrierActivated {
        player_id: PlayerId,
        duration: u64,
    },
    BarrierExpired {
        player_id: PlayerId,
    },
    SpeedUpAcquired,
    SpeedUpActivated {
        player_id: PlayerId,
        duration: u64,
        multiplier: f32,
    },
    SpeedUpExpired {
        player_id: PlayerId,
    },
    /// Broadcast when any player picks up an item.
    ItemCollected {
        kind: ItemKind,
        player_id: PlayerId,
        item_id: EntityId,
    },
    BuyGunResult(PurchaseResult),
    BuyBarrierResult(PurchaseResult),
    PlayerBoughtGun {
        player_id: PlayerId,
        name: String,
    },
    PlayerBoughtBarrier {
        player_id: PlayerId,
        name: String,
    },
    VirusRiskReward {
        player_id: PlayerId,
        bonus_mass: f32,
        split_count: usize,
        new_mass: f32,
        total_cells: usize,
        total_risk_rewards: u32,
        virus_destroyed: bool,
    },
    Pong {
        timestamp: f64,
    },
}

impl ServerEvent {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::GameInit { .. } => "gameInit",
            ServerEvent::GameUpdate(_) => "gameUpdate",
            ServerEvent::PlayerJoined { .. } => "playerJoined",
            ServerEvent::PlayerLeft { .. } => "playerLeft",
            ServerEvent::PlayerEaten { .. } => "playerEaten",
            ServerEvent::PlayerDeath { .. } => "playerDeath",
            ServerEvent::PlayerKilledByBullet { .. } => "playerKilledByBullet",
            ServerEvent::ChatMessage(_) => "chatMessage",
            ServerEvent::ChatError { .. } => "chatError",
            ServerEvent::GunAcquired { .. } => "gunAcquired",
            ServerEvent::GunExpired => "gunExpired",
            ServerEvent::GunShotResult { .. } => "gunShotResult",
            ServerEvent::BulletHit { .. } => "bulletHit",
            ServerEvent::BarrierAcquired => "barrierAcquired",
            ServerEvent::BarrierActivated { .. } => "barrierActivated",
            ServerEvent::BarrierExpired { .. } => "barrierExpired",
            ServerEvent::SpeedUpAcquired => "speedUpAcquired",
            ServerEvent::SpeedUpActivated { .. } => "speedUpActivated",
            ServerEvent::SpeedUpExpired { .. } => "speedUpExpired",
            ServerEvent::ItemCollected { .. } => "itemCollected",
            ServerEvent::BuyGunResult(_) => "buyGunResult",
            ServerEvent::BuyBarrierResult(_) => "buyBarrierResult",
            ServerEvent::PlayerBoughtGun { .. } => "playerBoughtGun",
            ServerEvent::PlayerBoughtBarrier { .. } => "playerBoughtBarrier",
            ServerEvent::VirusRiskReward { .. } => "virusRiskReward",
            ServerEvent::Pong { .. } => "pong",
        }
    }
}

/// Why a player was eliminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeathReason {
    Eaten,
    Bullet,
}

/// Pickup kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemKind {
    Gun,
    Barrier,
    SpeedUp,
}

/// Outcome of a shop purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bullets_left: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

/// Chat entry kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChatKind {
    Normal,
    System,
}

/// A chat log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEntry {
    pub id: u64,
    pub player_id: Option<PlayerId>,
    pub player_name: String,
    pub player_color: Option<Color>,
    pub message: String,
    /// Simulation clock in milliseconds.
    pub timestamp: u64,
    pub kind: ChatKind,
}

/// Full world snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub players: BTreeMap<PlayerId, PlayerView>,
    pub foods: Vec<EntityView>,
    pub viruses: Vec<EntityView>,
    pub ejected_masses: Vec<EntityView>,
    pub gun_items: Vec<EntityView>,
    pub barrier_items: Vec<EntityView>,
    pub speed_up_items: Vec<EntityView>,
    pub bullets: Vec<EntityView>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub world_size: WorldSize,
    pub chat_messages: Vec<ChatEntry>,
    pub stats: Stats,
}

/// Per-player view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub name: String,
    pub color: Color,
    pub cells: Vec<EntityView>,
    pub score: u64,
    pub has_gun: bool,
    pub gun_bullets: u32,
    pub has_barrier: bool,
    pub barrier_active: bool,
    /// Milliseconds of barrier left (0 when inactive).
    pub barrier_time_left: u64,
    pub has_speed_up: bool,
    pub speed_up_active: bool,
    pub speed_up_time_left: u64,
}

/// Any circular entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntityView {
    pub id: EntityId,
    pub x: f32,
    pub y: f32,
    pub mass: f32,
    pub radius: f32,
    pub color: Color,
}

impl EntityView {
    /// Build a view with wire rounding applied.
    pub fn rounded(id: EntityId, x: f32, y: f32, mass: f32, radius: f32, color: Color) -> Self {
        Self {
            id,
            x: round2(x),
            y: round2(y),
            mass: round1(mass),
            radius: round2(radius),
            color,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub id: PlayerId,
    pub name: String,
    pub mass: f32,
    pub score: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldSize {
    pub width: f32,
    pub height: f32,
}

/// Diagnostic counters.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Last tick duration in milliseconds.
    pub update_time: f32,
    pub collision_time: f32,
    pub position_adjustment_time: f32,
    pub players_count: usize,
    pub foods_count: usize,
    pub viruses_count: usize,
    /// Resident memory in megabytes, sampled by telemetry.
    pub memory_usage: f32,
    pub virus_risk_rewards: u64,
    pub small_players_ignored: u64,
    pub protected_cells: usize,
    pub position_adjustments: u64,
    pub chat_messages_count: usize,
    pub gun_items_count: usize,
    pub bullets_count: usize,
    pub players_with_gun: usize,
    pub barrier_items_count: usize,
    pub players_with_barrier: usize,
    pub speed_up_items_count: usize,
    pub players_with_speed_up: usize,
    pub tick_count: u64,
}
