//! Player state.
//!
//! A player is one joined connection. It owns its cells by id; the cells live
//! in the world arena and point back through [`PlayerCell::owner`](crate::entity::PlayerCell).

use crate::config::ItemsConfig;
use glam::Vec2;
use protocol::packets::ItemKind;
use protocol::{Color, EntityId, PlayerId};

/// Gun power-up.
#[derive(Debug, Clone, Copy, Default)]
pub struct GunState {
    pub has: bool,
    pub bullets: u32,
    pub acquired_at_ms: u64,
    pub last_shot_ms: Option<u64>,
}

/// Barrier and speed-up share the possess-then-activate lifecycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimedPowerUp {
    pub has: bool,
    pub active: bool,
    pub activated_at_ms: u64,
}

impl TimedPowerUp {
    /// Milliseconds left while active, 0 otherwise.
    #[inline]
    pub fn time_left(&self, now_ms: u64, duration_ms: u64) -> u64 {
        if self.active {
            (self.activated_at_ms + duration_ms).saturating_sub(now_ms)
        } else {
            0
        }
    }

    /// Start the effect. Fails unless possessed and idle.
    pub fn activate(&mut self, now_ms: u64) -> bool {
        if !self.has || self.active {
            return false;
        }
        self.active = true;
        self.activated_at_ms = now_ms;
        true
    }

    /// Clear the power-up once its duration has elapsed. Returns true on expiry.
    pub fn expire(&mut self, now_ms: u64, duration_ms: u64) -> bool {
        if self.active && now_ms >= self.activated_at_ms + duration_ms {
            *self = Self::default();
            true
        } else {
            false
        }
    }
}

/// Eject request staged until the next tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EjectRequest {
    /// Mouse position, if the client sent one.
    pub aim: Option<Vec2>,
}

/// Actions requested by commands, consumed by the next tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct Intents {
    /// Split toward this point.
    pub split: Option<Vec2>,
    pub eject: Option<EjectRequest>,
    /// Shoot toward this point.
    pub shoot: Option<Vec2>,
}

/// A joined player.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub color: Color,
    /// Owned cells. Index 0 is the main cell.
    pub cells: Vec<EntityId>,
    pub score: u64,

    pub gun: GunState,
    pub barrier: TimedPowerUp,
    pub speed_up: TimedPowerUp,

    pub intents: Intents,
    pub last_eject_ms: Option<u64>,
    /// Virus risk/reward interactions survived.
    pub virus_risk_rewards: u32,
}

impl Player {
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            color: color_for(id),
            cells: Vec::new(),
            score: 0,
            gun: GunState::default(),
            barrier: TimedPowerUp::default(),
            speed_up: TimedPowerUp::default(),
            intents: Intents::default(),
            last_eject_ms: None,
            virus_risk_rewards: 0,
        }
    }

    #[inline]
    pub fn main_cell(&self) -> Option<EntityId> {
        self.cells.first().copied()
    }

    /// Forget a cell. Returns false if the player did not own it.
    pub fn remove_cell(&mut self, id: EntityId) -> bool {
        match self.cells.iter().position(|c| *c == id) {
            Some(index) => {
                self.cells.remove(index);
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn barrier_active(&self) -> bool {
        self.barrier.active
    }

    /// Movement multiplier from an active speed-up.
    #[inline]
    pub fn speed_multiplier(&self, items: &ItemsConfig) -> f32 {
        if self.speed_up.active { items.speed_up_multiplier } else { 1.0 }
    }

    /// Pickups are mutually exclusive: holding any other power-up blocks a
    /// pickup. Guns stack with guns.
    pub fn can_pick_up(&self, item: ItemKind) -> bool {
        let barrier = self.barrier.has || self.barrier.active;
        let speed_up = self.speed_up.has || self.speed_up.active;
        match item {
            ItemKind::Gun => !barrier && !speed_up,
            ItemKind::Barrier => !self.gun.has && !barrier && !speed_up,
            ItemKind::SpeedUp => !self.gun.has && !barrier && !speed_up,
        }
    }

    /// Add a gun item's bullets. Returns the new bullet count.
    pub fn grant_gun(&mut self, bullets: u32, max_bullets: u32, now_ms: u64) -> u32 {
        let current = if self.gun.has { self.gun.bullets } else { 0 };
        self.gun = GunState {
            has: true,
            bullets: (current + bullets).min(max_bullets),
            acquired_at_ms: now_ms,
            last_shot_ms: None,
        };
        self.gun.bullets
    }

    /// Drop the gun.
    #[inline]
    pub fn expire_gun(&mut self) {
        self.gun = GunState::default();
    }
}

/// Trim a requested display name and fall back to `Player_<id>`.
pub fn sanitize_name(raw: &str, id: PlayerId, max_chars: usize) -> String {
    let name: String = raw.trim().chars().take(max_chars).collect();
    let name = name.trim_end();
    if name.is_empty() {
        format!("Player_{}", id)
    } else {
        name.to_string()
    }
}

/// Deterministic color derived from the player id.
pub fn color_for(id: PlayerId) -> Color {
    let hash = id
        .to_string()
        .chars()
        .fold(0i32, |h, c| (h << 5).wrapping_sub(h).wrapping_add(c as i32));
    let h = hash.unsigned_abs();
    Color::from_hsl((h % 360) as f32, (65 + h % 20) as f32, (50 + h % 15) as f32)
}
