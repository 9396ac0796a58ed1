//! Virus.

use super::object::{GameObject, ObjectData};
use crate::config::VirusConfig;
use glam::Vec2;
use protocol::{Color, EntityId};
use rand::Rng;

/// Default virus color (green).
pub const VIRUS_COLOR: Color = Color::new(51, 255, 51);

/// A stationary hazard that grows from ejected mass and fragments big cells.
#[derive(Debug, Clone)]
pub struct Virus {
    data: ObjectData,
    /// Ejected blobs absorbed since the last split.
    pub hit_count: u32,
    /// Last risk/reward interaction, for the per-virus cooldown.
    pub last_hit_ms: Option<u64>,
}

impl Virus {
    pub fn new(id: EntityId, position: Vec2, mass: f32, now_ms: u64) -> Self {
        Self {
            data: ObjectData::new(id, position, mass, VIRUS_COLOR, now_ms),
            hit_count: 0,
            last_hit_ms: None,
        }
    }

    /// Absorb ejected mass. Returns true when the virus must split.
    pub fn absorb(&mut self, mass: f32, config: &VirusConfig) -> bool {
        self.data.add_mass(mass);
        self.hit_count += 1;
        self.data.mass() >= config.split_mass || self.hit_count >= config.max_hits
    }

    /// Back to the base mass after spawning children, drifting a little.
    pub fn reset_after_split(&mut self, config: &VirusConfig) {
        let mut rng = rand::rng();
        self.data.set_mass(config.mass);
        self.hit_count = 0;
        self.data.velocity = Vec2::new(rng.random_range(-100.0..100.0), rng.random_range(-100.0..100.0));
    }

    /// Whether the per-virus cooldown allows another risk/reward trigger.
    #[inline]
    pub fn ready(&self, now_ms: u64, config: &VirusConfig) -> bool {
        self.last_hit_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= config.hit_cooldown_ms)
    }
}

impl GameObject for Virus {
    fn data(&self) -> &ObjectData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut ObjectData {
        &mut self.data
    }
}
