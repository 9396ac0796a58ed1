//! Ejected mass.

use super::object::{GameObject, ObjectData};
use crate::config::{EjectConfig, PhysicsConfig};
use crate::world::WorldBorder;
use glam::Vec2;
use protocol::{Color, EntityId};

/// Mass launched by a player cell.
#[derive(Debug, Clone)]
pub struct EjectedMass {
    data: ObjectData,
    /// Ejecting player's cell.
    pub source: EntityId,
}

impl EjectedMass {
    pub fn new(id: EntityId, source: EntityId, position: Vec2, velocity: Vec2, mass: f32, color: Color, now_ms: u64) -> Self {
        let mut data = ObjectData::new(id, position, mass, color, now_ms);
        data.velocity = velocity;
        Self { data, source }
    }

    /// Integrate, then expire once stopped or too old.
    pub fn update(&mut self, dt_secs: f32, now_ms: u64, physics: &PhysicsConfig, config: &EjectConfig, border: &WorldBorder) {
        self.data.integrate(dt_secs, physics, border);
        self.data.velocity *= config.friction;

        let v = self.data.velocity;
        let stopped = v.x.abs() < config.stop_velocity && v.y.abs() < config.stop_velocity;
        if stopped || self.data.age_ms(now_ms) > config.ttl_ms {
            self.data.removed = true;
        }
    }
}

impl GameObject for EjectedMass {
    fn data(&self) -> &ObjectData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut ObjectData {
        &mut self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slows_down_and_expires() {
        let physics = PhysicsConfig::default();
        let config = EjectConfig::default();
        let border = WorldBorder::new(2000.0, 2000.0);
        let mut blob = EjectedMass::new(
            EntityId(2),
            EntityId(1),
            Vec2::new(1000.0, 1000.0),
            Vec2::new(150.0, 0.0),
            14.0,
            Color::default(),
            0,
        );

        let mut ticks = 0;
        while !blob.data().removed && ticks < 100 {
            blob.update(0.04, ticks * 40, &physics, &config, &border);
            ticks += 1;
        }
        assert!(blob.data().removed);
        assert!(blob.data().position.x > 1000.0);
    }

    #[test]
    fn test_ttl_expiry() {
        let physics = PhysicsConfig::default();
        let config = EjectConfig::default();
        let border = WorldBorder::new(2000.0, 2000.0);
        let mut blob = EjectedMass::new(EntityId(2), EntityId(1), Vec2::new(10.0, 10.0), Vec2::ZERO, 14.0, Color::default(), 0);
        blob.data_mut().velocity = Vec2::new(0.0, 1.0e9);
        blob.update(0.0, config.ttl_ms + 1, &physics, &config, &border);
        assert!(blob.data().removed);
    }
}
