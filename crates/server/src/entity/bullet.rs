//! Bullet fired from a gun.

use super::object::{GameObject, ObjectData};
use crate::collision::radius_to_mass;
use crate::config::{BulletConfig, PhysicsConfig};
use crate::world::WorldBorder;
use glam::Vec2;
use protocol::{Color, EntityId, PlayerId};

pub const BULLET_COLOR: Color = Color::new(20, 20, 20);

#[derive(Debug, Clone)]
pub struct Bullet {
    data: ObjectData,
    /// Bullets never hit their shooter.
    pub shooter: PlayerId,
}

impl Bullet {
    /// Create a bullet. Its mass is derived from the configured radius.
    pub fn new(id: EntityId, shooter: PlayerId, position: Vec2, direction: Vec2, config: &BulletConfig, now_ms: u64) -> Self {
        let mut data = ObjectData::new(
            id,
            position,
            radius_to_mass(config.radius),
            BULLET_COLOR,
            now_ms,
        );
        data.velocity = direction.normalize_or_zero() * config.speed;
        Self { data, shooter }
    }

    pub fn update(&mut self, dt_secs: f32, now_ms: u64, physics: &PhysicsConfig, config: &BulletConfig, border: &WorldBorder) {
        self.data.integrate(dt_secs, physics, border);
        self.data.velocity *= config.friction;

        let v = self.data.velocity;
        let stopped = v.x.abs() < config.stop_velocity && v.y.abs() < config.stop_velocity;
        if stopped || self.data.age_ms(now_ms) > config.ttl_ms {
            self.data.removed = true;
        }
    }
}

impl GameObject for Bullet {
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
    fn test_radius_matches_config() {
        let config = BulletConfig::default();
        let bullet = Bullet::new(EntityId(1), PlayerId(1), Vec2::ZERO, Vec2::new(3.0, 4.0), &config, 0);
        assert!((bullet.data().radius() - config.radius).abs() < 1e-4);
        assert!((bullet.data().velocity.length() - config.speed).abs() < 1e-2);
    }

    #[test]
    fn test_bullet_stops() {
        let physics = PhysicsConfig::default();
        let config = BulletConfig::default();
        let border = WorldBorder::new(100_000.0, 100_000.0);
        let mut bullet = Bullet::new(EntityId(1), PlayerId(1), Vec2::new(500.0, 500.0), Vec2::X, &config, 0);
        for tick in 0..200u64 {
            bullet.update(0.04, tick * 40, &physics, &config, &border);
            if bullet.data().removed {
                break;
            }
        }
        assert!(bullet.data().removed);
    }
}
