//! Base object type and common functionality.

use crate::collision::mass_to_radius;
use crate::config::PhysicsConfig;
use crate::spatial::Bounds;
use crate::world::WorldBorder;
use glam::Vec2;
use protocol::{Color, EntityId};

/// Common data shared by every simulated object.
///
/// `mass` and `radius` are private: the radius is recomputed on every mass
/// change and can never be set on its own.
#[derive(Debug, Clone)]
pub struct ObjectData {
    /// Unique entity ID.
    pub id: EntityId,
    /// Position in world coordinates.
    pub position: Vec2,
    /// Velocity in units per second.
    pub velocity: Vec2,
    /// Pending one-shot position adjustment (overlap separation).
    pub adjustment: Vec2,
    mass: f32,
    radius: f32,
    pub color: Color,
    /// Simulation time of creation, in milliseconds.
    pub born_at_ms: u64,
    /// Set during a tick, swept at the end of it.
    pub removed: bool,
}

impl ObjectData {
    pub fn new(id: EntityId, position: Vec2, mass: f32, color: Color, now_ms: u64) -> Self {
        Self {
            id,
            position,
            velocity: Vec2::ZERO,
            adjustment: Vec2::ZERO,
            mass,
            radius: mass_to_radius(mass),
            color,
            born_at_ms: now_ms,
            removed: false,
        }
    }

    #[inline]
    pub fn mass(&self) -> f32 {
        self.mass
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Set the mass and update the radius.
    #[inline]
    pub fn set_mass(&mut self, mass: f32) {
        self.mass = mass.max(0.0);
        self.radius = mass_to_radius(self.mass);
    }

    #[inline]
    pub fn add_mass(&mut self, amount: f32) {
        self.set_mass(self.mass + amount);
    }

    /// Age in milliseconds.
    #[inline]
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.born_at_ms)
    }

    #[inline]
    pub fn bounds(&self) -> Bounds {
        Bounds::from_circle(self.position.x, self.position.y, self.radius)
    }

    /// Clamp the position so the whole circle stays inside the border.
    #[inline]
    pub fn clamp_to(&mut self, border: &WorldBorder) {
        self.position = border.clamp_circle(self.position, self.radius);
    }

    /// One integration step: adjustment, velocity, friction, border clamp.
    pub fn integrate(&mut self, dt_secs: f32, physics: &PhysicsConfig, border: &WorldBorder) {
        self.position += self.adjustment;
        self.adjustment *= physics.adjustment_decay;

        self.position += self.velocity * dt_secs;
        self.velocity *= physics.friction;

        self.clamp_to(border);
    }
}

/// Trait for all object types.
pub trait GameObject: Send + Sync {
    /// Get the common object data.
    fn data(&self) -> &ObjectData;

    /// Get mutable object data.
    fn data_mut(&mut self) -> &mut ObjectData;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radius_follows_mass() {
        let mut data = ObjectData::new(EntityId(1), Vec2::ZERO, 10.0, Color::default(), 0);
        assert_eq!(data.radius(), mass_to_radius(10.0));
        data.set_mass(250.0);
        assert_eq!(data.radius(), mass_to_radius(250.0));
        data.add_mass(-50.0);
        assert_eq!(data.mass(), 200.0);
        assert_eq!(data.radius(), mass_to_radius(200.0));
    }

    #[test]
    fn test_integrate_applies_friction_and_clamp() {
        let physics = PhysicsConfig::default();
        let border = WorldBorder::new(100.0, 100.0);
        let mut data = ObjectData::new(EntityId(1), Vec2::new(50.0, 50.0), 10.0, Color::default(), 0);
        data.velocity = Vec2::new(100.0, 0.0);
        data.integrate(0.1, &physics, &border);
        assert!((data.position.x - 60.0).abs() < 1e-4);
        assert!((data.velocity.x - 92.0).abs() < 1e-4);

        data.velocity = Vec2::new(10_000.0, 0.0);
        data.integrate(1.0, &physics, &border);
        assert_eq!(data.position.x, 100.0 - data.radius());
    }

    #[test]
    fn test_adjustment_decays() {
        let physics = PhysicsConfig::default();
        let border = WorldBorder::new(100.0, 100.0);
        let mut data = ObjectData::new(EntityId(1), Vec2::new(50.0, 50.0), 20.0, Color::default(), 0);
        data.adjustment = Vec2::new(2.0, 0.0);
        data.integrate(0.0, &physics, &border);
        assert!((data.position.x - 52.0).abs() < 1e-4);
        assert!((data.adjustment.x - 1.7).abs() < 1e-4);
    }
}
