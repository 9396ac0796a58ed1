//! Food pellet.

use super::object::{GameObject, ObjectData};
use crate::config::FoodConfig;
use glam::Vec2;
use protocol::{Color, EntityId};

/// A pellet that grows slowly and can be eaten by players.
#[derive(Debug, Clone)]
pub struct Food {
    data: ObjectData,
}

impl Food {
    pub fn new(id: EntityId, position: Vec2, mass: f32, color: Color, now_ms: u64) -> Self {
        Self {
            data: ObjectData::new(id, position, mass, color, now_ms),
        }
    }

    /// Grow linearly from the initial to the max mass over the growth window.
    pub fn update(&mut self, now_ms: u64, config: &FoodConfig) {
        let window = config.growth_time_ms.max(1) as f32;
        let progress = (self.data.age_ms(now_ms) as f32 / window).min(1.0);
        let mass = config.initial_mass + (config.max_mass - config.initial_mass) * progress;
        if mass > self.data.mass() {
            self.data.set_mass(mass);
        }
    }

    /// Mass granted to the eater.
    #[inline]
    pub fn nutritional_value(&self) -> f32 {
        self.data.mass().floor()
    }
}

impl GameObject for Food {
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
    fn test_growth_is_capped() {
        let config = FoodConfig::default();
        let mut food = Food::new(EntityId(1), Vec2::ZERO, config.initial_mass, Color::default(), 0);

        food.update(config.growth_time_ms / 2, &config);
        assert!((food.data().mass() - 12.5).abs() < 1e-4);
        assert_eq!(food.nutritional_value(), 12.0);

        food.update(config.growth_time_ms * 3, &config);
        assert_eq!(food.data().mass(), config.max_mass);
    }
}
