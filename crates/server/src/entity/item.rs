//! Pickups: gun, barrier and speed-up items.

use super::object::{GameObject, ObjectData};
use glam::Vec2;
use protocol::packets::ItemKind;
use protocol::{Color, EntityId};

/// A stationary power-up waiting to be collected.
#[derive(Debug, Clone)]
pub struct Pickup {
    data: ObjectData,
    pub item: ItemKind,
}

impl Pickup {
    pub fn new(id: EntityId, item: ItemKind, position: Vec2, mass: f32, now_ms: u64) -> Self {
        let color = match item {
            ItemKind::Gun => Color::new(255, 215, 0),
            ItemKind::Barrier => Color::new(0, 191, 255),
            ItemKind::SpeedUp => Color::new(255, 105, 180),
        };
        Self {
            data: ObjectData::new(id, position, mass, color, now_ms),
            item,
        }
    }
}

impl GameObject for Pickup {
    fn data(&self) -> &ObjectData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut ObjectData {
        &mut self.data
    }
}
