//! World state management.
//!
//! Owns every simulated entity in a flat arena (`Vec<Entity>`) with an
//! `id -> index` map. Removal is two-phase: entities are flagged during a
//! tick and swept with `swap_remove` at its end.

use crate::config::{Config, FoodConfig};
use crate::entity::{Bullet, EjectedMass, Food, GameObject, ObjectData, Pickup, PlayerCell, Virus};
use crate::spatial::{QuadItem, QuadTree};
use glam::Vec2;
use protocol::packets::ItemKind;
use protocol::{Color, EntityId};
use rand::Rng;
use std::collections::HashMap;

/// Palette used for food pellets.
const FOOD_COLORS: [Color; 10] = [
    Color::new(0xFF, 0x6B, 0x6B),
    Color::new(0x4E, 0xCD, 0xC4),
    Color::new(0x45, 0xB7, 0xD1),
    Color::new(0x96, 0xCE, 0xB4),
    Color::new(0xFE, 0xCA, 0x57),
    Color::new(0xFF, 0x9F, 0xF3),
    Color::new(0x54, 0xA0, 0xFF),
    Color::new(0x5F, 0x27, 0xCD),
    Color::new(0x00, 0xD2, 0xD3),
    Color::new(0xFF, 0x9F, 0x43),
];

/// An entity in the world.
#[derive(Debug, Clone)]
pub enum Entity {
    Player(PlayerCell),
    Food(Food),
    Virus(Virus),
    Eject(EjectedMass),
    Item(Pickup),
    Bullet(Bullet),
}

impl Entity {
    /// Get the common object data.
    pub fn data(&self) -> &ObjectData {
        match self {
            Entity::Player(c) => c.data(),
            Entity::Food(c) => c.data(),
            Entity::Virus(c) => c.data(),
            Entity::Eject(c) => c.data(),
            Entity::Item(c) => c.data(),
            Entity::Bullet(c) => c.data(),
        }
    }

    /// Get mutable object data.
    pub fn data_mut(&mut self) -> &mut ObjectData {
        match self {
            Entity::Player(c) => c.data_mut(),
            Entity::Food(c) => c.data_mut(),
            Entity::Virus(c) => c.data_mut(),
            Entity::Eject(c) => c.data_mut(),
            Entity::Item(c) => c.data_mut(),
            Entity::Bullet(c) => c.data_mut(),
        }
    }

    #[inline]
    pub fn id(&self) -> EntityId {
        self.data().id
    }

    #[inline]
    pub fn is_removed(&self) -> bool {
        self.data().removed
    }
}

/// World border bounds. The origin is the top-left corner.
#[derive(Debug, Clone, Copy)]
pub struct WorldBorder {
    pub width: f32,
    pub height: f32,
}

impl WorldBorder {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Random position at least `margin` away from every edge.
    #[inline]
    pub fn random_position(&self, margin: f32) -> Vec2 {
        let mut rng = rand::rng();
        let mx = margin.min(self.width / 2.0);
        let my = margin.min(self.height / 2.0);
        Vec2::new(
            rng.random_range(mx..=self.width - mx),
            rng.random_range(my..=self.height - my),
        )
    }

    /// Clamp a circle's centre so the circle stays inside.
    #[inline]
    pub fn clamp_circle(&self, position: Vec2, radius: f32) -> Vec2 {
        let rx = radius.min(self.width / 2.0);
        let ry = radius.min(self.height / 2.0);
        Vec2::new(
            position.x.clamp(rx, self.width - rx),
            position.y.clamp(ry, self.height - ry),
        )
    }

    /// Whether a circle lies fully inside.
    #[inline]
    pub fn fits(&self, position: Vec2, radius: f32) -> bool {
        position.x - radius >= 0.0
            && position.x + radius <= self.width
            && position.y - radius >= 0.0
            && position.y + radius <= self.height
    }

    /// Whether a point lies inside (edges included).
    #[inline]
    pub fn contains(&self, position: Vec2) -> bool {
        (0.0..=self.width).contains(&position.x) && (0.0..=self.height).contains(&position.y)
    }

    /// Clamp a point to `[margin, size - margin]` on both axes.
    #[inline]
    pub fn clamp_point(&self, position: Vec2, margin: f32) -> Vec2 {
        self.clamp_circle(position, margin)
    }
}

/// The game world containing all entities.
#[derive(Debug)]
pub struct World {
    /// Next entity ID to assign.
    next_entity_id: u32,

    entities: Vec<Entity>,
    /// Position of each entity in `entities`.
    index: HashMap<EntityId, usize>,

    pub border: WorldBorder,

    /// Rebuilt every tick before collision resolution.
    pub quad_tree: QuadTree,
}

impl World {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            next_entity_id: 1,
            entities: Vec::with_capacity(2048),
            index: HashMap::with_capacity(2048),
            border: WorldBorder::new(width, height),
            quad_tree: QuadTree::for_world(width, height),
        }
    }

    /// Get the next entity ID.
    pub fn next_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id = self.next_entity_id.wrapping_add(1);
        if self.next_entity_id == 0 {
            self.next_entity_id = 1; // Skip 0
        }
        EntityId(id)
    }

    /// Insert an entity (its id must come from [`World::next_id`]).
    pub fn insert(&mut self, entity: Entity) -> EntityId {
        let id = entity.id();
        self.index.insert(id, self.entities.len());
        self.entities.push(entity);
        id
    }

    /// Arena slot of an entity. Stable until the next sweep.
    #[inline]
    pub fn slot_of(&self, id: EntityId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    #[inline]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.index.get(&id).map(|&i| &self.entities[i])
    }

    #[inline]
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        match self.index.get(&id) {
            Some(&i) => Some(&mut self.entities[i]),
            None => None,
        }
    }

    /// Live (not removed) player cell.
    #[inline]
    pub fn player_cell(&self, id: EntityId) -> Option<&PlayerCell> {
        match self.get(id) {
            Some(Entity::Player(cell)) if !cell.data().removed => Some(cell),
            _ => None,
        }
    }

    #[inline]
    pub fn player_cell_mut(&mut self, id: EntityId) -> Option<&mut PlayerCell> {
        match self.get_mut(id) {
            Some(Entity::Player(cell)) if !cell.data().removed => Some(cell),
            _ => None,
        }
    }

    /// Flag an entity for removal at the end of the tick.
    #[inline]
    pub fn mark_removed(&mut self, id: EntityId) {
        if let Some(entity) = self.get_mut(id) {
            entity.data_mut().removed = true;
        }
    }

    /// Drop every flagged entity. Returns how many were removed.
    pub fn sweep_removed(&mut self) -> usize {
        let mut removed = 0;
        let mut i = 0;
        while i < self.entities.len() {
            if self.entities[i].is_removed() {
                let gone = self.entities.swap_remove(i);
                self.index.remove(&gone.id());
                if let Some(moved) = self.entities.get(i) {
                    self.index.insert(moved.id(), i);
                }
                removed += 1;
            } else {
                i += 1;
            }
        }
        removed
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    #[inline]
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.iter_mut()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Ids of live entities matching `filter`.
    pub fn ids_where(&self, filter: impl Fn(&Entity) -> bool) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|e| !e.is_removed() && filter(e))
            .map(Entity::id)
            .collect()
    }

    /// Count live entities of each kind.
    pub fn counts(&self) -> EntityCounts {
        let mut counts = EntityCounts::default();
        for entity in self.entities.iter().filter(|e| !e.is_removed()) {
            match entity {
                Entity::Player(_) => counts.player_cells += 1,
                Entity::Food(_) => counts.food += 1,
                Entity::Virus(_) => counts.viruses += 1,
                Entity::Eject(_) => counts.ejected += 1,
                Entity::Item(item) => match item.item {
                    ItemKind::Gun => counts.gun_items += 1,
                    ItemKind::Barrier => counts.barrier_items += 1,
                    ItemKind::SpeedUp => counts.speed_up_items += 1,
                },
                Entity::Bullet(_) => counts.bullets += 1,
            }
            counts.total += 1;
        }
        counts
    }

    /// Rebuild the QuadTree from every live entity except bullets.
    pub fn rebuild_quad_tree(&mut self) {
        self.quad_tree.clear();
        for entity in &self.entities {
            if entity.is_removed() || matches!(entity, Entity::Bullet(_)) {
                continue;
            }
            let data = entity.data();
            self.quad_tree
                .insert(QuadItem::new(data.id, data.position.x, data.position.y, data.radius()));
        }
    }

    /// Pick a food color.
    #[inline]
    pub fn random_food_color() -> Color {
        FOOD_COLORS[rand::rng().random_range(0..FOOD_COLORS.len())]
    }

    /// Add up to `amount` pellets without exceeding the configured population.
    pub fn spawn_food(&mut self, amount: usize, config: &FoodConfig, now_ms: u64) -> usize {
        let current = self.counts().food;
        let count = amount.min(config.count.saturating_sub(current));
        for _ in 0..count {
            let position = self.border.random_position(config.spawn_margin);
            let id = self.next_id();
            let food = Food::new(id, position, config.initial_mass, Self::random_food_color(), now_ms);
            self.insert(Entity::Food(food));
        }
        count
    }

    /// Add one virus at a random position.
    pub fn spawn_virus(&mut self, config: &Config, now_ms: u64) -> EntityId {
        let position = self.border.random_position(config.virus.spawn_margin);
        let id = self.next_id();
        self.insert(Entity::Virus(Virus::new(id, position, config.virus.mass, now_ms)))
    }

    /// Add one pickup at a random position.
    pub fn spawn_item(&mut self, item: ItemKind, config: &Config, now_ms: u64) -> EntityId {
        let position = self.border.random_position(config.items.spawn_margin);
        let id = self.next_id();
        self.insert(Entity::Item(Pickup::new(id, item, position, config.items.mass, now_ms)))
    }
}

/// Entity count statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityCounts {
    pub player_cells: usize,
    pub food: usize,
    pub viruses: usize,
    pub ejected: usize,
    pub gun_items: usize,
    pub barrier_items: usize,
    pub speed_up_items: usize,
    pub bullets: usize,
    pub total: usize,
}

impl EntityCounts {
    pub fn items(&self, item: ItemKind) -> usize {
        match item {
            ItemKind::Gun => self.gun_items,
            ItemKind::Barrier => self.barrier_items,
            ItemKind::SpeedUp => self.speed_up_items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn food_at(world: &mut World, x: f32, y: f32) -> EntityId {
        let id = world.next_id();
        world.insert(Entity::Food(Food::new(id, Vec2::new(x, y), 10.0, Color::default(), 0)))
    }

    #[test]
    fn test_ids_are_unique() {
        let mut world = World::new(100.0, 100.0);
        let a = world.next_id();
        let b = world.next_id();
        assert_ne!(a, b);
        assert_ne!(a, EntityId(0));
    }

    #[test]
    fn test_sweep_keeps_index_consistent() {
        let mut world = World::new(1000.0, 1000.0);
        let ids: Vec<_> = (0..10).map(|i| food_at(&mut world, 10.0 * i as f32 + 50.0, 50.0)).collect();

        world.mark_removed(ids[0]);
        world.mark_removed(ids[4]);
        world.mark_removed(ids[9]);
        assert_eq!(world.sweep_removed(), 3);
        assert_eq!(world.len(), 7);

        for (i, id) in ids.iter().enumerate() {
            match world.get(*id) {
                Some(entity) => {
                    assert!(![0, 4, 9].contains(&i));
                    assert_eq!(entity.id(), *id);
                }
                None => assert!([0, 4, 9].contains(&i)),
            }
        }
    }

    #[test]
    fn test_removed_entities_are_not_counted_or_indexed() {
        let mut world = World::new(1000.0, 1000.0);
        let a = food_at(&mut world, 100.0, 100.0);
        food_at(&mut world, 200.0, 200.0);
        world.mark_removed(a);

        assert_eq!(world.counts().food, 1);
        world.rebuild_quad_tree();
        assert_eq!(world.quad_tree.len(), 1);
    }

    #[test]
    fn test_spawn_food_respects_population() {
        let mut world = World::new(2000.0, 2000.0);
        let config = FoodConfig { count: 5, ..FoodConfig::default() };
        assert_eq!(world.spawn_food(3, &config, 0), 3);
        assert_eq!(world.spawn_food(3, &config, 0), 2);
        assert_eq!(world.spawn_food(3, &config, 0), 0);
        assert_eq!(world.counts().food, 5);

        for entity in world.iter() {
            let p = entity.data().position;
            assert!(p.x >= config.spawn_margin && p.x <= 2000.0 - config.spawn_margin);
        }
    }

    #[test]
    fn test_items_use_their_own_margin() {
        let mut world = World::new(2000.0, 2000.0);
        let mut config = Config::default();
        config.virus.spawn_margin = 0.0;
        config.items.spawn_margin = 400.0;

        for _ in 0..50 {
            let id = world.spawn_item(ItemKind::Gun, &config, 0);
            let pos = world.get(id).unwrap().data().position;
            assert!((400.0..=1600.0).contains(&pos.x));
            assert!((400.0..=1600.0).contains(&pos.y));
        }
        assert_eq!(world.counts().gun_items, 50);
    }

    #[test]
    fn test_border_helpers() {
        let border = WorldBorder::new(2000.0, 1000.0);
        assert_eq!(border.clamp_circle(Vec2::new(-5.0, 2000.0), 10.0), Vec2::new(10.0, 990.0));
        assert!(border.fits(Vec2::new(10.0, 10.0), 10.0));
        assert!(!border.fits(Vec2::new(9.0, 10.0), 10.0));
        assert!(border.contains(Vec2::new(2000.0, 0.0)));
        assert!(!border.contains(Vec2::new(2000.1, 0.0)));
    }
}
