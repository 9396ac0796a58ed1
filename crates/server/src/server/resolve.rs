//! Interaction passes run each tick after integration.
//!
//! Entities consumed during a pass are flagged in `consumed`, indexed by arena
//! slot, and marked removed in the world. A pair is never processed twice and
//! nothing is deleted until the end-of-tick sweep.

use super::game::GameState;
use crate::collision::{can_eat, check_collision, is_overlapping, mass_to_radius, separation_impulse};
use crate::entity::{GameObject, PlayerCell, SplitAnimation, Virus};
use crate::shop;
use crate::spatial::Bounds;
use crate::world::Entity;
use glam::Vec2;
use protocol::packets::{round1, DeathReason, ItemKind, ServerEvent};
use protocol::{EntityId, PlayerId};
use rand::Rng;
use std::f32::consts::{FRAC_PI_4, PI};
use tracing::{debug, info};

/// Placement attempts per risk/reward piece.
const RISK_PLACEMENT_ATTEMPTS: usize = 16;
/// Recoil applied to the retained cell after a risk/reward split.
const RISK_RECOIL: f32 = 150.0;

/// Copy of a player cell's state taken before mutating the world.
#[derive(Debug, Clone, Copy)]
struct CellInfo {
    id: EntityId,
    owner: PlayerId,
    position: Vec2,
    mass: f32,
    radius: f32,
    merge_eligible: bool,
    protected: bool,
}

impl CellInfo {
    fn of(cell: &PlayerCell) -> Self {
        let data = cell.data();
        Self {
            id: data.id,
            owner: cell.owner,
            position: data.position,
            mass: data.mass(),
            radius: data.radius(),
            merge_eligible: cell.merge_eligible,
            protected: cell.is_protected(),
        }
    }
}

/// What a player cell touched.
enum Contact {
    Pellet { position: Vec2, mass: f32, radius: f32, value: f32 },
    Enemy(CellInfo),
    Virus,
    Item(ItemKind),
}

impl GameState {
    #[inline]
    fn is_consumed(&self, id: EntityId) -> bool {
        self.world.slot_of(id).is_some_and(|slot| self.consumed.contains(slot))
    }

    fn consume(&mut self, id: EntityId) {
        if let Some(slot) = self.world.slot_of(id) {
            // Entities spawned during the pass sit past the initial length.
            if slot >= self.consumed.len() {
                self.consumed.grow(slot + 1);
            }
            self.consumed.insert(slot);
        }
        self.world.mark_removed(id);
    }

    /// Required mass ratio for the given player's cells to eat.
    fn eat_ratio(&self, owner: PlayerId) -> f32 {
        let split = self.players.get(&owner).is_some_and(|p| p.cells.len() > 1);
        if split { self.config.player.eat_ratio_split } else { self.config.player.eat_ratio }
    }

    fn live_cell(&self, id: EntityId) -> Option<CellInfo> {
        if self.is_consumed(id) {
            return None;
        }
        self.world.player_cell(id).map(CellInfo::of)
    }

    /// Merge each player's eligible cells that sit close enough together.
    pub(super) fn merge_cells(&mut self) {
        let factor = self.config.player.merge_distance_factor;
        let ids: Vec<PlayerId> = self.players.keys().copied().collect();

        for id in ids {
            let Some(player) = self.players.get(&id) else {
                continue;
            };
            let mut cells: Vec<CellInfo> = player
                .cells
                .iter()
                .filter_map(|c| self.world.player_cell(*c))
                .map(CellInfo::of)
                .filter(|c| c.merge_eligible && !c.protected)
                .collect();
            if cells.len() < 2 {
                continue;
            }

            let mut absorbed = Vec::new();
            let mut i = 0;
            while i < cells.len() {
                let mut j = i + 1;
                let mut lost_i = false;
                while j < cells.len() {
                    let (a, b) = (cells[i], cells[j]);
                    if a.position.distance(b.position) >= (a.radius + b.radius) * factor {
                        j += 1;
                        continue;
                    }

                    let (keep, gone) = if a.mass >= b.mass { (i, j) } else { (j, i) };
                    let total = cells[keep].mass + cells[gone].mass;
                    if let Some(cell) = self.world.player_cell_mut(cells[keep].id) {
                        cell.data_mut().set_mass(total);
                    }
                    self.world.mark_removed(cells[gone].id);
                    absorbed.push(cells[gone].id);

                    cells[keep].mass = total;
                    cells[keep].radius = mass_to_radius(total);
                    cells.remove(gone);
                    if gone == i {
                        lost_i = true;
                        break;
                    }
                }
                if !lost_i {
                    i += 1;
                }
            }

            if let Some(player) = self.players.get_mut(&id) {
                if !absorbed.is_empty() {
                    debug!("{} merged {} cells", player.name, absorbed.len());
                }
                player.cells.retain(|c| !absorbed.contains(c));
            }
        }
    }

    /// Push overlapping player cells apart. Protected cells are left alone.
    pub(super) fn separate_cells(&mut self) {
        let cells: Vec<CellInfo> = self
            .world
            .iter()
            .filter_map(|e| match e {
                Entity::Player(cell) if !cell.data().removed => Some(CellInfo::of(cell)),
                _ => None,
            })
            .collect();
        let max_radius = cells.iter().map(|c| c.radius).fold(0.0, f32::max);
        let physics = &self.config.physics;

        let mut candidates = std::mem::take(&mut self.candidates);
        let mut pushes = Vec::new();
        let mut adjustments = 0u64;

        for cell in cells.iter().filter(|c| !c.protected) {
            candidates.clear();
            let reach = cell.radius * 1.1 + 8.0 + max_radius * 0.1;
            let region = Bounds::from_circle(cell.position.x, cell.position.y, reach);
            self.world.quad_tree.query(&region, &mut candidates);

            let mut push = Vec2::ZERO;
            for &other_id in &candidates {
                if other_id == cell.id {
                    continue;
                }
                let Some(other) = self.world.player_cell(other_id).map(CellInfo::of) else {
                    continue;
                };
                let distance = cell.position.distance(other.position);
                if other.owner == cell.owner
                    && cell.merge_eligible
                    && other.merge_eligible
                    && distance < (cell.radius + other.radius) * 0.9
                {
                    continue;
                }
                if is_overlapping(cell.position, cell.radius, other.position, other.radius, physics) {
                    push += separation_impulse(
                        cell.position,
                        cell.radius,
                        cell.mass,
                        other.position,
                        other.radius,
                        other.mass,
                        physics,
                    );
                    adjustments += 1;
                }
            }
            if push != Vec2::ZERO {
                pushes.push((cell.id, push));
            }
        }
        self.candidates = candidates;

        for (id, push) in pushes {
            if let Some(cell) = self.world.player_cell_mut(id) {
                cell.data_mut().adjustment += push;
            }
        }
        self.stats.position_adjustments += adjustments;
    }

    /// Eating, virus contact and pickups for every live player cell.
    pub(super) fn resolve_collisions(&mut self) {
        self.consumed.clear();
        self.consumed.grow(self.world.len());
        let cell_ids = self.world.ids_where(|e| matches!(e, Entity::Player(_)));
        let mut candidates = std::mem::take(&mut self.candidates);

        for cell_id in cell_ids {
            let Some(cell) = self.live_cell(cell_id) else {
                continue;
            };
            candidates.clear();
            let region = Bounds::from_circle(cell.position.x, cell.position.y, cell.radius);
            self.world.quad_tree.query(&region, &mut candidates);

            for &other_id in &candidates {
                if other_id == cell_id || self.is_consumed(other_id) {
                    continue;
                }
                // The cell may have grown, shrunk or been eaten earlier in this loop.
                let Some(cell) = self.live_cell(cell_id) else {
                    break;
                };

                let contact = match self.world.get(other_id) {
                    Some(entity) if entity.is_removed() => continue,
                    Some(Entity::Food(food)) => {
                        let data = food.data();
                        Contact::Pellet {
                            position: data.position,
                            mass: data.mass(),
                            radius: data.radius(),
                            value: food.nutritional_value(),
                        }
                    }
                    Some(Entity::Eject(eject)) => {
                        let data = eject.data();
                        Contact::Pellet {
                            position: data.position,
                            mass: data.mass(),
                            radius: data.radius(),
                            value: data.mass(),
                        }
                    }
                    Some(Entity::Player(other)) if other.owner != cell.owner => Contact::Enemy(CellInfo::of(other)),
                    Some(Entity::Virus(_)) => Contact::Virus,
                    Some(Entity::Item(item)) => Contact::Item(item.item),
                    _ => continue,
                };

                match contact {
                    Contact::Pellet { position, mass, radius, value } => {
                        self.eat_pellet(cell, other_id, position, mass, radius, value)
                    }
                    Contact::Enemy(other) => self.resolve_enemy(cell, other),
                    Contact::Virus => self.touch_virus(cell, other_id),
                    Contact::Item(kind) => self.pick_up(cell, other_id, kind),
                }
            }
        }

        self.candidates = candidates;
    }

    fn eat_pellet(&mut self, cell: CellInfo, pellet: EntityId, position: Vec2, mass: f32, radius: f32, value: f32) {
        let ratio = self.eat_ratio(cell.owner);
        if !can_eat(cell.position, cell.mass, cell.radius, position, mass, radius, ratio) {
            return;
        }
        self.consume(pellet);
        if let Some(eater) = self.world.player_cell_mut(cell.id) {
            eater.data_mut().add_mass(value);
        }
        if let Some(player) = self.players.get_mut(&cell.owner) {
            player.score += value.floor() as u64;
        }
    }

    fn resolve_enemy(&mut self, a: CellInfo, b: CellInfo) {
        let barrier = |id: PlayerId| self.players.get(&id).is_some_and(|p| p.barrier_active());
        if barrier(a.owner) || barrier(b.owner) {
            return;
        }

        let a_eats = !b.protected
            && can_eat(a.position, a.mass, a.radius, b.position, b.mass, b.radius, self.eat_ratio(a.owner));
        let b_eats = !a.protected
            && can_eat(b.position, b.mass, b.radius, a.position, a.mass, a.radius, self.eat_ratio(b.owner));

        if a_eats {
            self.eat_enemy(a, b);
        } else if b_eats {
            self.eat_enemy(b, a);
        }
    }

    fn eat_enemy(&mut self, predator: CellInfo, prey: CellInfo) {
        self.consume(prey.id);
        let gain = prey.mass.floor() as u64;
        if let Some(cell) = self.world.player_cell_mut(predator.id) {
            cell.data_mut().add_mass(prey.mass);
        }
        let predator_name = match self.players.get_mut(&predator.owner) {
            Some(player) => {
                player.score += gain;
                player.name.clone()
            }
            None => return,
        };

        let Some(victim) = self.players.get_mut(&prey.owner) else {
            return;
        };
        victim.score = victim.score.saturating_sub(gain);
        victim.remove_cell(prey.id);
        let remaining_cells = victim.cells.len();
        let victim_name = victim.name.clone();

        debug!(
            "{} ate a {:.0} mass cell of {} ({} left)",
            predator_name, prey.mass, victim_name, remaining_cells
        );
        self.outbox.to_all(ServerEvent::PlayerEaten {
            predator_id: predator.owner,
            prey_id: prey.owner,
            cell_id: prey.id,
            remaining_cells,
        });

        if remaining_cells == 0 {
            let announcement = format!("{} was eaten by {}", victim_name, predator_name);
            self.eliminate_player(prey.owner, predator_name, prey.mass, DeathReason::Eaten, announcement);
        }
    }

    /// Remove a player and everything they own, and tell everyone.
    pub(super) fn eliminate_player(
        &mut self,
        id: PlayerId,
        killed_by: String,
        final_mass: f32,
        reason: DeathReason,
        announcement: String,
    ) {
        let Some(player) = self.players.remove(&id) else {
            return;
        };
        for cell in &player.cells {
            self.consume(*cell);
        }
        info!("{} eliminated by {} ({:?}, score {})", player.name, killed_by, reason, player.score);

        self.outbox.to_player(
            id,
            ServerEvent::PlayerDeath {
                killed_by,
                final_mass: round1(final_mass),
                final_score: player.score,
                death_reason: reason,
            },
        );
        let entry = self.chat.push_system(announcement, self.now_ms);
        self.outbox.to_all(ServerEvent::ChatMessage(entry));
        self.outbox.to_all(ServerEvent::PlayerLeft { player_id: id });
    }

    fn touch_virus(&mut self, cell: CellInfo, virus_id: EntityId) {
        let Some(Entity::Virus(virus)) = self.world.get(virus_id) else {
            return;
        };
        let data = virus.data();
        if !check_collision(cell.position, cell.radius, data.position, data.radius()).is_colliding() {
            return;
        }
        if cell.mass < self.config.virus.min_interaction_mass {
            self.stats.small_players_ignored += 1;
            return;
        }
        if virus.ready(self.now_ms, &self.config.virus) {
            self.virus_risk_reward(cell, virus_id);
        }
    }

    /// Break a big cell into equal pieces plus a bonus, destroying the virus.
    fn virus_risk_reward(&mut self, cell: CellInfo, virus_id: EntityId) {
        let now_ms = self.now_ms;
        let Some(owned) = self.players.get(&cell.owner).map(|p| p.cells.len()) else {
            return;
        };
        let Some((color, target)) = self.world.player_cell(cell.id).map(|c| (c.data().color, c.target)) else {
            return;
        };

        let virus = &self.config.virus;
        let player = &self.config.player;
        let bonus = virus.bonus_mass;
        let pieces = virus.risk_split_count.min(player.max_cells.saturating_sub(owned));
        let piece_mass = (cell.mass + bonus) / (pieces + 1) as f32;
        let (merge_ms, protection_ms) = (player.merge_time_ms, player.split_protection_ms);

        let placements = self.risk_placements(cell.position, piece_mass, pieces);
        let mut rng = rand::rng();

        if let Some(retained) = self.world.player_cell_mut(cell.id) {
            retained.data_mut().set_mass(piece_mass);
            retained.data_mut().velocity += Vec2::from_angle(rng.random_range(0.0..(2.0 * PI))) * RISK_RECOIL;
            retained.protect(protection_ms);
            retained.start_merge_cooldown(merge_ms);
        }

        let mut new_cells = Vec::with_capacity(pieces);
        for (angle, position) in placements {
            let id = self.world.next_id();
            let mut piece = PlayerCell::new(id, cell.owner, position, piece_mass, color, now_ms);
            piece.target = target;
            piece.start_merge_cooldown(merge_ms);
            piece.protect(protection_ms);
            piece.last_split_ms = Some(now_ms);
            piece.animation = Some(SplitAnimation { from: cell.position, phase: 1.0 });
            piece.data_mut().velocity = Vec2::from_angle(angle) * rng.random_range(400.0..600.0);
            self.world.insert(Entity::Player(piece));
            new_cells.push(id);
        }

        if let Some(Entity::Virus(virus)) = self.world.get_mut(virus_id) {
            virus.last_hit_ms = Some(now_ms);
        }
        self.consume(virus_id);
        self.stats.virus_risk_rewards += 1;

        let Some(player) = self.players.get_mut(&cell.owner) else {
            return;
        };
        player.cells.extend(new_cells);
        player.score += bonus as u64;
        player.virus_risk_rewards += 1;

        info!(
            "{} hit a virus: {:.0} mass split into {} pieces of {:.1} (+{:.0})",
            player.name,
            cell.mass,
            pieces + 1,
            piece_mass,
            bonus
        );
        self.outbox.to_all(ServerEvent::VirusRiskReward {
            player_id: player.id,
            bonus_mass: bonus,
            split_count: pieces,
            new_mass: round1(piece_mass),
            total_cells: player.cells.len(),
            total_risk_rewards: player.virus_risk_rewards,
            virus_destroyed: true,
        });
    }

    /// Pick `count` launch angles and positions around `center`, each as far
    /// from the previously placed pieces as a bounded random search finds.
    fn risk_placements(&self, center: Vec2, piece_mass: f32, count: usize) -> Vec<(f32, Vec2)> {
        let border = self.world.border;
        let radius = mass_to_radius(piece_mass);
        let min_distance = (radius + radius) * 1.5 + 24.0;
        let mut rng = rand::rng();
        let mut placed: Vec<(f32, Vec2)> = Vec::with_capacity(count);

        for i in 0..count {
            let base_angle = 2.0 * PI * i as f32 / count as f32;
            let mut best: Option<(f32, f32, Vec2)> = None;

            for _ in 0..RISK_PLACEMENT_ATTEMPTS {
                let angle = base_angle + rng.random_range(-FRAC_PI_4..FRAC_PI_4);
                let distance = min_distance + rng.random_range(20.0..60.0);
                let candidate = center + Vec2::from_angle(angle) * distance;
                if !border.fits(candidate, radius) {
                    continue;
                }

                let spread = placed
                    .iter()
                    .map(|(_, p)| p.distance(candidate))
                    .fold(f32::INFINITY, f32::min);
                if best.is_none_or(|(score, ..)| spread > score) {
                    best = Some((spread, angle, candidate));
                }
                if spread > radius * 3.0 {
                    break;
                }
            }

            placed.push(match best {
                Some((_, angle, position)) => (angle, position),
                None => {
                    let fallback = center + Vec2::from_angle(base_angle) * min_distance;
                    (base_angle, border.clamp_circle(fallback, radius))
                }
            });
        }
        placed
    }

    fn pick_up(&mut self, cell: CellInfo, item_id: EntityId, kind: ItemKind) {
        let Some(Entity::Item(item)) = self.world.get(item_id) else {
            return;
        };
        let data = item.data();
        let ratio = self.eat_ratio(cell.owner);
        if !can_eat(cell.position, cell.mass, cell.radius, data.position, data.mass(), data.radius(), ratio) {
            return;
        }

        let now_ms = self.now_ms;
        let items = &self.config.items;
        let Some(player) = self.players.get_mut(&cell.owner) else {
            return;
        };
        if !player.can_pick_up(kind) {
            return;
        }
        let event = match kind {
            ItemKind::Gun => ServerEvent::GunAcquired {
                bullets: player.grant_gun(items.gun_bullets_per_item, items.gun_max_bullets, now_ms),
            },
            ItemKind::Barrier => {
                player.barrier.has = true;
                ServerEvent::BarrierAcquired
            }
            ItemKind::SpeedUp => {
                player.speed_up.has = true;
                ServerEvent::SpeedUpAcquired
            }
        };
        info!("{} picked up a {}", player.name, shop::item_name(kind));

        self.consume(item_id);
        self.outbox.to_player(cell.owner, event);
        self.outbox.to_all(ServerEvent::ItemCollected {
            kind,
            player_id: cell.owner,
            item_id,
        });
    }

    /// Viruses absorb ejected mass they touch and split when full.
    pub(super) fn feed_viruses(&mut self) {
        let viruses = self.world.ids_where(|e| matches!(e, Entity::Virus(_)));
        let mut candidates = std::mem::take(&mut self.candidates);

        for virus_id in viruses {
            let (position, radius) = match self.world.get(virus_id) {
                Some(virus) if !virus.is_removed() => (virus.data().position, virus.data().radius()),
                _ => continue,
            };
            candidates.clear();
            self.world
                .quad_tree
                .query(&Bounds::from_circle(position.x, position.y, radius), &mut candidates);

            let mut split = false;
            for &other_id in &candidates {
                let mass = match self.world.get(other_id) {
                    Some(Entity::Eject(eject))
                        if !eject.data().removed
                            && check_collision(position, radius, eject.data().position, eject.data().radius())
                                .is_colliding() =>
                    {
                        eject.data().mass()
                    }
                    _ => continue,
                };
                self.consume(other_id);
                if let Some(Entity::Virus(virus)) = self.world.get_mut(virus_id) {
                    split |= virus.absorb(mass, &self.config.virus);
                }
            }

            if split {
                self.split_virus(virus_id);
            }
        }

        self.candidates = candidates;
    }

    fn split_virus(&mut self, virus_id: EntityId) {
        let Some(Entity::Virus(virus)) = self.world.get(virus_id) else {
            return;
        };
        let origin = virus.data().position;
        let radius = virus.data().radius();
        let now_ms = self.now_ms;
        let border = self.world.border;
        let config = &self.config.virus;
        let (children, child_mass, child_speed) = (config.split_into, config.mass, config.child_speed);
        let child_radius = mass_to_radius(child_mass);
        let mut rng = rand::rng();

        for i in 0..children {
            let angle = 2.0 * PI * i as f32 / children as f32 + rng.random::<f32>() * 0.5;
            let direction = Vec2::from_angle(angle);
            let position = border.clamp_circle(origin + direction * radius * 3.0, child_radius);

            let id = self.world.next_id();
            let mut child = Virus::new(id, position, child_mass, now_ms);
            child.data_mut().velocity = direction * child_speed;
            self.world.insert(Entity::Virus(child));
        }

        if let Some(Entity::Virus(virus)) = self.world.get_mut(virus_id) {
            virus.reset_after_split(&self.config.virus);
        }
        info!("Virus {} split into {} children", virus_id, children);
    }

    /// Bullets hit the first enemy cell they touch.
    pub(super) fn resolve_bullets(&mut self) {
        let bullets: Vec<(EntityId, PlayerId, Vec2, f32)> = self
            .world
            .iter()
            .filter_map(|e| match e {
                Entity::Bullet(b) if !b.data().removed => {
                    Some((b.data().id, b.shooter, b.data().position, b.data().radius()))
                }
                _ => None,
            })
            .collect();

        for (bullet_id, shooter, position, radius) in bullets {
            let world = &self.world;
            let hit = self
                .players
                .values()
                .filter(|p| p.id != shooter && !p.barrier_active())
                .find_map(|p| {
                    p.cells
                        .iter()
                        .filter_map(|c| world.player_cell(*c))
                        .find(|c| check_collision(position, radius, c.data().position, c.data().radius()).is_colliding())
                        .map(|c| (p.id, c.data().id, c.data().mass()))
                });
            let Some((target, cell_id, mass)) = hit else {
                continue;
            };

            self.consume(bullet_id);
            if mass <= self.config.bullet.lethal_mass {
                self.kill_by_bullet(shooter, target);
            } else {
                self.damage_cell(shooter, target, cell_id, mass);
            }
        }
    }

    fn damage_cell(&mut self, shooter: PlayerId, target: PlayerId, cell_id: EntityId, mass: f32) {
        let remaining = (mass - self.config.bullet.damage).max(self.config.bullet.min_mass);
        if let Some(cell) = self.world.player_cell_mut(cell_id) {
            cell.data_mut().set_mass(remaining);
        }
        debug!("Bullet from {} hit {} (-{:.0}, {:.0} left)", shooter, target, mass - remaining, remaining);
        self.outbox.to_all(ServerEvent::BulletHit {
            shooter_id: shooter,
            target_id: target,
            cell_id,
            damage: round1(mass - remaining),
            remaining_mass: round1(remaining),
        });
    }

    fn kill_by_bullet(&mut self, shooter: PlayerId, victim: PlayerId) {
        let shooter_name = match self.players.get_mut(&shooter) {
            Some(player) => {
                player.score += self.config.bullet.kill_bonus;
                player.name.clone()
            }
            None => "Unknown".to_string(),
        };
        let Some(victim_name) = self.players.get(&victim).map(|p| p.name.clone()) else {
            return;
        };
        let final_mass = self.mass_of(victim).unwrap_or(0.0);

        self.outbox.to_all(ServerEvent::PlayerKilledByBullet {
            victim_id: victim,
            victim_name: victim_name.clone(),
            shooter_id: shooter,
            shooter_name: shooter_name.clone(),
        });
        let announcement = format!("{} was shot down by {}", victim_name, shooter_name);
        self.eliminate_player(victim, shooter_name, final_mass, DeathReason::Bullet, announcement);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::entity::{Bullet, EjectedMass, Food, Pickup};
    use crate::events::Recipient;
    use protocol::packets::ClientCommand;
    use protocol::Color;

    const CENTER: Vec2 = Vec2::new(1000.0, 1000.0);

    fn game() -> GameState {
        let mut config = Config::default();
        config.food.count = 0;
        config.virus.initial_count = 0;
        config.virus.max_count = 0;
        config.items.gun.max_count = 0;
        config.items.barrier.max_count = 0;
        config.items.speed_up.max_count = 0;
        GameState::new(&config)
    }

    /// Join a player whose single cell has `mass` and sits at `position`.
    fn player(game: &mut GameState, name: &str, mass: f32, position: Vec2) -> PlayerId {
        let id = game.connect();
        game.handle_command(id, ClientCommand::Join { name: name.into() }).unwrap();
        let cell = game.players[&id].cells[0];
        if let Some(c) = game.world.player_cell_mut(cell) {
            c.data_mut().set_mass(mass);
            c.data_mut().position = position;
            c.target = position;
        }
        game.outbox.drain();
        id
    }

    fn add_cell(game: &mut GameState, owner: PlayerId, mass: f32, position: Vec2) -> EntityId {
        let id = game.world.next_id();
        game.world
            .insert(Entity::Player(PlayerCell::new(id, owner, position, mass, Color::default(), 0)));
        game.players.get_mut(&owner).unwrap().cells.push(id);
        id
    }

    fn resolve(game: &mut GameState) {
        game.world.rebuild_quad_tree();
        game.resolve_collisions();
        game.resolve_bullets();
    }

    #[test]
    fn test_eating_food_adds_mass_and_score() {
        let mut game = game();
        let id = player(&mut game, "ann", 20.0, CENTER);
        for _ in 0..5 {
            let food = game.world.next_id();
            game.world.insert(Entity::Food(Food::new(food, CENTER, 10.0, Color::default(), 0)));
        }

        resolve(&mut game);

        assert_eq!(game.mass_of(id), Some(70.0));
        assert_eq!(game.players[&id].score, 50);
        assert_eq!(game.world.counts().food, 0);
    }

    #[test]
    fn test_consumed_set_is_sized_by_population() {
        let mut game = game();
        let id = player(&mut game, "ann", 20.0, CENTER);
        for _ in 0..100_000 {
            game.world.next_id();
        }
        let food = game.world.next_id();
        game.world.insert(Entity::Food(Food::new(food, CENTER, 10.0, Color::default(), 0)));

        resolve(&mut game);

        assert!(game.world.get(food).unwrap().is_removed());
        assert_eq!(game.mass_of(id), Some(30.0));
        assert!(game.consumed.len() <= game.world.len());
    }

    #[test]
    fn test_eject_is_eaten_at_full_mass() {
        let mut game = game();
        let id = player(&mut game, "ann", 100.0, CENTER);
        let eject = game.world.next_id();
        let source = EntityId(9999);
        game.world
            .insert(Entity::Eject(EjectedMass::new(eject, source, CENTER, Vec2::ZERO, 14.5, Color::default(), 0)));

        resolve(&mut game);
        assert_eq!(game.mass_of(id), Some(114.5));
        assert_eq!(game.players[&id].score, 14);
    }

    #[test]
    fn test_eat_ratio_gates_enemy_eating() {
        let mut game = game();
        let big = player(&mut game, "big", 100.0, CENTER);
        let close = player(&mut game, "close", 81.0, CENTER);

        resolve(&mut game);
        assert_eq!(game.mass_of(big), Some(100.0));
        assert_eq!(game.mass_of(close), Some(81.0));

        let cell = game.players[&close].cells[0];
        game.world.player_cell_mut(cell).unwrap().data_mut().set_mass(79.0);
        resolve(&mut game);

        assert_eq!(game.mass_of(big), Some(179.0));
        assert_eq!(game.players[&big].score, 79);
        assert!(!game.players.contains_key(&close));

        let events = game.outbox.drain();
        assert!(events.iter().any(|o| matches!(
            o.event,
            ServerEvent::PlayerEaten { predator_id, prey_id, remaining_cells: 0, .. }
                if predator_id == big && prey_id == close
        )));
        assert!(events.iter().any(|o| o.recipient == Recipient::Player(close)
            && matches!(o.event, ServerEvent::PlayerDeath { death_reason: DeathReason::Eaten, .. })));
        assert!(events.iter().any(|o| o.event == ServerEvent::PlayerLeft { player_id: close }));
    }

    #[test]
    fn test_smaller_cell_can_be_eaten_from_either_side() {
        let mut game = game();
        let small = player(&mut game, "small", 30.0, CENTER);
        let big = player(&mut game, "big", 200.0, CENTER);
        add_cell(&mut game, small, 30.0, Vec2::new(300.0, 300.0));

        resolve(&mut game);

        assert_eq!(game.mass_of(big), Some(230.0));
        assert_eq!(game.players[&small].cells.len(), 1);
    }

    #[test]
    fn test_barrier_blocks_eating() {
        let mut game = game();
        let big = player(&mut game, "big", 200.0, CENTER);
        let small = player(&mut game, "small", 30.0, CENTER);
        {
            let p = game.players.get_mut(&small).unwrap();
            p.barrier.has = true;
            p.barrier.activate(0);
        }

        resolve(&mut game);
        assert_eq!(game.mass_of(big), Some(200.0));
        assert_eq!(game.mass_of(small), Some(30.0));
    }

    #[test]
    fn test_protected_cell_is_not_eaten() {
        let mut game = game();
        let big = player(&mut game, "big", 200.0, CENTER);
        let small = player(&mut game, "small", 30.0, CENTER);
        let cell = game.players[&small].cells[0];
        game.world.player_cell_mut(cell).unwrap().protect(1000.0);

        resolve(&mut game);
        assert_eq!(game.mass_of(big), Some(200.0));
        assert!(game.players.contains_key(&small));
    }

    #[test]
    fn test_small_cells_pass_through_viruses() {
        let mut game = game();
        let id = player(&mut game, "ann", 119.9, CENTER);
        game.world.spawn_virus(&game.config.clone(), 0);
        let virus = game.world.ids_where(|e| matches!(e, Entity::Virus(_)))[0];
        game.world.get_mut(virus).unwrap().data_mut().position = CENTER;

        resolve(&mut game);

        assert_eq!(game.players[&id].cells.len(), 1);
        assert_eq!(game.stats.small_players_ignored, 1);
        assert_eq!(game.world.counts().viruses, 1);
    }

    #[test]
    fn test_virus_risk_reward() {
        let mut game = game();
        let id = player(&mut game, "ann", 150.0, CENTER);
        game.world.spawn_virus(&game.config.clone(), 0);
        let virus = game.world.ids_where(|e| matches!(e, Entity::Virus(_)))[0];
        game.world.get_mut(virus).unwrap().data_mut().position = CENTER;

        resolve(&mut game);

        let player = &game.players[&id];
        assert_eq!(player.cells.len(), 8);
        assert_eq!(player.score, 100);
        assert_eq!(player.virus_risk_rewards, 1);
        assert!((game.mass_of(id).unwrap() - 250.0).abs() < 0.01);
        assert_eq!(game.world.counts().viruses, 0);
        assert_eq!(game.stats.virus_risk_rewards, 1);

        for cell in &game.players[&id].cells {
            let cell = game.world.player_cell(*cell).unwrap();
            assert!(cell.is_protected());
            assert!(!cell.merge_eligible);
            assert!((cell.data().mass() - 31.25).abs() < 0.01);
        }

        let events = game.outbox.drain();
        assert!(events.iter().any(|o| matches!(
            o.event,
            ServerEvent::VirusRiskReward { split_count: 7, total_cells: 8, virus_destroyed: true, .. }
        )));
    }

    #[test]
    fn test_risk_reward_starts_at_min_interaction_mass() {
        let mut game = game();
        let mass = game.config.virus.min_interaction_mass;
        let id = player(&mut game, "ann", mass, CENTER);
        game.world.spawn_virus(&game.config.clone(), 0);
        let virus = game.world.ids_where(|e| matches!(e, Entity::Virus(_)))[0];
        game.world.get_mut(virus).unwrap().data_mut().position = CENTER;

        resolve(&mut game);

        assert_eq!(game.players[&id].cells.len(), 8);
        assert_eq!(game.stats.small_players_ignored, 0);
        assert_eq!(game.world.counts().viruses, 0);
    }

    #[test]
    fn test_risk_reward_respects_cell_cap() {
        let mut game = game();
        game.config.player.max_cells = 3;
        let id = player(&mut game, "ann", 150.0, CENTER);
        game.world.spawn_virus(&game.config.clone(), 0);
        let virus = game.world.ids_where(|e| matches!(e, Entity::Virus(_)))[0];
        game.world.get_mut(virus).unwrap().data_mut().position = CENTER;

        resolve(&mut game);
        assert_eq!(game.players[&id].cells.len(), 3);
        assert!((game.mass_of(id).unwrap() - 250.0).abs() < 0.01);
    }

    #[test]
    fn test_item_pickup() {
        let mut game = game();
        let id = player(&mut game, "ann", 200.0, CENTER);
        let item = game.world.next_id();
        game.world.insert(Entity::Item(Pickup::new(item, ItemKind::Gun, CENTER, 50.0, 0)));

        resolve(&mut game);

        let player = &game.players[&id];
        assert!(player.gun.has);
        assert_eq!(player.gun.bullets, game.config.items.gun_bullets_per_item);
        assert_eq!(game.world.counts().gun_items, 0);
        let events = game.outbox.drain();
        assert!(events.iter().any(|o| o.recipient == Recipient::Player(id)
            && matches!(o.event, ServerEvent::GunAcquired { .. })));
        assert!(events.iter().any(|o| matches!(o.event, ServerEvent::ItemCollected { kind: ItemKind::Gun, .. })));
    }

    #[test]
    fn test_held_power_up_blocks_other_pickups() {
        let mut game = game();
        let id = player(&mut game, "ann", 200.0, CENTER);
        game.players.get_mut(&id).unwrap().speed_up.has = true;
        let item = game.world.next_id();
        game.world.insert(Entity::Item(Pickup::new(item, ItemKind::Barrier, CENTER, 50.0, 0)));

        resolve(&mut game);
        assert!(!game.players[&id].barrier.has);
        assert_eq!(game.world.counts().barrier_items, 1);
    }

    #[test]
    fn test_bullet_damage() {
        let mut game = game();
        let shooter = player(&mut game, "shooter", 50.0, Vec2::new(200.0, 200.0));
        let target = player(&mut game, "target", 300.0, CENTER);
        let bullet = game.world.next_id();
        let config = game.config.bullet.clone();
        game.world.insert(Entity::Bullet(Bullet::new(bullet, shooter, CENTER, Vec2::X, &config, 0)));

        resolve(&mut game);

        assert_eq!(game.mass_of(target), Some(200.0));
        assert_eq!(game.world.counts().bullets, 0);
        assert!(game.outbox.drain().iter().any(|o| matches!(
            o.event,
            ServerEvent::BulletHit { damage, remaining_mass, .. } if damage == 100.0 && remaining_mass == 200.0
        )));
    }

    #[test]
    fn test_bullet_floor_and_lethality() {
        let mut game = game();
        let shooter = player(&mut game, "shooter", 50.0, Vec2::new(200.0, 200.0));
        let target = player(&mut game, "target", 110.0, CENTER);
        let config = game.config.bullet.clone();

        let bullet = game.world.next_id();
        game.world.insert(Entity::Bullet(Bullet::new(bullet, shooter, CENTER, Vec2::X, &config, 0)));
        resolve(&mut game);
        assert_eq!(game.mass_of(target), Some(20.0));

        let bullet = game.world.next_id();
        game.world.insert(Entity::Bullet(Bullet::new(bullet, shooter, CENTER, Vec2::X, &config, 0)));
        resolve(&mut game);
        assert!(!game.players.contains_key(&target));
        assert_eq!(game.players[&shooter].score, config.kill_bonus);

        let events = game.outbox.drain();
        assert!(events.iter().any(|o| matches!(o.event, ServerEvent::PlayerKilledByBullet { .. })));
        assert!(events.iter().any(|o| matches!(
            o.event,
            ServerEvent::PlayerDeath { death_reason: DeathReason::Bullet, .. }
        )));
    }

    #[test]
    fn test_bullet_lethal_at_exact_threshold() {
        let mut game = game();
        let lethal = game.config.bullet.lethal_mass;
        let shooter = player(&mut game, "shooter", 50.0, Vec2::new(200.0, 200.0));
        let target = player(&mut game, "target", lethal, CENTER);
        let config = game.config.bullet.clone();

        let bullet = game.world.next_id();
        game.world.insert(Entity::Bullet(Bullet::new(bullet, shooter, CENTER, Vec2::X, &config, 0)));
        resolve(&mut game);

        assert!(!game.players.contains_key(&target));
        assert_eq!(game.mass_of(target), None);
    }

    #[test]
    fn test_bullet_just_above_threshold_only_damages() {
        let mut game = game();
        let mass = game.config.bullet.lethal_mass + 0.01;
        let shooter = player(&mut game, "shooter", 50.0, Vec2::new(200.0, 200.0));
        let target = player(&mut game, "target", mass, CENTER);
        let config = game.config.bullet.clone();

        let bullet = game.world.next_id();
        game.world.insert(Entity::Bullet(Bullet::new(bullet, shooter, CENTER, Vec2::X, &config, 0)));
        resolve(&mut game);

        assert!(game.players.contains_key(&target));
        assert_eq!(game.mass_of(target), Some(config.min_mass));
        assert_eq!(game.players[&shooter].score, 0);
    }

    #[test]
    fn test_bullets_skip_shooter_and_barrier() {
        let mut game = game();
        let shooter = player(&mut game, "shooter", 300.0, CENTER);
        let shielded = player(&mut game, "shielded", 300.0, Vec2::new(400.0, 400.0));
        {
            let p = game.players.get_mut(&shielded).unwrap();
            p.barrier.has = true;
            p.barrier.activate(0);
        }
        let config = game.config.bullet.clone();
        for position in [CENTER, Vec2::new(400.0, 400.0)] {
            let bullet = game.world.next_id();
            game.world.insert(Entity::Bullet(Bullet::new(bullet, shooter, position, Vec2::X, &config, 0)));
        }

        game.resolve_bullets();
        assert_eq!(game.mass_of(shooter), Some(300.0));
        assert_eq!(game.mass_of(shielded), Some(300.0));
        assert_eq!(game.world.counts().bullets, 2);
    }

    #[test]
    fn test_merge_eligible_cells_merge() {
        let mut game = game();
        let id = player(&mut game, "ann", 50.0, CENTER);
        let other = add_cell(&mut game, id, 30.0, CENTER + Vec2::new(2.0, 0.0));
        for cell in game.players[&id].cells.clone() {
            game.world.player_cell_mut(cell).unwrap().merge_eligible = true;
        }

        game.merge_cells();

        assert_eq!(game.players[&id].cells.len(), 1);
        assert_eq!(game.mass_of(id), Some(80.0));
        assert!(game.world.get(other).unwrap().is_removed());
    }

    #[test]
    fn test_cooling_down_cells_do_not_merge() {
        let mut game = game();
        let id = player(&mut game, "ann", 50.0, CENTER);
        add_cell(&mut game, id, 30.0, CENTER);
        game.merge_cells();
        assert_eq!(game.players[&id].cells.len(), 2);
    }

    #[test]
    fn test_separation_skips_protected_cells() {
        let mut game = game();
        let id = player(&mut game, "ann", 50.0, CENTER);
        let free = game.players[&id].cells[0];
        let protected = add_cell(&mut game, id, 50.0, CENTER + Vec2::new(3.0, 0.0));
        game.world.player_cell_mut(protected).unwrap().protect(1000.0);

        game.world.rebuild_quad_tree();
        game.separate_cells();

        let push = game.world.player_cell(free).unwrap().data().adjustment;
        assert!(push.x < 0.0);
        assert_eq!(game.world.player_cell(protected).unwrap().data().adjustment, Vec2::ZERO);
        assert_eq!(game.stats.position_adjustments, 1);
    }

    #[test]
    fn test_virus_splits_after_feeding() {
        let mut game = game();
        game.config.virus.max_hits = 1;
        game.world.spawn_virus(&game.config.clone(), 0);
        let virus = game.world.ids_where(|e| matches!(e, Entity::Virus(_)))[0];
        game.world.get_mut(virus).unwrap().data_mut().position = CENTER;
        let eject = game.world.next_id();
        game.world
            .insert(Entity::Eject(EjectedMass::new(eject, EntityId(9999), CENTER, Vec2::ZERO, 14.0, Color::default(), 0)));

        game.world.rebuild_quad_tree();
        game.feed_viruses();

        let counts = game.world.counts();
        assert_eq!(counts.ejected, 0);
        assert_eq!(counts.viruses, 1 + game.config.virus.split_into);
        assert_eq!(game.world.get(virus).unwrap().data().mass(), game.config.virus.mass);
    }

    #[test]
    fn test_elimination_is_idempotent() {
        let mut game = game();
        let id = player(&mut game, "ann", 50.0, CENTER);
        game.eliminate_player(id, "test".into(), 50.0, DeathReason::Eaten, "gone".into());
        game.eliminate_player(id, "test".into(), 50.0, DeathReason::Eaten, "gone".into());
        game.disconnect(id);

        let left = game
            .outbox
            .drain()
            .iter()
            .filter(|o| o.event == ServerEvent::PlayerLeft { player_id: id })
            .count();
        assert_eq!(left, 1);

        game.tick(40);
        assert_eq!(game.world.counts().player_cells, 0);
    }
}
