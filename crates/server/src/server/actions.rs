//! Staged player actions, applied at the start of each tick.

use super::game::GameState;
use crate::entity::{Bullet, EjectedMass, GameObject};
use crate::world::Entity;
use glam::Vec2;
use protocol::packets::ServerEvent;
use protocol::PlayerId;
use rand::Rng;
use std::f32::consts::PI;
use tracing::debug;

impl GameState {
    /// Apply and clear every player's split, eject and shoot intents.
    pub(super) fn consume_intents(&mut self) {
        let ids: Vec<PlayerId> = self.players.keys().copied().collect();
        for id in ids {
            let intents = match self.players.get_mut(&id) {
                Some(player) => std::mem::take(&mut player.intents),
                None => continue,
            };
            if let Some(mouse) = intents.split {
                self.split_player(id, mouse);
            }
            if let Some(request) = intents.eject {
                self.eject_mass(id, request.aim);
            }
            if let Some(mouse) = intents.shoot {
                self.shoot(id, mouse);
            }
        }
    }

    /// Split every ready cell toward `mouse` while under the cell cap.
    fn split_player(&mut self, id: PlayerId, mouse: Vec2) {
        let now_ms = self.now_ms;
        let max_cells = self.config.player.max_cells;
        let cell_ids = match self.players.get(&id) {
            Some(player) => player.cells.clone(),
            None => return,
        };

        let mut count = cell_ids.len();
        let mut created = Vec::new();
        for cell_id in cell_ids {
            if count >= max_cells {
                break;
            }

            let angle = match self.world.player_cell(cell_id) {
                Some(cell) if cell.split_ready(now_ms, &self.config.player) => {
                    let delta = mouse - cell.data().position;
                    if delta.length_squared() > 0.0 { delta.y.atan2(delta.x) } else { 0.0 }
                }
                _ => continue,
            };

            let new_id = self.world.next_id();
            let border = self.world.border;
            let Some(cell) = self.world.player_cell_mut(cell_id) else {
                continue;
            };
            if let Some(sibling) = cell.split(new_id, angle, now_ms, &self.config.player, &border) {
                self.world.insert(Entity::Player(sibling));
                created.push(new_id);
                count += 1;
            }
        }

        if let Some(player) = self.players.get_mut(&id) {
            if !created.is_empty() {
                debug!("{} split into {} cells", player.name, count);
            }
            player.cells.extend(created);
        }
    }

    /// Eject from the first cell heavy enough, respecting the per-player cooldown.
    fn eject_mass(&mut self, id: PlayerId, aim: Option<Vec2>) {
        let now_ms = self.now_ms;
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        if player
            .last_eject_ms
            .is_some_and(|last| now_ms.saturating_sub(last) < self.config.eject.cooldown_ms)
        {
            return;
        }

        for cell_id in player.cells.clone() {
            let Some(cell) = self.world.player_cell_mut(cell_id) else {
                continue;
            };
            if cell.data().mass() < self.config.player.eject_min_mass {
                continue;
            }

            let delta = cell.target - cell.data().position;
            let fallback = if delta.length() > 10.0 {
                delta.y.atan2(delta.x)
            } else {
                rand::rng().random_range(0.0..(2.0 * PI))
            };
            let Some(launch) = cell.eject(aim, fallback, &self.config.player, &self.config.eject) else {
                continue;
            };
            let color = cell.data().color;

            let eject_id = self.world.next_id();
            let eject = EjectedMass::new(eject_id, cell_id, launch.position, launch.velocity, launch.mass, color, now_ms);
            self.world.insert(Entity::Eject(eject));
            player.last_eject_ms = Some(now_ms);
            break;
        }
    }

    /// Fire one bullet from the main cell toward `mouse`.
    fn shoot(&mut self, id: PlayerId, mouse: Vec2) {
        let now_ms = self.now_ms;
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        if !player.gun.has {
            return;
        }
        if player
            .gun
            .last_shot_ms
            .is_some_and(|last| now_ms.saturating_sub(last) < self.config.items.gun_cooldown_ms)
        {
            return;
        }
        if player.gun.bullets == 0 {
            player.expire_gun();
            self.outbox.to_player(id, ServerEvent::GunExpired);
            return;
        }

        let Some(cell) = player.main_cell().and_then(|c| self.world.player_cell(c)) else {
            return;
        };
        let origin = cell.data().position;
        let direction = (mouse - origin).try_normalize().unwrap_or(Vec2::X);
        let position = origin + direction * (cell.data().radius() + self.config.bullet.muzzle_offset);

        let bullet_id = self.world.next_id();
        let bullet = Bullet::new(bullet_id, id, position, direction, &self.config.bullet, now_ms);
        self.world.insert(Entity::Bullet(bullet));

        player.gun.bullets -= 1;
        player.gun.last_shot_ms = Some(now_ms);
        let bullets_left = player.gun.bullets;
        self.outbox.to_player(id, ServerEvent::GunShotResult { bullets_left });

        if bullets_left == 0 {
            debug!("{} used their last bullet", player.name);
            player.expire_gun();
            self.outbox.to_player(id, ServerEvent::GunExpired);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use protocol::packets::ClientCommand;

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

    fn joined_with_mass(game: &mut GameState, mass: f32) -> PlayerId {
        let id = game.connect();
        game.handle_command(id, ClientCommand::Join { name: "ann".into() }).unwrap();
        let cell = game.players[&id].cells[0];
        if let Some(c) = game.world.player_cell_mut(cell) {
            c.data_mut().set_mass(mass);
            c.data_mut().position = Vec2::new(1000.0, 1000.0);
            c.target = Vec2::new(1000.0, 1000.0);
        }
        game.outbox.drain();
        id
    }

    #[test]
    fn test_split_halves_and_starts_cooldowns() {
        let mut game = game();
        let id = joined_with_mass(&mut game, 40.0);
        game.players.get_mut(&id).unwrap().intents.split = Some(Vec2::new(1500.0, 1000.0));

        game.consume_intents();

        let cells = &game.players[&id].cells;
        assert_eq!(cells.len(), 2);
        for cell_id in cells {
            let cell = game.world.player_cell(*cell_id).unwrap();
            assert_eq!(cell.data().mass(), 20.0);
            assert!(!cell.merge_eligible);
            assert!(cell.merge_cooldown_ms > 0.0);
        }
        assert!(game.players[&id].intents.split.is_none());
    }

    #[test]
    fn test_split_respects_cell_cap() {
        let mut game = game();
        game.config.player.max_cells = 3;
        let id = joined_with_mass(&mut game, 400.0);

        game.players.get_mut(&id).unwrap().intents.split = Some(Vec2::new(1500.0, 1000.0));
        game.consume_intents();
        assert_eq!(game.players[&id].cells.len(), 2);

        // Past the split cooldown both cells are ready, but only one may split.
        game.now_ms += game.config.player.split_cooldown_ms + 1;
        game.players.get_mut(&id).unwrap().intents.split = Some(Vec2::new(1500.0, 1000.0));
        game.consume_intents();
        assert_eq!(game.players[&id].cells.len(), 3);
    }

    #[test]
    fn test_eject_cooldown() {
        let mut game = game();
        let id = joined_with_mass(&mut game, 200.0);

        game.players.get_mut(&id).unwrap().intents.eject = Some(Default::default());
        game.consume_intents();
        assert_eq!(game.world.counts().ejected, 1);

        game.now_ms += 50;
        game.players.get_mut(&id).unwrap().intents.eject = Some(Default::default());
        game.consume_intents();
        assert_eq!(game.world.counts().ejected, 1);

        game.now_ms += game.config.eject.cooldown_ms;
        game.players.get_mut(&id).unwrap().intents.eject = Some(Default::default());
        game.consume_intents();
        assert_eq!(game.world.counts().ejected, 2);
        assert!(game.mass_of(id).unwrap() < 200.0);
    }

    #[test]
    fn test_eject_below_minimum_does_nothing() {
        let mut game = game();
        let id = joined_with_mass(&mut game, 30.0);
        game.players.get_mut(&id).unwrap().intents.eject = Some(Default::default());
        game.consume_intents();
        assert_eq!(game.world.counts().ejected, 0);
        assert_eq!(game.mass_of(id), Some(30.0));
    }

    #[test]
    fn test_shoot_spends_bullets_and_expires_gun() {
        let mut game = game();
        let id = joined_with_mass(&mut game, 200.0);
        game.players.get_mut(&id).unwrap().grant_gun(2, 10, 0);

        game.players.get_mut(&id).unwrap().intents.shoot = Some(Vec2::new(1500.0, 1000.0));
        game.consume_intents();
        assert_eq!(game.world.counts().bullets, 1);
        assert_eq!(game.players[&id].gun.bullets, 1);

        // Still cooling down.
        game.players.get_mut(&id).unwrap().intents.shoot = Some(Vec2::new(1500.0, 1000.0));
        game.consume_intents();
        assert_eq!(game.world.counts().bullets, 1);

        game.now_ms += game.config.items.gun_cooldown_ms;
        game.players.get_mut(&id).unwrap().intents.shoot = Some(Vec2::new(1500.0, 1000.0));
        game.consume_intents();
        assert_eq!(game.world.counts().bullets, 2);
        assert!(!game.players[&id].gun.has);

        let events = game.outbox.drain();
        assert!(events.iter().any(|o| o.event == ServerEvent::GunShotResult { bullets_left: 0 }));
        assert_eq!(events.last().map(|o| &o.event), Some(&ServerEvent::GunExpired));
    }

    #[test]
    fn test_bullet_spawns_outside_shooter() {
        let mut game = game();
        let id = joined_with_mass(&mut game, 200.0);
        game.players.get_mut(&id).unwrap().grant_gun(5, 10, 0);
        game.players.get_mut(&id).unwrap().intents.shoot = Some(Vec2::new(1000.0, 1000.0));
        game.consume_intents();

        let cell = game.players[&id].cells[0];
        let radius = game.world.player_cell(cell).unwrap().data().radius();
        let bullet = game.world.iter().find(|e| matches!(e, Entity::Bullet(_))).unwrap();
        let offset = bullet.data().position - Vec2::new(1000.0, 1000.0);
        assert!((offset.x - (radius + game.config.bullet.muzzle_offset)).abs() < 1e-3);
        assert_eq!(offset.y, 0.0);
    }
}
