//! Snapshot serialization views.

use super::game::GameState;
use crate::entity::GameObject;
use crate::world::Entity;
use protocol::packets::{EntityView, ItemKind, PlayerView, Snapshot, WorldSize};
use std::collections::BTreeMap;

/// Chat entries included in each snapshot.
pub const SNAPSHOT_CHAT_WINDOW: usize = 20;

impl GameState {
    /// Build the full world snapshot sent to clients.
    pub fn snapshot(&self) -> Snapshot {
        let now_ms = self.now_ms;
        let items = &self.config.items;
        let mut snapshot = Snapshot {
            players: BTreeMap::new(),
            world_size: WorldSize {
                width: self.world.border.width,
                height: self.world.border.height,
            },
            leaderboard: self.leaderboard.clone(),
            chat_messages: self.chat.recent(SNAPSHOT_CHAT_WINDOW),
            stats: self.stats.clone(),
            ..Snapshot::default()
        };

        for player in self.players.values() {
            let cells = player
                .cells
                .iter()
                .filter_map(|id| self.world.player_cell(*id))
                .map(|cell| {
                    let data = cell.data();
                    let pos = cell.visual_position();
                    EntityView::rounded(data.id, pos.x, pos.y, data.mass(), data.radius(), data.color)
                })
                .collect();

            snapshot.players.insert(
                player.id,
                PlayerView {
                    name: player.name.clone(),
                    color: player.color,
                    cells,
                    score: player.score,
                    has_gun: player.gun.has,
                    gun_bullets: player.gun.bullets,
                    has_barrier: player.barrier.has,
                    barrier_active: player.barrier.active,
                    barrier_time_left: player.barrier.time_left(now_ms, items.barrier_duration_ms),
                    has_speed_up: player.speed_up.has,
                    speed_up_active: player.speed_up.active,
                    speed_up_time_left: player.speed_up.time_left(now_ms, items.speed_up_duration_ms),
                },
            );
        }

        for entity in self.world.iter() {
            if entity.is_removed() {
                continue;
            }
            let data = entity.data();
            let view = EntityView::rounded(data.id, data.position.x, data.position.y, data.mass(), data.radius(), data.color);
            match entity {
                Entity::Player(_) => {}
                Entity::Food(_) => snapshot.foods.push(view),
                Entity::Virus(_) => snapshot.viruses.push(view),
                Entity::Eject(_) => snapshot.ejected_masses.push(view),
                Entity::Bullet(_) => snapshot.bullets.push(view),
                Entity::Item(item) => match item.item {
                    ItemKind::Gun => snapshot.gun_items.push(view),
                    ItemKind::Barrier => snapshot.barrier_items.push(view),
                    ItemKind::SpeedUp => snapshot.speed_up_items.push(view),
                },
            }
        }

        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use protocol::packets::{encode_event, ClientCommand, ServerEvent};

    #[test]
    fn test_snapshot_contents() {
        let mut config = Config::default();
        config.food.count = 10;
        config.virus.initial_count = 2;
        let mut game = GameState::new(&config);
        game.populate();

        let id = game.connect();
        game.handle_command(id, ClientCommand::Join { name: "ann".into() }).unwrap();

        let snapshot = game.snapshot();
        assert_eq!(snapshot.foods.len(), 10);
        assert_eq!(snapshot.viruses.len(), 2);
        assert_eq!(snapshot.players[&id].cells.len(), 1);
        assert_eq!(snapshot.players[&id].name, "ann");
        assert_eq!(snapshot.world_size.width, 2000.0);
        assert_eq!(snapshot.chat_messages.len(), 1);
    }

    #[test]
    fn test_removed_entities_are_hidden() {
        let mut config = Config::default();
        config.food.count = 3;
        config.virus.initial_count = 0;
        let mut game = GameState::new(&config);
        game.populate();

        let food = game.snapshot().foods[0].id;
        game.world.mark_removed(food);
        assert!(game.snapshot().foods.iter().all(|f| f.id != food));
    }

    #[test]
    fn test_snapshot_wire_shape() {
        let mut game = GameState::new(&Config::default());
        let id = game.connect();
        game.handle_command(id, ClientCommand::Join { name: "ann".into() }).unwrap();

        let json = encode_event(&ServerEvent::GameUpdate(Box::new(game.snapshot()))).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "gameUpdate");
        assert!(value["players"][id.to_string()]["cells"].is_array());
        assert!(value["worldSize"]["width"].is_number());
        assert!(value["stats"]["tickCount"].is_number());
    }
}
