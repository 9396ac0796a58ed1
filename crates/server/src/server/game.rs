//! Game state and main loop.

use crate::chat::ChatLog;
use crate::config::Config;
use crate::entity::GameObject;
use crate::events::Outbox;
use crate::player::Player;
use crate::world::{Entity, World};
use fixedbitset::FixedBitSet;
use futures_util::FutureExt;
use protocol::packets::{round1, ItemKind, LeaderboardEntry, ServerEvent, Stats};
use protocol::{EntityId, PlayerId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::session::Hub;

/// Last spawn or refresh time of each periodic activity, in simulation ms.
#[derive(Debug, Default, Clone, Copy)]
struct Timers {
    virus_ms: u64,
    gun_ms: u64,
    barrier_ms: u64,
    speed_up_ms: u64,
    leaderboard_ms: u64,
}

/// Main game state.
pub struct GameState {
    pub config: Config,
    pub world: World,
    pub players: HashMap<PlayerId, Player>,
    pub chat: ChatLog,
    /// Events produced since the last drain.
    pub outbox: Outbox,
    pub stats: Stats,
    pub leaderboard: Vec<LeaderboardEntry>,

    /// Simulation clock in milliseconds.
    pub now_ms: u64,
    pub tick_count: u64,
    /// Open connections, joined or not.
    pub connections: usize,

    // Average tick duration in milliseconds (exponential moving average).
    pub update_time_avg: f64,

    next_player_id: u32,
    timers: Timers,

    // Reusable buffers for collision detection (reduce allocations)
    pub(super) consumed: FixedBitSet,
    pub(super) candidates: Vec<EntityId>,
}

impl GameState {
    /// Create a new game state.
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            world: World::new(config.world.width, config.world.height),
            players: HashMap::new(),
            chat: ChatLog::new(config.chat.max_messages),
            outbox: Outbox::new(),
            stats: Stats::default(),
            leaderboard: Vec::new(),
            now_ms: 0,
            tick_count: 0,
            connections: 0,
            update_time_avg: 0.0,
            next_player_id: 1,
            timers: Timers::default(),
            consumed: FixedBitSet::new(),
            candidates: Vec::with_capacity(256),
        }
    }

    /// Fill the world with its initial food and viruses.
    pub fn populate(&mut self) {
        let food = self.config.food.clone();
        self.world.spawn_food(food.count, &food, self.now_ms);

        let viruses = self.config.virus.initial_count.min(self.config.virus.max_count);
        for _ in 0..viruses {
            self.world.spawn_virus(&self.config, self.now_ms);
        }

        let counts = self.world.counts();
        info!("World initialized: {} food, {} viruses", counts.food, counts.viruses);
    }

    /// Register a connection and hand out its player id.
    pub fn connect(&mut self) -> PlayerId {
        let id = PlayerId(self.next_player_id);
        self.next_player_id = self.next_player_id.wrapping_add(1).max(1);
        self.connections += 1;
        debug!("Connection {} opened", id);
        id
    }

    /// Drop a connection and, if it joined, its player.
    pub fn disconnect(&mut self, id: PlayerId) {
        self.connections = self.connections.saturating_sub(1);
        let Some(player) = self.players.remove(&id) else {
            return;
        };
        for cell in &player.cells {
            self.world.mark_removed(*cell);
        }
        info!("Player {} ({}) left", player.name, id);

        let entry = self.chat.push_system(format!("{} left the game", player.name), self.now_ms);
        self.outbox.to_all(ServerEvent::ChatMessage(entry));
        self.outbox.to_all(ServerEvent::PlayerLeft { player_id: id });
    }

    /// Advance the simulation by `dt_ms` milliseconds.
    pub fn tick(&mut self, dt_ms: u64) {
        let tick_start = std::time::Instant::now();
        let dt_ms = dt_ms.min(self.config.server.max_tick_delta_ms);
        self.now_ms += dt_ms;
        self.tick_count += 1;

        self.consume_intents();
        self.integrate(dt_ms as f32);
        self.merge_cells();
        self.world.rebuild_quad_tree();

        let separation_start = std::time::Instant::now();
        self.separate_cells();
        self.stats.position_adjustment_time = elapsed_ms(separation_start);

        let collision_start = std::time::Instant::now();
        self.resolve_collisions();
        self.feed_viruses();
        self.resolve_bullets();
        self.stats.collision_time = elapsed_ms(collision_start);

        self.cleanup();
        self.expire_power_ups();
        self.spawn_entities();

        if self.now_ms.saturating_sub(self.timers.leaderboard_ms) >= self.config.server.leaderboard_interval_ms
            || self.tick_count == 1
        {
            self.timers.leaderboard_ms = self.now_ms;
            self.refresh_leaderboard();
        }

        self.refresh_stats();
        self.stats.update_time = elapsed_ms(tick_start);

        if self.tick_count % 400 == 0 {
            debug!(
                "Tick #{}: {:.2}ms total | separation={:.2}ms collision={:.2}ms | {} entities, {} players",
                self.tick_count,
                self.stats.update_time,
                self.stats.position_adjustment_time,
                self.stats.collision_time,
                self.world.len(),
                self.players.len()
            );
        }
    }

    /// Physics step for every live entity.
    fn integrate(&mut self, dt_ms: f32) {
        let dt_secs = dt_ms / 1000.0;
        let now_ms = self.now_ms;
        let border = self.world.border;
        let config = &self.config;

        let speed: HashMap<PlayerId, f32> = self
            .players
            .values()
            .map(|p| (p.id, p.speed_multiplier(&config.items)))
            .collect();

        for entity in self.world.iter_mut() {
            if entity.is_removed() {
                continue;
            }
            match entity {
                Entity::Player(cell) => {
                    let multiplier = speed.get(&cell.owner).copied().unwrap_or(1.0);
                    cell.update(dt_ms, multiplier, config, &border);
                }
                Entity::Food(food) => food.update(now_ms, &config.food),
                Entity::Eject(eject) => eject.update(dt_secs, now_ms, &config.physics, &config.eject, &border),
                Entity::Bullet(bullet) => bullet.update(dt_secs, now_ms, &config.physics, &config.bullet, &border),
                Entity::Virus(virus) => virus.data_mut().integrate(dt_secs, &config.physics, &border),
                Entity::Item(_) => {}
            }
        }
    }

    /// Sweep removed entities and eliminate anyone left without cells.
    fn cleanup(&mut self) {
        let removed = self.world.sweep_removed();
        if removed > 0 {
            debug!("Swept {} entities", removed);
        }

        let world = &self.world;
        let mut empty = Vec::new();
        for player in self.players.values_mut() {
            player.cells.retain(|id| world.player_cell(*id).is_some());
            if player.cells.is_empty() {
                empty.push(player.id);
            }
        }
        for id in empty {
            warn!("Player {} has no cells left, removing", id);
            if let Some(player) = self.players.remove(&id) {
                self.outbox.to_all(ServerEvent::PlayerLeft { player_id: player.id });
            }
        }
    }

    /// Expire barrier and speed-up effects whose duration has elapsed.
    fn expire_power_ups(&mut self) {
        let now_ms = self.now_ms;
        let items = &self.config.items;
        for player in self.players.values_mut() {
            if player.barrier.expire(now_ms, items.barrier_duration_ms) {
                debug!("{}'s barrier expired", player.name);
                self.outbox.to_all(ServerEvent::BarrierExpired { player_id: player.id });
            }
            if player.speed_up.expire(now_ms, items.speed_up_duration_ms) {
                debug!("{}'s speed-up expired", player.name);
                self.outbox.to_all(ServerEvent::SpeedUpExpired { player_id: player.id });
            }
        }
    }

    /// Top up food, viruses and pickups on their timers.
    fn spawn_entities(&mut self) {
        let now_ms = self.now_ms;
        let food = &self.config.food;
        self.world.spawn_food(food.respawn_per_tick, food, now_ms);

        let counts = self.world.counts();

        if now_ms.saturating_sub(self.timers.virus_ms) >= self.config.virus.spawn_interval_ms {
            self.timers.virus_ms = now_ms;
            if counts.viruses < self.config.virus.max_count {
                self.world.spawn_virus(&self.config, now_ms);
                debug!("Virus spawned ({}/{})", counts.viruses + 1, self.config.virus.max_count);
            }
        }

        let schedule = [
            (ItemKind::Gun, self.config.items.gun.clone(), self.timers.gun_ms),
            (ItemKind::Barrier, self.config.items.barrier.clone(), self.timers.barrier_ms),
            (ItemKind::SpeedUp, self.config.items.speed_up.clone(), self.timers.speed_up_ms),
        ];
        for (item, spawn, last_ms) in schedule {
            if now_ms.saturating_sub(last_ms) < spawn.spawn_interval_ms {
                continue;
            }
            match item {
                ItemKind::Gun => self.timers.gun_ms = now_ms,
                ItemKind::Barrier => self.timers.barrier_ms = now_ms,
                ItemKind::SpeedUp => self.timers.speed_up_ms = now_ms,
            }
            if counts.items(item) < spawn.max_count {
                self.world.spawn_item(item, &self.config, now_ms);
                debug!("{:?} item spawned ({}/{})", item, counts.items(item) + 1, spawn.max_count);
            }
        }
    }

    /// Total mass of a player's cells.
    pub fn player_mass(&self, player: &Player) -> f32 {
        crate::shop::total_mass(player, &self.world)
    }

    /// Rebuild the top-N-by-mass leaderboard.
    pub fn refresh_leaderboard(&mut self) {
        let mut entries: Vec<LeaderboardEntry> = self
            .players
            .values()
            .map(|p| LeaderboardEntry {
                id: p.id,
                name: p.name.clone(),
                mass: round1(self.player_mass(p)),
                score: p.score,
            })
            .collect();
        entries.sort_by(|a, b| b.mass.total_cmp(&a.mass).then(a.id.cmp(&b.id)));
        entries.truncate(self.config.server.leaderboard_size);
        self.leaderboard = entries;
    }

    fn refresh_stats(&mut self) {
        let counts = self.world.counts();
        let players = self.players.values();
        let stats = &mut self.stats;

        stats.tick_count = self.tick_count;
        stats.players_count = self.players.len();
        stats.foods_count = counts.food;
        stats.viruses_count = counts.viruses;
        stats.chat_messages_count = self.chat.len();
        stats.gun_items_count = counts.gun_items;
        stats.barrier_items_count = counts.barrier_items;
        stats.speed_up_items_count = counts.speed_up_items;
        stats.bullets_count = counts.bullets;

        stats.players_with_gun = 0;
        stats.players_with_barrier = 0;
        stats.players_with_speed_up = 0;
        for player in players {
            stats.players_with_gun += player.gun.has as usize;
            stats.players_with_barrier += (player.barrier.has || player.barrier.active) as usize;
            stats.players_with_speed_up += (player.speed_up.has || player.speed_up.active) as usize;
        }

        stats.protected_cells = self
            .world
            .iter()
            .filter(|e| matches!(e, Entity::Player(cell) if cell.is_protected() && !cell.data().removed))
            .count();
    }
}

#[inline]
fn elapsed_ms(start: std::time::Instant) -> f32 {
    start.elapsed().as_secs_f32() * 1000.0
}

/// Resident memory of this process in megabytes (Linux only, 0 elsewhere).
fn resident_memory_mb() -> f32 {
    std::fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|status| vm_rss_kb(&status))
        .map(|kb| kb as f32 / 1024.0)
        .unwrap_or(0.0)
}

/// The `VmRSS` line of `/proc/<pid>/status`, which the kernel reports in kB.
fn vm_rss_kb(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse().ok())
}

/// Run the simulation, broadcast and telemetry loops.
pub async fn run_game_loop(hub: Arc<Hub>) {
    let (tick_interval_ms, broadcast_interval_ms, telemetry_interval_ms) = {
        let mut game = hub.state.write().await;
        info!("Initial world spawn...");
        game.populate();
        let server = &game.config.server;
        (server.tick_interval_ms(), server.broadcast_interval_ms(), server.telemetry_interval_ms)
    };

    tokio::spawn(run_broadcast_loop(Arc::clone(&hub), broadcast_interval_ms));
    tokio::spawn(run_telemetry_loop(Arc::clone(&hub), telemetry_interval_ms));

    let start = Instant::now() + Duration::from_millis(tick_interval_ms);
    let mut ticker = interval_at(start, Duration::from_millis(tick_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_tick = Instant::now();

    loop {
        let scheduled = ticker.tick().await;

        // Hibernate when no users are connected to reduce CPU usage
        if hub.state.read().await.connections == 0 {
            sleep(Duration::from_millis((tick_interval_ms * 4).max(100))).await;
            last_tick = Instant::now();
            continue;
        }

        // Drain any backlog so the tick always runs on the latest schedule.
        let mut skipped = 0u32;
        while ticker.tick().now_or_never().is_some() {
            skipped += 1;
        }
        if skipped > 0 {
            debug!("Skipped {} ticks to stay current (lag: {:?})", skipped, Instant::now().saturating_duration_since(scheduled));
        }

        let now = Instant::now();
        let dt_ms = now.duration_since(last_tick).as_millis() as u64;
        last_tick = now;

        let outbound = {
            let mut game = hub.state.write().await;
            let tick_start = std::time::Instant::now();
            game.tick(dt_ms);
            let tick_ms = tick_start.elapsed().as_secs_f64() * 1000.0;
            game.update_time_avg = game.update_time_avg * 0.5 + tick_ms * 0.5;

            let tick_budget = tick_interval_ms as f64 * 0.9;
            if tick_ms > tick_budget {
                warn!(
                    "Slow tick #{}: {:.3}ms (budget: {:.1}ms) - {} players, {} entities",
                    game.tick_count,
                    tick_ms,
                    tick_budget,
                    game.players.len(),
                    game.world.len()
                );
            }
            game.outbox.drain()
        }; // Write lock released here

        hub.publish(outbound);
    }
}

/// Serialize and publish a snapshot at the broadcast rate.
async fn run_broadcast_loop(hub: Arc<Hub>, interval_ms: u64) {
    let mut ticker = interval_at(Instant::now() + Duration::from_millis(interval_ms), Duration::from_millis(interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let snapshot = {
            let game = hub.state.read().await;
            if game.connections == 0 {
                continue;
            }
            game.snapshot()
        };
        hub.publish_snapshot(snapshot);
    }
}

/// Sample resource usage and log a summary line.
async fn run_telemetry_loop(hub: Arc<Hub>, interval_ms: u64) {
    let mut ticker = interval_at(Instant::now() + Duration::from_millis(interval_ms), Duration::from_millis(interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let memory = resident_memory_mb();
        let mut game = hub.state.write().await;
        game.stats.memory_usage = round1(memory);
        info!(
            "Telemetry: {} players, {} connections, {} entities, tick avg {:.2}ms, {:.1} MB",
            game.players.len(),
            game.connections,
            game.world.len(),
            game.update_time_avg,
            memory
        );
    }
}
