//! Server configuration.
//!
//! Every tuning constant of the simulation lives here. Missing keys fall back
//! to their defaults, so a partial `config.toml` is always valid.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub physics: PhysicsConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub food: FoodConfig,
    #[serde(default)]
    pub eject: EjectConfig,
    #[serde(default)]
    pub virus: VirusConfig,
    #[serde(default)]
    pub items: ItemsConfig,
    #[serde(default)]
    pub bullet: BulletConfig,
    #[serde(default)]
    pub shop: ShopConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl Config {
    /// Load configuration from `config.toml` or use defaults.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    /// Load configuration from `path`, writing the defaults there if it does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            info!("No {} found, creating default config", path.display());
            let default_config = Self::default();
            std::fs::write(path, toml::to_string_pretty(&default_config)?)?;
            Ok(default_config)
        }
    }
}

/// Server networking and scheduling settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum simultaneous connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Server name reported by the status endpoint.
    #[serde(default = "default_name")]
    pub name: String,
    /// Simulation ticks per second.
    #[serde(default = "default_tick_rate")]
    pub tick_rate: u32,
    /// Snapshot broadcasts per second.
    #[serde(default = "default_broadcast_rate")]
    pub broadcast_rate: u32,
    /// Telemetry sampling interval in milliseconds.
    #[serde(default = "default_telemetry_interval")]
    pub telemetry_interval_ms: u64,
    /// Leaderboard refresh interval in milliseconds.
    #[serde(default = "default_leaderboard_interval")]
    pub leaderboard_interval_ms: u64,
    /// Leaderboard length.
    #[serde(default = "default_leaderboard_size")]
    pub leaderboard_size: usize,
    /// Largest tick delta fed to the simulation, in milliseconds.
    #[serde(default = "default_max_tick_delta")]
    pub max_tick_delta_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            max_connections: default_max_connections(),
            name: default_name(),
            tick_rate: default_tick_rate(),
            broadcast_rate: default_broadcast_rate(),
            telemetry_interval_ms: default_telemetry_interval(),
            leaderboard_interval_ms: default_leaderboard_interval(),
            leaderboard_size: default_leaderboard_size(),
            max_tick_delta_ms: default_max_tick_delta(),
        }
    }
}

impl ServerConfig {
    /// Tick interval in milliseconds.
    pub fn tick_interval_ms(&self) -> u64 {
        (1000 / self.tick_rate.max(1)) as u64
    }

    /// Broadcast interval in milliseconds.
    pub fn broadcast_interval_ms(&self) -> u64 {
        (1000 / self.broadcast_rate.max(1)) as u64
    }
}

fn default_port() -> u16 {
    3000
}
fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_max_connections() -> usize {
    100
}
fn default_name() -> String {
    "Cell Arena".to_string()
}
fn default_tick_rate() -> u32 {
    25
}
fn default_broadcast_rate() -> u32 {
    20
}
fn default_telemetry_interval() -> u64 {
    5000
}
fn default_leaderboard_interval() -> u64 {
    1000
}
fn default_leaderboard_size() -> usize {
    10
}
fn default_max_tick_delta() -> u64 {
    250
}

/// World bounds. Coordinates run from `0` to `width`/`height`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorldConfig {
    #[serde(default = "default_world_size")]
    pub width: f32,
    #[serde(default = "default_world_size")]
    pub height: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: default_world_size(),
            height: default_world_size(),
        }
    }
}

fn default_world_size() -> f32 {
    2000.0
}

/// Integration and overlap separation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PhysicsConfig {
    /// Velocity multiplier applied every tick.
    #[serde(default = "default_friction")]
    pub friction: f32,
    /// Decay of pending position adjustments after they are applied.
    #[serde(default = "default_adjustment_decay")]
    pub adjustment_decay: f32,
    /// Extra gap kept between overlapping cells.
    #[serde(default = "default_min_cell_distance")]
    pub min_cell_distance: f32,
    #[serde(default = "default_adjustment_force")]
    pub position_adjustment_force: f32,
    #[serde(default = "default_smooth_factor")]
    pub smooth_factor: f32,
    /// Radius multiplier for the overlap test.
    #[serde(default = "default_overlap_check_radius")]
    pub overlap_check_radius: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            friction: default_friction(),
            adjustment_decay: default_adjustment_decay(),
            min_cell_distance: default_min_cell_distance(),
            position_adjustment_force: default_adjustment_force(),
            smooth_factor: default_smooth_factor(),
            overlap_check_radius: default_overlap_check_radius(),
        }
    }
}

fn default_friction() -> f32 {
    0.92
}
fn default_adjustment_decay() -> f32 {
    0.85
}
fn default_min_cell_distance() -> f32 {
    8.0
}
fn default_adjustment_force() -> f32 {
    0.15
}
fn default_smooth_factor() -> f32 {
    0.08
}
fn default_overlap_check_radius() -> f32 {
    1.1
}

/// Player cell configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayerConfig {
    #[serde(default = "default_player_initial_mass")]
    pub initial_mass: f32,
    /// Distance from the border at which new players spawn.
    #[serde(default = "default_player_spawn_margin")]
    pub spawn_margin: f32,
    /// Distance from the border that move targets are clamped to.
    #[serde(default = "default_player_target_margin")]
    pub target_margin: f32,
    /// `speed = max(speed_base / mass^speed_exponent, speed_floor)`.
    #[serde(default = "default_player_speed_base")]
    pub speed_base: f32,
    #[serde(default = "default_player_speed_exponent")]
    pub speed_exponent: f32,
    #[serde(default = "default_player_speed_floor")]
    pub speed_floor: f32,
    #[serde(default = "default_player_split_min_mass")]
    pub split_min_mass: f32,
    #[serde(default = "default_player_eject_min_mass")]
    pub eject_min_mass: f32,
    /// Eat ratio while the player owns a single cell.
    #[serde(default = "default_player_eat_ratio")]
    pub eat_ratio: f32,
    /// Eat ratio while the player owns several cells.
    #[serde(default = "default_player_eat_ratio_split")]
    pub eat_ratio_split: f32,
    #[serde(default = "default_player_decay_min_mass")]
    pub decay_min_mass: f32,
    #[serde(default = "default_player_decay_rate")]
    pub decay_rate: f32,
    #[serde(default = "default_player_decay_offset")]
    pub decay_offset: f32,
    #[serde(default = "default_player_max_cells")]
    pub max_cells: usize,
    /// Merge cooldown after a split, in milliseconds.
    #[serde(default = "default_player_merge_time")]
    pub merge_time_ms: f32,
    #[serde(default = "default_player_split_protection")]
    pub split_protection_ms: f32,
    #[serde(default = "default_player_split_boost")]
    pub split_boost: f32,
    #[serde(default = "default_player_min_split_distance")]
    pub min_split_distance: f32,
    /// Minimum time between two splits of the same cell.
    #[serde(default = "default_player_split_cooldown")]
    pub split_cooldown_ms: u64,
    /// Cells merge when closer than `(r1 + r2) * merge_distance_factor`.
    #[serde(default = "default_player_merge_distance_factor")]
    pub merge_distance_factor: f32,
    #[serde(default = "default_max_nick_length")]
    pub max_nick_length: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            initial_mass: default_player_initial_mass(),
            spawn_margin: default_player_spawn_margin(),
            target_margin: default_player_target_margin(),
            speed_base: default_player_speed_base(),
            speed_exponent: default_player_speed_exponent(),
            speed_floor: default_player_speed_floor(),
            split_min_mass: default_player_split_min_mass(),
            eject_min_mass: default_player_eject_min_mass(),
            eat_ratio: default_player_eat_ratio(),
            eat_ratio_split: default_player_eat_ratio_split(),
            decay_min_mass: default_player_decay_min_mass(),
            decay_rate: default_player_decay_rate(),
            decay_offset: default_player_decay_offset(),
            max_cells: default_player_max_cells(),
            merge_time_ms: default_player_merge_time(),
            split_protection_ms: default_player_split_protection(),
            split_boost: default_player_split_boost(),
            min_split_distance: default_player_min_split_distance(),
            split_cooldown_ms: default_player_split_cooldown(),
            merge_distance_factor: default_player_merge_distance_factor(),
            max_nick_length: default_max_nick_length(),
        }
    }
}

fn default_player_initial_mass() -> f32 {
    20.0
}
fn default_player_spawn_margin() -> f32 {
    200.0
}
fn default_player_target_margin() -> f32 {
    50.0
}
fn default_player_speed_base() -> f32 {
    60.0
}
fn default_player_speed_exponent() -> f32 {
    0.4
}
fn default_player_speed_floor() -> f32 {
    8.0
}
fn default_player_split_min_mass() -> f32 {
    35.0
}
fn default_player_eject_min_mass() -> f32 {
    38.0
}
fn default_player_eat_ratio() -> f32 {
    1.25
}
fn default_player_eat_ratio_split() -> f32 {
    1.33
}
fn default_player_decay_min_mass() -> f32 {
    35.0
}
fn default_player_decay_rate() -> f32 {
    0.002
}
fn default_player_decay_offset() -> f32 {
    32.0
}
fn default_player_max_cells() -> usize {
    16
}
fn default_player_merge_time() -> f32 {
    15000.0
}
fn default_player_split_protection() -> f32 {
    2500.0
}
fn default_player_split_boost() -> f32 {
    780.0
}
fn default_player_min_split_distance() -> f32 {
    100.0
}
fn default_player_split_cooldown() -> u64 {
    1000
}
fn default_player_merge_distance_factor() -> f32 {
    1.2
}
fn default_max_nick_length() -> usize {
    20
}

/// Food configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FoodConfig {
    #[serde(default = "default_food_initial_mass")]
    pub initial_mass: f32,
    #[serde(default = "default_food_max_mass")]
    pub max_mass: f32,
    /// Time for a pellet to grow from initial to max mass.
    #[serde(default = "default_food_growth_time")]
    pub growth_time_ms: u64,
    /// Population maintained by the spawner.
    #[serde(default = "default_food_count")]
    pub count: usize,
    /// Pellets added per tick while below `count`.
    #[serde(default = "default_food_respawn_per_tick")]
    pub respawn_per_tick: usize,
    /// Distance from the border at which food spawns.
    #[serde(default = "default_food_spawn_margin")]
    pub spawn_margin: f32,
}

impl Default for FoodConfig {
    fn default() -> Self {
        Self {
            initial_mass: default_food_initial_mass(),
            max_mass: default_food_max_mass(),
            growth_time_ms: default_food_growth_time(),
            count: default_food_count(),
            respawn_per_tick: default_food_respawn_per_tick(),
            spawn_margin: default_food_spawn_margin(),
        }
    }
}

fn default_food_initial_mass() -> f32 {
    10.0
}
fn default_food_max_mass() -> f32 {
    15.0
}
fn default_food_growth_time() -> u64 {
    300_000
}
fn default_food_count() -> usize {
    800
}
fn default_food_respawn_per_tick() -> usize {
    3
}
fn default_food_spawn_margin() -> f32 {
    50.0
}

/// Ejected mass configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EjectConfig {
    /// Fraction of the cell's mass ejected, before clamping.
    #[serde(default = "default_eject_fraction")]
    pub fraction: f32,
    #[serde(default = "default_eject_min_amount")]
    pub min_amount: f32,
    #[serde(default = "default_eject_max_amount")]
    pub max_amount: f32,
    #[serde(default = "default_eject_base_velocity")]
    pub base_velocity: f32,
    #[serde(default = "default_eject_max_speed_bonus")]
    pub max_speed_bonus: f32,
    #[serde(default = "default_eject_recoil")]
    pub recoil_strength: f32,
    /// Extra friction on top of the global one.
    #[serde(default = "default_eject_friction")]
    pub friction: f32,
    /// Ejected mass is removed once both velocity components fall below this.
    #[serde(default = "default_eject_stop_velocity")]
    pub stop_velocity: f32,
    #[serde(default = "default_eject_ttl")]
    pub ttl_ms: u64,
    #[serde(default = "default_eject_cooldown")]
    pub cooldown_ms: u64,
    #[serde(default = "default_eject_jitter")]
    pub angle_jitter: f32,
}

impl Default for EjectConfig {
    fn default() -> Self {
        Self {
            fraction: default_eject_fraction(),
            min_amount: default_eject_min_amount(),
            max_amount: default_eject_max_amount(),
            base_velocity: default_eject_base_velocity(),
            max_speed_bonus: default_eject_max_speed_bonus(),
            recoil_strength: default_eject_recoil(),
            friction: default_eject_friction(),
            stop_velocity: default_eject_stop_velocity(),
            ttl_ms: default_eject_ttl(),
            cooldown_ms: default_eject_cooldown(),
            angle_jitter: default_eject_jitter(),
        }
    }
}

fn default_eject_fraction() -> f32 {
    0.18
}
fn default_eject_min_amount() -> f32 {
    12.0
}
fn default_eject_max_amount() -> f32 {
    16.0
}
fn default_eject_base_velocity() -> f32 {
    120.0
}
fn default_eject_max_speed_bonus() -> f32 {
    50.0
}
fn default_eject_recoil() -> f32 {
    100.0
}
fn default_eject_friction() -> f32 {
    0.8
}
fn default_eject_stop_velocity() -> f32 {
    10.0
}
fn default_eject_ttl() -> u64 {
    10_000
}
fn default_eject_cooldown() -> u64 {
    120
}
fn default_eject_jitter() -> f32 {
    0.15
}

/// Virus configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VirusConfig {
    #[serde(default = "default_virus_mass")]
    pub mass: f32,
    /// Mass at which a virus fed with ejected mass splits.
    #[serde(default = "default_virus_split_mass")]
    pub split_mass: f32,
    #[serde(default = "default_virus_max_hits")]
    pub max_hits: u32,
    /// Children launched by a virus split.
    #[serde(default = "default_virus_split_into")]
    pub split_into: usize,
    #[serde(default = "default_virus_child_speed")]
    pub child_speed: f32,
    /// Player cells below this mass pass through viruses.
    #[serde(default = "default_virus_min_interaction_mass")]
    pub min_interaction_mass: f32,
    /// Mass granted by a risk/reward interaction.
    #[serde(default = "default_virus_bonus_mass")]
    pub bonus_mass: f32,
    /// New cells created by a risk/reward interaction.
    #[serde(default = "default_virus_risk_split_count")]
    pub risk_split_count: usize,
    #[serde(default = "default_virus_hit_cooldown")]
    pub hit_cooldown_ms: u64,
    #[serde(default = "default_virus_count")]
    pub initial_count: usize,
    #[serde(default = "default_virus_count")]
    pub max_count: usize,
    #[serde(default = "default_virus_spawn_interval")]
    pub spawn_interval_ms: u64,
    /// Distance from the border at which viruses and items spawn.
    #[serde(default = "default_virus_spawn_margin")]
    pub spawn_margin: f32,
}

impl Default for VirusConfig {
    fn default() -> Self {
        Self {
            mass: default_virus_mass(),
            split_mass: default_virus_split_mass(),
            max_hits: default_virus_max_hits(),
            split_into: default_virus_split_into(),
            child_speed: default_virus_child_speed(),
            min_interaction_mass: default_virus_min_interaction_mass(),
            bonus_mass: default_virus_bonus_mass(),
            risk_split_count: default_virus_risk_split_count(),
            hit_cooldown_ms: default_virus_hit_cooldown(),
            initial_count: default_virus_count(),
            max_count: default_virus_count(),
            spawn_interval_ms: default_virus_spawn_interval(),
            spawn_margin: default_virus_spawn_margin(),
        }
    }
}

fn default_virus_mass() -> f32 {
    100.0
}
fn default_virus_split_mass() -> f32 {
    120.0
}
fn default_virus_max_hits() -> u32 {
    7
}
fn default_virus_split_into() -> usize {
    16
}
fn default_virus_child_speed() -> f32 {
    500.0
}
fn default_virus_min_interaction_mass() -> f32 {
    120.0
}
fn default_virus_bonus_mass() -> f32 {
    100.0
}
fn default_virus_risk_split_count() -> usize {
    7
}
fn default_virus_hit_cooldown() -> u64 {
    500
}
fn default_virus_count() -> usize {
    15
}
fn default_virus_spawn_interval() -> u64 {
    30_000
}
fn default_virus_spawn_margin() -> f32 {
    100.0
}

/// Spawn rules for one pickup kind.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ItemSpawnConfig {
    pub spawn_interval_ms: u64,
    pub max_count: usize,
}

/// Pickup configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ItemsConfig {
    /// Mass of every pickup (determines its radius).
    #[serde(default = "default_item_mass")]
    pub mass: f32,
    /// Distance from the border kept clear when placing pickups.
    #[serde(default = "default_item_spawn_margin")]
    pub spawn_margin: f32,
    #[serde(default = "default_gun_spawn")]
    pub gun: ItemSpawnConfig,
    #[serde(default = "default_barrier_spawn")]
    pub barrier: ItemSpawnConfig,
    #[serde(default = "default_speed_up_spawn")]
    pub speed_up: ItemSpawnConfig,
    /// Bullets granted per gun pickup.
    #[serde(default = "default_gun_bullets_per_item")]
    pub gun_bullets_per_item: u32,
    #[serde(default = "default_gun_max_bullets")]
    pub gun_max_bullets: u32,
    #[serde(default = "default_gun_cooldown")]
    pub gun_cooldown_ms: u64,
    #[serde(default = "default_barrier_duration")]
    pub barrier_duration_ms: u64,
    #[serde(default = "default_speed_up_duration")]
    pub speed_up_duration_ms: u64,
    #[serde(default = "default_speed_up_multiplier")]
    pub speed_up_multiplier: f32,
}

impl Default for ItemsConfig {
    fn default() -> Self {
        Self {
            mass: default_item_mass(),
            spawn_margin: default_item_spawn_margin(),
            gun: default_gun_spawn(),
            barrier: default_barrier_spawn(),
            speed_up: default_speed_up_spawn(),
            gun_bullets_per_item: default_gun_bullets_per_item(),
            gun_max_bullets: default_gun_max_bullets(),
            gun_cooldown_ms: default_gun_cooldown(),
            barrier_duration_ms: default_barrier_duration(),
            speed_up_duration_ms: default_speed_up_duration(),
            speed_up_multiplier: default_speed_up_multiplier(),
        }
    }
}

fn default_item_mass() -> f32 {
    50.0
}
fn default_item_spawn_margin() -> f32 {
    100.0
}
fn default_gun_spawn() -> ItemSpawnConfig {
    ItemSpawnConfig { spawn_interval_ms: 45_000, max_count: 6 }
}
fn default_barrier_spawn() -> ItemSpawnConfig {
    ItemSpawnConfig { spawn_interval_ms: 60_000, max_count: 3 }
}
fn default_speed_up_spawn() -> ItemSpawnConfig {
    ItemSpawnConfig { spawn_interval_ms: 45_000, max_count: 3 }
}
fn default_gun_bullets_per_item() -> u32 {
    5
}
fn default_gun_max_bullets() -> u32 {
    10
}
fn default_gun_cooldown() -> u64 {
    500
}
fn default_barrier_duration() -> u64 {
    10_000
}
fn default_speed_up_duration() -> u64 {
    5_000
}
fn default_speed_up_multiplier() -> f32 {
    2.0
}

/// Bullet configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BulletConfig {
    #[serde(default = "default_bullet_damage")]
    pub damage: f32,
    #[serde(default = "default_bullet_speed")]
    pub speed: f32,
    #[serde(default = "default_bullet_radius")]
    pub radius: f32,
    #[serde(default = "default_bullet_ttl")]
    pub ttl_ms: u64,
    /// Cells at or below this mass die from a single hit.
    #[serde(default = "default_bullet_lethal_mass")]
    pub lethal_mass: f32,
    /// Damage never takes a cell below this mass.
    #[serde(default = "default_bullet_min_mass")]
    pub min_mass: f32,
    /// Score awarded to the shooter for a kill.
    #[serde(default = "default_bullet_kill_bonus")]
    pub kill_bonus: u64,
    #[serde(default = "default_bullet_friction")]
    pub friction: f32,
    #[serde(default = "default_bullet_stop_velocity")]
    pub stop_velocity: f32,
    /// Distance past the shooter's edge at which bullets spawn.
    #[serde(default = "default_bullet_muzzle_offset")]
    pub muzzle_offset: f32,
}

impl Default for BulletConfig {
    fn default() -> Self {
        Self {
            damage: default_bullet_damage(),
            speed: default_bullet_speed(),
            radius: default_bullet_radius(),
            ttl_ms: default_bullet_ttl(),
            lethal_mass: default_bullet_lethal_mass(),
            min_mass: default_bullet_min_mass(),
            kill_bonus: default_bullet_kill_bonus(),
            friction: default_bullet_friction(),
            stop_velocity: default_bullet_stop_velocity(),
            muzzle_offset: default_bullet_muzzle_offset(),
        }
    }
}

fn default_bullet_damage() -> f32 {
    100.0
}
fn default_bullet_speed() -> f32 {
    800.0
}
fn default_bullet_radius() -> f32 {
    4.0
}
fn default_bullet_ttl() -> u64 {
    3000
}
fn default_bullet_lethal_mass() -> f32 {
    100.0
}
fn default_bullet_min_mass() -> f32 {
    20.0
}
fn default_bullet_kill_bonus() -> u64 {
    500
}
fn default_bullet_friction() -> f32 {
    0.8
}
fn default_bullet_stop_velocity() -> f32 {
    10.0
}
fn default_bullet_muzzle_offset() -> f32 {
    10.0
}

/// Shop prices and minimums.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShopConfig {
    #[serde(default = "default_shop_gun_price")]
    pub gun_price: f32,
    /// Total mass required before a gun can be bought.
    #[serde(default = "default_shop_gun_min_mass")]
    pub gun_min_mass: f32,
    #[serde(default = "default_shop_gun_bullets")]
    pub gun_bullets: u32,
    /// Advertised gun duration sent with the purchase result.
    #[serde(default = "default_shop_gun_duration")]
    pub gun_duration_ms: u64,
    #[serde(default = "default_shop_barrier_price")]
    pub barrier_price: f32,
    /// Mass every cell keeps when paying.
    #[serde(default = "default_shop_reserve_mass")]
    pub reserve_mass: f32,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            gun_price: default_shop_gun_price(),
            gun_min_mass: default_shop_gun_min_mass(),
            gun_bullets: default_shop_gun_bullets(),
            gun_duration_ms: default_shop_gun_duration(),
            barrier_price: default_shop_barrier_price(),
            reserve_mass: default_shop_reserve_mass(),
        }
    }
}

fn default_shop_gun_price() -> f32 {
    100.0
}
fn default_shop_gun_min_mass() -> f32 {
    150.0
}
fn default_shop_gun_bullets() -> u32 {
    5
}
fn default_shop_gun_duration() -> u64 {
    30_000
}
fn default_shop_barrier_price() -> f32 {
    120.0
}
fn default_shop_reserve_mass() -> f32 {
    10.0
}

/// Chat configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    /// Messages retained in the ring buffer.
    #[serde(default = "default_chat_max_messages")]
    pub max_messages: usize,
    #[serde(default = "default_chat_max_length")]
    pub max_length: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_messages: default_chat_max_messages(),
            max_length: default_chat_max_length(),
        }
    }
}

fn default_chat_max_messages() -> usize {
    50
}
fn default_chat_max_length() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9000

            [player]
            max_cells = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.tick_rate, 25);
        assert_eq!(config.player.max_cells, 8);
        assert_eq!(config.player.initial_mass, 20.0);
        assert_eq!(config.virus.bonus_mass, 100.0);
        assert_eq!(config.items.gun.max_count, 6);
    }

    #[test]
    fn test_default_config_roundtrips_through_toml() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.world.width, 2000.0);
        assert_eq!(parsed.bullet.kill_bonus, 500);
        assert_eq!(parsed.items.barrier.spawn_interval_ms, 60_000);
    }

    #[test]
    fn test_intervals() {
        let server = ServerConfig::default();
        assert_eq!(server.tick_interval_ms(), 40);
        assert_eq!(server.broadcast_interval_ms(), 50);
    }
}
