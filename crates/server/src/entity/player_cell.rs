//! Player cell.

use super::object::{GameObject, ObjectData};
use crate::collision::{mass_to_radius, speed_for_mass};
use crate::config::{Config, EjectConfig, PlayerConfig};
use crate::world::WorldBorder;
use glam::Vec2;
use protocol::{Color, EntityId, PlayerId};
use rand::Rng;
use std::f32::consts::PI;

/// Phase consumed per tick by the split animation.
const SPLIT_ANIMATION_STEP: f32 = 0.12;
/// Targets closer than this stop active steering.
const ARRIVAL_DISTANCE: f32 = 3.0;
/// Fraction of the remaining distance a cell may cover in one tick.
const MAX_STEP_FRACTION: f32 = 0.25;
const SAFE_SPLIT_ATTEMPTS: usize = 12;

/// Cosmetic interpolation from the split origin to the committed position.
#[derive(Debug, Clone, Copy)]
pub struct SplitAnimation {
    pub from: Vec2,
    /// Runs from 1.0 down to 0.0.
    pub phase: f32,
}

/// Mass blob produced by [`PlayerCell::eject`], not yet placed in the world.
#[derive(Debug, Clone, Copy)]
pub struct EjectLaunch {
    pub position: Vec2,
    pub velocity: Vec2,
    pub mass: f32,
}

/// A cell controlled by a player.
#[derive(Debug, Clone)]
pub struct PlayerCell {
    data: ObjectData,
    /// Owning player (looked up in the player map, never owned).
    pub owner: PlayerId,
    /// Movement target set by input.
    pub target: Vec2,
    pub merge_eligible: bool,
    pub merge_cooldown_ms: f32,
    pub split_protection_ms: f32,
    /// Recomputed from mass every tick.
    pub max_speed: f32,
    pub last_split_ms: Option<u64>,
    pub animation: Option<SplitAnimation>,
}

impl PlayerCell {
    pub fn new(id: EntityId, owner: PlayerId, position: Vec2, mass: f32, color: Color, now_ms: u64) -> Self {
        Self {
            data: ObjectData::new(id, position, mass, color, now_ms),
            owner,
            target: position,
            merge_eligible: false,
            merge_cooldown_ms: 0.0,
            split_protection_ms: 0.0,
            max_speed: 0.0,
            last_split_ms: None,
            animation: None,
        }
    }

    #[inline]
    pub fn is_protected(&self) -> bool {
        self.split_protection_ms > 0.0
    }

    /// Block merging for `ms` milliseconds.
    #[inline]
    pub fn start_merge_cooldown(&mut self, ms: f32) {
        self.merge_eligible = false;
        self.merge_cooldown_ms = ms;
    }

    #[inline]
    pub fn protect(&mut self, ms: f32) {
        self.split_protection_ms = ms;
    }

    /// Whether this cell may split again at `now_ms`.
    #[inline]
    pub fn split_ready(&self, now_ms: u64, config: &PlayerConfig) -> bool {
        self.data.mass() >= config.split_min_mass
            && self
                .last_split_ms
                .is_none_or(|last| now_ms.saturating_sub(last) > config.split_cooldown_ms)
    }

    /// Position shown to clients: trails the committed position while a split animation runs.
    pub fn visual_position(&self) -> Vec2 {
        match self.animation {
            Some(anim) => {
                let progress = 1.0 - anim.phase;
                let eased = 1.0 - (1.0 - progress).powi(3);
                anim.from.lerp(self.data.position, eased)
            }
            None => self.data.position,
        }
    }

    /// One simulation step: physics, timers, decay, steering.
    pub fn update(&mut self, dt_ms: f32, speed_multiplier: f32, config: &Config, border: &WorldBorder) {
        let dt_secs = dt_ms / 1000.0;
        self.data.integrate(dt_secs, &config.physics, border);

        if self.split_protection_ms > 0.0 {
            self.split_protection_ms = (self.split_protection_ms - dt_ms).max(0.0);
        }

        if let Some(anim) = self.animation.as_mut() {
            anim.phase -= SPLIT_ANIMATION_STEP;
            if anim.phase <= 0.0 {
                self.animation = None;
            }
        }

        if self.merge_cooldown_ms > 0.0 {
            self.merge_cooldown_ms -= dt_ms;
            if self.merge_cooldown_ms <= 0.0 {
                self.merge_cooldown_ms = 0.0;
                self.merge_eligible = true;
            }
        }

        self.apply_decay(dt_secs, &config.player);

        let player = &config.player;
        self.max_speed = speed_for_mass(self.data.mass(), player.speed_base, player.speed_exponent, player.speed_floor);
        self.move_towards(dt_secs, speed_multiplier, border);
    }

    /// Lose mass proportional to `mass - offset`, never below the decay floor.
    pub fn apply_decay(&mut self, dt_secs: f32, config: &PlayerConfig) {
        let mass = self.data.mass();
        if mass > config.decay_min_mass {
            let loss = config.decay_rate * (mass - config.decay_offset) * dt_secs;
            self.data.set_mass((mass - loss).max(config.decay_min_mass));
        }
    }

    fn move_towards(&mut self, dt_secs: f32, speed_multiplier: f32, border: &WorldBorder) {
        let delta = self.target - self.data.position;
        let distance = delta.length();

        if distance > ARRIVAL_DISTANCE {
            let step = (self.max_speed * dt_secs * speed_multiplier).min(distance * MAX_STEP_FRACTION);
            let direction = delta / distance;
            self.data.position += direction * step;
            self.data.velocity = direction * step * 12.0;
        } else {
            self.data.velocity *= 0.88;
            self.data.position += self.data.velocity * dt_secs;
        }

        self.data.clamp_to(border);
    }

    /// Halve this cell and return the new sibling launched along `angle`.
    ///
    /// The caller enforces the per-player cell cap and the split cooldown.
    pub fn split(&mut self, new_id: EntityId, angle: f32, now_ms: u64, config: &PlayerConfig, border: &WorldBorder) -> Option<PlayerCell> {
        if self.data.mass() < config.split_min_mass {
            return None;
        }

        let half = self.data.mass() / 2.0;
        self.data.set_mass(half);

        let origin = self.data.position;
        let position = self.safe_split_position(angle, config.min_split_distance, border);

        let mut sibling = PlayerCell::new(new_id, self.owner, position, half, self.data.color, now_ms);
        sibling.target = self.target;
        sibling.start_merge_cooldown(config.merge_time_ms);
        sibling.protect(config.split_protection_ms);
        sibling.last_split_ms = Some(now_ms);
        sibling.animation = Some(SplitAnimation { from: origin, phase: 1.0 });

        let direction = Vec2::from_angle(angle);
        let boost = config.split_boost * 0.8;
        sibling.data.velocity = direction * boost;
        self.data.velocity = -direction * boost * 0.3;

        self.start_merge_cooldown(config.merge_time_ms);
        self.protect(config.split_protection_ms);
        self.last_split_ms = Some(now_ms);

        Some(sibling)
    }

    /// Probe angularly offset candidates for a spot where the half-mass
    /// sibling fits inside the world; fall back to a clamped position.
    fn safe_split_position(&self, angle: f32, base_distance: f32, border: &WorldBorder) -> Vec2 {
        let origin = self.data.position;
        let radius = mass_to_radius(self.data.mass());

        for i in 0..SAFE_SPLIT_ATTEMPTS {
            let candidate_angle = angle + i as f32 * PI / 6.0;
            let distance = base_distance + i as f32 * 10.0;
            let candidate = origin + Vec2::from_angle(candidate_angle) * distance;
            if border.fits(candidate, radius) {
                return candidate;
            }
        }

        border.clamp_circle(origin + Vec2::from_angle(angle) * base_distance, self.data.radius())
    }

    /// Shed mass toward `aim` (or along `fallback_angle` when there is no usable aim).
    pub fn eject(&mut self, aim: Option<Vec2>, fallback_angle: f32, player: &PlayerConfig, config: &EjectConfig) -> Option<EjectLaunch> {
        if self.data.mass() < player.eject_min_mass {
            return None;
        }

        let amount = (self.data.mass() * config.fraction).clamp(config.min_amount, config.max_amount);
        self.data.set_mass(self.data.mass() - amount);

        let origin = self.data.position;
        let mut angle = fallback_angle;
        if let Some(aim) = aim {
            let delta = aim - origin;
            if delta.length() > 5.0 {
                angle = delta.y.atan2(delta.x);
            }
        }
        angle += (rand::rng().random::<f32>() - 0.5) * config.angle_jitter;

        let mass = self.data.mass();
        let direction = Vec2::from_angle(angle);
        let distance = self.data.radius() + 30.0 + (mass * 0.05).min(20.0);
        let speed = config.base_velocity + (60.0 / (mass / 35.0).sqrt()).min(config.max_speed_bonus);

        self.data.velocity -= direction * config.recoil_strength * (amount / mass);

        Some(EjectLaunch {
            position: origin + direction * distance,
            velocity: direction * speed,
            mass: amount,
        })
    }
}

impl GameObject for PlayerCell {
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

    fn cell(mass: f32, x: f32, y: f32) -> PlayerCell {
        PlayerCell::new(EntityId(1), PlayerId(1), Vec2::new(x, y), mass, Color::default(), 0)
    }

    #[test]
    fn test_split_halves_mass() {
        let config = PlayerConfig::default();
        let border = WorldBorder::new(2000.0, 2000.0);
        let mut source = cell(40.0, 1000.0, 1000.0);

        let sibling = source.split(EntityId(2), 0.0, 5000, &config, &border).unwrap();

        assert_eq!(source.data().mass(), 20.0);
        assert_eq!(sibling.data().mass(), 20.0);
        assert!(!source.merge_eligible && !sibling.merge_eligible);
        assert!(source.merge_cooldown_ms > 0.0 && sibling.merge_cooldown_ms > 0.0);
        assert!(source.is_protected() && sibling.is_protected());
        assert!(sibling.data().position.distance(source.data().position) >= config.min_split_distance - 1e-3);
        assert!(sibling.data().velocity.x > 0.0);
        assert!(source.data().velocity.x < 0.0);
    }

    #[test]
    fn test_split_below_minimum_is_noop() {
        let config = PlayerConfig::default();
        let border = WorldBorder::new(2000.0, 2000.0);
        let mut source = cell(30.0, 1000.0, 1000.0);
        assert!(source.split(EntityId(2), 0.0, 0, &config, &border).is_none());
        assert_eq!(source.data().mass(), 30.0);
    }

    #[test]
    fn test_split_near_wall_stays_in_bounds() {
        let config = PlayerConfig::default();
        let border = WorldBorder::new(2000.0, 2000.0);
        let mut source = cell(400.0, 1990.0, 1000.0);
        source.data_mut().clamp_to(&border);

        let sibling = source.split(EntityId(2), 0.0, 0, &config, &border).unwrap();
        let r = sibling.data().radius();
        let p = sibling.data().position;
        assert!(p.x - r >= 0.0 && p.x + r <= 2000.0);
        assert!(p.y - r >= 0.0 && p.y + r <= 2000.0);
    }

    #[test]
    fn test_split_cooldown() {
        let config = PlayerConfig::default();
        let mut c = cell(100.0, 500.0, 500.0);
        assert!(c.split_ready(0, &config));
        c.last_split_ms = Some(1000);
        assert!(!c.split_ready(2000, &config));
        assert!(c.split_ready(2001, &config));
    }

    #[test]
    fn test_eject_amount_and_recoil() {
        let player = PlayerConfig::default();
        let config = EjectConfig::default();
        let mut c = cell(100.0, 1000.0, 1000.0);

        let launch = c.eject(Some(Vec2::new(1500.0, 1000.0)), 0.0, &player, &config).unwrap();
        assert_eq!(launch.mass, 16.0);
        assert_eq!(c.data().mass(), 84.0);
        assert!(launch.position.x > 1000.0);
        assert!(launch.velocity.x > config.base_velocity * 0.9);
        assert!(c.data().velocity.x < 0.0);

        let mut small = cell(37.0, 1000.0, 1000.0);
        assert!(small.eject(None, 0.0, &player, &config).is_none());
    }

    #[test]
    fn test_decay_floor() {
        let config = PlayerConfig::default();
        let mut c = cell(36.0, 0.0, 0.0);
        c.apply_decay(1000.0, &config);
        assert_eq!(c.data().mass(), config.decay_min_mass);

        let mut small = cell(30.0, 0.0, 0.0);
        small.apply_decay(1000.0, &config);
        assert_eq!(small.data().mass(), 30.0);

        let mut big = cell(1032.0, 0.0, 0.0);
        big.apply_decay(1.0, &config);
        assert!((big.data().mass() - 1030.0).abs() < 1e-3);
    }

    #[test]
    fn test_moves_toward_target() {
        let config = Config::default();
        let border = WorldBorder::new(2000.0, 2000.0);
        let mut c = cell(20.0, 1000.0, 1000.0);
        c.target = Vec2::new(1500.0, 1000.0);

        c.update(40.0, 1.0, &config, &border);
        let slow = c.data().position.x - 1000.0;
        assert!(slow > 0.0);

        let mut fast = cell(20.0, 1000.0, 1000.0);
        fast.target = Vec2::new(1500.0, 1000.0);
        fast.update(40.0, 2.0, &config, &border);
        assert!(fast.data().position.x - 1000.0 > slow);
    }

    #[test]
    fn test_merge_cooldown_expires() {
        let config = Config::default();
        let border = WorldBorder::new(2000.0, 2000.0);
        let mut c = cell(20.0, 1000.0, 1000.0);
        c.start_merge_cooldown(100.0);
        c.update(60.0, 1.0, &config, &border);
        assert!(!c.merge_eligible);
        c.update(60.0, 1.0, &config, &border);
        assert!(c.merge_eligible);
    }

    #[test]
    fn test_split_animation_trails() {
        let config = Config::default();
        let border = WorldBorder::new(2000.0, 2000.0);
        let mut c = cell(20.0, 1000.0, 1000.0);
        c.animation = Some(SplitAnimation { from: Vec2::new(900.0, 1000.0), phase: 1.0 });
        assert_eq!(c.visual_position(), Vec2::new(900.0, 1000.0));

        for _ in 0..10 {
            c.update(40.0, 1.0, &config, &border);
        }
        assert!(c.animation.is_none());
        assert_eq!(c.visual_position(), c.data().position);
    }
}
