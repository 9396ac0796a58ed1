//! Collision geometry and interaction rules.
//!
//! This module holds the pure math used by the resolver:
//! - mass/radius conversion
//! - contact and envelopment ("can eat") checks
//! - overlap separation impulses

use crate::config::PhysicsConfig;
use glam::Vec2;
use rand::Rng;
use std::f32::consts::PI;

/// `radius = sqrt(mass / PI) * RADIUS_FACTOR`.
pub const RADIUS_FACTOR: f32 = 1.2;

/// Result of checking two circles against each other.
#[derive(Debug, Clone, Copy)]
pub struct CollisionResult {
    /// Combined radius of both circles.
    pub r: f32,
    /// Vector from the first centre to the second.
    pub delta: Vec2,
    /// Distance between the centres.
    pub d: f32,
}

impl CollisionResult {
    /// Check if the circles actually touch.
    #[inline]
    pub fn is_colliding(&self) -> bool {
        self.d < self.r
    }
}

/// Check two circles.
#[inline]
pub fn check_collision(a_pos: Vec2, a_radius: f32, b_pos: Vec2, b_radius: f32) -> CollisionResult {
    let delta = b_pos - a_pos;
    CollisionResult {
        r: a_radius + b_radius,
        delta,
        d: delta.length(),
    }
}

/// Radius of a body with the given mass.
#[inline]
pub fn mass_to_radius(mass: f32) -> f32 {
    (mass.max(0.0) / PI).sqrt() * RADIUS_FACTOR
}

/// Mass of a body with the given radius.
#[inline]
pub fn radius_to_mass(radius: f32) -> f32 {
    let r = radius / RADIUS_FACTOR;
    PI * r * r
}

/// Whether a predator may consume prey.
///
/// The predator must outweigh the prey by `ratio` and the prey's centre must
/// be deep inside the predator (`distance < r_pred - r_prey / 2`).
#[inline]
pub fn can_eat(
    predator_pos: Vec2,
    predator_mass: f32,
    predator_radius: f32,
    prey_pos: Vec2,
    prey_mass: f32,
    prey_radius: f32,
    ratio: f32,
) -> bool {
    predator_mass >= prey_mass * ratio
        && predator_pos.distance(prey_pos) < predator_radius - prey_radius / 2.0
}

/// Overlap test used by position separation (padded by the config).
#[inline]
pub fn is_overlapping(a_pos: Vec2, a_radius: f32, b_pos: Vec2, b_radius: f32, physics: &PhysicsConfig) -> bool {
    a_pos.distance(b_pos) < (a_radius + b_radius) * physics.overlap_check_radius + physics.min_cell_distance
}

/// Adjustment pushing `pos` away from `other_pos`.
///
/// The heavier the other body, the harder this one is pushed. Coincident
/// centres get a small push in a random direction.
pub fn separation_impulse(
    pos: Vec2,
    radius: f32,
    mass: f32,
    other_pos: Vec2,
    other_radius: f32,
    other_mass: f32,
    physics: &PhysicsConfig,
) -> Vec2 {
    let delta = pos - other_pos;
    let distance = delta.length();

    if distance == 0.0 {
        let angle = rand::rng().random_range(0.0..(2.0 * PI));
        return Vec2::from_angle(angle) * physics.position_adjustment_force;
    }

    let overlap = (radius + other_radius) * physics.overlap_check_radius + physics.min_cell_distance - distance;
    if overlap <= 0.0 {
        return Vec2::ZERO;
    }

    let total = mass + other_mass;
    let mass_ratio = if total > 0.0 { other_mass / total } else { 0.5 };
    let strength = overlap * physics.position_adjustment_force * mass_ratio * physics.smooth_factor;
    delta / distance * strength
}

/// Maximum speed for a cell of the given mass: `max(base / mass^exp, floor)`.
#[inline]
pub fn speed_for_mass(mass: f32, base: f32, exponent: f32, floor: f32) -> f32 {
    (base / mass.max(1.0).powf(exponent)).max(floor)
}
