//! Mass-for-item purchases.
//!
//! A purchase re-checks every precondition, then drains the price from the
//! player's cells in order, never taking a cell below the reserve. Nothing is
//! touched unless every check passes.

use crate::config::Config;
use crate::entity::GameObject;
use crate::player::Player;
use crate::world::World;
use protocol::packets::ItemKind;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ShopError {
    #[error("You have no cells")]
    NoCells,
    #[error("You already have a {0}")]
    AlreadyOwned(&'static str),
    #[error("Need at least {required} total mass (you have {total:.0})")]
    BelowMinimum { required: f32, total: f32 },
    #[error("Not enough mass: costs {price:.0}, you can spend {available:.0}")]
    InsufficientMass { price: f32, available: f32 },
}

/// Sum of the mass of every owned cell.
pub fn total_mass(player: &Player, world: &World) -> f32 {
    player
        .cells
        .iter()
        .filter_map(|id| world.player_cell(*id))
        .map(|cell| cell.data().mass())
        .sum()
}

/// Mass that can be taken without pushing any cell below `reserve`.
pub fn drainable_mass(player: &Player, world: &World, reserve: f32) -> f32 {
    player
        .cells
        .iter()
        .filter_map(|id| world.player_cell(*id))
        .map(|cell| (cell.data().mass() - reserve).max(0.0))
        .sum()
}

fn drain(player: &Player, world: &mut World, mut amount: f32, reserve: f32) {
    for id in &player.cells {
        if amount <= 0.0 {
            break;
        }
        if let Some(cell) = world.player_cell_mut(*id) {
            let mass = cell.data().mass();
            let take = (mass - reserve).max(0.0).min(amount);
            cell.data_mut().set_mass(mass - take);
            amount -= take;
        }
    }
}

fn check_cells(player: &Player, world: &World) -> Result<(), ShopError> {
    if player.cells.iter().any(|id| world.player_cell(*id).is_some()) {
        Ok(())
    } else {
        Err(ShopError::NoCells)
    }
}

fn check_price(player: &Player, world: &World, price: f32, config: &Config) -> Result<(), ShopError> {
    let available = drainable_mass(player, world, config.shop.reserve_mass);
    if available < price {
        return Err(ShopError::InsufficientMass { price, available });
    }
    Ok(())
}

/// Buy a gun. Returns the granted bullet count.
pub fn buy_gun(player: &mut Player, world: &mut World, config: &Config, now_ms: u64) -> Result<u32, ShopError> {
    check_cells(player, world)?;
    if player.gun.has {
        return Err(ShopError::AlreadyOwned(item_name(ItemKind::Gun)));
    }
    let total = total_mass(player, world);
    if total < config.shop.gun_min_mass {
        return Err(ShopError::BelowMinimum { required: config.shop.gun_min_mass, total });
    }
    check_price(player, world, config.shop.gun_price, config)?;

    drain(player, world, config.shop.gun_price, config.shop.reserve_mass);
    Ok(player.grant_gun(config.shop.gun_bullets, config.items.gun_max_bullets, now_ms))
}

/// Buy a barrier (possessed, not yet active). Returns its duration.
pub fn buy_barrier(player: &mut Player, world: &mut World, config: &Config) -> Result<u64, ShopError> {
    check_cells(player, world)?;
    if player.barrier.has || player.barrier.active {
        return Err(ShopError::AlreadyOwned(item_name(ItemKind::Barrier)));
    }
    let price = config.shop.barrier_price;
    let total = total_mass(player, world);
    if total < price {
        return Err(ShopError::BelowMinimum { required: price, total });
    }
    check_price(player, world, price, config)?;

    drain(player, world, price, config.shop.reserve_mass);
    player.barrier.has = true;
    Ok(config.items.barrier_duration_ms)
}

pub fn item_name(item: ItemKind) -> &'static str {
    match item {
        ItemKind::Gun => "gun",
        ItemKind::Barrier => "barrier",
        ItemKind::SpeedUp => "speed-up",
    }
}
