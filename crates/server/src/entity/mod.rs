//! Game entities.
//!
//! Every entity is an [`ObjectData`] plus a kind-specific payload; the
//! [`GameObject`] trait gives uniform access to the shared part.

mod bullet;
mod ejected_mass;
mod food;
mod item;
mod object;
mod player_cell;
mod virus;

pub use bullet::Bullet;
pub use ejected_mass::EjectedMass;
pub use food::Food;
pub use item::Pickup;
pub use object::{GameObject, ObjectData};
pub use player_cell::{EjectLaunch, PlayerCell, SplitAnimation};
pub use virus::Virus;
