//! Spatial indexing utilities.
//!
//! A region quadtree rebuilt from scratch every tick.

mod quadtree;

pub use quadtree::{Bounds, QuadItem, QuadTree};
