//! Fauna - deer herds that react to the player
//!
//! Deer run a small state machine on the scheduler tick and additionally
//! react immediately to player movement through a bounded reaction queue.
//! Terrain is consulted through [`DeerTerrain`]; deer never hold references
//! to the world.

pub mod behavior;
pub mod manager;
pub mod types;

pub use manager::DeerManager;
pub use types::{
    Deer, DeerId, DeerState, HerdId, PlayerMemory, Reaction, ReactionKind, ReactionQueue,
};

use crate::geometry::Point;

/// What deer need to know about the ground they stand on.
pub trait DeerTerrain {
    /// In bounds, not water and not a trunk.
    fn is_walkable(&self, p: Point) -> bool;

    /// Trunk or canopy.
    fn blocks_sight(&self, p: Point) -> bool;
}
