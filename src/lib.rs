//! Wildland: procedural region generation and deer simulation
//!
//! Re-exports modules for use by binaries and tools.

pub mod ascii;
pub mod classifier;
pub mod config;
pub mod elevation;
pub mod error;
pub mod explorer;
pub mod export;
pub mod fauna;
pub mod fog;
pub mod geology;
pub mod geometry;
pub mod hydrology;
pub mod pipeline;
pub mod rng;
pub mod tilemap;
pub mod trees;
pub mod vegetation;
pub mod world;

pub use crate::config::GameConfig;
pub use crate::error::{Result, WorldError};
pub use crate::world::{BufferAdapter, CellView, Core, Glyph, MoveOutcome, Viewport, WorldStats};
