//! Terrain-awareness navigation-display rasterizer.
//!
//! Consumes live aircraft state from a simulator connector, rasterizes
//! color-coded terrain frames per display side, and emits them as
//! PNG-encoded radar-sweep transitions.

pub mod cli;
pub mod nd;
