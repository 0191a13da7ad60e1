//! Boundary between the renderer and the simulator.
//!
//! The renderer never talks to the simulator directly; it consumes
//! [`SimMessage`]s from a channel and pushes finished frames through a
//! [`FrameSink`]. The crate also decodes the terrain-map file the renderer
//! is pointed at on startup.

pub use link::{message_channel, sink_channel, ChannelSink, DiscardSink, FrameSink, SinkEvent};
pub use mapfile::{load_terrain_map, MapFileError};
pub use types::{
    AircraftStatus, FrameMetadata, NavigationDisplay, PositionData, Side, SimMessage,
    TerrainRenderingMode,
};

mod link;
mod mapfile;
mod types;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("simulator consumer disconnected")]
    Disconnected,
}
