//! Frame composition: canvas embedding and the radar-sweep transition.
//!
//! The colorized map payload is painted into a fixed 768×768 canvas; during
//! a transition the wedge between the sweep's start and end angle shows the
//! new frame while everything else still shows the previous one.

use crate::nd::config::{
    DisplayConfig, BACKGROUND_RGBA, MAP_START_OFFSET_Y, SCREEN_HEIGHT, SCREEN_WIDTH,
    SWEEP_ANGULAR_STEP, SWEEP_FINAL_ANGLE,
};
use crate::nd::renderer::RenderedFrame;

/// Map payload of a rendered frame as 8-bit RGBA, metadata row stripped.
pub fn strip_metadata(frame: &RenderedFrame) -> Vec<u8> {
    frame.image[..frame.width * frame.height * 4]
        .iter()
        .map(|&v| v.clamp(0, 255) as u8)
        .collect()
}

/// A canvas holding nothing but the background fill.
pub fn background_canvas() -> Vec<u8> {
    BACKGROUND_RGBA.repeat(SCREEN_WIDTH * SCREEN_HEIGHT)
}

/// Paint the map payload into a fresh canvas at its configured inset.
pub fn embed_map(map_rgba: &[u8], config: &DisplayConfig) -> Vec<u8> {
    let mut canvas = background_canvas();
    for y in 0..config.map_height {
        let src = y * config.map_width * 4;
        let dst = ((y + MAP_START_OFFSET_Y) * SCREEN_WIDTH + config.map_offset_x) * 4;
        canvas[dst..dst + config.map_width * 4]
            .copy_from_slice(&map_rgba[src..src + config.map_width * 4]);
    }
    canvas
}

/// Compose one transition frame.
///
/// Map-region pixels whose sweep angle lies inside `[start_angle,
/// end_angle]` come from `new_canvas`; the rest comes from `last_canvas` or
/// the background when no previous frame exists.
pub fn sweep_frame(
    new_canvas: &[u8],
    last_canvas: Option<&[u8]>,
    config: &DisplayConfig,
    start_angle: f64,
    end_angle: f64,
) -> Vec<u8> {
    let mut canvas = match last_canvas {
        Some(last) => last.to_vec(),
        None => background_canvas(),
    };

    for y_local in 0..config.map_height {
        let dy = (config.map_height - y_local) as f64;
        let canvas_y = y_local + MAP_START_OFFSET_Y;
        for x in config.map_offset_x..config.map_offset_x + config.map_width {
            let dx = x as f64 - SCREEN_WIDTH as f64 / 2.0;
            let distance = (dx * dx + dy * dy).sqrt();
            let angle = (dy / distance).acos().to_degrees();
            if angle >= start_angle && angle <= end_angle {
                let offset = (canvas_y * SCREEN_WIDTH + x) * 4;
                canvas[offset..offset + 4].copy_from_slice(&new_canvas[offset..offset + 4]);
            }
        }
    }
    canvas
}

/// Start angle of the first sweep after startup, derived from the elapsed
/// time so a restarted display rejoins the continuous sweep phase.
pub fn initial_sweep_angle(elapsed_ms: u64) -> f64 {
    let fraction = (elapsed_ms % crate::nd::config::FRAME_VALIDITY_MS) as f64
        / crate::nd::config::FRAME_VALIDITY_MS as f64;
    (fraction * SWEEP_FINAL_ANGLE / SWEEP_ANGULAR_STEP).floor() * SWEEP_ANGULAR_STEP
}
