//! Encoder stage: canvases to PNG, emission to the simulator sink, and the
//! pull-side transition buffer.
//!
//! The encoder runs on its own thread so PNG compression never blocks the
//! sweep pacing. Jobs carry the side epoch they were rendered under; a job
//! whose epoch no longer matches is a stale frame and is dropped silently.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use image::{codecs::png::PngEncoder, ExtendedColorType, ImageEncoder};
use tracing::{debug, error};

use sim_link::{FrameMetadata, FrameSink, Side};

use crate::nd::config::{SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::nd::data::{current_millis, SharedTransitions, ThresholdData, TransitionSnapshot};
use crate::nd::telemetry;
use crate::nd::watchdog::RenderHealth;

const ENCODER_IDLE_TIMEOUT_MS: u64 = 500;

/// One canvas queued for encoding and emission.
pub(crate) struct EncodeJob {
    pub(crate) side: Side,
    pub(crate) canvas: Vec<u8>,
    /// Byte count is filled in after encoding.
    pub(crate) metadata: FrameMetadata,
    pub(crate) thresholds: ThresholdData,
    pub(crate) epoch: u64,
    /// First frame of a sweep: starts a fresh transition buffer.
    pub(crate) starts_transition: bool,
}

/// Epoch mirror shared between the render worker and the encoder.
#[derive(Default)]
pub(crate) struct SideEpochs {
    capt: AtomicU64,
    fo: AtomicU64,
}

impl SideEpochs {
    fn slot(&self, side: Side) -> &AtomicU64 {
        match side {
            Side::Capt => &self.capt,
            Side::Fo => &self.fo,
        }
    }

    pub(crate) fn set(&self, side: Side, epoch: u64) {
        self.slot(side).store(epoch, Ordering::SeqCst);
    }

    pub(crate) fn get(&self, side: Side) -> u64 {
        self.slot(side).load(Ordering::SeqCst)
    }
}

/// Spawn the dedicated encoder thread.
pub(crate) fn spawn_encode_worker(
    encode_rx: Receiver<EncodeJob>,
    sink: Arc<dyn FrameSink>,
    transitions: SharedTransitions,
    epochs: Arc<SideEpochs>,
    health: Arc<RenderHealth>,
    running: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    telemetry::spawn_thread("nd-encoding", move || loop {
        if !running.load(Ordering::Relaxed) {
            break;
        }
        let job = match encode_rx.recv_timeout(Duration::from_millis(ENCODER_IDLE_TIMEOUT_MS)) {
            Ok(job) => job,
            Err(RecvTimeoutError::Timeout) => {
                health.encoder_alive();
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        };
        health.encoder_alive();
        metrics::gauge!("nd_queue_depth", "queue" => "encoding").set(encode_rx.len() as f64);

        if job.epoch != epochs.get(job.side) {
            metrics::counter!("nd_stale_frames_total").increment(1);
            debug!(side = job.side.label(), "stale frame dropped after reconfiguration");
            continue;
        }

        let encode_start = Instant::now();
        let png = match encode_png(&job.canvas) {
            Ok(png) => png,
            Err(err) => {
                // A failed frame is dropped; the sweep keeps running.
                error!(side = job.side.label(), "frame encode failed: {err}");
                metrics::counter!("nd_encode_errors_total").increment(1);
                continue;
            }
        };
        metrics::histogram!("nd_encode_seconds").record(encode_start.elapsed().as_secs_f64());

        // A reconfiguration may have landed while the frame was encoding;
        // its output is discarded rather than emitted after the reset.
        if job.epoch != epochs.get(job.side) {
            metrics::counter!("nd_stale_frames_total").increment(1);
            continue;
        }

        let mut metadata = job.metadata;
        metadata.frame_byte_count = png.len() as u32;

        if sink.send_metadata(job.side, &metadata).is_err()
            || sink.send_frame(job.side, png.clone()).is_err()
        {
            error!("frame consumer disconnected, stopping pipeline");
            running.store(false, Ordering::SeqCst);
            break;
        }
        metrics::counter!("nd_frames_emitted_total", "side" => job.side.label()).increment(1);

        if let Ok(mut guard) = transitions.lock() {
            let slot = guard.get_mut(job.side);
            match slot {
                Some(snapshot) if !job.starts_transition => snapshot.frames.push(png),
                _ => {
                    *slot = Some(TransitionSnapshot {
                        timestamp_ms: current_millis(),
                        thresholds: job.thresholds,
                        frames: vec![png],
                    });
                }
            }
        }
    })
    .expect("failed to spawn encoding worker")
}

fn encode_png(canvas: &[u8]) -> Result<Vec<u8>, image::ImageError> {
    let mut png = Vec::with_capacity(64 * 1024);
    PngEncoder::new(&mut png).write_image(
        canvas,
        SCREEN_WIDTH as u32,
        SCREEN_HEIGHT as u32,
        ExtendedColorType::Rgba8,
    )?;
    Ok(png)
}

/// Drop a side's buffered transition data, e.g. on reconfiguration.
pub(crate) fn clear_transition(transitions: &SharedTransitions, side: Side) {
    if let Ok(mut guard) = transitions.lock() {
        *guard.get_mut(side) = None;
    }
}
